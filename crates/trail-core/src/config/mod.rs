//! Configuration types for audit trails.
//!
//! A `TrailConfig` can be built in code or loaded from a YAML file
//! (conventionally `trail.yaml`):
//!
//! ```yaml
//! active: true
//! ignored: [updated_at, password_hash]
//! ignored_classes: [app::models::Session]
//! date_format: "%Y-%m-%d %H:%M:%S"
//! on_delete_failure: propagate
//! storage:
//!   backend: postgres
//!   database_url_env: DATABASE_URL
//! ```

pub mod storage;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub use storage::{StorageBackend, StorageConfig};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Behavior of the audit trail for one host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailConfig {
    /// Whether auditing runs at all. Inactive trails skip every action, deletes included.
    #[serde(default = "default_true")]
    pub active: bool,

    /// Fields to audit. Empty means every field.
    #[serde(default, deserialize_with = "lenient_list")]
    pub allowed: Vec<String>,

    /// Fields never audited. Applied after `allowed`.
    #[serde(default, deserialize_with = "lenient_list")]
    pub ignored: Vec<String>,

    /// Record type names skipped entirely.
    #[serde(default, deserialize_with = "lenient_list")]
    pub ignored_classes: Vec<String>,

    /// Format of the `created` column.
    #[serde(default)]
    pub date_format: DateFormat,

    /// What to do when writing a delete row fails.
    #[serde(default)]
    pub on_delete_failure: DeleteFailurePolicy,

    /// Where trail rows are written.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            active: true,
            allowed: Vec::new(),
            ignored: Vec::new(),
            ignored_classes: Vec::new(),
            date_format: DateFormat::default(),
            on_delete_failure: DeleteFailurePolicy::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl TrailConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML configuration.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.date_format.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "date_format '{}' is not a strftime pattern (use e.g. \"%Y-%m-%d %H:%M:%S\" or \"U\")",
                self.date_format.as_str()
            )));
        }
        self.storage.validate()
    }

    pub fn is_class_ignored(&self, type_name: &str) -> bool {
        self.ignored_classes.iter().any(|c| c == type_name)
    }

    pub fn with_allowed<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ignored<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ignored_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_classes = classes.into_iter().map(Into::into).collect();
        self
    }
}

/// strftime pattern for the `created` column.
///
/// `"U"` is accepted as shorthand for Unix seconds (`%s`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateFormat(String);

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const UNIX_FORMAT: &str = "%s";

impl Default for DateFormat {
    fn default() -> Self {
        Self(DATETIME_FORMAT.to_string())
    }
}

impl DateFormat {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn unix() -> Self {
        Self(UNIX_FORMAT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn pattern(&self) -> &str {
        match self.0.as_str() {
            "U" => UNIX_FORMAT,
            other => other,
        }
    }

    /// A pattern is valid when it parses and contains at least one specifier.
    ///
    /// Patterns made only of literal text, such as `Y-m-d H:i:s`, would stamp
    /// every row with the same string, so they are rejected.
    pub fn is_valid(&self) -> bool {
        let mut has_specifier = false;
        for item in StrftimeItems::new(self.pattern()) {
            match item {
                Item::Error => return false,
                Item::Numeric(..) | Item::Fixed(..) => has_specifier = true,
                _ => {}
            }
        }
        has_specifier
    }

    /// Format a timestamp, or `None` if the pattern is invalid.
    pub fn format(&self, at: &DateTime<Utc>) -> Option<String> {
        if !self.is_valid() {
            return None;
        }
        let mut out = String::new();
        write!(out, "{}", at.format(self.pattern())).ok()?;
        Some(out)
    }
}

/// Handling of storage failures while recording a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteFailurePolicy {
    /// Return the error to the caller, which may abort the delete.
    #[default]
    Propagate,
    /// Log and discard the error, like create and update failures.
    Ignore,
}

fn default_true() -> bool {
    true
}

/// Name list that falls back to empty, meaning no restriction, when malformed.
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::Null => Ok(Vec::new()),
        serde_yaml::Value::Sequence(items) => {
            let names: Option<Vec<String>> = items
                .into_iter()
                .map(|item| match item {
                    serde_yaml::Value::String(name) => Some(name),
                    _ => None,
                })
                .collect();
            Ok(names.unwrap_or_else(|| {
                tracing::warn!("Field list contains non-string entries, applying no restriction");
                Vec::new()
            }))
        }
        other => {
            tracing::warn!(value = ?other, "Field list is not a sequence, applying no restriction");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let config = TrailConfig::default();
        assert!(config.active);
        assert!(config.allowed.is_empty());
        assert!(config.ignored.is_empty());
        assert_eq!(config.date_format.as_str(), DATETIME_FORMAT);
        assert_eq!(config.on_delete_failure, DeleteFailurePolicy::Propagate);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
active: false
allowed: [name, email]
ignored: [email]
ignored_classes: [app::Session]
date_format: U
on_delete_failure: ignore
storage:
  backend: file
  file_path: /tmp/trail.log
"#;
        let config = TrailConfig::from_yaml_str(yaml).unwrap();
        assert!(!config.active);
        assert_eq!(config.allowed, vec!["name", "email"]);
        assert_eq!(config.ignored, vec!["email"]);
        assert!(config.is_class_ignored("app::Session"));
        assert!(!config.is_class_ignored("app::User"));
        assert_eq!(config.on_delete_failure, DeleteFailurePolicy::Ignore);
        assert_eq!(config.storage.backend, StorageBackend::File);
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = TrailConfig::from_yaml_str("{}").unwrap();
        assert!(config.active);
        assert_eq!(config.date_format, DateFormat::default());
    }

    #[test]
    fn test_invalid_date_format_rejected() {
        let err = TrailConfig::from_yaml_str("date_format: \"%Q\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_literal_date_format_rejected() {
        let err = TrailConfig::from_yaml_str("date_format: \"Y-m-d H:i:s\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(DateFormat::new("Y-m-d H:i:s").format(&at), None);
        assert!(!DateFormat::new("").is_valid());
        assert!(!DateFormat::new("%%").is_valid());
        assert!(DateFormat::new("at %H:%M").is_valid());
    }

    #[test]
    fn test_malformed_field_lists_mean_no_restriction() {
        let config = TrailConfig::from_yaml_str("allowed: name\nignored: 5\nignored_classes: [app::Session]\n").unwrap();
        assert!(config.allowed.is_empty());
        assert!(config.ignored.is_empty());
        assert!(config.is_class_ignored("app::Session"));

        let config = TrailConfig::from_yaml_str("allowed: [name, {nested: true}]\nignored:\n").unwrap();
        assert!(config.allowed.is_empty());
        assert!(config.ignored.is_empty());
    }

    #[test]
    fn test_date_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            DateFormat::default().format(&at).as_deref(),
            Some("2024-03-09 14:05:07")
        );
        assert_eq!(
            DateFormat::new("U").format(&at),
            Some(at.timestamp().to_string())
        );
        assert_eq!(DateFormat::unix().format(&at), Some(at.timestamp().to_string()));
        assert_eq!(DateFormat::new("%Q").format(&at), None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trail.yaml");
        fs::write(&path, "ignored: [updated_at]\n").unwrap();

        let config = TrailConfig::load(&path).unwrap();
        assert_eq!(config.ignored, vec!["updated_at"]);
    }
}
