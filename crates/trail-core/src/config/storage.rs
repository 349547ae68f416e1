//! Trail storage configuration.

use super::ConfigError;
use serde::{Deserialize, Serialize};

/// Storage backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend type.
    #[serde(default)]
    pub backend: StorageBackend,

    /// File path (for file backend).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Environment variable holding the database URL. Takes precedence over `database_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url_env: Option<String>,

    /// Database URL (for postgres backend).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Trail table name (for postgres backend).
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            file_path: None,
            database_url_env: None,
            database_url: None,
            table: default_table(),
        }
    }
}

impl StorageConfig {
    /// Path of the JSON Lines file for the file backend.
    pub fn file_path(&self) -> &str {
        self.file_path.as_deref().unwrap_or("audit_trail.log")
    }

    /// Resolve the database URL, environment variable first.
    pub fn database_url(&self) -> Option<String> {
        if let Some(var) = &self.database_url_env {
            if let Ok(url) = std::env::var(var) {
                return Some(url);
            }
        }
        self.database_url.clone()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == StorageBackend::Postgres
            && self.database_url.is_none()
            && self.database_url_env.is_none()
        {
            return Err(ConfigError::Invalid(
                "postgres storage requires database_url or database_url_env".to_string(),
            ));
        }
        if self.table.is_empty()
            || !self
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "invalid table name '{}'",
                self.table
            )));
        }
        Ok(())
    }
}

/// Storage backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Keep rows in process memory.
    #[default]
    Memory,
    /// Append rows to a JSON Lines file.
    File,
    /// Discard rows.
    Null,
    /// Insert rows into a Postgres table.
    Postgres,
}

fn default_table() -> String {
    "audit_trail".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_requires_url() {
        let config = StorageConfig {
            backend: StorageBackend::Postgres,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StorageConfig {
            backend: StorageBackend::Postgres,
            database_url: Some("postgres://localhost/app".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_table_name_validated() {
        let config = StorageConfig {
            table: "audit; drop table users".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_url_from_env() {
        // SAFETY: We're in a test and controlling the environment
        unsafe {
            std::env::set_var("TRAIL_TEST_DB_URL", "postgres://env-host/db");
        }
        let config = StorageConfig {
            database_url_env: Some("TRAIL_TEST_DB_URL".to_string()),
            database_url: Some("postgres://direct/db".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.database_url().as_deref(),
            Some("postgres://env-host/db")
        );
    }

    #[test]
    fn test_file_path_default() {
        assert_eq!(StorageConfig::default().file_path(), "audit_trail.log");
    }
}
