//! Allow/ignore filtering of audited attributes.

use std::collections::BTreeSet;
use trail_core::{Snapshot, TrailConfig};

/// Reduces a snapshot to the fields that should be audited.
///
/// The allow-list is applied first, then the ignore-list on top of it, so a
/// field named in both lists is dropped. An empty list places no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    allowed: BTreeSet<String>,
    ignored: BTreeSet<String>,
}

impl ChangeFilter {
    pub fn new<A, I, S, T>(allowed: A, ignored: I) -> Self
    where
        A: IntoIterator<Item = S>,
        I: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            ignored: ignored.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &TrailConfig) -> Self {
        Self::new(config.allowed.iter().cloned(), config.ignored.iter().cloned())
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allowed.is_empty() && self.ignored.is_empty()
    }

    pub fn apply(&self, attributes: &Snapshot) -> Snapshot {
        let allowed = self.apply_allowed(attributes);
        self.apply_ignored(&allowed)
    }

    fn apply_allowed(&self, attributes: &Snapshot) -> Snapshot {
        if self.allowed.is_empty() {
            return attributes.clone();
        }
        attributes.retained(|name| self.allowed.contains(name))
    }

    fn apply_ignored(&self, attributes: &Snapshot) -> Snapshot {
        if self.ignored.is_empty() {
            return attributes.clone();
        }
        attributes.retained(|name| !self.ignored.contains(name))
    }
}

/// One-shot form of [`ChangeFilter::apply`].
pub fn filter<S: AsRef<str>>(attributes: &Snapshot, allowed: &[S], ignored: &[S]) -> Snapshot {
    ChangeFilter::new(
        allowed.iter().map(|s| s.as_ref().to_string()),
        ignored.iter().map(|s| s.as_ref().to_string()),
    )
    .apply(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot::new()
            .with("id", 1)
            .with("name", "Bob")
            .with("email", "bob@example.com")
            .with("updated_at", "2024-01-01")
    }

    #[test]
    fn test_empty_lists_are_identity() {
        let none: [&str; 0] = [];
        assert_eq!(filter(&sample(), &none, &none), sample());
        assert!(ChangeFilter::default().is_unrestricted());
    }

    #[test]
    fn test_allowed_only() {
        let out = filter(&sample(), &["name", "email"], &[]);
        assert_eq!(out.names().collect::<Vec<_>>(), vec!["email", "name"]);
    }

    #[test]
    fn test_ignored_only() {
        let out = filter(&sample(), &[], &["updated_at"]);
        assert_eq!(out.len(), 3);
        assert!(!out.contains("updated_at"));
    }

    #[test]
    fn test_field_in_both_lists_is_dropped() {
        let out = filter(&sample(), &["name", "email"], &["email"]);
        assert_eq!(out.names().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn test_unknown_names_do_not_fail() {
        let out = filter(&sample(), &["missing"], &["also_missing"]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let f = ChangeFilter::new(["name", "email", "id"], ["id"]);
        let once = f.apply(&sample());
        assert_eq!(f.apply(&once), once);
    }

    #[test]
    fn test_from_config() {
        let config = TrailConfig::default()
            .with_allowed(["name"])
            .with_ignored(["email"]);
        let f = ChangeFilter::from_config(&config);
        assert_eq!(f, ChangeFilter::new(["name"], ["email"]));
    }
}
