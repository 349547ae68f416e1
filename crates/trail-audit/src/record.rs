//! Records as seen by the audit trail.

use serde::{Deserialize, Serialize};
use trail_core::{RecordKey, Snapshot};

/// What the audit trail needs to read from a host record.
///
/// Implement this for ORM models, or use [`RecordState`] to pass the values
/// explicitly.
pub trait TrackedRecord {
    /// Fully-qualified type name, written to the `model` column.
    fn type_name(&self) -> &str;

    fn primary_key(&self) -> RecordKey;

    /// Current attribute values.
    fn attributes(&self) -> Snapshot;
}

/// Plain record state handed over by a persistence adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordState {
    pub type_name: String,
    pub key: RecordKey,
    pub attributes: Snapshot,
}

impl RecordState {
    pub fn new(type_name: impl Into<String>, key: impl Into<RecordKey>, attributes: Snapshot) -> Self {
        Self {
            type_name: type_name.into(),
            key: key.into(),
            attributes,
        }
    }
}

impl TrackedRecord for RecordState {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn primary_key(&self) -> RecordKey {
        self.key.clone()
    }

    fn attributes(&self) -> Snapshot {
        self.attributes.clone()
    }
}
