//! Persisted audit trail rows.

use serde::{Deserialize, Serialize};
use trail_core::{Action, EntryId};

/// One persisted change: a single field of a created or updated record, or a
/// delete marker.
///
/// Rows are append-only; nothing in this crate updates or removes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrailRow {
    pub entry_id: EntryId,
    pub user_id: Option<String>,
    pub old_value: String,
    pub new_value: String,
    pub action: Action,
    /// Type name of the record.
    pub model: String,
    /// Normalized primary key of the record.
    pub model_id: String,
    /// Changed field, empty for deletes.
    pub field: String,
    /// Creation time formatted with the configured date format.
    pub created: String,
}

impl AuditTrailRow {
    /// Column names in storage order.
    pub const COLUMNS: [&'static str; 9] = [
        "entry_id",
        "user_id",
        "old_value",
        "new_value",
        "action",
        "model",
        "model_id",
        "field",
        "created",
    ];

    /// Delete marker row: no field, no old or new value.
    pub fn delete(
        entry_id: EntryId,
        user_id: Option<String>,
        model: impl Into<String>,
        model_id: impl Into<String>,
        created: impl Into<String>,
    ) -> Self {
        Self {
            entry_id,
            user_id,
            old_value: String::new(),
            new_value: String::new(),
            action: Action::Delete,
            model: model.into(),
            model_id: model_id.into(),
            field: String::new(),
            created: created.into(),
        }
    }

    pub fn is_delete(&self) -> bool {
        self.action == Action::Delete
    }

    /// Human-readable one-line summary.
    ///
    /// Format: `[created] ACTION model#model_id field: old -> new entry=... user=...`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} {}#{}",
            self.created, self.action, self.model, self.model_id
        );

        if !self.field.is_empty() {
            line.push_str(&format!(
                " {}: {} -> {}",
                self.field,
                preview(&self.old_value),
                preview(&self.new_value)
            ));
        }

        line.push_str(&format!(" entry={}", self.entry_id));
        if let Some(ref user) = self.user_id {
            line.push_str(&format!(" user={}", user));
        }

        line
    }
}

fn preview(value: &str) -> String {
    let flat = value.replace('\n', " ");
    if flat.chars().count() > 60 {
        let cut: String = flat.chars().take(60).collect();
        format!("\"{}...\"", cut)
    } else {
        format!("\"{}\"", flat)
    }
}
