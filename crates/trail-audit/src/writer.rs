//! Trail writer: diffs filtered snapshots and persists trail rows.

use std::sync::Arc;

use trail_core::{Action, DateFormat, RecordKey, Snapshot, TrailConfig, stringify_value};

use crate::context::AuditContext;
use crate::error::TrailError;
use crate::filter::ChangeFilter;
use crate::row::AuditTrailRow;
use crate::storage::TrailStorage;

/// Difference of a single field between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

/// Field-by-field difference driven by the fields of `new`.
///
/// A field missing from `old` compares as the empty string. Fields only
/// present in `old` are not reported.
pub fn diff(new: &Snapshot, old: &Snapshot) -> Vec<FieldChange> {
    new.iter()
        .filter_map(|(field, value)| {
            let new_value = stringify_value(value);
            let old_value = old.text(field).unwrap_or_default();
            (old_value != new_value).then(|| FieldChange {
                field: field.to_string(),
                old_value,
                new_value,
            })
        })
        .collect()
}

/// Produces trail rows and hands them to storage. Never reads rows back.
pub struct TrailWriter {
    filter: ChangeFilter,
    date_format: DateFormat,
    storage: Arc<dyn TrailStorage>,
}

impl TrailWriter {
    pub fn new(filter: ChangeFilter, date_format: DateFormat, storage: Arc<dyn TrailStorage>) -> Self {
        Self {
            filter,
            date_format,
            storage,
        }
    }

    pub fn from_config(config: &TrailConfig, storage: Arc<dyn TrailStorage>) -> Self {
        Self::new(
            ChangeFilter::from_config(config),
            config.date_format.clone(),
            storage,
        )
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }

    pub fn storage(&self) -> &Arc<dyn TrailStorage> {
        &self.storage
    }

    /// Auditable changes between two raw snapshots, after filtering both.
    pub fn changes(&self, new_raw: &Snapshot, old_raw: &Snapshot) -> Vec<FieldChange> {
        let new = self.filter.apply(new_raw);
        let old = self.filter.apply(old_raw);
        if new.same_values_as(&old) {
            return Vec::new();
        }
        diff(&new, &old)
    }

    /// Record a create or update.
    ///
    /// Writes one row per changed field as a single batch and returns the
    /// written rows. Returns an empty list, without resolving an entry or
    /// touching storage, when nothing auditable changed.
    pub async fn capture(
        &self,
        action: Action,
        new_raw: &Snapshot,
        old_raw: &Snapshot,
        model: &str,
        key: &RecordKey,
        ctx: &AuditContext,
    ) -> Result<Vec<AuditTrailRow>, TrailError> {
        let changes = self.changes(new_raw, old_raw);
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let entry_id = ctx.resolve_entry().await?;
        let user_id = ctx.user_id().map(str::to_string);
        let model_id = key.normalized()?;
        let created = self.created(ctx)?;

        let rows: Vec<AuditTrailRow> = changes
            .into_iter()
            .map(|change| AuditTrailRow {
                entry_id: entry_id.clone(),
                user_id: user_id.clone(),
                old_value: change.old_value,
                new_value: change.new_value,
                action,
                model: model.to_string(),
                model_id: model_id.clone(),
                field: change.field,
                created: created.clone(),
            })
            .collect();

        self.storage.insert_batch(rows.clone()).await?;

        tracing::debug!(
            entry_id = %entry_id,
            action = %action,
            model = %model,
            model_id = %model_id,
            rows = rows.len(),
            "Audit trail written"
        );

        Ok(rows)
    }

    /// Record a delete as a single row, without diffing.
    pub async fn capture_delete(
        &self,
        model: &str,
        key: &RecordKey,
        ctx: &AuditContext,
    ) -> Result<AuditTrailRow, TrailError> {
        let entry_id = ctx.resolve_entry().await?;
        let row = AuditTrailRow::delete(
            entry_id,
            ctx.user_id().map(str::to_string),
            model,
            key.normalized()?,
            self.created(ctx)?,
        );

        self.storage.insert(row.clone()).await?;

        tracing::debug!(
            entry_id = %row.entry_id,
            model = %row.model,
            model_id = %row.model_id,
            "Audit trail delete written"
        );

        Ok(row)
    }

    fn created(&self, ctx: &AuditContext) -> Result<String, TrailError> {
        self.date_format
            .format(&ctx.timestamp())
            .ok_or_else(|| TrailError::Timestamp(self.date_format.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticEntryProvider;
    use crate::storage::MemoryStorage;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn writer(filter: ChangeFilter) -> (TrailWriter, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let writer = TrailWriter::new(filter, DateFormat::default(), storage.clone());
        (writer, storage)
    }

    fn ctx() -> AuditContext {
        AuditContext::for_user("7")
            .with_entries(Arc::new(StaticEntryProvider::new(1_i64)))
            .at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_diff_missing_old_is_empty_string() {
        let new = Snapshot::new().with("name", "Bob").with("note", "");
        let changes = diff(&new, &Snapshot::new());
        assert_eq!(
            changes,
            vec![FieldChange {
                field: "name".into(),
                old_value: "".into(),
                new_value: "Bob".into(),
            }]
        );
    }

    #[test]
    fn test_diff_ignores_fields_only_in_old() {
        let new = Snapshot::new().with("name", "Bob");
        let old = Snapshot::new().with("name", "Bob").with("legacy", 1);
        assert!(diff(&new, &old).is_empty());
    }

    #[tokio::test]
    async fn test_capture_update_writes_changed_fields() {
        let (writer, storage) = writer(ChangeFilter::default());
        let new = Snapshot::new().with("name", "Bob").with("age", 31);
        let old = Snapshot::new().with("name", "Bob").with("age", 30);

        let rows = writer
            .capture(Action::Update, &new, &old, "app::User", &RecordKey::from(5), &ctx())
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field, "age");
        assert_eq!(rows[0].old_value, "30");
        assert_eq!(rows[0].new_value, "31");
        assert_eq!(rows[0].model_id, "5");
        assert_eq!(rows[0].user_id.as_deref(), Some("7"));
        assert_eq!(rows[0].created, "2024-05-01 12:00:00");
        assert_eq!(storage.rows(), rows);
    }

    #[tokio::test]
    async fn test_capture_create_from_empty_snapshot() {
        let (writer, storage) = writer(ChangeFilter::default());
        let new = Snapshot::new().with("id", 1).with("name", "Bob");

        let rows = writer
            .capture(Action::Create, &new, &Snapshot::new(), "app::User", &RecordKey::from(1), &ctx())
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.action == Action::Create && r.old_value.is_empty()));
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn test_capture_composite_key() {
        let (writer, _) = writer(ChangeFilter::default());
        let key = RecordKey::composite([("user_id", json!(3)), ("group_id", json!(9))]);
        let rows = writer
            .capture(
                Action::Update,
                &Snapshot::new().with("role", "admin"),
                &Snapshot::new().with("role", "member"),
                "app::Membership",
                &key,
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(rows[0].model_id, r#"{"group_id":9,"user_id":3}"#);
    }

    #[tokio::test]
    async fn test_capture_unix_timestamp() {
        let storage = Arc::new(MemoryStorage::new());
        let writer = TrailWriter::new(ChangeFilter::default(), DateFormat::unix(), storage);
        let rows = writer
            .capture(
                Action::Create,
                &Snapshot::new().with("a", 1),
                &Snapshot::new(),
                "app::Thing",
                &RecordKey::from(1),
                &ctx(),
            )
            .await
            .unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap().timestamp();
        assert_eq!(rows[0].created, expected.to_string());
    }

    #[tokio::test]
    async fn test_capture_delete() {
        let (writer, storage) = writer(ChangeFilter::default());
        let row = writer
            .capture_delete("app::User", &RecordKey::from(5), &ctx())
            .await
            .unwrap();
        assert!(row.is_delete());
        assert_eq!(row.entry_id.as_str(), "1");
        assert_eq!(storage.rows(), vec![row]);
    }
}
