//! Lifecycle entry points: gating, dispatch and per-record snapshot tracking.
//!
//! An [`AuditTrail`] is built once per application and shared. Each tracked
//! record instance gets its own [`AuditTrailBehavior`] from
//! [`AuditTrail::behavior`], and the persistence layer calls its `on_after_*`
//! hooks:
//!
//! | Hook | Audits | Snapshot afterwards |
//! |------|--------|---------------------|
//! | `on_after_load` | nothing | current attributes |
//! | `on_after_create` | `CREATE` | current attributes |
//! | `on_after_update` | `UPDATE` | current attributes |
//! | `on_after_delete` | `DELETE` | empty |
//!
//! Storage failures while recording a create or update are logged and
//! discarded so that the record's own operation always succeeds. Delete
//! failures are returned to the caller unless `on_delete_failure: ignore` is
//! configured. A missing audit entry is always returned as an error.

use std::sync::Arc;

use trail_core::{Action, DeleteFailurePolicy, Snapshot, TrailConfig};

use crate::context::AuditContext;
use crate::error::TrailError;
use crate::record::TrackedRecord;
use crate::row::AuditTrailRow;
use crate::storage::{TrailStorage, create_storage};
use crate::tracker::SnapshotTracker;
use crate::writer::TrailWriter;

/// Result of a single audit call.
#[derive(Debug)]
pub enum AuditOutcome {
    /// Auditing is switched off.
    Inactive,
    /// The record type is in `ignored_classes`.
    IgnoredClass,
    /// No auditable field changed; nothing was written.
    Unchanged,
    /// Rows were written.
    Recorded(Vec<AuditTrailRow>),
    /// Writing failed and the failure was discarded.
    Suppressed(TrailError),
}

impl AuditOutcome {
    /// Rows written by this call.
    pub fn rows(&self) -> &[AuditTrailRow] {
        match self {
            Self::Recorded(rows) => rows,
            _ => &[],
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

/// Shared audit trail configuration and writer.
#[derive(Clone)]
pub struct AuditTrail {
    config: Arc<TrailConfig>,
    writer: Arc<TrailWriter>,
}

impl AuditTrail {
    pub fn new(config: TrailConfig, storage: Arc<dyn TrailStorage>) -> Self {
        let writer = TrailWriter::from_config(&config, storage);
        Self {
            config: Arc::new(config),
            writer: Arc::new(writer),
        }
    }

    /// Build a trail with the storage backend named in the configuration.
    pub fn from_config(config: TrailConfig) -> Result<Self, TrailError> {
        let storage = create_storage(&config.storage)?;
        Ok(Self::new(config, storage))
    }

    pub fn config(&self) -> &TrailConfig {
        &self.config
    }

    pub fn writer(&self) -> &TrailWriter {
        &self.writer
    }

    pub fn is_active(&self) -> bool {
        self.config.active
    }

    /// Fresh per-instance behavior with an empty snapshot.
    pub fn behavior(&self) -> AuditTrailBehavior {
        AuditTrailBehavior {
            trail: self.clone(),
            tracker: SnapshotTracker::new(),
        }
    }

    /// Audit one lifecycle event of `record`, given its previous snapshot.
    pub async fn audit<R>(
        &self,
        action: Action,
        record: &R,
        old: &Snapshot,
        ctx: &AuditContext,
    ) -> Result<AuditOutcome, TrailError>
    where
        R: TrackedRecord + ?Sized,
    {
        if !self.config.active {
            return Ok(AuditOutcome::Inactive);
        }

        let model = record.type_name();
        if self.config.is_class_ignored(model) {
            tracing::debug!(model = %model, action = %action, "Skipping audit for ignored class");
            return Ok(AuditOutcome::IgnoredClass);
        }

        let key = record.primary_key();

        if action == Action::Delete {
            return match self.writer.capture_delete(model, &key, ctx).await {
                Ok(row) => Ok(AuditOutcome::Recorded(vec![row])),
                Err(e)
                    if e.is_persistence_failure()
                        && self.config.on_delete_failure == DeleteFailurePolicy::Ignore =>
                {
                    tracing::warn!(error = %e, model = %model, "Discarding audit trail delete failure");
                    Ok(AuditOutcome::Suppressed(e))
                }
                Err(e) => Err(e),
            };
        }

        let new = record.attributes();
        match self.writer.capture(action, &new, old, model, &key, ctx).await {
            Ok(rows) if rows.is_empty() => Ok(AuditOutcome::Unchanged),
            Ok(rows) => Ok(AuditOutcome::Recorded(rows)),
            Err(e) if e.is_persistence_failure() => {
                tracing::warn!(
                    error = %e,
                    model = %model,
                    action = %action,
                    "Discarding audit trail failure"
                );
                Ok(AuditOutcome::Suppressed(e))
            }
            Err(e) => Err(e),
        }
    }
}

/// Audit trail attached to a single record instance.
pub struct AuditTrailBehavior {
    trail: AuditTrail,
    tracker: SnapshotTracker,
}

impl AuditTrailBehavior {
    /// Snapshot as of the last load or save.
    pub fn snapshot(&self) -> &Snapshot {
        self.tracker.current_snapshot()
    }

    pub fn trail(&self) -> &AuditTrail {
        &self.trail
    }

    pub fn on_after_load<R>(&mut self, record: &R)
    where
        R: TrackedRecord + ?Sized,
    {
        self.tracker.record_snapshot(record.attributes());
    }

    pub async fn on_after_create<R>(
        &mut self,
        record: &R,
        ctx: &AuditContext,
    ) -> Result<AuditOutcome, TrailError>
    where
        R: TrackedRecord + ?Sized,
    {
        let outcome = self.audit(Action::Create, record, ctx).await?;
        self.tracker.record_snapshot(record.attributes());
        Ok(outcome)
    }

    pub async fn on_after_update<R>(
        &mut self,
        record: &R,
        ctx: &AuditContext,
    ) -> Result<AuditOutcome, TrailError>
    where
        R: TrackedRecord + ?Sized,
    {
        let outcome = self.audit(Action::Update, record, ctx).await?;
        self.tracker.record_snapshot(record.attributes());
        Ok(outcome)
    }

    pub async fn on_after_delete<R>(
        &mut self,
        record: &R,
        ctx: &AuditContext,
    ) -> Result<AuditOutcome, TrailError>
    where
        R: TrackedRecord + ?Sized,
    {
        let outcome = self.audit(Action::Delete, record, ctx).await?;
        self.tracker.clear();
        Ok(outcome)
    }

    /// Audit against the tracked snapshot without updating it.
    pub async fn audit<R>(
        &self,
        action: Action,
        record: &R,
        ctx: &AuditContext,
    ) -> Result<AuditOutcome, TrailError>
    where
        R: TrackedRecord + ?Sized,
    {
        self.trail
            .audit(action, record, self.tracker.current_snapshot(), ctx)
            .await
    }
}
