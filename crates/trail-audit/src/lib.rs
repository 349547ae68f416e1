//! # trail-audit
//!
//! Field-level audit trails for records managed by a host persistence layer.
//!
//! This crate provides functionality for:
//! - Tracking the last-known attribute snapshot of each record instance
//! - Filtering attributes through allow/ignore lists
//! - Writing one trail row per changed field on create and update
//! - Writing a single marker row on delete
//! - Storing rows in memory, in JSON Lines files, or discarding them
//!
//! ## Row Format
//!
//! | Column | Content |
//! |--------|---------|
//! | `entry_id` | Audit entry grouping the rows of one operation |
//! | `user_id` | Acting user, if any |
//! | `old_value` / `new_value` | Stringified field values (empty on delete) |
//! | `action` | `CREATE`, `UPDATE` or `DELETE` |
//! | `model` / `model_id` | Record type and normalized primary key |
//! | `field` | Changed field (empty on delete) |
//! | `created` | Timestamp in the configured format |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trail_audit::{AuditContext, AuditTrail, MemoryStorage, RecordState, RequestEntryProvider};
//! use trail_core::{Snapshot, TrailConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrailConfig::default().with_ignored(["updated_at"]);
//! let trail = AuditTrail::new(config, Arc::new(MemoryStorage::new()));
//!
//! // One context per request, one behavior per record instance
//! let ctx = AuditContext::for_user("42").with_entries(Arc::new(RequestEntryProvider::new()));
//! let mut behavior = trail.behavior();
//!
//! let loaded = RecordState::new("app::User", 7, Snapshot::new().with("name", "Alice"));
//! behavior.on_after_load(&loaded);
//!
//! let saved = RecordState::new("app::User", 7, Snapshot::new().with("name", "Bob"));
//! behavior.on_after_update(&saved, &ctx).await?;
//! # Ok(())
//! # }
//! ```

pub mod behavior;
pub mod context;
pub mod error;
pub mod filter;
pub mod record;
pub mod row;
pub mod storage;
pub mod tracker;
pub mod writer;

pub use behavior::{AuditOutcome, AuditTrail, AuditTrailBehavior};
pub use context::{
    AuditContext, EntryProvider, IdentityProvider, RequestEntryProvider, StaticEntryProvider,
};
pub use error::TrailError;
pub use filter::{ChangeFilter, filter};
pub use record::{RecordState, TrackedRecord};
pub use row::AuditTrailRow;
pub use storage::{
    FileStorage, MemoryStorage, NullStorage, TrailFilter, TrailStorage, create_storage,
};
pub use tracker::SnapshotTracker;
pub use writer::{FieldChange, TrailWriter, diff};
