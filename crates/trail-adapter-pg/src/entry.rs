//! Audit entries stored in Postgres.

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use trail_audit::EntryProvider;
use trail_core::EntryId;

use crate::schema::{DEFAULT_ENTRY_TABLE, entry_table_ddl, quote_ident};

/// Entry provider that inserts one `audit_entry` row on first use.
///
/// Create one per request: every trail row written during the request then
/// refers to the same entry, and requests that change nothing never create one.
pub struct PgEntryProvider {
    pool: PgPool,
    table: String,
    user_id: Option<String>,
    entry: OnceCell<EntryId>,
}

impl PgEntryProvider {
    pub fn new(pool: PgPool, user_id: Option<String>) -> Self {
        Self {
            pool,
            table: DEFAULT_ENTRY_TABLE.to_string(),
            user_id,
            entry: OnceCell::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Entry id if the entry has been created already.
    pub fn entry_id(&self) -> Option<&EntryId> {
        self.entry.get()
    }

    /// Create the entry table if it does not exist.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(&entry_table_ddl(&self.table)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_entry(&self) -> anyhow::Result<EntryId> {
        let sql = format!(
            "INSERT INTO {} (user_id) VALUES ($1) RETURNING id",
            quote_ident(&self.table)?
        );
        let id: i64 = sqlx::query_scalar(&sql)
            .bind(self.user_id.clone())
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(entry_id = id, user_id = ?self.user_id, "Created audit entry");
        Ok(EntryId::from(id))
    }
}

#[async_trait]
impl EntryProvider for PgEntryProvider {
    async fn current_entry_id(&self) -> anyhow::Result<EntryId> {
        let entry = self.entry.get_or_try_init(|| self.create_entry()).await?;
        Ok(entry.clone())
    }
}
