//! Trail storage that writes into a caller-owned transaction.

use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::{Postgres, Transaction};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use trail_audit::{AuditTrailRow, TrailError, TrailFilter, TrailStorage};

use crate::{COUNT_COLUMN, count_from_pg, persistence, query_failed, row_from_pg, select, select_rows, write_batch};

/// Trail storage bound to one open transaction.
///
/// Trail rows written through it commit or roll back together with whatever
/// else the host runs on [`connection`](Self::connection). Each batch goes
/// into its own savepoint, so a failed audit write does not poison the
/// host's transaction. After [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) every call fails with a persistence error.
pub struct TransactionTrailStorage {
    table: String,
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl TransactionTrailStorage {
    pub(crate) fn new(table: String, tx: Transaction<'static, Postgres>) -> Self {
        Self {
            table,
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Connection of the open transaction, for the host's own statements.
    pub async fn connection(&self) -> Result<MappedMutexGuard<'_, PgConnection>, TrailError> {
        MutexGuard::try_map(self.tx.lock().await, |tx| tx.as_deref_mut()).map_err(|_| finished())
    }

    pub async fn commit(&self) -> Result<(), TrailError> {
        let tx = self.take().await?;
        tx.commit().await.map_err(persistence)
    }

    pub async fn rollback(&self) -> Result<(), TrailError> {
        let tx = self.take().await?;
        tx.rollback().await.map_err(persistence)
    }

    async fn take(&self) -> Result<Transaction<'static, Postgres>, TrailError> {
        self.tx.lock().await.take().ok_or_else(finished)
    }
}

fn finished() -> TrailError {
    TrailError::Persistence("transaction already committed or rolled back".to_string())
}

#[async_trait]
impl TrailStorage for TransactionTrailStorage {
    async fn insert(&self, row: AuditTrailRow) -> Result<(), TrailError> {
        self.insert_batch(vec![row]).await
    }

    async fn insert_batch(&self, rows: Vec<AuditTrailRow>) -> Result<(), TrailError> {
        let mut conn = self.connection().await?;
        write_batch(&mut conn, &self.table, &rows).await
    }

    async fn query(&self, filter: TrailFilter) -> Result<Vec<AuditTrailRow>, TrailError> {
        let mut qb = select_rows(&self.table, &filter)?;
        let mut conn = self.connection().await?;
        let rows = qb
            .build()
            .fetch_all(&mut *conn)
            .await
            .map_err(query_failed)?;
        rows.iter().map(row_from_pg).collect()
    }

    async fn count(&self, filter: TrailFilter) -> Result<usize, TrailError> {
        let mut qb = select(&self.table, COUNT_COLUMN, &filter);
        let mut conn = self.connection().await?;
        let row = qb
            .build()
            .fetch_one(&mut *conn)
            .await
            .map_err(query_failed)?;
        count_from_pg(&row)
    }
}
