use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Connection, Postgres, QueryBuilder, Row, Transaction};
use trail_audit::{AuditTrailRow, TrailError, TrailFilter, TrailStorage};
use trail_core::{Action, EntryId, StorageConfig};

pub mod entry;
pub mod schema;
pub mod transaction;

pub use entry::PgEntryProvider;
pub use schema::{DEFAULT_ENTRY_TABLE, DEFAULT_TRAIL_TABLE, entry_table_ddl, trail_table_ddl};
pub use transaction::TransactionTrailStorage;

use schema::quote_ident;

// Nine bind parameters per row, Postgres allows 65535 per statement.
const MAX_ROWS_PER_STATEMENT: usize = 5000;

/// Trail storage backed by a Postgres table.
///
/// Batches are written inside one transaction, so a failed batch leaves no
/// partial rows behind. To commit or roll back trail rows together with the
/// data change that produced them, write through [`PostgresTrailStorage::insert_with`]
/// or a [`TransactionTrailStorage`] instead.
pub struct PostgresTrailStorage {
    pool: PgPool,
    table_name: String,
    table: String,
}

impl PostgresTrailStorage {
    pub async fn connect(database_url: &str, table: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Self::new(pool, table)
    }

    /// Wrap an existing pool, typically the host application's.
    pub fn new(pool: PgPool, table: &str) -> anyhow::Result<Self> {
        Ok(Self {
            pool,
            table_name: table.to_string(),
            table: quote_ident(table)?,
        })
    }

    pub async fn from_config(config: &StorageConfig) -> anyhow::Result<Self> {
        let url = config
            .database_url()
            .ok_or_else(|| anyhow::anyhow!("postgres storage requires a database URL"))?;
        Self::connect(&url, &config.table).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table_name
    }

    /// Create the trail table and its indexes if they do not exist.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in trail_table_ddl(&self.table_name)? {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Write rows on a connection the caller controls.
    ///
    /// Inside an open transaction the rows go into a savepoint, so they commit
    /// or roll back with the caller's transaction and a failed batch leaves it
    /// usable.
    pub async fn insert_with(&self, conn: &mut PgConnection, rows: &[AuditTrailRow]) -> Result<(), TrailError> {
        write_batch(conn, &self.table, rows).await
    }

    /// Start a transaction on the pool and audit into it.
    pub async fn begin(&self) -> Result<TransactionTrailStorage, TrailError> {
        let tx = self.pool.begin().await.map_err(persistence)?;
        Ok(self.scoped(tx))
    }

    /// Audit into a transaction the host already opened.
    pub fn scoped(&self, tx: Transaction<'static, Postgres>) -> TransactionTrailStorage {
        TransactionTrailStorage::new(self.table.clone(), tx)
    }
}

pub(crate) fn persistence(e: sqlx::Error) -> TrailError {
    TrailError::Persistence(e.to_string())
}

pub(crate) fn query_failed(e: sqlx::Error) -> TrailError {
    TrailError::Query(e.to_string())
}

/// Write `rows` atomically: a transaction on a bare connection, a savepoint
/// inside an open one.
pub(crate) async fn write_batch(
    conn: &mut PgConnection,
    table: &str,
    rows: &[AuditTrailRow],
) -> Result<(), TrailError> {
    if rows.is_empty() {
        return Ok(());
    }

    let prefix = format!("INSERT INTO {} ({}) ", table, AuditTrailRow::COLUMNS.join(", "));
    let mut tx = conn.begin().await.map_err(persistence)?;

    for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(prefix.as_str());
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(row.entry_id.as_str().to_string())
                .push_bind(row.user_id.clone())
                .push_bind(row.old_value.clone())
                .push_bind(row.new_value.clone())
                .push_bind(row.action.as_str())
                .push_bind(row.model.clone())
                .push_bind(row.model_id.clone())
                .push_bind(row.field.clone())
                .push_bind(row.created.clone());
        });
        qb.build().execute(&mut *tx).await.map_err(persistence)?;
    }

    tx.commit().await.map_err(persistence)?;

    tracing::debug!(rows = rows.len(), table = %table, "Inserted audit trail rows");
    Ok(())
}

pub(crate) fn select(table: &str, columns: &str, filter: &TrailFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM {} WHERE TRUE", columns, table));

    if let Some(ref entry) = filter.entry_id {
        qb.push(" AND entry_id = ").push_bind(entry.as_str().to_string());
    }
    if let Some(ref user) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user.clone());
    }
    if let Some(ref model) = filter.model {
        qb.push(" AND model = ").push_bind(model.clone());
    }
    if let Some(ref model_id) = filter.model_id {
        qb.push(" AND model_id = ").push_bind(model_id.clone());
    }
    if let Some(action) = filter.action {
        qb.push(" AND action = ").push_bind(action.as_str());
    }
    if let Some(ref field) = filter.field {
        qb.push(" AND field = ").push_bind(field.clone());
    }

    qb
}

/// Row query ordered by insertion, with limit and offset applied.
pub(crate) fn select_rows(table: &str, filter: &TrailFilter) -> Result<QueryBuilder<'static, Postgres>, TrailError> {
    let mut qb = select(table, &AuditTrailRow::COLUMNS.join(", "), filter);
    qb.push(" ORDER BY id");
    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(page_bound("limit", limit)?);
    }
    if let Some(offset) = filter.offset {
        qb.push(" OFFSET ").push_bind(page_bound("offset", offset)?);
    }
    Ok(qb)
}

pub(crate) const COUNT_COLUMN: &str = "count(*)::bigint AS cnt";

fn page_bound(name: &str, value: usize) -> Result<i64, TrailError> {
    i64::try_from(value).map_err(|_| TrailError::Query(format!("{} {} is out of range", name, value)))
}

pub(crate) fn row_from_pg(row: &PgRow) -> Result<AuditTrailRow, TrailError> {
    let action: String = row.try_get("action").map_err(query_failed)?;
    Ok(AuditTrailRow {
        entry_id: EntryId::new(row.try_get::<String, _>("entry_id").map_err(query_failed)?),
        user_id: row.try_get("user_id").map_err(query_failed)?,
        old_value: row.try_get("old_value").map_err(query_failed)?,
        new_value: row.try_get("new_value").map_err(query_failed)?,
        action: action.parse::<Action>().map_err(TrailError::Query)?,
        model: row.try_get("model").map_err(query_failed)?,
        model_id: row.try_get("model_id").map_err(query_failed)?,
        field: row.try_get("field").map_err(query_failed)?,
        created: row.try_get("created").map_err(query_failed)?,
    })
}

pub(crate) fn count_from_pg(row: &PgRow) -> Result<usize, TrailError> {
    let cnt: i64 = row.try_get("cnt").map_err(query_failed)?;
    Ok(cnt.max(0) as usize)
}

#[async_trait]
impl TrailStorage for PostgresTrailStorage {
    async fn insert(&self, row: AuditTrailRow) -> Result<(), TrailError> {
        self.insert_batch(vec![row]).await
    }

    async fn insert_batch(&self, rows: Vec<AuditTrailRow>) -> Result<(), TrailError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.acquire().await.map_err(persistence)?;
        write_batch(&mut conn, &self.table, &rows).await
    }

    async fn query(&self, filter: TrailFilter) -> Result<Vec<AuditTrailRow>, TrailError> {
        let mut qb = select_rows(&self.table, &filter)?;
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed)?;
        rows.iter().map(row_from_pg).collect()
    }

    async fn count(&self, filter: TrailFilter) -> Result<usize, TrailError> {
        let mut qb = select(&self.table, COUNT_COLUMN, &filter);
        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed)?;
        count_from_pg(&row)
    }
}
