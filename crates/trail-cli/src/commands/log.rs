//! `trail log` - browse stored trail rows.

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use trail_adapter_pg::PostgresTrailStorage;
use trail_audit::{FileStorage, TrailFilter, TrailStorage, create_storage};
use trail_core::{Action, EntryId, StorageBackend, TrailConfig};

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Read a JSON Lines trail file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Read from a Postgres trail table
    #[arg(long, env = "TRAIL_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Postgres trail table
    #[arg(long, default_value = trail_adapter_pg::DEFAULT_TRAIL_TABLE)]
    pub table: String,

    /// Use the storage named in a trail configuration file
    #[arg(long, default_value = "trail.yaml")]
    pub config: PathBuf,

    /// Only rows written under this entry
    #[arg(long)]
    pub entry: Option<String>,

    /// Only rows written by this user
    #[arg(long)]
    pub user: Option<String>,

    /// Only rows for this record type
    #[arg(long)]
    pub model: Option<String>,

    /// Only rows for this normalized primary key
    #[arg(long)]
    pub model_id: Option<String>,

    /// Only rows with this action (create, update, delete)
    #[arg(long)]
    pub action: Option<Action>,

    /// Only rows for this field
    #[arg(long)]
    pub field: Option<String>,

    /// Maximum number of rows
    #[arg(long, default_value = "50")]
    pub limit: usize,

    /// Rows to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,

    /// Print rows as JSON Lines
    #[arg(long)]
    pub json: bool,
}

impl LogArgs {
    fn filter(&self) -> TrailFilter {
        TrailFilter {
            entry_id: self.entry.clone().map(EntryId::new),
            user_id: self.user.clone(),
            model: self.model.clone(),
            model_id: self.model_id.clone(),
            action: self.action,
            field: self.field.clone(),
            limit: Some(self.limit),
            offset: Some(self.offset),
        }
    }
}

pub async fn run(args: LogArgs) -> anyhow::Result<()> {
    let storage = open_storage(&args).await?;
    let filter = args.filter();

    let total = storage.count(filter.clone()).await?;
    let rows = storage.query(filter).await?;
    tracing::info!(shown = rows.len(), total, "Audit trail rows");

    super::print_rows(&rows, args.json)
}

/// Pick the storage to read: explicit file, explicit database, then the config file.
async fn open_storage(args: &LogArgs) -> anyhow::Result<Arc<dyn TrailStorage>> {
    if let Some(ref path) = args.file {
        return Ok(Arc::new(FileStorage::new(path)?));
    }
    if let Some(ref url) = args.database_url {
        return Ok(Arc::new(PostgresTrailStorage::connect(url, &args.table).await?));
    }

    let config = TrailConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}; pass --file or --database-url", args.config))?;
    match config.storage.backend {
        StorageBackend::Postgres => Ok(Arc::new(PostgresTrailStorage::from_config(&config.storage).await?)),
        _ => Ok(create_storage(&config.storage)?),
    }
}
