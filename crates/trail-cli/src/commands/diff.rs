//! `trail diff` - dry-run change capture against in-memory storage.

use anyhow::Context;
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use trail_audit::{
    AuditContext, AuditOutcome, AuditTrail, AuditTrailRow, MemoryStorage, RecordState, StaticEntryProvider,
};
use trail_core::{Action, RecordKey, Snapshot, TrailConfig};

/// Entry id stamped on dry-run rows.
const DRY_RUN_ENTRY: &str = "dry-run";

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Previous snapshot as a JSON object, or @path to read it from a file
    #[arg(long, default_value = "{}")]
    pub old: String,

    /// Current snapshot as a JSON object, or @path to read it from a file
    #[arg(long)]
    pub new: String,

    /// Record type name written to the `model` column
    #[arg(long)]
    pub model: String,

    /// Primary key as JSON (a scalar, or an object for composite keys)
    #[arg(long)]
    pub key: String,

    /// Trail configuration file (allow/ignore lists, date format)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Lifecycle action to simulate
    #[arg(long, default_value = "update")]
    pub action: Action,

    /// User id written to the `user_id` column
    #[arg(long)]
    pub user: Option<String>,

    /// Print rows as JSON Lines
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: DiffArgs) -> anyhow::Result<()> {
    let json = args.json;
    let rows = compute(&args).await?;
    if rows.is_empty() {
        tracing::info!("No changes would be recorded");
    }
    super::print_rows(&rows, json)
}

async fn compute(args: &DiffArgs) -> anyhow::Result<Vec<AuditTrailRow>> {
    let config = match args.config {
        Some(ref path) => TrailConfig::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => TrailConfig::default(),
    };

    let old = parse_snapshot(&args.old).context("Invalid --old snapshot")?;
    let new = parse_snapshot(&args.new).context("Invalid --new snapshot")?;
    let key: Value = serde_json::from_str(&args.key).context("Invalid --key JSON")?;

    // Dry runs never touch the configured backend.
    let storage = Arc::new(MemoryStorage::new());
    let trail = AuditTrail::new(config, storage);
    let ctx = AuditContext::new(args.user.clone())
        .with_entries(Arc::new(StaticEntryProvider::new(DRY_RUN_ENTRY)));

    let record = RecordState::new(args.model.clone(), RecordKey::from_json(key), new);
    match trail.audit(args.action, &record, &old, &ctx).await? {
        AuditOutcome::Suppressed(e) => Err(e.into()),
        outcome => Ok(outcome.rows().to_vec()),
    }
}

fn parse_snapshot(input: &str) -> anyhow::Result<Snapshot> {
    let text = match input.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?,
        None => input.to_string(),
    };
    let value: Value = serde_json::from_str(&text)?;
    Snapshot::from_json(value).ok_or_else(|| anyhow::anyhow!("snapshot must be a JSON object"))
}
