use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{diff::DiffArgs, log::LogArgs};

#[derive(Parser, Debug)]
#[command(name = "trail", version, about = "Field-level audit trail tools")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show trail rows from a JSON Lines file, a Postgres table or the configured storage
    Log(LogArgs),

    /// Dry-run change capture between two snapshot files and print the rows it would write
    Diff(DiffArgs),

    /// Print the Postgres DDL for the trail and entry tables
    Schema {
        /// Trail table name
        #[arg(long, default_value = trail_adapter_pg::DEFAULT_TRAIL_TABLE)]
        table: String,

        /// Entry table name
        #[arg(long, default_value = trail_adapter_pg::DEFAULT_ENTRY_TABLE)]
        entry_table: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Log(args) => commands::log::run(args).await?,
        Command::Diff(args) => commands::diff::run(args).await?,
        Command::Schema { table, entry_table } => commands::schema::run(&table, &entry_table)?,
    }

    Ok(())
}
