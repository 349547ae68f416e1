//! CLI command implementations for the `trail` binary.

pub mod diff;
pub mod log;
pub mod schema;

use trail_audit::AuditTrailRow;

/// Print rows either as JSON Lines or as human-readable log lines.
pub(crate) fn print_rows(rows: &[AuditTrailRow], json: bool) -> anyhow::Result<()> {
    for row in rows {
        if json {
            println!("{}", serde_json::to_string(row)?);
        } else {
            println!("{}", row.to_log_line());
        }
    }
    Ok(())
}
