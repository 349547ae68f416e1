//! `trail schema` - print Postgres DDL.

use trail_adapter_pg::{entry_table_ddl, trail_table_ddl};

pub fn run(table: &str, entry_table: &str) -> anyhow::Result<()> {
    println!("{}", render(table, entry_table)?);
    Ok(())
}

fn render(table: &str, entry_table: &str) -> anyhow::Result<String> {
    let mut statements = vec![entry_table_ddl(entry_table)?];
    statements.extend(trail_table_ddl(table)?);
    Ok(statements
        .iter()
        .map(|s| format!("{};", s))
        .collect::<Vec<_>>()
        .join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_both_tables() {
        let sql = render("trail", "entries").unwrap();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS \"entries\""));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS \"trail\""));
        assert_eq!(sql.matches(';').count(), 4);
    }

    #[test]
    fn test_render_rejects_bad_names() {
        assert!(render("bad name", "entries").is_err());
    }
}
