//! DDL for the trail and entry tables.

pub const DEFAULT_TRAIL_TABLE: &str = "audit_trail";
pub const DEFAULT_ENTRY_TABLE: &str = "audit_entry";

pub(crate) fn quote_ident(ident: &str) -> anyhow::Result<String> {
    if ident.is_empty() {
        return Err(anyhow::anyhow!("empty identifier"));
    }
    if !ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(anyhow::anyhow!("invalid identifier '{}'", ident));
    }
    Ok(format!("\"{}\"", ident))
}

/// Statements creating the trail table and its indexes, if missing.
pub fn trail_table_ddl(table: &str) -> anyhow::Result<Vec<String>> {
    let quoted = quote_ident(table)?;
    let entry_idx = quote_ident(&format!("{}_entry_idx", table))?;
    let model_idx = quote_ident(&format!("{}_model_idx", table))?;

    Ok(vec![
        format!(
            r#"CREATE TABLE IF NOT EXISTS {quoted} (
    id BIGSERIAL PRIMARY KEY,
    entry_id TEXT NOT NULL,
    user_id TEXT NULL,
    old_value TEXT NOT NULL DEFAULT '',
    new_value TEXT NOT NULL DEFAULT '',
    action TEXT NOT NULL CHECK (action IN ('CREATE', 'UPDATE', 'DELETE')),
    model TEXT NOT NULL,
    model_id TEXT NOT NULL,
    field TEXT NOT NULL DEFAULT '',
    created TEXT NOT NULL
)"#
        ),
        format!("CREATE INDEX IF NOT EXISTS {entry_idx} ON {quoted} (entry_id)"),
        format!("CREATE INDEX IF NOT EXISTS {model_idx} ON {quoted} (model, model_id)"),
    ])
}

/// Statement creating the entry table, if missing.
pub fn entry_table_ddl(table: &str) -> anyhow::Result<String> {
    let quoted = quote_ident(table)?;
    Ok(format!(
        r#"CREATE TABLE IF NOT EXISTS {quoted} (
    id BIGSERIAL PRIMARY KEY,
    user_id TEXT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("audit_trail").unwrap(), "\"audit_trail\"");
        assert!(quote_ident("").is_err());
        assert!(quote_ident("trail\"; DROP TABLE x; --").is_err());
    }

    #[test]
    fn test_trail_ddl() {
        let statements = trail_table_ddl(DEFAULT_TRAIL_TABLE).unwrap();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].contains("CREATE TABLE IF NOT EXISTS \"audit_trail\""));
        for column in ["entry_id", "user_id", "old_value", "new_value", "action", "model", "model_id", "field", "created"] {
            assert!(statements[0].contains(column), "missing column {}", column);
        }
        assert!(statements[1].contains("\"audit_trail_entry_idx\""));
    }

    #[test]
    fn test_entry_ddl() {
        let ddl = entry_table_ddl(DEFAULT_ENTRY_TABLE).unwrap();
        assert!(ddl.contains("\"audit_entry\""));
        assert!(ddl.contains("created_at TIMESTAMPTZ"));
    }
}
