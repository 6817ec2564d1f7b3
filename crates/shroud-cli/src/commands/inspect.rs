//! `shroud inspect` command implementation.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use shroud_core::{SchemaCatalog, ShroudConfig};

pub fn run(catalog_path: &Path, config: &ShroudConfig, sensitive_only: bool) -> Result<()> {
    let mut catalog = SchemaCatalog::from_file(catalog_path)
        .with_context(|| format!("Failed to load catalog from {}", catalog_path.display()))?;
    catalog.case_sensitivity = config.effective_case_sensitivity();

    print!("{}", render(&catalog, sensitive_only));
    Ok(())
}

/// Indented tree of the catalog. Sensitive columns are marked with `*`.
pub fn render(catalog: &SchemaCatalog, sensitive_only: bool) -> String {
    let mut out = String::new();

    for db in &catalog.databases {
        let _ = writeln!(out, "{}", db.name);
        for schema in &db.schemas {
            let schema_name = if schema.name.is_empty() {
                "(default)"
            } else {
                schema.name.as_str()
            };
            let _ = writeln!(out, "  {schema_name}");

            for table in &schema.tables {
                let sensitive = table.columns.iter().filter(|c| c.sensitive).count();
                if sensitive_only && sensitive == 0 {
                    continue;
                }
                let _ = writeln!(
                    out,
                    "    table {} ({} columns, {} sensitive)",
                    table.name,
                    table.columns.len(),
                    sensitive
                );
                for column in &table.columns {
                    if column.sensitive {
                        let _ = writeln!(out, "      * {}", column.name);
                    } else if !sensitive_only {
                        let _ = writeln!(out, "        {}", column.name);
                    }
                }
            }

            if !sensitive_only {
                for view in &schema.views {
                    let _ = writeln!(out, "    view {}", view.name);
                }
            }
        }
    }

    let _ = writeln!(
        out,
        "\n{} table(s), {} sensitive column(s)",
        catalog.table_count(),
        catalog.sensitive_column_count()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shroud_core::{CaseSensitivity, ColumnSchema, TableSchema, ViewSchema};

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new(CaseSensitivity::Insensitive)
            .with_table(
                "shop",
                "public",
                TableSchema::new(
                    "users",
                    vec![ColumnSchema::plain("id"), ColumnSchema::sensitive("email")],
                ),
            )
            .with_table(
                "shop",
                "public",
                TableSchema::new("orders", vec![ColumnSchema::plain("id")]),
            )
            .with_view("shop", "public", ViewSchema::new("contacts", "SELECT email FROM users"))
    }

    #[test]
    fn test_render_full_tree() {
        assert_eq!(
            render(&catalog(), false),
            "shop
  public
    table users (2 columns, 1 sensitive)
        id
      * email
    table orders (1 columns, 0 sensitive)
        id
    view contacts

2 table(s), 1 sensitive column(s)
"
        );
    }

    #[test]
    fn test_render_sensitive_only() {
        assert_eq!(
            render(&catalog(), true),
            "shop
  public
    table users (2 columns, 1 sensitive)
      * email

2 table(s), 1 sensitive column(s)
"
        );
    }

    #[test]
    fn test_run_reads_catalog_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, serde_json::to_string(&catalog()).unwrap()).unwrap();
        assert!(run(&path, &ShroudConfig::default(), false).is_ok());
        assert!(run(&dir.path().join("absent.json"), &ShroudConfig::default(), false).is_err());
    }
}
