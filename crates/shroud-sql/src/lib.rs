//! # shroud-sql
//!
//! Dialect adapters for Shroud. Each adapter parses SQL text with
//! `sqlparser` and lowers the statement into the query shape that
//! `shroud-lineage` evaluates.
//!
//! | Dialect | `sqlparser` dialect | Unquoted identifiers |
//! |---------|---------------------|----------------------|
//! | MySQL | `MySqlDialect` | kept as written |
//! | PostgreSQL | `PostgreSqlDialect` | lower case |
//! | Oracle | `GenericDialect` | upper case |
//! | Snowflake | `SnowflakeDialect` | upper case |
//! | T-SQL | `MsSqlDialect` | kept as written |
//!
//! Expressions without a dedicated lowering keep the column references
//! found inside them, so their sensitivity still reaches the output.

pub mod adapter;
pub mod error;
mod lower;
mod names;

use shroud_core::{AnalysisConfig, Dialect, SchemaCatalog, SensitiveField};
use shroud_lineage::{EvalError, Extractor};

pub use adapter::SqlAdapter;
pub use error::AdapterError;

/// Parse `sql` in `dialect` and report which output columns are sensitive.
///
/// Views met during evaluation are parsed with the same dialect.
pub fn analyze(
    sql: &str,
    catalog: &SchemaCatalog,
    dialect: Dialect,
    current_database: &str,
    config: AnalysisConfig,
) -> Result<Vec<SensitiveField>, EvalError> {
    let adapter = SqlAdapter::new(dialect);
    let statement = adapter.parse(sql)?;
    Extractor::new(catalog, &adapter, dialect)
        .with_current_database(current_database)
        .with_config(config)
        .extract(&statement)
}
