//! SQL dialect family and the naming rules that differ between them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::CaseSensitivity;

/// Dialect family of the analyzed statement.
///
/// Several engines share a family: TiDB, MariaDB and OceanBase resolve names
/// like MySQL, Redshift and RisingWave like PostgreSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "tidb", alias = "mariadb", alias = "oceanbase")]
    MySql,
    #[serde(alias = "postgresql", alias = "redshift", alias = "risingwave")]
    Postgres,
    #[serde(alias = "dm")]
    Oracle,
    Snowflake,
    #[serde(alias = "mssql", alias = "sqlserver")]
    TSql,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::MySql,
        Dialect::Postgres,
        Dialect::Oracle,
        Dialect::Snowflake,
        Dialect::TSql,
    ];

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Oracle => "oracle",
            Dialect::Snowflake => "snowflake",
            Dialect::TSql => "tsql",
        }
    }

    /// Schema searched when a table reference carries no schema qualifier.
    ///
    /// `None` means every schema of the database is searched.
    pub fn default_schema(self) -> Option<&'static str> {
        match self {
            Dialect::Postgres => Some("public"),
            Dialect::TSql => Some("dbo"),
            Dialect::Snowflake => Some("PUBLIC"),
            Dialect::MySql | Dialect::Oracle => None,
        }
    }

    /// Whether names have a schema level between database and table.
    pub fn has_schema_level(self) -> bool {
        !matches!(self, Dialect::MySql)
    }

    /// Whether an aliased table keeps its database qualifier.
    ///
    /// MySQL lets `db.alias.col` address an aliased table, the other
    /// families only accept the bare alias.
    pub fn keeps_database_under_alias(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Identifier comparison used when the configuration does not say.
    pub fn default_case_sensitivity(self) -> CaseSensitivity {
        match self {
            Dialect::MySql | Dialect::TSql | Dialect::Snowflake => CaseSensitivity::Insensitive,
            Dialect::Postgres | Dialect::Oracle => CaseSensitivity::Sensitive,
        }
    }

    /// Schemas owned by the engine itself.
    pub fn system_schemas(self) -> &'static [&'static str] {
        match self {
            Dialect::MySql => &["information_schema", "performance_schema", "mysql", "sys"],
            Dialect::Postgres => &["pg_catalog", "information_schema", "rw_catalog"],
            Dialect::Oracle => &["SYS", "SYSTEM"],
            Dialect::Snowflake => &["INFORMATION_SCHEMA"],
            Dialect::TSql => &["sys", "INFORMATION_SCHEMA"],
        }
    }

    pub fn is_system_schema(self, schema: &str) -> bool {
        self.system_schemas()
            .iter()
            .any(|s| s.eq_ignore_ascii_case(schema))
    }

    /// Name the engine gives to a projection it cannot name.
    pub fn unnamed_column(self) -> &'static str {
        match self {
            Dialect::TSql => "(No column name)",
            _ => "?column?",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "tidb" | "mariadb" | "oceanbase" => Ok(Dialect::MySql),
            "postgres" | "postgresql" | "redshift" | "risingwave" => Ok(Dialect::Postgres),
            "oracle" | "dm" => Ok(Dialect::Oracle),
            "snowflake" => Ok(Dialect::Snowflake),
            "tsql" | "mssql" | "sqlserver" => Ok(Dialect::TSql),
            other => Err(format!(
                "unknown dialect '{other}' (expected one of mysql, postgres, oracle, snowflake, tsql)"
            )),
        }
    }
}
