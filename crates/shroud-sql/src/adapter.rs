//! Per-dialect SQL parsing.

use std::sync::LazyLock;

use regex::Regex;
use shroud_core::{CreateView, Dialect, Span, Statement};
use shroud_lineage::{EvalError, QueryParser};
use sqlparser::ast;
use sqlparser::dialect::{
    GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SnowflakeDialect,
};
use sqlparser::parser::Parser;

use crate::error::AdapterError;
use crate::lower::{Lowerer, leading_keyword};
use crate::names::{self, location_at};

static CREATE_VIEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:(?:SECURE|TEMP|TEMPORARY|RECURSIVE)\s+)*VIEW\s+(?:IF\s+NOT\s+EXISTS\s+)?(?P<name>(?:"[^"]*"|`[^`]*`|\[[^\]]*\]|[^\s(."`\[]+)(?:\s*\.\s*(?:"[^"]*"|`[^`]*`|\[[^\]]*\]|[^\s(."`\[]+))*)\s*(?:\((?P<columns>[^)]*)\)\s*)?AS\b"#,
    )
    .expect("valid regex")
});

static NAME_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?P<dq>[^"]*)"|`(?P<bq>[^`]*)`|\[(?P<br>[^\]]*)\]|(?P<plain>[^\s."`\[\],]+)"#)
        .expect("valid regex")
});

/// Parses SQL text in one dialect and lowers it into a [`Statement`].
///
/// ```
/// use shroud_core::{Dialect, Statement};
/// use shroud_sql::SqlAdapter;
///
/// let adapter = SqlAdapter::new(Dialect::Postgres);
/// let statement = adapter.parse("SELECT Email FROM Users").unwrap();
/// assert!(matches!(statement, Statement::Query(_)));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SqlAdapter {
    dialect: Dialect,
}

impl SqlAdapter {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Parse exactly one statement.
    pub fn parse(&self, sql: &str) -> Result<Statement, EvalError> {
        if let Some(caps) = CREATE_VIEW.captures(sql) {
            let Some(header) = caps.get(0) else {
                return Err(AdapterError::StatementCount(0).into());
            };
            let name_match = caps.name("name");
            let name = name_match
                .map(|m| self.name_parts(m.as_str()))
                .and_then(|mut parts| parts.pop())
                .unwrap_or_default();
            let columns = caps
                .name("columns")
                .map(|m| self.name_parts(m.as_str()))
                .unwrap_or_default();
            let span = name_match.map_or_else(Span::empty, |m| {
                Span::new(location_at(sql, m.start()), location_at(sql, m.end()))
            });

            // Blank out the header so positions in the body stay those of `sql`.
            let padded = format!("{}{}", blank(header.as_str()), &sql[header.end()..]);
            let query = match self.parse_one(&padded)? {
                ast::Statement::Query(query) => Lowerer::new(self.dialect).query(&query)?,
                _ => return Err(AdapterError::ViewBody(name).into()),
            };
            tracing::debug!(view = %name, columns = columns.len(), "parsed view definition");
            return Ok(Statement::CreateView(CreateView {
                name,
                columns,
                query,
                span,
            }));
        }

        let statement = self.parse_one(sql)?;
        self.lower_statement(&statement)
    }

    fn parse_one(&self, sql: &str) -> Result<ast::Statement, AdapterError> {
        let dialect: Box<dyn sqlparser::dialect::Dialect> = match self.dialect {
            Dialect::MySql => Box::new(MySqlDialect {}),
            Dialect::Postgres => Box::new(PostgreSqlDialect {}),
            Dialect::Snowflake => Box::new(SnowflakeDialect {}),
            Dialect::TSql => Box::new(MsSqlDialect {}),
            Dialect::Oracle => Box::new(GenericDialect {}),
        };
        let mut statements = Parser::parse_sql(dialect.as_ref(), sql)?;
        if statements.len() != 1 {
            return Err(AdapterError::StatementCount(statements.len()));
        }
        statements
            .pop()
            .ok_or(AdapterError::StatementCount(0))
    }

    fn lower_statement(&self, statement: &ast::Statement) -> Result<Statement, EvalError> {
        match statement {
            ast::Statement::Query(query) => {
                Ok(Statement::Query(Lowerer::new(self.dialect).query(query)?))
            }
            ast::Statement::Explain { .. } | ast::Statement::ExplainTable { .. } => {
                Ok(Statement::Explain)
            }
            other => Ok(Statement::Other {
                kind: leading_keyword(&other.to_string()),
            }),
        }
    }

    /// Split a dotted or comma-separated list of possibly quoted names.
    fn name_parts(&self, text: &str) -> Vec<String> {
        NAME_PART
            .captures_iter(text)
            .filter_map(|caps| {
                if let Some(plain) = caps.name("plain") {
                    return Some(names::fold(self.dialect, plain.as_str(), false));
                }
                ["dq", "bq", "br"]
                    .iter()
                    .find_map(|group| caps.name(group))
                    .map(|quoted| quoted.as_str().to_string())
            })
            .collect()
    }
}

impl QueryParser for SqlAdapter {
    fn parse_statement(&self, sql: &str) -> Result<Statement, EvalError> {
        self.parse(sql)
    }
}

fn blank(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\n' { '\n' } else { ' ' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_parts_handles_quotes() {
        let adapter = SqlAdapter::new(Dialect::Postgres);
        assert_eq!(adapter.name_parts("Public.\"Odd Name\""), vec!["public", "Odd Name"]);
        assert_eq!(adapter.name_parts("a, \"B\" , c"), vec!["a", "B", "c"]);

        let tsql = SqlAdapter::new(Dialect::TSql);
        assert_eq!(tsql.name_parts("[dbo].[V]"), vec!["dbo", "V"]);
    }

    #[test]
    fn test_blank_keeps_line_breaks() {
        assert_eq!(blank("CREATE\nVIEW v AS "), format!("{}\n{}", " ".repeat(6), " ".repeat(10)));
    }

    #[test]
    fn test_create_view_header() {
        let adapter = SqlAdapter::new(Dialect::Postgres);
        let Statement::CreateView(view) = adapter
            .parse("CREATE OR REPLACE VIEW shop.V (a, b) AS SELECT 1, 2")
            .unwrap()
        else {
            panic!("expected a view");
        };
        assert_eq!(view.name, "v");
        assert_eq!(view.columns, vec!["a", "b"]);
        assert_eq!(view.span.start.column, 24);
    }

    #[test]
    fn test_create_view_body_may_follow_as_without_space() {
        let adapter = SqlAdapter::new(Dialect::Postgres);
        let Statement::CreateView(view) = adapter
            .parse("CREATE VIEW w AS(SELECT 1 AS one)")
            .unwrap()
        else {
            panic!("expected a view");
        };
        assert_eq!(view.name, "w");
        assert!(view.columns.is_empty());

        // `AS` must end the keyword
        assert!(!CREATE_VIEW.is_match("CREATE VIEW w ASSELECT 1"));
    }

    #[test]
    fn test_view_body_must_be_a_query() {
        let adapter = SqlAdapter::new(Dialect::Postgres);
        let err = adapter
            .parse("CREATE VIEW v AS INSERT INTO t VALUES (1)")
            .unwrap_err();
        assert!(matches!(err, EvalError::Parse { .. }));
    }

    #[test]
    fn test_several_statements_are_rejected() {
        let adapter = SqlAdapter::new(Dialect::MySql);
        let err = adapter.parse("SELECT 1; SELECT 2").unwrap_err();
        assert!(
            matches!(err, EvalError::Parse { ref message, .. } if message.contains("found 2"))
        );
    }
}
