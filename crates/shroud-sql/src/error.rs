//! Error types for the SQL adapters.

use std::sync::LazyLock;

use regex::Regex;
use shroud_core::{Location, Span};
use shroud_lineage::EvalError;
use sqlparser::parser::ParserError;
use thiserror::Error;

static PARSER_POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Line: (\d+), Column: (\d+)").expect("valid regex"));

/// Errors raised while turning SQL text into a query shape.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The dialect parser rejected the text.
    #[error("{0}")]
    Syntax(#[from] ParserError),

    /// Input held zero or several statements.
    #[error("expected exactly one statement, found {0}")]
    StatementCount(usize),

    /// `CREATE VIEW ... AS` followed by something other than a query.
    #[error("body of view {0} is not a query")]
    ViewBody(String),
}

impl AdapterError {
    /// Position reported by the parser, when there is one.
    pub fn span(&self) -> Span {
        let AdapterError::Syntax(err) = self else {
            return Span::empty();
        };
        let message = err.to_string();
        PARSER_POSITION
            .captures(&message)
            .and_then(|caps| {
                let line = caps[1].parse().ok()?;
                let column = caps[2].parse().ok()?;
                let at = Location { line, column };
                Some(Span::new(at, at))
            })
            .unwrap_or_else(Span::empty)
    }
}

impl From<AdapterError> for EvalError {
    fn from(err: AdapterError) -> Self {
        EvalError::Parse {
            span: err.span(),
            message: err.to_string(),
        }
    }
}
