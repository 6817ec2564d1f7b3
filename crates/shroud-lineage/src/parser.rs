//! Re-parsing of SQL text met during evaluation.

use shroud_core::{Span, Statement};

use crate::error::EvalError;

/// Lowers SQL text into a [`Statement`].
///
/// Used to expand catalog views, whose definitions are stored as text.
/// Implementations must be usable from several threads.
pub trait QueryParser: Send + Sync {
    fn parse_statement(&self, sql: &str) -> Result<Statement, EvalError>;
}

/// Parser for callers that never expand views. Any view reference fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoParser;

impl QueryParser for NoParser {
    fn parse_statement(&self, _sql: &str) -> Result<Statement, EvalError> {
        Err(EvalError::unsupported(
            "view expansion without a SQL parser",
            Span::empty(),
        ))
    }
}
