//! Error types for sensitivity evaluation.

use shroud_core::Span;
use thiserror::Error;

/// Errors that abort the evaluation of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A table reference matched no CTE, table or view.
    #[error("table {} not found at {span}", dotted(.database, .schema, .name))]
    TableNotFound {
        database: String,
        schema: String,
        name: String,
        span: Span,
    },

    /// A view lookup matched nothing.
    #[error("view {} not found at {span}", dotted(.database, .schema, .name))]
    ViewNotFound {
        database: String,
        schema: String,
        name: String,
        span: Span,
    },

    /// Two column lists that must line up have different lengths.
    #[error("{context}: expected {expected} columns, found {found} at {span}")]
    ColumnCountMismatch {
        context: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    /// The statement uses something the engine cannot evaluate.
    #[error("unsupported construct: {construct} at {span}")]
    UnsupportedConstruct { construct: String, span: Span },

    /// A qualified reference whose final name is empty.
    #[error("no object name is specified at {span}")]
    NoObjectNameSpecified { span: Span },

    /// A qualifier given without the level below it, e.g. a database name
    /// without a schema name.
    #[error("{qualifier} name {value:?} specified without {missing} name at {span}")]
    InvalidQualifierCombination {
        qualifier: &'static str,
        value: String,
        missing: &'static str,
        span: Span,
    },

    /// A column reference matched more than one column of one scope frame.
    #[error("column reference {name:?} is ambiguous at {span}")]
    AmbiguousColumn { name: String, span: Span },

    /// SQL text (a statement or a view definition) failed to parse.
    #[error("failed to parse SQL: {message}")]
    Parse { message: String, span: Span },
}

impl EvalError {
    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        EvalError::UnsupportedConstruct {
            construct: construct.into(),
            span,
        }
    }

    /// Position of the offending node.
    pub fn span(&self) -> Span {
        match self {
            EvalError::TableNotFound { span, .. }
            | EvalError::ViewNotFound { span, .. }
            | EvalError::ColumnCountMismatch { span, .. }
            | EvalError::UnsupportedConstruct { span, .. }
            | EvalError::NoObjectNameSpecified { span }
            | EvalError::InvalidQualifierCombination { span, .. }
            | EvalError::AmbiguousColumn { span, .. }
            | EvalError::Parse { span, .. } => *span,
        }
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::TableNotFound { .. } => "table_not_found",
            EvalError::ViewNotFound { .. } => "view_not_found",
            EvalError::ColumnCountMismatch { .. } => "column_count_mismatch",
            EvalError::UnsupportedConstruct { .. } => "unsupported_construct",
            EvalError::NoObjectNameSpecified { .. } => "no_object_name_specified",
            EvalError::InvalidQualifierCombination { .. } => "invalid_qualifier_combination",
            EvalError::AmbiguousColumn { .. } => "ambiguous_column",
            EvalError::Parse { .. } => "parse_error",
        }
    }
}

fn dotted(database: &str, schema: &str, name: &str) -> String {
    [database, schema, name]
        .iter()
        .filter(|part| !part.is_empty())
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join(".")
}
