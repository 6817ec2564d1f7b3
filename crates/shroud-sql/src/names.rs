//! Identifier folding and multi-part name mapping.

use shroud_core::{Dialect, Location, Span};
use sqlparser::ast::{Ident, ObjectName, Spanned};

/// Fold an unquoted identifier the way `dialect` stores it.
pub(crate) fn fold(dialect: Dialect, value: &str, quoted: bool) -> String {
    if quoted {
        return value.to_string();
    }
    match dialect {
        Dialect::Postgres => value.to_lowercase(),
        Dialect::Snowflake | Dialect::Oracle => value.to_uppercase(),
        Dialect::MySql | Dialect::TSql => value.to_string(),
    }
}

pub(crate) fn ident(dialect: Dialect, ident: &Ident) -> String {
    fold(dialect, &ident.value, ident.quote_style.is_some())
}

/// Parts of an object name, folded. Parts that are not plain identifiers
/// are skipped.
pub(crate) fn object_parts(dialect: Dialect, name: &ObjectName) -> Vec<String> {
    name.0
        .iter()
        .filter_map(|part| part.as_ident())
        .map(|part| ident(dialect, part))
        .collect()
}

/// Relation qualifiers of a dotted name, outermost first.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Qualified {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

/// Map `parts` onto database, schema and name.
///
/// Two parts mean `database.name` in MySQL, which has no schema level, and
/// `schema.name` everywhere else. Empty parts, as in T-SQL `db..t`, are
/// dropped to `None`. `None` is returned for more than three parts.
pub(crate) fn qualify(dialect: Dialect, mut parts: Vec<String>) -> Option<Qualified> {
    let name = parts.pop().unwrap_or_default();
    let non_empty = |part: String| (!part.is_empty()).then_some(part);
    let (database, schema) = match parts.len() {
        0 => (None, None),
        1 => {
            let qualifier = parts.pop().and_then(non_empty);
            if dialect.has_schema_level() {
                (None, qualifier)
            } else {
                (qualifier, None)
            }
        }
        2 => {
            let schema = parts.pop().and_then(non_empty);
            (parts.pop().and_then(non_empty), schema)
        }
        _ => return None,
    };
    Some(Qualified {
        database,
        schema,
        name,
    })
}

pub(crate) fn span_of(node: &impl Spanned) -> Span {
    convert_span(node.span())
}

pub(crate) fn convert_span(span: sqlparser::tokenizer::Span) -> Span {
    Span::new(
        Location {
            line: span.start.line,
            column: span.start.column,
        },
        Location {
            line: span.end.line,
            column: span.end.column,
        },
    )
}

/// 1-based line and column of a byte offset into `text`.
pub(crate) fn location_at(text: &str, offset: usize) -> Location {
    let before = &text[..offset.min(text.len())];
    let line = before.matches('\n').count() as u64 + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map_or(0, |tail| tail.chars().count()) as u64
        + 1;
    Location { line, column }
}
