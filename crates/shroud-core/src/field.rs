//! Output column descriptors.

use serde::{Deserialize, Serialize};

/// An output column together with where it came from.
///
/// `database`, `schema` and `table` are empty when the column has no such
/// qualifier (computed expressions, aliased derived tables).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedField {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub name: String,
    pub sensitive: bool,
}

impl ResolvedField {
    /// Unqualified field.
    pub fn new(name: impl Into<String>, sensitive: bool) -> Self {
        Self {
            name: name.into(),
            sensitive,
            ..Default::default()
        }
    }

    pub fn qualified(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        sensitive: bool,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
            sensitive,
        }
    }
}

/// Final per-column answer returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveField {
    pub name: String,
    pub sensitive: bool,
}

impl SensitiveField {
    pub fn new(name: impl Into<String>, sensitive: bool) -> Self {
        Self {
            name: name.into(),
            sensitive,
        }
    }
}

impl From<ResolvedField> for SensitiveField {
    fn from(field: ResolvedField) -> Self {
        Self {
            name: field.name,
            sensitive: field.sensitive,
        }
    }
}
