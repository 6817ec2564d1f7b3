//! Name-resolution scopes.
//!
//! A [`Scope`] is a set of borrowed links into frames that live on the
//! evaluator's call stack:
//!
//! - the FROM list of the query block being evaluated,
//! - the outer frames of enclosing blocks, innermost first, visible to
//!   correlated subqueries,
//! - the CTE frames, innermost first,
//! - the correlation sinks of enclosing expression subqueries.
//!
//! Entering a nested block builds a new `Scope` value and leaves the parent
//! untouched, so frames pushed inside a subquery can never leak back out.

use std::cell::Cell;

use shroud_core::{
    AmbiguityMode, CaseSensitivity, ColumnRef, Dialect, ObjectQualifier, ResolvedField, Span,
    TableSchema,
};

use crate::error::EvalError;

/// FROM-list fields of an enclosing query block.
#[derive(Debug)]
pub struct OuterFrame<'s> {
    fields: &'s [ResolvedField],
    level: usize,
    parent: Option<&'s OuterFrame<'s>>,
}

/// CTEs declared by one WITH clause; later entries shadow earlier ones.
#[derive(Debug)]
pub struct CteFrame<'s> {
    tables: &'s [TableSchema],
    parent: Option<&'s CteFrame<'s>>,
}

/// Records whether a subquery read a sensitive column of a block outside it.
///
/// Outer frames with `level < boundary` lie outside the subquery that owns
/// the sink.
#[derive(Debug)]
pub struct CorrelationSink<'s> {
    boundary: usize,
    hit: Cell<bool>,
    parent: Option<&'s CorrelationSink<'s>>,
}

impl CorrelationSink<'_> {
    pub fn is_hit(&self) -> bool {
        self.hit.get()
    }
}

/// Resolution context for one query block.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'s> {
    from: &'s [ResolvedField],
    outer: Option<&'s OuterFrame<'s>>,
    ctes: Option<&'s CteFrame<'s>>,
    sinks: Option<&'s CorrelationSink<'s>>,
    depth: usize,
}

impl Scope<'static> {
    /// Empty scope for a top-level statement.
    pub fn root() -> Self {
        Self::at_depth(0)
    }

    /// Empty scope starting at a given nesting depth. View bodies are
    /// evaluated this way so they see nothing of the referencing query.
    pub fn at_depth(depth: usize) -> Self {
        Scope {
            from: &[],
            outer: None,
            ctes: None,
            sinks: None,
            depth,
        }
    }
}

impl<'s> Scope<'s> {
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn from_fields(&self) -> &'s [ResolvedField] {
        self.from
    }

    /// Whether some enclosing expression subquery wants outer references reported.
    pub fn tracks_correlation(&self) -> bool {
        self.sinks.is_some()
    }

    fn outer_level(&self) -> usize {
        self.outer.map_or(0, |frame| frame.level + 1)
    }

    /// Scope for a new query block: same outer, CTE and sink chains, empty
    /// FROM list, one level deeper.
    pub fn nested(&self) -> Scope<'s> {
        Scope {
            from: &[],
            depth: self.depth + 1,
            ..*self
        }
    }

    /// Same scope with `from` as the FROM list.
    pub fn with_from<'t>(&self, from: &'t [ResolvedField]) -> Scope<'t>
    where
        's: 't,
    {
        Scope {
            from,
            outer: self.outer,
            ctes: self.ctes,
            sinks: self.sinks,
            depth: self.depth,
        }
    }

    /// Frame exposing this scope's FROM list to a subquery.
    pub fn outer_frame(&self) -> OuterFrame<'s> {
        OuterFrame {
            fields: self.from,
            level: self.outer_level(),
            parent: self.outer,
        }
    }

    /// Sink for a subquery entered from this scope.
    pub fn correlation_sink(&self) -> CorrelationSink<'s> {
        CorrelationSink {
            boundary: self.outer_level() + 1,
            hit: Cell::new(false),
            parent: self.sinks,
        }
    }

    /// Scope for an expression subquery, with this scope's FROM list pushed
    /// as the innermost outer frame.
    pub fn enter_subquery<'t>(
        &self,
        frame: &'t OuterFrame<'t>,
        sink: &'t CorrelationSink<'t>,
    ) -> Scope<'t>
    where
        's: 't,
    {
        Scope {
            from: &[],
            outer: Some(frame),
            ctes: self.ctes,
            sinks: Some(sink),
            depth: self.depth,
        }
    }

    pub fn cte_frame<'t>(&self, tables: &'t [TableSchema]) -> CteFrame<'t>
    where
        's: 't,
    {
        CteFrame {
            tables,
            parent: self.ctes,
        }
    }

    pub fn push_ctes<'t>(&self, frame: &'t CteFrame<'t>) -> Scope<'t>
    where
        's: 't,
    {
        Scope {
            from: self.from,
            outer: self.outer,
            ctes: Some(frame),
            sinks: self.sinks,
            depth: self.depth,
        }
    }

    /// Innermost visible CTE called `name`.
    pub fn find_cte(&self, name: &str, mode: CaseSensitivity) -> Option<&'s TableSchema> {
        let mut frame = self.ctes;
        while let Some(current) = frame {
            if let Some(table) = current
                .tables
                .iter()
                .rev()
                .find(|t| mode.ident_eq(&t.name, name))
            {
                return Some(table);
            }
            frame = current.parent;
        }
        None
    }

    /// Resolve a column reference.
    ///
    /// Outer frames are searched first, innermost first, then the FROM list.
    /// `Ok(None)` means nothing matched.
    pub fn resolve_column(
        &self,
        column: &ColumnRef,
        dialect: Dialect,
        mode: CaseSensitivity,
        ambiguity: AmbiguityMode,
    ) -> Result<Option<&'s ResolvedField>, EvalError> {
        validate_qualifiers(
            column.database.as_deref(),
            column.schema.as_deref(),
            column.table.as_deref(),
            &column.name,
            dialect,
            column.span,
        )?;

        let mut frame = self.outer;
        while let Some(current) = frame {
            if let Some(field) = find_in(current.fields, column, mode, ambiguity)? {
                if field.sensitive {
                    self.record_outer_hit(current.level);
                }
                return Ok(Some(field));
            }
            frame = current.parent;
        }

        find_in(self.from, column, mode, ambiguity)
    }

    /// Sensitivity of the relation called `name` read as a whole row: the
    /// FROM list first, then the outer frames innermost first. `None` when
    /// no visible relation has that name.
    pub fn whole_row(&self, name: &str, mode: CaseSensitivity) -> Option<bool> {
        if let Some(sensitive) = relation_sensitivity(self.from, name, mode) {
            return Some(sensitive);
        }
        let mut frame = self.outer;
        while let Some(current) = frame {
            if let Some(sensitive) = relation_sensitivity(current.fields, name, mode) {
                if sensitive {
                    self.record_outer_hit(current.level);
                }
                return Some(sensitive);
            }
            frame = current.parent;
        }
        None
    }

    /// Fields of the FROM list matching `qualifier.*`.
    pub fn expand_wildcard(
        &self,
        qualifier: &ObjectQualifier,
        dialect: Dialect,
        mode: CaseSensitivity,
    ) -> Result<Vec<ResolvedField>, EvalError> {
        validate_qualifiers(
            qualifier.database.as_deref(),
            qualifier.schema.as_deref(),
            Some(&qualifier.table),
            "*",
            dialect,
            qualifier.span,
        )?;
        Ok(self
            .from
            .iter()
            .filter(|f| {
                mode.matches(qualifier.database.as_deref(), &f.database)
                    && mode.matches(qualifier.schema.as_deref(), &f.schema)
                    && mode.ident_eq(&qualifier.table, &f.table)
            })
            .cloned()
            .collect())
    }

    fn record_outer_hit(&self, level: usize) {
        let mut sink = self.sinks;
        while let Some(current) = sink {
            if level < current.boundary {
                current.hit.set(true);
            }
            sink = current.parent;
        }
    }
}

fn find_in<'f>(
    fields: &'f [ResolvedField],
    column: &ColumnRef,
    mode: CaseSensitivity,
    ambiguity: AmbiguityMode,
) -> Result<Option<&'f ResolvedField>, EvalError> {
    let mut matches = fields.iter().filter(|f| {
        mode.ident_eq(&f.name, &column.name)
            && mode.matches(column.table.as_deref(), &f.table)
            && mode.matches(column.schema.as_deref(), &f.schema)
            && mode.matches(column.database.as_deref(), &f.database)
    });
    let first = matches.next();
    if ambiguity == AmbiguityMode::Strict && first.is_some() && matches.next().is_some() {
        return Err(EvalError::AmbiguousColumn {
            name: column.name.clone(),
            span: column.span,
        });
    }
    Ok(first)
}

fn relation_sensitivity(fields: &[ResolvedField], name: &str, mode: CaseSensitivity) -> Option<bool> {
    let mut found = None;
    for field in fields.iter().filter(|f| mode.ident_eq(&f.table, name)) {
        *found.get_or_insert(false) |= field.sensitive;
    }
    found
}

/// Reject qualifier combinations no dialect accepts.
///
/// `table` is the relation part of the reference and `name` its final part:
/// the column for a column reference, `*` for a wildcard and the table name
/// itself for a table reference.
pub fn validate_qualifiers(
    database: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
    name: &str,
    dialect: Dialect,
    span: Span,
) -> Result<(), EvalError> {
    if name.is_empty() || table.is_some_and(str::is_empty) {
        return Err(EvalError::NoObjectNameSpecified { span });
    }
    if let Some(schema) = schema
        && table.is_none()
    {
        return Err(missing("schema", schema, "table", span));
    }
    if let Some(database) = database {
        if !dialect.has_schema_level() {
            if table.is_none() {
                return Err(missing("database", database, "table", span));
            }
        } else if schema.is_none() {
            return Err(missing("database", database, "schema", span));
        }
    }
    Ok(())
}

fn missing(qualifier: &'static str, value: &str, missing: &'static str, span: Span) -> EvalError {
    EvalError::InvalidQualifierCombination {
        qualifier,
        value: value.to_string(),
        missing,
        span,
    }
}
