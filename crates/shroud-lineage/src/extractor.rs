//! Sensitivity evaluation over query shapes.

use shroud_core::{
    AnalysisConfig, CaseSensitivity, ColumnRef, ColumnSchema, CreateView, Derived, Dialect,
    ExprNode, Join, JoinConstraint, QueryNode, ResolvedField, SchemaCatalog, Select,
    SensitiveField, Span, Statement, TableRef, TableSchema, Values,
};

use crate::error::EvalError;
use crate::join::merge_join;
use crate::parser::QueryParser;
use crate::scope::{Scope, validate_qualifiers};
use crate::set_op::combine;

/// Computes which output columns of a statement carry sensitive data.
///
/// An `Extractor` borrows a read-only catalog and keeps no state between
/// calls, so one instance can serve many statements, also from several
/// threads at once.
pub struct Extractor<'a> {
    catalog: &'a SchemaCatalog,
    parser: &'a dyn QueryParser,
    dialect: Dialect,
    current_database: &'a str,
    config: AnalysisConfig,
}

impl<'a> Extractor<'a> {
    /// `parser` re-parses view definitions met during evaluation.
    pub fn new(catalog: &'a SchemaCatalog, parser: &'a dyn QueryParser, dialect: Dialect) -> Self {
        Self {
            catalog,
            parser,
            dialect,
            current_database: "",
            config: AnalysisConfig::default(),
        }
    }

    /// Database searched for table references without a database qualifier.
    pub fn with_current_database(mut self, database: &'a str) -> Self {
        self.current_database = database;
        self
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn catalog(&self) -> &'a SchemaCatalog {
        self.catalog
    }

    pub(crate) fn parser(&self) -> &'a dyn QueryParser {
        self.parser
    }

    pub(crate) fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub(crate) fn mode(&self) -> CaseSensitivity {
        self.catalog.case_sensitivity
    }

    /// Sensitivity of each output column of a top-level statement, in output order.
    ///
    /// Returns an empty list when there is nothing to mask: an empty
    /// catalog, an `EXPLAIN`, or a query against a system table missing
    /// from the catalog.
    pub fn extract(&self, statement: &Statement) -> Result<Vec<SensitiveField>, EvalError> {
        if self.catalog.is_empty() {
            tracing::debug!("catalog has no tables, nothing to mask");
            return Ok(Vec::new());
        }

        let result = match statement {
            Statement::Explain => {
                tracing::debug!("EXPLAIN output holds no table data");
                return Ok(Vec::new());
            }
            Statement::Other { kind } => {
                Err(EvalError::unsupported(format!("{kind} statement"), Span::empty()))
            }
            Statement::Query(query) => self.evaluate(query, Scope::root()),
            Statement::CreateView(view) => self.evaluate_create_view(view, Scope::root()),
        };

        match result {
            Ok(fields) => Ok(fields.into_iter().map(SensitiveField::from).collect()),
            Err(EvalError::TableNotFound {
                database,
                schema,
                name,
                ..
            }) if self.config.skip_system_schemas
                && (self.dialect.is_system_schema(&schema)
                    || self.dialect.is_system_schema(&database)) =>
            {
                tracing::debug!(
                    database = %database,
                    schema = %schema,
                    table = %name,
                    "system table not in catalog, nothing to mask"
                );
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Output columns of `node` evaluated in `scope`.
    pub fn evaluate(
        &self,
        node: &QueryNode,
        scope: Scope<'_>,
    ) -> Result<Vec<ResolvedField>, EvalError> {
        match node {
            QueryNode::Table(table) => self.evaluate_table(table, scope),
            QueryNode::Derived(derived) => self.evaluate_derived(derived, scope),
            QueryNode::Join(join) => self.evaluate_join(join, scope),
            QueryNode::Select(select) => self.evaluate_select(select, scope),
            QueryNode::SetOp(op) => {
                let left = self.evaluate(&op.left, scope)?;
                let right = self.evaluate(&op.right, scope)?;
                combine(left, &right, op.kind, op.span)
            }
            QueryNode::Values(values) => self.evaluate_values(values, scope),
            QueryNode::With(with) => {
                self.with_ctes(&with.clause, scope, |scope| self.evaluate(&with.body, scope))
            }
        }
    }

    pub(crate) fn evaluate_create_view(
        &self,
        view: &CreateView,
        scope: Scope<'_>,
    ) -> Result<Vec<ResolvedField>, EvalError> {
        let mut fields = self.evaluate(&view.query, scope)?;
        rename_columns(
            &mut fields,
            &view.columns,
            &format!("column list of view {}", view.name),
            view.span,
        )?;
        Ok(fields)
    }

    fn evaluate_table(
        &self,
        table: &TableRef,
        scope: Scope<'_>,
    ) -> Result<Vec<ResolvedField>, EvalError> {
        validate_qualifiers(
            table.database.as_deref(),
            table.schema.as_deref(),
            Some(&table.name),
            &table.name,
            self.dialect,
            table.span,
        )?;

        let cte = if table.is_unqualified() {
            scope.find_cte(&table.name, self.mode())
        } else {
            None
        };
        let fields = match cte {
            Some(cte) => cte
                .columns
                .iter()
                .map(|c| ResolvedField::qualified("", "", &cte.name, &c.name, c.sensitive))
                .collect(),
            None => self.lookup_relation(table, scope.depth())?,
        };

        let mut fields = fields;
        rename_columns(
            &mut fields,
            &table.column_aliases,
            &format!("column aliases of {}", table.name),
            table.span,
        )?;
        if let Some(alias) = &table.alias {
            let keep_database = self.dialect.keeps_database_under_alias();
            for field in &mut fields {
                field.table.clone_from(alias);
                field.schema.clear();
                if !keep_database {
                    field.database.clear();
                }
            }
        }
        Ok(fields)
    }

    /// Catalog table first, then catalog view.
    fn lookup_relation(
        &self,
        table: &TableRef,
        depth: usize,
    ) -> Result<Vec<ResolvedField>, EvalError> {
        let database = table
            .database
            .as_deref()
            .or((!self.current_database.is_empty()).then_some(self.current_database));
        let schema = table.schema.as_deref().or(self.dialect.default_schema());

        if let Some(found) = self.catalog.find_table(database, schema, &table.name) {
            tracing::trace!(
                database = found.database,
                schema = found.schema,
                table = %found.table.name,
                "resolved table"
            );
            return Ok(found
                .table
                .columns
                .iter()
                .map(|c| {
                    ResolvedField::qualified(
                        found.database,
                        found.schema,
                        &found.table.name,
                        &c.name,
                        c.sensitive,
                    )
                })
                .collect());
        }

        match self.view_fields(database, schema, &table.name, depth, table.span) {
            Err(EvalError::ViewNotFound { .. }) => Err(EvalError::TableNotFound {
                database: database.unwrap_or_default().to_string(),
                schema: schema.unwrap_or_default().to_string(),
                name: table.name.clone(),
                span: table.span,
            }),
            other => other,
        }
    }

    fn evaluate_derived(
        &self,
        derived: &Derived,
        scope: Scope<'_>,
    ) -> Result<Vec<ResolvedField>, EvalError> {
        // While a FROM clause is evaluated, the scope's FROM list holds the
        // relations to the left of the current item.
        let mut fields = if derived.lateral {
            let frame = scope.outer_frame();
            let sink = scope.correlation_sink();
            self.evaluate(&derived.body, scope.enter_subquery(&frame, &sink))?
        } else {
            self.evaluate(&derived.body, scope.with_from(&[]))?
        };
        let context = match &derived.alias {
            Some(alias) => format!("column aliases of {alias}"),
            None => "column aliases of derived table".to_string(),
        };
        rename_columns(&mut fields, &derived.column_aliases, &context, derived.span)?;
        if let Some(alias) = &derived.alias {
            for field in &mut fields {
                field.database.clear();
                field.schema.clear();
                field.table.clone_from(alias);
            }
        }
        Ok(fields)
    }

    fn evaluate_join(&self, join: &Join, scope: Scope<'_>) -> Result<Vec<ResolvedField>, EvalError> {
        let left = self.evaluate(&join.left, scope)?;
        let preceding: Vec<ResolvedField> =
            scope.from_fields().iter().chain(&left).cloned().collect();
        let right = self.evaluate(&join.right, scope.with_from(&preceding))?;

        if let JoinConstraint::On(condition) = &join.constraint
            && scope.tracks_correlation()
        {
            let visible: Vec<ResolvedField> = left.iter().chain(&right).cloned().collect();
            self.expr_sensitive(condition, scope.with_from(&visible))?;
        }

        tracing::trace!(kind = ?join.kind, left = left.len(), right = right.len(), "merging join");
        Ok(merge_join(left, right, &join.constraint, self.mode()))
    }

    fn evaluate_select(
        &self,
        select: &Select,
        scope: Scope<'_>,
    ) -> Result<Vec<ResolvedField>, EvalError> {
        let block = scope.nested();
        self.check_depth(block.depth(), select.span)?;
        match &select.with {
            Some(clause) => {
                self.with_ctes(clause, block, |block| self.evaluate_block(select, block))
            }
            None => self.evaluate_block(select, block),
        }
    }

    fn evaluate_block(
        &self,
        select: &Select,
        scope: Scope<'_>,
    ) -> Result<Vec<ResolvedField>, EvalError> {
        let from_fields = match &select.from {
            Some(from) => self.evaluate(from, scope)?,
            None => Vec::new(),
        };
        let scope = scope.with_from(&from_fields);

        // Filters only matter when they can reach a sensitive outer column.
        if scope.tracks_correlation() {
            for expr in select
                .selection
                .iter()
                .chain(&select.group_by)
                .chain(&select.having)
            {
                self.expr_sensitive(expr, scope)?;
            }
        }

        let mut fields = Vec::with_capacity(select.projections.len());
        for item in &select.projections {
            match &item.expr {
                ExprNode::Wildcard(None) => fields.extend(from_fields.iter().cloned()),
                ExprNode::Wildcard(Some(qualifier)) => {
                    let matched = scope.expand_wildcard(qualifier, self.dialect, self.mode())?;
                    if matched.is_empty() {
                        return Err(EvalError::TableNotFound {
                            database: qualifier.database.clone().unwrap_or_default(),
                            schema: qualifier.schema.clone().unwrap_or_default(),
                            name: qualifier.table.clone(),
                            span: qualifier.span,
                        });
                    }
                    fields.extend(matched);
                }
                expr => fields.push(self.project(expr, item.alias.as_deref(), scope)?),
            }
        }
        Ok(fields)
    }

    fn project(
        &self,
        expr: &ExprNode,
        alias: Option<&str>,
        scope: Scope<'_>,
    ) -> Result<ResolvedField, EvalError> {
        if let ExprNode::Column(column) = expr {
            let mut field = self
                .resolve_column(column, scope)?
                .unwrap_or_else(|| ResolvedField::new(column.name.clone(), false));
            if let Some(alias) = alias {
                field.name = alias.to_string();
            }
            return Ok(field);
        }

        let sensitive = self.expr_sensitive(expr, scope)?;
        let name = alias.map_or_else(|| self.output_name(expr), str::to_string);
        Ok(ResolvedField::new(name, sensitive))
    }

    fn evaluate_values(
        &self,
        values: &Values,
        scope: Scope<'_>,
    ) -> Result<Vec<ResolvedField>, EvalError> {
        let width = values.rows.first().map_or(0, Vec::len);
        let mut sensitive = vec![false; width];
        for row in &values.rows {
            if row.len() != width {
                return Err(EvalError::ColumnCountMismatch {
                    context: "VALUES rows".to_string(),
                    expected: width,
                    found: row.len(),
                    span: values.span,
                });
            }
            for (bit, expr) in sensitive.iter_mut().zip(row) {
                *bit |= self.expr_sensitive(expr, scope)?;
            }
        }
        Ok(sensitive
            .into_iter()
            .enumerate()
            .map(|(idx, sensitive)| ResolvedField::new(format!("column{}", idx + 1), sensitive))
            .collect())
    }

    /// Whether `expr` reads any sensitive column.
    ///
    /// Every sub-expression is visited, also after a sensitive one was
    /// found, so that correlated references inside later subqueries are
    /// still reported to the enclosing subquery.
    pub fn expr_sensitive(&self, expr: &ExprNode, scope: Scope<'_>) -> Result<bool, EvalError> {
        match expr {
            ExprNode::Column(column) => {
                return Ok(self
                    .resolve_column(column, scope)?
                    .is_some_and(|field| field.sensitive));
            }
            ExprNode::Unsupported {
                construct, span, ..
            } => {
                tracing::warn!(
                    construct = %construct,
                    position = %span,
                    "unsupported expression, propagating operand sensitivity only"
                );
            }
            _ => {}
        }

        let mut sensitive = false;
        for child in expr.children() {
            sensitive |= self.expr_sensitive(child, scope)?;
        }
        if let Some(query) = expr.nested_query() {
            sensitive |= self.subquery_sensitive(query, scope)?;
        }
        Ok(sensitive)
    }

    /// Taint of an expression subquery: any sensitive output column, or a
    /// sensitive column of an enclosing block read anywhere inside it.
    fn subquery_sensitive(&self, query: &QueryNode, scope: Scope<'_>) -> Result<bool, EvalError> {
        let frame = scope.outer_frame();
        let sink = scope.correlation_sink();
        let fields = self.evaluate(query, scope.enter_subquery(&frame, &sink))?;
        if sink.is_hit() {
            tracing::debug!("subquery reads a sensitive column of an enclosing query");
            return Ok(true);
        }
        Ok(fields.iter().any(|field| field.sensitive))
    }

    /// Field read by a column reference.
    ///
    /// A bare name that matches no column but names a visible relation is a
    /// whole-row reference (`row_to_json(u)`) and is sensitive when any
    /// field of that relation is.
    fn resolve_column(
        &self,
        column: &ColumnRef,
        scope: Scope<'_>,
    ) -> Result<Option<ResolvedField>, EvalError> {
        if let Some(field) =
            scope.resolve_column(column, self.dialect, self.mode(), self.config.ambiguity)?
        {
            return Ok(Some(field.clone()));
        }
        if column.table.is_none()
            && let Some(sensitive) = scope.whole_row(&column.name, self.mode())
        {
            tracing::trace!(relation = %column.name, sensitive, "whole-row reference");
            return Ok(Some(ResolvedField::new(column.name.clone(), sensitive)));
        }
        tracing::debug!(
            column = %column.name,
            table = column.table.as_deref().unwrap_or_default(),
            "column reference did not resolve, treating as not sensitive"
        );
        Ok(None)
    }

    fn output_name(&self, expr: &ExprNode) -> String {
        match expr {
            ExprNode::Column(column) => column.name.clone(),
            ExprNode::Function { name, .. } => name.clone(),
            ExprNode::Window { function, .. } => self.output_name(function),
            ExprNode::Subquery(query) => self
                .subquery_output_name(query)
                .unwrap_or_else(|| self.dialect.unnamed_column().to_string()),
            ExprNode::Exists(_) if self.dialect == Dialect::Postgres => "exists".to_string(),
            ExprNode::Case { .. } if self.dialect == Dialect::Postgres => "case".to_string(),
            _ => self.dialect.unnamed_column().to_string(),
        }
    }

    fn subquery_output_name(&self, query: &QueryNode) -> Option<String> {
        match query {
            QueryNode::Select(select) => match select.projections.as_slice() {
                [item] if !matches!(item.expr, ExprNode::Wildcard(_)) => Some(
                    item.alias
                        .clone()
                        .unwrap_or_else(|| self.output_name(&item.expr)),
                ),
                _ => None,
            },
            QueryNode::SetOp(op) => self.subquery_output_name(&op.left),
            QueryNode::With(with) => self.subquery_output_name(&with.body),
            _ => None,
        }
    }

    pub(crate) fn check_depth(&self, depth: usize, span: Span) -> Result<(), EvalError> {
        if depth > self.config.max_depth {
            return Err(EvalError::unsupported(
                format!("query nesting deeper than {} levels", self.config.max_depth),
                span,
            ));
        }
        Ok(())
    }
}

/// Rename `fields` positionally. An empty `names` list keeps the names.
pub(crate) fn rename_columns(
    fields: &mut [ResolvedField],
    names: &[String],
    context: &str,
    span: Span,
) -> Result<(), EvalError> {
    if names.is_empty() {
        return Ok(());
    }
    if names.len() != fields.len() {
        return Err(EvalError::ColumnCountMismatch {
            context: context.to_string(),
            expected: fields.len(),
            found: names.len(),
            span,
        });
    }
    for (field, name) in fields.iter_mut().zip(names) {
        field.name.clone_from(name);
    }
    Ok(())
}

pub(crate) fn to_table(name: &str, fields: Vec<ResolvedField>) -> TableSchema {
    TableSchema::new(
        name,
        fields
            .into_iter()
            .map(|field| ColumnSchema::new(field.name, field.sensitive))
            .collect(),
    )
}
