//! Expansion of catalog views.

use shroud_core::{ResolvedField, Span, Statement, TableSchema};

use crate::error::EvalError;
use crate::extractor::{Extractor, to_table};
use crate::scope::Scope;

impl Extractor<'_> {
    /// Output columns of a catalog view, evaluated as a standalone query.
    pub fn expand_view(
        &self,
        database: Option<&str>,
        schema: Option<&str>,
        name: &str,
    ) -> Result<TableSchema, EvalError> {
        let fields = self.view_fields(database, schema, name, 0, Span::empty())?;
        Ok(to_table(name, fields))
    }

    /// Output columns of a view, qualified with the view's own location.
    ///
    /// The definition is evaluated in a fresh scope: nothing of the
    /// referencing query (outer columns, CTEs) is visible to it.
    pub(crate) fn view_fields(
        &self,
        database: Option<&str>,
        schema: Option<&str>,
        name: &str,
        depth: usize,
        span: Span,
    ) -> Result<Vec<ResolvedField>, EvalError> {
        let found = self
            .catalog()
            .find_view(database, schema, name)
            .ok_or_else(|| EvalError::ViewNotFound {
                database: database.unwrap_or_default().to_string(),
                schema: schema.unwrap_or_default().to_string(),
                name: name.to_string(),
                span,
            })?;

        let depth = depth + 1;
        if depth > self.config().max_depth {
            return Err(EvalError::unsupported(
                format!(
                    "view {} nested deeper than {} levels, are the view definitions cyclic?",
                    found.view.name,
                    self.config().max_depth
                ),
                span,
            ));
        }

        tracing::debug!(
            database = found.database,
            schema = found.schema,
            view = %found.view.name,
            "expanding view definition"
        );

        let statement = self.parser().parse_statement(&found.view.definition)?;
        let scope = Scope::at_depth(depth);
        let fields = match &statement {
            Statement::Query(query) => self.evaluate(query, scope)?,
            Statement::CreateView(view) => self.evaluate_create_view(view, scope)?,
            Statement::Explain | Statement::Other { .. } => {
                return Err(EvalError::unsupported(
                    format!("definition of view {} is not a query", found.view.name),
                    span,
                ));
            }
        };

        Ok(fields
            .into_iter()
            .map(|field| {
                ResolvedField::qualified(
                    found.database,
                    found.schema,
                    &found.view.name,
                    field.name,
                    field.sensitive,
                )
            })
            .collect())
    }
}
