//! Common table expressions.
//!
//! A recursive CTE is split into the branches that reference it and the
//! branches that do not. The latter seed its columns, the former are
//! re-evaluated against the seed until no column flips to sensitive.
//! Sensitivity only ever goes from `false` to `true`, so the loop ends after
//! at most one pass per column.

use shroud_core::{
    CaseSensitivity, CteDef, ExprNode, JoinConstraint, QueryNode, ResolvedField, Select,
    SetOpKind, Span, TableSchema, WithClause,
};

use crate::error::EvalError;
use crate::extractor::{Extractor, rename_columns, to_table};
use crate::scope::Scope;
use crate::set_op::combine_all;

impl Extractor<'_> {
    /// Resolve the CTEs of `clause` in order, each seeing the ones before
    /// it, then run `body` with all of them visible.
    pub(crate) fn with_ctes<T>(
        &self,
        clause: &WithClause,
        scope: Scope<'_>,
        body: impl FnOnce(Scope<'_>) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        let mut tables: Vec<TableSchema> = Vec::with_capacity(clause.ctes.len());
        for cte in &clause.ctes {
            let frame = scope.cte_frame(&tables);
            let table = self.resolve_cte(cte, scope.push_ctes(&frame))?;
            tables.push(table);
        }
        let frame = scope.cte_frame(&tables);
        body(scope.push_ctes(&frame))
    }

    /// Output columns of one CTE. `scope` does not contain the CTE itself.
    pub fn resolve_cte(&self, cte: &CteDef, scope: Scope<'_>) -> Result<TableSchema, EvalError> {
        if cte.is_recursive
            && let Some(table) = self.resolve_recursive_cte(cte, scope)?
        {
            return Ok(table);
        }

        let mut fields = self.evaluate(&cte.body, scope)?;
        rename_columns(
            &mut fields,
            &cte.explicit_columns,
            &format!("column list of CTE {}", cte.name),
            cte.span,
        )?;
        Ok(to_table(&cte.name, fields))
    }

    /// `Ok(None)` when the CTE turns out not to be recursive.
    fn resolve_recursive_cte(
        &self,
        cte: &CteDef,
        scope: Scope<'_>,
    ) -> Result<Option<TableSchema>, EvalError> {
        match &cte.body {
            QueryNode::With(with) => {
                if with
                    .clause
                    .ctes
                    .iter()
                    .any(|inner| self.mode().ident_eq(&inner.name, &cte.name))
                {
                    tracing::debug!(
                        cte = %cte.name,
                        "recursive CTE redefined by a nested WITH, evaluating as non-recursive"
                    );
                    return Ok(None);
                }
                self.with_ctes(&with.clause, scope, |scope| {
                    self.fixpoint(cte, &with.body, scope)
                })
            }
            body => self.fixpoint(cte, body, scope),
        }
    }

    fn fixpoint(
        &self,
        cte: &CteDef,
        body: &QueryNode,
        scope: Scope<'_>,
    ) -> Result<Option<TableSchema>, EvalError> {
        let self_ref = SelfReference {
            name: &cte.name,
            mode: self.mode(),
        };
        let mut branches = Vec::new();
        collect_branches(body, &mut branches);
        let (recursive, initial): (Vec<&QueryNode>, Vec<&QueryNode>) = branches
            .into_iter()
            .partition(|branch| self_ref.in_query(branch));

        if recursive.is_empty() {
            return Ok(None);
        }
        if initial.is_empty() {
            return Err(EvalError::unsupported(
                format!("recursive CTE {} without a non-recursive branch", cte.name),
                cte.span,
            ));
        }

        let kind = match body {
            QueryNode::SetOp(op) => op.kind,
            _ => SetOpKind::Union,
        };

        let mut seed_fields = self.evaluate_branches(&initial, kind, scope, cte.span)?;
        rename_columns(
            &mut seed_fields,
            &cte.explicit_columns,
            &format!("column list of CTE {}", cte.name),
            cte.span,
        )?;
        let mut seed = to_table(&cte.name, seed_fields);

        let mut passes = 0usize;
        loop {
            passes += 1;
            let frame = scope.cte_frame(std::slice::from_ref(&seed));
            let fields = self.evaluate_branches(&recursive, kind, scope.push_ctes(&frame), cte.span)?;
            if fields.len() != seed.columns.len() {
                return Err(EvalError::ColumnCountMismatch {
                    context: format!("recursive branch of CTE {}", cte.name),
                    expected: seed.columns.len(),
                    found: fields.len(),
                    span: cte.span,
                });
            }

            let mut changed = false;
            for (column, field) in seed.columns.iter_mut().zip(&fields) {
                if field.sensitive && !column.sensitive {
                    column.sensitive = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        tracing::debug!(cte = %cte.name, passes, "recursive CTE reached fixpoint");
        Ok(Some(seed))
    }

    fn evaluate_branches(
        &self,
        branches: &[&QueryNode],
        kind: SetOpKind,
        scope: Scope<'_>,
        span: Span,
    ) -> Result<Vec<ResolvedField>, EvalError> {
        let evaluated = branches
            .iter()
            .map(|branch| self.evaluate(branch, scope))
            .collect::<Result<Vec<_>, _>>()?;
        combine_all(evaluated, kind, span)
    }
}

fn collect_branches<'q>(node: &'q QueryNode, out: &mut Vec<&'q QueryNode>) {
    match node {
        QueryNode::SetOp(op) => {
            collect_branches(&op.left, out);
            collect_branches(&op.right, out);
        }
        other => out.push(other),
    }
}

/// Finds unqualified table references to one CTE name, honoring shadowing
/// by nested WITH clauses.
struct SelfReference<'n> {
    name: &'n str,
    mode: CaseSensitivity,
}

impl SelfReference<'_> {
    fn in_query(&self, node: &QueryNode) -> bool {
        match node {
            QueryNode::Table(table) => {
                table.is_unqualified() && self.mode.ident_eq(&table.name, self.name)
            }
            QueryNode::Derived(derived) => self.in_query(&derived.body),
            QueryNode::Join(join) => {
                self.in_query(&join.left)
                    || self.in_query(&join.right)
                    || matches!(&join.constraint, JoinConstraint::On(on) if self.in_expr(on))
            }
            QueryNode::Select(select) => match &select.with {
                Some(clause) => self.in_with(clause, || self.in_select(select)),
                None => self.in_select(select),
            },
            QueryNode::SetOp(op) => self.in_query(&op.left) || self.in_query(&op.right),
            QueryNode::Values(values) => values.rows.iter().flatten().any(|e| self.in_expr(e)),
            QueryNode::With(with) => self.in_with(&with.clause, || self.in_query(&with.body)),
        }
    }

    fn in_with(&self, clause: &WithClause, body: impl FnOnce() -> bool) -> bool {
        for cte in &clause.ctes {
            let redefines = self.mode.ident_eq(&cte.name, self.name);
            // A recursive redefinition refers to itself.
            if !(redefines && cte.is_recursive) && self.in_query(&cte.body) {
                return true;
            }
            if redefines {
                return false;
            }
        }
        body()
    }

    fn in_select(&self, select: &Select) -> bool {
        select.from.as_ref().is_some_and(|from| self.in_query(from))
            || select.projections.iter().any(|item| self.in_expr(&item.expr))
            || select
                .selection
                .iter()
                .chain(&select.group_by)
                .chain(&select.having)
                .any(|expr| self.in_expr(expr))
    }

    fn in_expr(&self, expr: &ExprNode) -> bool {
        expr.nested_query().is_some_and(|query| self.in_query(query))
            || expr.children().into_iter().any(|child| self.in_expr(child))
    }
}
