//! Lowering of `sqlparser` syntax trees into the query shape.

use std::ops::ControlFlow;

use shroud_core::{
    CaseBranch, ColumnRef, CteDef, Derived, Dialect, ExprNode, Join, JoinConstraint, JoinKind,
    ObjectQualifier, QueryNode, Select, SelectItem, SetOp, SetOpKind, Values, With, WithClause,
};
use shroud_lineage::EvalError;
use sqlparser::ast::{
    self, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, JoinOperator,
    Query, SelectItemQualifiedWildcardKind, SetExpr, SetOperator, TableAlias, TableFactor,
    TableWithJoins, WindowType, visit_expressions,
};

use crate::names::{self, Qualified, convert_span, span_of};

/// Lowers parsed statements of one dialect.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lowerer {
    dialect: Dialect,
}

/// Anything that can stand in an expression subquery position.
pub(crate) trait Subquery {
    fn lower_with(&self, lowerer: &Lowerer) -> Result<QueryNode, EvalError>;
}

impl Subquery for Query {
    fn lower_with(&self, lowerer: &Lowerer) -> Result<QueryNode, EvalError> {
        lowerer.query(self)
    }
}

impl Subquery for SetExpr {
    fn lower_with(&self, lowerer: &Lowerer) -> Result<QueryNode, EvalError> {
        lowerer.set_expr(self)
    }
}

impl Lowerer {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    fn ident(&self, ident: &ast::Ident) -> String {
        names::ident(self.dialect, ident)
    }

    pub(crate) fn query(&self, query: &Query) -> Result<QueryNode, EvalError> {
        let body = self.set_expr(&query.body)?;
        let Some(with) = &query.with else {
            return Ok(body);
        };
        let clause = self.with_clause(with)?;
        Ok(match body {
            QueryNode::Select(mut select) if select.with.is_none() => {
                select.with = Some(clause);
                QueryNode::Select(select)
            }
            body => With { clause, body }.into(),
        })
    }

    fn with_clause(&self, with: &ast::With) -> Result<WithClause, EvalError> {
        let ctes = with
            .cte_tables
            .iter()
            .map(|cte| {
                Ok(CteDef {
                    name: self.ident(&cte.alias.name),
                    explicit_columns: self.alias_columns(&cte.alias),
                    body: self.query(&cte.query)?,
                    is_recursive: with.recursive,
                    span: convert_span(cte.alias.name.span),
                })
            })
            .collect::<Result<Vec<_>, EvalError>>()?;
        Ok(WithClause {
            recursive: with.recursive,
            ctes,
        })
    }

    fn alias_columns(&self, alias: &TableAlias) -> Vec<String> {
        alias
            .columns
            .iter()
            .map(|column| self.ident(&column.name))
            .collect()
    }

    pub(crate) fn set_expr(&self, body: &SetExpr) -> Result<QueryNode, EvalError> {
        match body {
            SetExpr::Select(select) => Ok(self.select(select)?.into()),
            SetExpr::Query(query) => self.query(query),
            SetExpr::SetOperation {
                op, left, right, ..
            } => {
                let kind = match op {
                    SetOperator::Union => SetOpKind::Union,
                    SetOperator::Intersect => SetOpKind::Intersect,
                    // EXCEPT and MINUS
                    _ => SetOpKind::Except,
                };
                let mut node = SetOp::new(kind, self.set_expr(left)?, self.set_expr(right)?);
                node.span = span_of(body);
                Ok(node.into())
            }
            SetExpr::Values(values) => Ok(QueryNode::Values(Values {
                rows: values
                    .rows
                    .iter()
                    .map(|row| self.exprs(row))
                    .collect::<Result<_, _>>()?,
                span: span_of(body),
            })),
            other => Err(EvalError::unsupported(
                format!("{} as a query body", leading_keyword(&other.to_string())),
                span_of(other),
            )),
        }
    }

    fn select(&self, select: &ast::Select) -> Result<Select, EvalError> {
        let from = self.from_list(&select.from)?;
        let projections = select
            .projection
            .iter()
            .map(|item| self.select_item(item))
            .collect::<Result<Vec<_>, _>>()?;

        let mut node = Select::new(from, projections);
        node.selection = select.selection.as_ref().map(|e| self.expr(e)).transpose()?;
        node.group_by = match &select.group_by {
            GroupByExpr::Expressions(exprs, _) => self.exprs(exprs)?,
            GroupByExpr::All(_) => Vec::new(),
        };
        node.having = select.having.as_ref().map(|e| self.expr(e)).transpose()?;
        node.span = span_of(select);
        Ok(node)
    }

    fn select_item(&self, item: &ast::SelectItem) -> Result<SelectItem, EvalError> {
        match item {
            ast::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::expr(self.expr(expr)?)),
            ast::SelectItem::ExprWithAlias { expr, alias } => {
                Ok(SelectItem::aliased(self.expr(expr)?, self.ident(alias)))
            }
            ast::SelectItem::Wildcard(_) => Ok(SelectItem::wildcard()),
            ast::SelectItem::QualifiedWildcard(SelectItemQualifiedWildcardKind::ObjectName(name), _) => {
                let qualifier = self.wildcard_qualifier(name)?;
                Ok(SelectItem::expr(ExprNode::Wildcard(Some(qualifier))))
            }
            other => Err(EvalError::unsupported(
                format!("select item {other}"),
                span_of(other),
            )),
        }
    }

    fn wildcard_qualifier(&self, name: &ast::ObjectName) -> Result<ObjectQualifier, EvalError> {
        let span = span_of(name);
        let Qualified {
            database,
            schema,
            name: table,
        } = names::qualify(self.dialect, names::object_parts(self.dialect, name))
            .ok_or_else(|| EvalError::unsupported(format!("wildcard qualifier {name}"), span))?;
        Ok(ObjectQualifier {
            database,
            schema,
            table,
            span,
        })
    }

    /// Comma-separated FROM items become a chain of cross joins.
    fn from_list(&self, from: &[TableWithJoins]) -> Result<Option<QueryNode>, EvalError> {
        let mut result: Option<QueryNode> = None;
        for item in from {
            let right = self.table_with_joins(item)?;
            result = Some(match result {
                None => right,
                Some(left) => Join::new(left, right, JoinKind::Cross, JoinConstraint::None).into(),
            });
        }
        Ok(result)
    }

    fn table_with_joins(&self, item: &TableWithJoins) -> Result<QueryNode, EvalError> {
        let mut node = self.table_factor(&item.relation)?;
        for join in &item.joins {
            let mut right = self.table_factor(&join.relation)?;
            if let (JoinOperator::CrossApply | JoinOperator::OuterApply, QueryNode::Derived(derived)) =
                (&join.join_operator, &mut right)
            {
                derived.lateral = true;
            }
            let (kind, constraint) = self.join_operator(&join.join_operator, &join.relation)?;
            let mut joined = Join::new(node, right, kind, constraint);
            joined.span = span_of(&join.relation);
            node = joined.into();
        }
        Ok(node)
    }

    fn join_operator(
        &self,
        operator: &JoinOperator,
        relation: &TableFactor,
    ) -> Result<(JoinKind, JoinConstraint), EvalError> {
        let (kind, constraint) = match operator {
            JoinOperator::Join(c) | JoinOperator::Inner(c) => (JoinKind::Inner, c),
            JoinOperator::Left(c) | JoinOperator::LeftOuter(c) => (JoinKind::Left, c),
            JoinOperator::Right(c) | JoinOperator::RightOuter(c) => (JoinKind::Right, c),
            JoinOperator::FullOuter(c) => (JoinKind::Full, c),
            JoinOperator::CrossJoin(c) => (JoinKind::Cross, c),
            JoinOperator::CrossApply => return Ok((JoinKind::Cross, JoinConstraint::None)),
            JoinOperator::OuterApply => return Ok((JoinKind::Left, JoinConstraint::None)),
            other => {
                return Err(EvalError::unsupported(
                    format!("{} join", variant_name(other)),
                    span_of(relation),
                ));
            }
        };
        Ok((kind, self.join_constraint(constraint)?))
    }

    fn join_constraint(&self, constraint: &ast::JoinConstraint) -> Result<JoinConstraint, EvalError> {
        Ok(match constraint {
            ast::JoinConstraint::On(expr) => JoinConstraint::On(self.expr(expr)?),
            ast::JoinConstraint::Using(columns) => JoinConstraint::Using(
                columns
                    .iter()
                    .map(|column| self.display_ident(&column.to_string()))
                    .collect(),
            ),
            ast::JoinConstraint::Natural => JoinConstraint::Natural,
            ast::JoinConstraint::None => JoinConstraint::None,
        })
    }

    /// Fold the last part of a name given in its printed form.
    fn display_ident(&self, printed: &str) -> String {
        let last = printed.rsplit('.').next().unwrap_or(printed).trim();
        let quoted = ['"', '`', '['].iter().any(|q| last.starts_with(*q));
        let value = if quoted {
            last.get(1..last.len().saturating_sub(1)).unwrap_or_default()
        } else {
            last
        };
        names::fold(self.dialect, value, quoted)
    }

    fn table_factor(&self, factor: &TableFactor) -> Result<QueryNode, EvalError> {
        let span = span_of(factor);
        match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                if args.is_some() {
                    return Err(EvalError::unsupported(
                        format!("table function {name}"),
                        span,
                    ));
                }
                let Qualified {
                    database,
                    schema,
                    name: table,
                } = names::qualify(self.dialect, names::object_parts(self.dialect, name))
                    .ok_or_else(|| {
                        EvalError::unsupported(format!("table name {name} with too many parts"), span)
                    })?;
                let mut table_ref = shroud_core::TableRef::new(table);
                table_ref.database = database;
                table_ref.schema = schema;
                if let Some(alias) = alias {
                    table_ref.alias = Some(self.ident(&alias.name));
                    table_ref.column_aliases = self.alias_columns(alias);
                }
                table_ref.span = span;
                Ok(table_ref.into())
            }
            TableFactor::Derived {
                lateral,
                subquery,
                alias,
                ..
            } => {
                let mut derived = Derived::new(self.query(subquery)?, None);
                derived.lateral = *lateral;
                if let Some(alias) = alias {
                    derived.alias = Some(self.ident(&alias.name));
                    derived.column_aliases = self.alias_columns(alias);
                }
                derived.span = span;
                Ok(derived.into())
            }
            TableFactor::NestedJoin {
                table_with_joins,
                alias,
                ..
            } => {
                let node = self.table_with_joins(table_with_joins)?;
                let Some(alias) = alias else {
                    return Ok(node);
                };
                let mut derived = Derived::new(node, None);
                derived.alias = Some(self.ident(&alias.name));
                derived.column_aliases = self.alias_columns(alias);
                derived.span = span;
                Ok(derived.into())
            }
            other => Err(EvalError::unsupported(
                format!("{} in FROM", variant_name(other)),
                span,
            )),
        }
    }

    fn exprs(&self, exprs: &[Expr]) -> Result<Vec<ExprNode>, EvalError> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn boxed(&self, expr: &Expr) -> Result<Box<ExprNode>, EvalError> {
        self.expr(expr).map(Box::new)
    }

    pub(crate) fn expr(&self, expr: &Expr) -> Result<ExprNode, EvalError> {
        Ok(match expr {
            Expr::Identifier(ident) => ExprNode::Column(ColumnRef {
                name: self.ident(ident),
                span: convert_span(ident.span),
                ..Default::default()
            }),
            Expr::CompoundIdentifier(parts) => self.compound_column(parts, expr)?,
            Expr::Value(_) | Expr::TypedString { .. } => ExprNode::Literal,
            Expr::Nested(inner)
            | Expr::Collate { expr: inner, .. }
            | Expr::Cast { expr: inner, .. } => self.expr(inner)?,
            Expr::BinaryOp { left, right, .. } => ExprNode::Binary {
                left: self.boxed(left)?,
                right: self.boxed(right)?,
            },
            Expr::UnaryOp { expr: operand, .. }
            | Expr::IsNull(operand)
            | Expr::IsNotNull(operand)
            | Expr::IsTrue(operand)
            | Expr::IsNotTrue(operand)
            | Expr::IsFalse(operand)
            | Expr::IsNotFalse(operand) => ExprNode::Unary {
                operand: self.boxed(operand)?,
            },
            Expr::Like {
                expr: left,
                pattern,
                ..
            }
            | Expr::ILike {
                expr: left,
                pattern,
                ..
            }
            | Expr::SimilarTo {
                expr: left,
                pattern,
                ..
            } => ExprNode::Binary {
                left: self.boxed(left)?,
                right: self.boxed(pattern)?,
            },
            Expr::InList {
                expr: operand,
                list,
                ..
            } => ExprNode::InList {
                expr: self.boxed(operand)?,
                list: self.exprs(list)?,
            },
            Expr::InSubquery {
                expr: operand,
                subquery,
                ..
            } => ExprNode::InSubquery {
                expr: self.boxed(operand)?,
                subquery: Box::new(subquery.lower_with(self)?),
            },
            Expr::Between {
                expr: operand,
                low,
                high,
                ..
            } => ExprNode::Between {
                expr: self.boxed(operand)?,
                low: self.boxed(low)?,
                high: self.boxed(high)?,
            },
            Expr::Subquery(query) => ExprNode::Subquery(Box::new(query.lower_with(self)?)),
            Expr::Exists { subquery, .. } => ExprNode::Exists(Box::new(subquery.lower_with(self)?)),
            Expr::Tuple(items) => ExprNode::Tuple(self.exprs(items)?),
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => ExprNode::Case {
                operand: operand.as_deref().map(|e| self.boxed(e)).transpose()?,
                branches: conditions
                    .iter()
                    .map(|when| {
                        Ok(CaseBranch {
                            condition: self.expr(&when.condition)?,
                            result: self.expr(&when.result)?,
                        })
                    })
                    .collect::<Result<_, EvalError>>()?,
                else_result: else_result.as_deref().map(|e| self.boxed(e)).transpose()?,
            },
            Expr::Function(function) => self.function(function)?,
            Expr::Wildcard(_) => ExprNode::Wildcard(None),
            Expr::QualifiedWildcard(name, _) => {
                ExprNode::Wildcard(Some(self.wildcard_qualifier(name)?))
            }
            other => self.fallback(other)?,
        })
    }

    fn compound_column(&self, parts: &[ast::Ident], expr: &Expr) -> Result<ExprNode, EvalError> {
        let span = span_of(expr);
        let mut folded: Vec<String> = parts.iter().map(|part| self.ident(part)).collect();
        let name = folded.pop().unwrap_or_default();
        if folded.is_empty() {
            return Ok(ExprNode::Column(ColumnRef {
                name,
                span,
                ..Default::default()
            }));
        }
        let Qualified {
            database,
            schema,
            name: table,
        } = names::qualify(self.dialect, folded).ok_or_else(|| {
            EvalError::unsupported(format!("column reference {expr} with too many parts"), span)
        })?;
        Ok(ExprNode::Column(ColumnRef {
            database,
            schema,
            table: Some(table),
            name,
            span,
        }))
    }

    fn function(&self, function: &ast::Function) -> Result<ExprNode, EvalError> {
        let name = names::object_parts(self.dialect, &function.name)
            .pop()
            .unwrap_or_default();

        let mut args = Vec::new();
        match &function.args {
            FunctionArguments::List(list) => {
                for arg in &list.args {
                    let arg = match arg {
                        FunctionArg::Unnamed(arg)
                        | FunctionArg::Named { arg, .. }
                        | FunctionArg::ExprNamed { arg, .. } => arg,
                    };
                    args.push(match arg {
                        FunctionArgExpr::Expr(e) => self.expr(e)?,
                        FunctionArgExpr::QualifiedWildcard(qualifier) => {
                            ExprNode::Wildcard(Some(self.wildcard_qualifier(qualifier)?))
                        }
                        FunctionArgExpr::Wildcard => ExprNode::Wildcard(None),
                    });
                }
            }
            FunctionArguments::Subquery(query) => {
                args.push(ExprNode::Subquery(Box::new(query.lower_with(self)?)));
            }
            FunctionArguments::None => {}
        }
        if let Some(filter) = &function.filter {
            args.push(self.expr(filter)?);
        }
        for order in &function.within_group {
            args.push(self.expr(&order.expr)?);
        }

        let call = ExprNode::Function { name, args };
        Ok(match &function.over {
            Some(WindowType::WindowSpec(spec)) => ExprNode::Window {
                function: Box::new(call),
                partition_by: self.exprs(&spec.partition_by)?,
                order_by: spec
                    .order_by
                    .iter()
                    .map(|order| self.expr(&order.expr))
                    .collect::<Result<_, _>>()?,
            },
            Some(WindowType::NamedWindow(_)) => ExprNode::Window {
                function: Box::new(call),
                partition_by: Vec::new(),
                order_by: Vec::new(),
            },
            None => call,
        })
    }

    /// Lower an expression kind without a dedicated rule. Column references
    /// and subqueries found inside it are kept as operands.
    fn fallback(&self, expr: &Expr) -> Result<ExprNode, EvalError> {
        let mut operands = Vec::new();
        let flow = visit_expressions(expr, |inner| {
            if matches!(
                inner,
                Expr::Identifier(_) | Expr::CompoundIdentifier(_) | Expr::Subquery(_)
            ) {
                match self.expr(inner) {
                    Ok(node) => operands.push(node),
                    Err(err) => return ControlFlow::Break(err),
                }
            }
            ControlFlow::Continue(())
        });
        if let ControlFlow::Break(err) = flow {
            return Err(err);
        }
        let construct = variant_name(expr);
        tracing::debug!(%construct, operands = operands.len(), "expression lowered without a dedicated rule");
        Ok(ExprNode::Unsupported {
            construct,
            operands,
            span: span_of(expr),
        })
    }
}

/// Name of an enum variant, taken from its debug form.
fn variant_name(value: &impl std::fmt::Debug) -> String {
    format!("{value:?}")
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// First keyword of a printed statement, upper-cased.
pub(crate) fn leading_keyword(text: &str) -> String {
    text.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
}
