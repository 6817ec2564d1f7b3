//! Intermediate query shape.
//!
//! A dialect-neutral tree that SQL adapters lower parsed statements into and
//! the lineage engine consumes. It keeps only what influences which output
//! columns carry sensitive data: relations, projections, expressions,
//! set operations and common table expressions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in the statement text. Lines and columns are 1-based, zero means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: u64,
    pub column: u64,
}

/// Source range of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub const fn empty() -> Self {
        Self {
            start: Location { line: 0, column: 0 },
            end: Location { line: 0, column: 0 },
        }
    }

    pub const fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start.line == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("unknown position")
        } else {
            write!(f, "line {} column {}", self.start.line, self.start.column)
        }
    }
}

/// Top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Query(QueryNode),
    CreateView(CreateView),
    /// `EXPLAIN ...`: produces a plan, never table data.
    Explain,
    /// Anything else (DML, DDL, session commands).
    Other { kind: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateView {
    pub name: String,
    /// Explicit output column names, empty when omitted.
    pub columns: Vec<String>,
    pub query: QueryNode,
    pub span: Span,
}

/// A relation-producing node.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    Table(TableRef),
    Derived(Derived),
    Join(Box<Join>),
    Select(Box<Select>),
    SetOp(Box<SetOp>),
    Values(Values),
    With(Box<With>),
}

impl QueryNode {
    /// Unqualified, unaliased table reference.
    pub fn table(name: impl Into<String>) -> Self {
        QueryNode::Table(TableRef::new(name))
    }

    pub fn span(&self) -> Span {
        match self {
            QueryNode::Table(t) => t.span,
            QueryNode::Derived(d) => d.span,
            QueryNode::Join(j) => j.span,
            QueryNode::Select(s) => s.span,
            QueryNode::SetOp(s) => s.span,
            QueryNode::Values(v) => v.span,
            QueryNode::With(w) => w.body.span(),
        }
    }
}

/// Reference to a catalog table, view or CTE.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRef {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub name: String,
    pub alias: Option<String>,
    pub column_aliases: Vec<String>,
    pub span: Span,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn in_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn is_unqualified(&self) -> bool {
        self.database.is_none() && self.schema.is_none()
    }
}

impl From<TableRef> for QueryNode {
    fn from(table: TableRef) -> Self {
        QueryNode::Table(table)
    }
}

/// Parenthesized subquery used as a relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub body: Box<QueryNode>,
    pub alias: Option<String>,
    pub column_aliases: Vec<String>,
    /// `LATERAL` or the right side of `APPLY`: the body may read the
    /// relations to its left in the same FROM clause.
    pub lateral: bool,
    pub span: Span,
}

impl Derived {
    pub fn new(body: QueryNode, alias: Option<&str>) -> Self {
        Self {
            body: Box::new(body),
            alias: alias.map(str::to_string),
            column_aliases: Vec::new(),
            lateral: false,
            span: Span::empty(),
        }
    }

    pub fn lateral(mut self) -> Self {
        self.lateral = true;
        self
    }
}

impl From<Derived> for QueryNode {
    fn from(derived: Derived) -> Self {
        QueryNode::Derived(derived)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    None,
    On(ExprNode),
    Using(Vec<String>),
    Natural,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: QueryNode,
    pub right: QueryNode,
    pub kind: JoinKind,
    pub constraint: JoinConstraint,
    pub span: Span,
}

impl Join {
    pub fn new(left: QueryNode, right: QueryNode, kind: JoinKind, constraint: JoinConstraint) -> Self {
        Self {
            left,
            right,
            kind,
            constraint,
            span: Span::empty(),
        }
    }
}

impl From<Join> for QueryNode {
    fn from(join: Join) -> Self {
        QueryNode::Join(Box::new(join))
    }
}

/// One query block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub with: Option<WithClause>,
    pub from: Option<QueryNode>,
    pub projections: Vec<SelectItem>,
    pub selection: Option<ExprNode>,
    pub group_by: Vec<ExprNode>,
    pub having: Option<ExprNode>,
    pub span: Span,
}

impl Select {
    pub fn new(from: Option<QueryNode>, projections: Vec<SelectItem>) -> Self {
        Self {
            from,
            projections,
            ..Default::default()
        }
    }

    pub fn filter(mut self, selection: ExprNode) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_ctes(mut self, with: WithClause) -> Self {
        self.with = Some(with);
        self
    }
}

impl From<Select> for QueryNode {
    fn from(select: Select) -> Self {
        QueryNode::Select(Box::new(select))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: ExprNode,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn expr(expr: ExprNode) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: ExprNode, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    /// `*`
    pub fn wildcard() -> Self {
        Self::expr(ExprNode::Wildcard(None))
    }

    /// `table.*`
    pub fn qualified_wildcard(table: impl Into<String>) -> Self {
        Self::expr(ExprNode::Wildcard(Some(ObjectQualifier::table(table))))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpKind {
    Union,
    Intersect,
    Except,
}

impl fmt::Display for SetOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SetOpKind::Union => "UNION",
            SetOpKind::Intersect => "INTERSECT",
            SetOpKind::Except => "EXCEPT",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetOp {
    pub left: QueryNode,
    pub right: QueryNode,
    pub kind: SetOpKind,
    pub span: Span,
}

impl SetOp {
    pub fn new(kind: SetOpKind, left: QueryNode, right: QueryNode) -> Self {
        Self {
            left,
            right,
            kind,
            span: Span::empty(),
        }
    }
}

impl From<SetOp> for QueryNode {
    fn from(op: SetOp) -> Self {
        QueryNode::SetOp(Box::new(op))
    }
}

/// `VALUES (...), (...)`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Values {
    pub rows: Vec<Vec<ExprNode>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WithClause {
    pub recursive: bool,
    pub ctes: Vec<CteDef>,
}

/// A query wrapped in its own WITH clause.
#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub clause: WithClause,
    pub body: QueryNode,
}

impl From<With> for QueryNode {
    fn from(with: With) -> Self {
        QueryNode::With(Box::new(with))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CteDef {
    pub name: String,
    pub explicit_columns: Vec<String>,
    pub body: QueryNode,
    pub is_recursive: bool,
    pub span: Span,
}

impl CteDef {
    pub fn new(name: impl Into<String>, body: QueryNode) -> Self {
        Self {
            name: name.into(),
            explicit_columns: Vec::new(),
            body,
            is_recursive: false,
            span: Span::empty(),
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.explicit_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn recursive(mut self) -> Self {
        self.is_recursive = true;
        self
    }
}

/// Column reference with its optional qualifiers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnRef {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub name: String,
    pub span: Span,
}

/// Qualifier of `table.*`, `schema.table.*` and so on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectQualifier {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: String,
    pub span: Span,
}

impl ObjectQualifier {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseBranch {
    pub condition: ExprNode,
    pub result: ExprNode,
}

/// Scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Column(ColumnRef),
    Literal,
    Function {
        name: String,
        args: Vec<ExprNode>,
    },
    Binary {
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    Unary {
        operand: Box<ExprNode>,
    },
    Case {
        operand: Option<Box<ExprNode>>,
        branches: Vec<CaseBranch>,
        else_result: Option<Box<ExprNode>>,
    },
    InList {
        expr: Box<ExprNode>,
        list: Vec<ExprNode>,
    },
    InSubquery {
        expr: Box<ExprNode>,
        subquery: Box<QueryNode>,
    },
    Between {
        expr: Box<ExprNode>,
        low: Box<ExprNode>,
        high: Box<ExprNode>,
    },
    /// Scalar subquery.
    Subquery(Box<QueryNode>),
    Exists(Box<QueryNode>),
    Window {
        function: Box<ExprNode>,
        partition_by: Vec<ExprNode>,
        order_by: Vec<ExprNode>,
    },
    Tuple(Vec<ExprNode>),
    /// `*` or `qualifier.*`, in a projection or as a function argument.
    Wildcard(Option<ObjectQualifier>),
    /// Construct the adapter could not lower. `operands` holds the
    /// expressions found inside it so their sensitivity still propagates.
    Unsupported {
        construct: String,
        operands: Vec<ExprNode>,
        span: Span,
    },
}

impl ExprNode {
    pub fn column(name: impl Into<String>) -> Self {
        ExprNode::Column(ColumnRef {
            name: name.into(),
            ..Default::default()
        })
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        ExprNode::Column(ColumnRef {
            table: Some(table.into()),
            name: name.into(),
            ..Default::default()
        })
    }

    pub fn function(name: impl Into<String>, args: Vec<ExprNode>) -> Self {
        ExprNode::Function {
            name: name.into(),
            args,
        }
    }

    pub fn binary(left: ExprNode, right: ExprNode) -> Self {
        ExprNode::Binary {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn subquery(query: impl Into<QueryNode>) -> Self {
        ExprNode::Subquery(Box::new(query.into()))
    }

    pub fn exists(query: impl Into<QueryNode>) -> Self {
        ExprNode::Exists(Box::new(query.into()))
    }

    /// Direct sub-expressions, not descending into nested queries.
    pub fn children(&self) -> Vec<&ExprNode> {
        match self {
            ExprNode::Column(_) | ExprNode::Literal | ExprNode::Wildcard(_) => Vec::new(),
            ExprNode::Subquery(_) | ExprNode::Exists(_) => Vec::new(),
            ExprNode::Function { args, .. } | ExprNode::Tuple(args) => args.iter().collect(),
            ExprNode::Unsupported { operands, .. } => operands.iter().collect(),
            ExprNode::Binary { left, right } => vec![left.as_ref(), right.as_ref()],
            ExprNode::Unary { operand } => vec![operand.as_ref()],
            ExprNode::Case {
                operand,
                branches,
                else_result,
            } => operand
                .as_deref()
                .into_iter()
                .chain(branches.iter().flat_map(|b| [&b.condition, &b.result]))
                .chain(else_result.as_deref())
                .collect(),
            ExprNode::InList { expr, list } => std::iter::once(expr.as_ref()).chain(list).collect(),
            ExprNode::InSubquery { expr, .. } => vec![expr.as_ref()],
            ExprNode::Between { expr, low, high } => {
                vec![expr.as_ref(), low.as_ref(), high.as_ref()]
            }
            ExprNode::Window {
                function,
                partition_by,
                order_by,
            } => std::iter::once(function.as_ref())
                .chain(partition_by)
                .chain(order_by)
                .collect(),
        }
    }

    /// Query nested directly in this expression, if any.
    pub fn nested_query(&self) -> Option<&QueryNode> {
        match self {
            ExprNode::Subquery(query) | ExprNode::Exists(query) => Some(query.as_ref()),
            ExprNode::InSubquery { subquery, .. } => Some(subquery.as_ref()),
            _ => None,
        }
    }
}
