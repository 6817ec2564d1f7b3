//! # shroud-lineage
//!
//! Column sensitivity propagation for Shroud.
//!
//! Given a statement lowered into the query shape of [`shroud_core::iqs`]
//! and a catalog that flags sensitive columns, this crate answers, for each
//! output column in order: can it carry data from a sensitive column?
//!
//! ## Propagation Rules
//!
//! | Construct | Rule |
//! |-----------|------|
//! | Column reference | Sensitivity of the column it resolves to |
//! | Expression | OR over every column reference inside it |
//! | Scalar / `EXISTS` / `IN` subquery | OR over its output columns, or any sensitive outer column it reads |
//! | `JOIN ... USING` / `NATURAL JOIN` | Shared columns merged, bits OR-ed |
//! | `UNION` / `INTERSECT` / `EXCEPT` | Positional OR, left branch names the result |
//! | CTE | Evaluated once, visible to later CTEs and the body |
//! | Recursive CTE | Iterated until no column changes |
//! | View | Definition re-parsed and evaluated standalone |
//!
//! ## Example
//!
//! ```
//! use shroud_core::{CaseSensitivity, ColumnSchema, Dialect, ExprNode, QueryNode, SchemaCatalog,
//!     Select, SelectItem, Statement, TableSchema};
//! use shroud_lineage::{Extractor, NoParser};
//!
//! let catalog = SchemaCatalog::new(CaseSensitivity::Insensitive).with_table(
//!     "shop",
//!     "public",
//!     TableSchema::new("users", vec![ColumnSchema::plain("id"), ColumnSchema::sensitive("email")]),
//! );
//! let query = Select::new(
//!     Some(QueryNode::table("users")),
//!     vec![SelectItem::expr(ExprNode::function("lower", vec![ExprNode::column("email")]))],
//! );
//!
//! let fields = Extractor::new(&catalog, &NoParser, Dialect::Postgres)
//!     .extract(&Statement::Query(query.into()))
//!     .unwrap();
//! assert!(fields[0].sensitive);
//! ```

pub mod cte;
pub mod error;
pub mod extractor;
pub mod join;
pub mod parser;
pub mod scope;
pub mod set_op;
pub mod view;

use shroud_core::{AnalysisConfig, Dialect, SchemaCatalog, SensitiveField, Statement};

pub use error::EvalError;
pub use extractor::Extractor;
pub use join::merge_join;
pub use parser::{NoParser, QueryParser};
pub use scope::Scope;
pub use set_op::{combine, combine_all};

/// Evaluate one top-level statement with default analysis settings.
pub fn evaluate_top_level(
    statement: &Statement,
    catalog: &SchemaCatalog,
    parser: &dyn QueryParser,
    dialect: Dialect,
    current_database: &str,
) -> Result<Vec<SensitiveField>, EvalError> {
    Extractor::new(catalog, parser, dialect)
        .with_current_database(current_database)
        .with_config(AnalysisConfig::default())
        .extract(statement)
}
