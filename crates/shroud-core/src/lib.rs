//! Core types shared by the Shroud crates.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`catalog`] | Databases, schemas, tables, views and column sensitivity |
//! | [`dialect`] | Dialect families and their naming rules |
//! | [`iqs`] | Dialect-neutral query shape produced by SQL adapters |
//! | [`field`] | Output column descriptors |
//! | [`report`] | Serializable analysis result |
//! | [`config`] | `shroud.yaml` configuration |

pub mod catalog;
pub mod config;
pub mod dialect;
pub mod field;
pub mod iqs;
pub mod report;

pub use catalog::{
    CaseSensitivity, CatalogIssue, CatalogSource, ColumnSchema, DatabaseSchema,
    FileCatalogSource, SchemaCatalog, SchemaSchema, TableMatch, TableSchema, ViewMatch,
    ViewSchema,
};
pub use config::{AmbiguityMode, AnalysisConfig, ConfigError, LoggingConfig, ShroudConfig};
pub use dialect::Dialect;
pub use field::{ResolvedField, SensitiveField};
pub use iqs::{
    CaseBranch, ColumnRef, CreateView, CteDef, Derived, ExprNode, Join, JoinConstraint,
    JoinKind, Location, ObjectQualifier, QueryNode, Select, SelectItem, SetOp, SetOpKind, Span,
    Statement, TableRef, Values, With, WithClause,
};
pub use report::SensitivityReport;
