//! Schema catalog: databases, schemas, tables and views with per-column
//! sensitivity flags.
//!
//! The catalog is read-only once loaded and can be shared across threads.
//! Lookups take optional qualifiers; a missing qualifier matches any value.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// How identifiers are compared when resolving names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSensitivity {
    #[default]
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    /// Compare two identifiers under this mode.
    pub fn ident_eq(self, a: &str, b: &str) -> bool {
        match self {
            CaseSensitivity::Sensitive => a == b,
            CaseSensitivity::Insensitive => a
                .chars()
                .flat_map(char::to_lowercase)
                .eq(b.chars().flat_map(char::to_lowercase)),
        }
    }

    /// Compare an identifier against an optional filter. `None` matches anything.
    pub fn matches(self, filter: Option<&str>, value: &str) -> bool {
        filter.is_none_or(|f| self.ident_eq(f, value))
    }
}

/// A column and whether it holds sensitive data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(default)]
    pub sensitive: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, sensitive: bool) -> Self {
        Self {
            name: name.into(),
            sensitive,
        }
    }

    pub fn plain(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    pub fn sensitive(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }
}

/// Ordered column list of a table (or of a derived relation such as a CTE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str, mode: CaseSensitivity) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| mode.ident_eq(&c.name, name))
    }
}

/// A view and its SQL definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSchema {
    pub name: String,
    pub definition: String,
}

impl ViewSchema {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }
}

/// One schema of a database. MySQL catalogs use a single unnamed schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSchema {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableSchema>,
    #[serde(default)]
    pub views: Vec<ViewSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub name: String,
    #[serde(default)]
    pub schemas: Vec<SchemaSchema>,
}

/// Result of a qualified table lookup.
#[derive(Debug, Clone, Copy)]
pub struct TableMatch<'a> {
    pub database: &'a str,
    pub schema: &'a str,
    pub table: &'a TableSchema,
}

/// Result of a qualified view lookup.
#[derive(Debug, Clone, Copy)]
pub struct ViewMatch<'a> {
    pub database: &'a str,
    pub schema: &'a str,
    pub view: &'a ViewSchema,
}

/// Problem found by [`SchemaCatalog::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogIssue {
    /// Dotted path of the offending object.
    pub path: String,
    pub message: String,
}

/// All databases visible to one analysis, plus the identifier comparison mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    #[serde(default)]
    pub case_sensitivity: CaseSensitivity,
    #[serde(default)]
    pub databases: Vec<DatabaseSchema>,
}

impl SchemaCatalog {
    pub fn new(case_sensitivity: CaseSensitivity) -> Self {
        Self {
            case_sensitivity,
            databases: Vec::new(),
        }
    }

    /// Load a catalog from a JSON or YAML file, picked by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    /// True when no database holds a table.
    pub fn is_empty(&self) -> bool {
        self.databases
            .iter()
            .flat_map(|db| &db.schemas)
            .all(|schema| schema.tables.is_empty())
    }

    /// Find the first table matching the given qualifiers.
    ///
    /// Databases and schemas are visited in catalog order.
    pub fn find_table(
        &self,
        database: Option<&str>,
        schema: Option<&str>,
        name: &str,
    ) -> Option<TableMatch<'_>> {
        let mode = self.case_sensitivity;
        self.schemas(database, schema).find_map(|(db, sch)| {
            sch.tables
                .iter()
                .find(|t| mode.ident_eq(&t.name, name))
                .map(|table| TableMatch {
                    database: &db.name,
                    schema: &sch.name,
                    table,
                })
        })
    }

    /// Find the first view matching the given qualifiers.
    pub fn find_view(
        &self,
        database: Option<&str>,
        schema: Option<&str>,
        name: &str,
    ) -> Option<ViewMatch<'_>> {
        let mode = self.case_sensitivity;
        self.schemas(database, schema).find_map(|(db, sch)| {
            sch.views
                .iter()
                .find(|v| mode.ident_eq(&v.name, name))
                .map(|view| ViewMatch {
                    database: &db.name,
                    schema: &sch.name,
                    view,
                })
        })
    }

    fn schemas<'a, 'q>(
        &'a self,
        database: Option<&'q str>,
        schema: Option<&'q str>,
    ) -> impl Iterator<Item = (&'a DatabaseSchema, &'a SchemaSchema)> + use<'a, 'q> {
        let mode = self.case_sensitivity;
        self.databases
            .iter()
            .filter(move |db| mode.matches(database, &db.name))
            .flat_map(move |db| {
                db.schemas
                    .iter()
                    .filter(move |s| mode.matches(schema, &s.name))
                    .map(move |s| (db, s))
            })
    }

    /// Add a table, creating the database and schema entries as needed.
    pub fn add_table(&mut self, database: &str, schema: &str, table: TableSchema) {
        self.schema_mut(database, schema).tables.push(table);
    }

    pub fn add_view(&mut self, database: &str, schema: &str, view: ViewSchema) {
        self.schema_mut(database, schema).views.push(view);
    }

    pub fn with_table(mut self, database: &str, schema: &str, table: TableSchema) -> Self {
        self.add_table(database, schema, table);
        self
    }

    pub fn with_view(mut self, database: &str, schema: &str, view: ViewSchema) -> Self {
        self.add_view(database, schema, view);
        self
    }

    fn schema_mut(&mut self, database: &str, schema: &str) -> &mut SchemaSchema {
        let db_idx = match self.databases.iter().position(|d| d.name == database) {
            Some(idx) => idx,
            None => {
                self.databases.push(DatabaseSchema {
                    name: database.to_string(),
                    schemas: Vec::new(),
                });
                self.databases.len() - 1
            }
        };
        let db = &mut self.databases[db_idx];
        let schema_idx = match db.schemas.iter().position(|s| s.name == schema) {
            Some(idx) => idx,
            None => {
                db.schemas.push(SchemaSchema {
                    name: schema.to_string(),
                    ..Default::default()
                });
                db.schemas.len() - 1
            }
        };
        &mut db.schemas[schema_idx]
    }

    /// Keep only the named database.
    pub fn restrict_to(&mut self, database: &str) {
        let mode = self.case_sensitivity;
        self.databases.retain(|db| mode.ident_eq(&db.name, database));
    }

    pub fn table_count(&self) -> usize {
        self.databases
            .iter()
            .flat_map(|db| &db.schemas)
            .map(|s| s.tables.len())
            .sum()
    }

    pub fn sensitive_column_count(&self) -> usize {
        self.databases
            .iter()
            .flat_map(|db| &db.schemas)
            .flat_map(|s| &s.tables)
            .flat_map(|t| &t.columns)
            .filter(|c| c.sensitive)
            .count()
    }

    /// Report structural problems: empty names, duplicate names under the
    /// catalog's comparison mode and tables without columns.
    pub fn validate(&self) -> Vec<CatalogIssue> {
        let mode = self.case_sensitivity;
        let mut issues = Vec::new();

        for (i, db) in self.databases.iter().enumerate() {
            if db.name.is_empty() {
                issues.push(CatalogIssue {
                    path: format!("databases[{i}]"),
                    message: "database name is empty".to_string(),
                });
            }
            if self.databases[..i]
                .iter()
                .any(|other| mode.ident_eq(&other.name, &db.name))
            {
                issues.push(CatalogIssue {
                    path: db.name.clone(),
                    message: "duplicate database".to_string(),
                });
            }

            for (j, schema) in db.schemas.iter().enumerate() {
                let schema_path = format!("{}.{}", db.name, schema.name);
                if db.schemas[..j]
                    .iter()
                    .any(|other| mode.ident_eq(&other.name, &schema.name))
                {
                    issues.push(CatalogIssue {
                        path: schema_path.clone(),
                        message: "duplicate schema".to_string(),
                    });
                }

                for (k, table) in schema.tables.iter().enumerate() {
                    let table_path = format!("{schema_path}.{}", table.name);
                    if table.name.is_empty() {
                        issues.push(CatalogIssue {
                            path: format!("{schema_path}.tables[{k}]"),
                            message: "table name is empty".to_string(),
                        });
                    }
                    if schema.tables[..k]
                        .iter()
                        .any(|other| mode.ident_eq(&other.name, &table.name))
                    {
                        issues.push(CatalogIssue {
                            path: table_path.clone(),
                            message: "duplicate table".to_string(),
                        });
                    }
                    if table.columns.is_empty() {
                        issues.push(CatalogIssue {
                            path: table_path.clone(),
                            message: "table has no columns".to_string(),
                        });
                    }
                    for (c, column) in table.columns.iter().enumerate() {
                        if table.columns[..c]
                            .iter()
                            .any(|other| mode.ident_eq(&other.name, &column.name))
                        {
                            issues.push(CatalogIssue {
                                path: format!("{table_path}.{}", column.name),
                                message: "duplicate column".to_string(),
                            });
                        }
                    }
                }

                for view in &schema.views {
                    if view.definition.trim().is_empty() {
                        issues.push(CatalogIssue {
                            path: format!("{schema_path}.{}", view.name),
                            message: "view definition is empty".to_string(),
                        });
                    }
                    if schema.tables.iter().any(|t| mode.ident_eq(&t.name, &view.name)) {
                        issues.push(CatalogIssue {
                            path: format!("{schema_path}.{}", view.name),
                            message: "view shadows a table with the same name".to_string(),
                        });
                    }
                }
            }
        }

        issues
    }
}

/// Source of a schema catalog for one analysis.
pub trait CatalogSource {
    /// Load the catalog for `database`, compared under `mode`.
    ///
    /// An empty `database` keeps every database of the source.
    fn load_catalog(
        &self,
        database: &str,
        mode: CaseSensitivity,
    ) -> Result<SchemaCatalog, ConfigError>;
}

/// Catalog stored in a JSON or YAML file.
#[derive(Debug, Clone)]
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for FileCatalogSource {
    fn load_catalog(
        &self,
        database: &str,
        mode: CaseSensitivity,
    ) -> Result<SchemaCatalog, ConfigError> {
        let mut catalog = SchemaCatalog::from_file(&self.path)?;
        catalog.case_sensitivity = mode;
        if !database.is_empty() {
            catalog.restrict_to(database);
        }
        tracing::debug!(
            path = %self.path.display(),
            database,
            tables = catalog.table_count(),
            "loaded catalog"
        );
        Ok(catalog)
    }
}
