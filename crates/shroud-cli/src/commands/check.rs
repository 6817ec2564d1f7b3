//! `shroud check` command implementation.
//!
//! Validates a catalog file:
//! - JSON Schema validation against `schemas/Catalog.schema.json`
//! - Structural checks (empty and duplicate names, tables without columns)
//! - Every view definition must parse and evaluate against the catalog

use anyhow::Result;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

use shroud_core::{Dialect, SchemaCatalog, Statement};
use shroud_lineage::Extractor;
use shroud_sql::SqlAdapter;

// ============================================================================
// Embedded JSON Schemas
// ============================================================================

/// Compiled into the binary so validation works without the source tree.
mod embedded_schemas {
    pub const CATALOG: &str = include_str!("../../../../schemas/Catalog.schema.json");
}

// ============================================================================
// Check Result Types
// ============================================================================

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        })
    }
}

/// A single finding from a check.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Check that produced the finding, e.g. "json-schema" or "view".
    pub category: String,
    pub message: String,
    pub file: Option<PathBuf>,
    /// Path inside the file, e.g. "/databases/0/schemas/1".
    pub location: Option<String>,
}

impl CheckFinding {
    fn new(severity: Severity, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            file: None,
            location: None,
        }
    }

    fn error(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, message)
    }

    fn warning(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, message)
    }

    fn info(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, category, message)
    }

    fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Collected results from all checks.
#[derive(Debug, Default)]
pub struct CheckResults {
    pub findings: Vec<CheckFinding>,
}

impl CheckResults {
    fn add(&mut self, finding: CheckFinding) {
        self.findings.push(finding);
    }

    fn extend(&mut self, findings: impl IntoIterator<Item = CheckFinding>) {
        self.findings.extend(findings);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    pub fn print_summary(&self) {
        let mut sorted: Vec<_> = self.findings.iter().collect();
        sorted.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.category.cmp(&b.category))
        });

        let quiet_info = self.error_count() + self.warning_count() > 0;
        for finding in sorted {
            if quiet_info && finding.severity == Severity::Info {
                continue;
            }
            print_finding(finding);
        }

        println!();
        println!("{}", "=".repeat(60));
        if self.error_count() + self.warning_count() == 0 {
            println!("All checks passed.");
        } else {
            println!(
                "Summary: {} error(s), {} warning(s)",
                self.error_count(),
                self.warning_count()
            );
        }
    }
}

fn print_finding(finding: &CheckFinding) {
    let location = match (&finding.file, &finding.location) {
        (Some(f), Some(l)) => format!(" [{}:{}]", f.display(), l),
        (Some(f), None) => format!(" [{}]", f.display()),
        (None, Some(l)) => format!(" [{}]", l),
        (None, None) => String::new(),
    };
    println!(
        "  {:<5} [{}]{}: {}",
        finding.severity, finding.category, location, finding.message
    );
}

// ============================================================================
// Main Check Runner
// ============================================================================

/// Run every check and print the findings. Fails when any error was found.
pub fn run(catalog_path: &Path, dialect: Dialect) -> Result<()> {
    println!("Checking catalog {} ({dialect})...", catalog_path.display());
    let results = collect(catalog_path, dialect);
    results.print_summary();

    if results.has_errors() {
        anyhow::bail!(
            "Catalog check failed with {} error(s)",
            results.error_count()
        );
    }
    Ok(())
}

/// Run every check without printing.
pub fn collect(catalog_path: &Path, dialect: Dialect) -> CheckResults {
    let mut results = CheckResults::default();

    let content = match fs::read_to_string(catalog_path) {
        Ok(c) => c,
        Err(e) => {
            results.add(
                CheckFinding::error("io", format!("Failed to read file: {e}"))
                    .with_file(catalog_path),
            );
            return results;
        }
    };

    let document = match parse_document(catalog_path, &content) {
        Ok(v) => v,
        Err(message) => {
            results.add(CheckFinding::error("parse", message).with_file(catalog_path));
            return results;
        }
    };

    let schema_findings = validate_against_schema(&document, embedded_schemas::CATALOG);
    let schema_failed = !schema_findings.is_empty();
    results.extend(
        schema_findings
            .into_iter()
            .map(|f| f.with_file(catalog_path)),
    );
    if schema_failed {
        return results;
    }

    let explicit_case = document.get("case_sensitivity").is_some();
    let mut catalog: SchemaCatalog = match serde_json::from_value(document) {
        Ok(c) => c,
        Err(e) => {
            results.add(
                CheckFinding::error("parse", format!("Not a catalog: {e}")).with_file(catalog_path),
            );
            return results;
        }
    };

    if !explicit_case {
        catalog.case_sensitivity = dialect.default_case_sensitivity();
    }

    results.extend(check_structure(&catalog));
    results.extend(check_views(&catalog, dialect));

    if catalog.sensitive_column_count() == 0 {
        results.add(CheckFinding::warning(
            "sensitivity",
            "No column is marked sensitive; every analysis will report nothing to mask",
        ));
    }
    results.add(CheckFinding::info(
        "summary",
        format!(
            "{} table(s), {} sensitive column(s)",
            catalog.table_count(),
            catalog.sensitive_column_count()
        ),
    ));
    results
}

fn parse_document(path: &Path, content: &str) -> Result<JsonValue, String> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => {
            serde_json::from_str(content).map_err(|e| format!("Failed to parse JSON: {e}"))
        }
        _ => serde_yaml::from_str(content).map_err(|e| format!("Failed to parse YAML: {e}")),
    }
}

fn validate_against_schema(document: &JsonValue, schema: &str) -> Vec<CheckFinding> {
    let schema: JsonValue = match serde_json::from_str(schema) {
        Ok(s) => s,
        Err(e) => {
            return vec![CheckFinding::error(
                "json-schema",
                format!("Failed to parse embedded schema: {e}"),
            )];
        }
    };
    let compiled = match jsonschema::validator_for(&schema) {
        Ok(c) => c,
        Err(e) => {
            return vec![CheckFinding::error(
                "json-schema",
                format!("Failed to compile JSON schema: {e}"),
            )];
        }
    };

    compiled
        .iter_errors(document)
        .map(|error| {
            let path = error.instance_path().to_string();
            let location = if path.is_empty() {
                "(root)".to_string()
            } else {
                path
            };
            CheckFinding::error("json-schema", error.to_string()).with_location(location)
        })
        .collect()
}

fn check_structure(catalog: &SchemaCatalog) -> Vec<CheckFinding> {
    catalog
        .validate()
        .into_iter()
        .map(|issue| CheckFinding::error("structure", issue.message).with_location(issue.path))
        .collect()
}

/// Parse each view with `dialect` and evaluate it against the catalog.
///
/// A definition that does not parse is an error. One that parses but does
/// not resolve (missing table, unknown column) is a warning, since the view
/// may depend on objects outside the catalog.
fn check_views(catalog: &SchemaCatalog, dialect: Dialect) -> Vec<CheckFinding> {
    let adapter = SqlAdapter::new(dialect);
    let mut findings = Vec::new();

    for db in &catalog.databases {
        for schema in &db.schemas {
            for view in &schema.views {
                let location = qualified(&[&db.name, &schema.name, &view.name]);
                let statement = match adapter.parse(&view.definition) {
                    Ok(s) => s,
                    Err(e) => {
                        findings.push(
                            CheckFinding::error("view", format!("Definition does not parse: {e}"))
                                .with_location(location),
                        );
                        continue;
                    }
                };
                if !matches!(statement, Statement::Query(_) | Statement::CreateView(_)) {
                    findings.push(
                        CheckFinding::error("view", "Definition is not a query")
                            .with_location(location),
                    );
                    continue;
                }

                let evaluated = Extractor::new(catalog, &adapter, dialect)
                    .with_current_database(&db.name)
                    .extract(&statement);
                if let Err(e) = evaluated {
                    findings.push(
                        CheckFinding::warning("view", format!("Definition does not resolve: {e}"))
                            .with_location(location),
                    );
                }
            }
        }
    }
    findings
}

fn qualified(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(".")
}
