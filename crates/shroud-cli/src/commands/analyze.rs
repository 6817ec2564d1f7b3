//! `shroud analyze` command implementation.

use std::fmt::Write as _;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ValueEnum;
use shroud_core::{
    AmbiguityMode, CatalogSource, Dialect, FileCatalogSource, SensitivityReport, ShroudConfig,
};

/// How the report is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Debug, Default)]
pub struct AnalyzeArgs {
    pub catalog: Option<PathBuf>,
    pub dialect: Option<Dialect>,
    pub database: Option<String>,
    pub file: Option<PathBuf>,
    pub sql: Option<String>,
    pub format: OutputFormat,
    pub strict: bool,
}

pub fn run(config: ShroudConfig, args: AnalyzeArgs) -> Result<()> {
    let format = args.format;
    let sql = read_statement(&args)?;
    let report = analyze(config, args, &sql)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print!("{}", render_table(&report)),
    }
    Ok(())
}

fn read_statement(args: &AnalyzeArgs) -> Result<String> {
    if let Some(sql) = &args.sql {
        return Ok(sql.clone());
    }
    if let Some(file) = &args.file {
        return fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()));
    }
    let mut sql = String::new();
    std::io::stdin()
        .read_to_string(&mut sql)
        .context("Failed to read the statement from stdin")?;
    Ok(sql)
}

/// Apply the flags over `config`, load the catalog and analyze `sql`.
pub fn analyze(mut config: ShroudConfig, args: AnalyzeArgs, sql: &str) -> Result<SensitivityReport> {
    if let Some(dialect) = args.dialect {
        config.dialect = dialect;
    }
    if let Some(database) = args.database {
        config.current_database = database;
    }
    if args.strict {
        config.analysis.ambiguity = AmbiguityMode::Strict;
    }
    let catalog_file = super::catalog_path(&config, args.catalog)?;

    let catalog = FileCatalogSource::new(&catalog_file)
        .load_catalog(&config.current_database, config.effective_case_sensitivity())
        .with_context(|| format!("Failed to load catalog from {}", catalog_file.display()))?;

    tracing::info!(
        dialect = %config.dialect,
        database = %config.current_database,
        tables = catalog.table_count(),
        "analyzing statement"
    );

    let fields = shroud_sql::analyze(
        sql,
        &catalog,
        config.dialect,
        &config.current_database,
        config.analysis.clone(),
    )
    .map_err(|err| {
        let span = err.span();
        if span.is_empty() {
            anyhow::anyhow!("Analysis failed: {err}")
        } else {
            anyhow::anyhow!("Analysis failed at {span}: {err}")
        }
    })?;

    let report = SensitivityReport::new(config.dialect, config.current_database, sql.trim(), fields);
    tracing::debug!(
        fields = report.fields.len(),
        sensitive = report.sensitive_count,
        "analysis finished"
    );
    Ok(report)
}

/// Plain-text table of the report's fields.
pub fn render_table(report: &SensitivityReport) -> String {
    let width = report
        .fields
        .iter()
        .map(|f| f.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("COLUMN".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:>3}  {:<width$}  SENSITIVE", "#", "COLUMN");
    for (i, field) in report.fields.iter().enumerate() {
        let flag = if field.sensitive { "yes" } else { "no" };
        let _ = writeln!(out, "{i:>3}  {:<width$}  {flag}", field.name);
    }
    let _ = writeln!(
        out,
        "\n{} of {} column(s) sensitive",
        report.sensitive_count,
        report.fields.len()
    );
    out
}
