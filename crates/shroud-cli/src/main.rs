use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shroud_core::Dialect;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::analyze::{AnalyzeArgs, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "shroud", version, about = "Column sensitivity lineage for SQL")]
struct Cli {
    /// Path to shroud.yaml. Defaults to ./shroud.yaml when present.
    #[arg(long, global = true, env = "SHROUD_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report which output columns of a statement carry sensitive data.
    Analyze {
        /// Catalog file (JSON or YAML). Overrides `catalog_file`.
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Dialect of the statement. Overrides `dialect`.
        #[arg(long, env = "SHROUD_DIALECT")]
        dialect: Option<Dialect>,

        /// Database for unqualified table names. Overrides `current_database`.
        #[arg(long, env = "SHROUD_DATABASE")]
        database: Option<String>,

        /// Read the statement from a file.
        #[arg(long, short, conflicts_with = "sql")]
        file: Option<PathBuf>,

        /// Statement text. Read from stdin when neither this nor --file is given.
        sql: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Reject ambiguous column references instead of taking the first match.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Validate a catalog file and parse every view definition.
    Check {
        #[arg(long)]
        catalog: Option<PathBuf>,

        #[arg(long, env = "SHROUD_DIALECT")]
        dialect: Option<Dialect>,
    },

    /// Print the databases, schemas, tables and views of a catalog.
    Inspect {
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Only list tables with sensitive columns, and only those columns.
        #[arg(long, default_value_t = false)]
        sensitive_only: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Analyze {
            catalog,
            dialect,
            database,
            file,
            sql,
            format,
            strict,
        } => commands::analyze::run(
            config,
            AnalyzeArgs {
                catalog,
                dialect,
                database,
                file,
                sql,
                format,
                strict,
            },
        )?,

        Command::Check { catalog, dialect } => {
            let path = commands::catalog_path(&config, catalog)?;
            commands::check::run(&path, dialect.unwrap_or(config.dialect))?
        }

        Command::Inspect {
            catalog,
            sensitive_only,
        } => {
            let path = commands::catalog_path(&config, catalog)?;
            commands::inspect::run(&path, &config, sensitive_only)?
        }
    }

    Ok(())
}
