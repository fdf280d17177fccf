//! oxide-query CLI
//!
//! Compiles JSON query documents and runs them against SQLite.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_query::{Catalog, FunctionRegistry, QueryCompiler, QueryDocument};
use oxide_query_core::dialect::dialect_by_name;
use oxide_query_sqlite::{connect, SqliteExecutor};

/// JSON query documents compiled to SQL.
#[derive(Parser)]
#[command(name = "oxide-query")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Catalog file describing the queryable relations.
    #[arg(short, long, env = "OXIDE_QUERY_CATALOG")]
    catalog: PathBuf,

    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite::memory:")]
    database: String,

    /// Dialect to render SQL for in dry-run mode.
    #[arg(long, default_value = "sqlite")]
    dialect: String,

    /// Print the compiled SQL without executing it.
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Document file (stdin if not specified).
    document: Option<PathBuf>,
}

fn read_document(path: Option<&PathBuf>) -> anyhow::Result<QueryDocument> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(QueryDocument::from_json(&text)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let catalog_text = std::fs::read_to_string(&cli.catalog)
        .with_context(|| format!("Failed to read catalog {}", cli.catalog.display()))?;
    let catalog = Catalog::from_json(&catalog_text)?;
    let functions = FunctionRegistry::standard();

    let doc = read_document(cli.document.as_ref())?;

    if cli.dry_run {
        let dialect = dialect_by_name(&cli.dialect)
            .with_context(|| format!("Unknown dialect: {}", cli.dialect))?;
        let compiled = QueryCompiler::new(&catalog, &functions).compile_dry_run(&doc)?;
        let output = compiled
            .debug_output(dialect.as_ref())
            .unwrap_or_else(|| compiled.to_sql_inline(dialect.as_ref()));
        println!("{output}");
        return Ok(());
    }

    info!(database = %cli.database, "Connecting");
    let pool = connect(&cli.database).await?;
    let executor = SqliteExecutor::new(pool, catalog, functions);
    let rows = executor.execute(&doc).await?;
    println!("{}", serde_json::to_string_pretty(&rows)?);

    Ok(())
}
