//! Runs compiled documents against a SQLite pool.

use std::str::FromStr;

use oxide_query::{Catalog, FunctionRegistry, QueryCompiler, QueryDocument, StagingBackend};
use oxide_query_core::ast::{DropTableStatement, Statement};
use oxide_query_core::dialect::SqliteDialect;
use oxide_query_core::SqlValue;
use serde_json::{Map, Value};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use crate::error::Result;

/// A result row keyed by output column name.
pub type JsonRow = Map<String, Value>;

/// Opens a pool with the `regexp()` function registered.
///
/// In-memory databases get a single connection so every statement sees the
/// same data.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the database cannot be opened.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .with_regexp();
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Compiles query documents and runs them on SQLite.
///
/// Resolver rows are staged during compilation and replayed into temporary
/// tables on the connection that runs the query. The temporary tables are
/// dropped afterwards, whether or not the query succeeded.
#[derive(Debug)]
pub struct SqliteExecutor {
    pool: SqlitePool,
    catalog: Catalog,
    functions: FunctionRegistry,
}

impl SqliteExecutor {
    /// Creates a new executor.
    #[must_use]
    pub const fn new(pool: SqlitePool, catalog: Catalog, functions: FunctionRegistry) -> Self {
        Self {
            pool,
            catalog,
            functions,
        }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the catalog documents are compiled against.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Compiles and runs a document, returning its rows.
    ///
    /// # Errors
    ///
    /// Returns an error if compilation fails or any statement fails.
    pub async fn execute(&self, doc: &QueryDocument) -> Result<Vec<JsonRow>> {
        let dialect = SqliteDialect::new();
        let mut backend = StagingBackend::new();
        let compiled = QueryCompiler::new(&self.catalog, &self.functions).compile(doc, &mut backend)?;
        if let Some(output) = compiled.debug_output(&dialect) {
            info!(compilation_id = compiled.compilation_id, "{output}");
        }

        let temp_relations: Vec<String> = backend
            .temp_relations()
            .into_iter()
            .map(String::from)
            .collect();
        let staged = backend.into_statements();
        let (sql, params) = compiled.to_sql(&dialect);

        let mut conn = self.pool.acquire().await?;
        let result = run(&mut conn, &staged, &sql, params, &compiled.json_columns).await;
        for name in temp_relations {
            let drop = Statement::DropTable(DropTableStatement {
                name,
                if_exists: true,
            });
            let (drop_sql, _) = drop.to_sql(&dialect);
            debug!(sql = %drop_sql, "Dropping temporary relation");
            if let Err(e) = sqlx::query(&drop_sql).execute(&mut *conn).await {
                warn!(error = %e, sql = %drop_sql, "Failed to drop temporary relation");
            }
        }
        result
    }

    /// Parses and runs a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is invalid, fails to compile, or
    /// fails to run.
    pub async fn execute_json(&self, text: &str) -> Result<Vec<JsonRow>> {
        let doc = QueryDocument::from_json(text)?;
        self.execute(&doc).await
    }

    /// Compiles a document without touching the database and renders it.
    ///
    /// Uses the document's `debug` rendering when it asks for one.
    ///
    /// # Errors
    ///
    /// Returns an error if compilation fails.
    pub fn explain(&self, doc: &QueryDocument) -> Result<String> {
        let dialect = SqliteDialect::new();
        let compiled = QueryCompiler::new(&self.catalog, &self.functions).compile_dry_run(doc)?;
        Ok(compiled
            .debug_output(&dialect)
            .unwrap_or_else(|| compiled.to_sql_inline(&dialect)))
    }
}

async fn run(
    conn: &mut PoolConnection<Sqlite>,
    staged: &[Statement],
    sql: &str,
    params: Vec<SqlValue>,
    json_columns: &[String],
) -> Result<Vec<JsonRow>> {
    let dialect = SqliteDialect::new();
    for statement in staged {
        let (staged_sql, staged_params) = statement.to_sql(&dialect);
        debug!(sql = %staged_sql, params = staged_params.len(), "Materializing resolver rows");
        bind_params(sqlx::query(&staged_sql), staged_params)
            .execute(&mut **conn)
            .await?;
    }

    debug!(sql = %sql, "Executing SQL");
    let rows = bind_params(sqlx::query(sql), params)
        .fetch_all(&mut **conn)
        .await?;
    rows.iter()
        .map(|row| row_to_json(row, json_columns))
        .collect()
}

fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    params: Vec<SqlValue>,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Bool(b) => query.bind(b),
            SqlValue::Int(n) => query.bind(n),
            SqlValue::Float(f) => query.bind(f),
            SqlValue::Text(s) => query.bind(s),
            SqlValue::Blob(b) => query.bind(b),
        };
    }
    query
}

/// Decodes a row by storage class. Text in `json_columns` is parsed as a
/// JSON document and kept as a string when it does not parse.
fn row_to_json(row: &SqliteRow, json_columns: &[String]) -> Result<JsonRow> {
    let mut out = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_owned();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(i)?),
                "REAL" => Value::from(row.try_get::<f64, _>(i)?),
                "BLOB" => Value::from(row.try_get::<Vec<u8>, _>(i)?),
                _ => {
                    let text = row.try_get::<String, _>(i)?;
                    if json_columns.iter().any(|c| c == column.name()) {
                        serde_json::from_str(&text).unwrap_or(Value::String(text))
                    } else {
                        Value::String(text)
                    }
                }
            }
        };
        out.insert(column.name().to_owned(), value);
    }
    Ok(out)
}
