//! # oxide-query-sqlite
//!
//! Runs JSON query documents against SQLite.
//!
//! [`SqliteExecutor`] compiles a document with [`oxide_query::QueryCompiler`],
//! replays staged resolver rows into temporary tables on a single pooled
//! connection, runs the composed query, and returns each row as a JSON
//! object keyed by output column name.
//!
//! ```rust,no_run
//! use oxide_query::{Catalog, FunctionRegistry};
//! use oxide_query_sqlite::{connect, SqliteExecutor};
//!
//! # async fn run() -> oxide_query_sqlite::Result<()> {
//! let pool = connect("sqlite:app.db").await?;
//! let catalog = Catalog::from_json(r#"{"relations": [
//!     {"name": "User", "table": "user_account",
//!      "columns": [{"name": "id", "type": "INTEGER"}, {"name": "name", "type": "TEXT"}]}
//! ]}"#)?;
//! let executor = SqliteExecutor::new(pool, catalog, FunctionRegistry::standard());
//! let rows = executor
//!     .execute_json(r#"{"select": {"User": {"name": {}}}, "limit": 5}"#)
//!     .await?;
//! println!("{rows:?}");
//! # Ok(())
//! # }
//! ```

mod error;
mod executor;

pub use error::{ExecuteError, Result};
pub use executor::{connect, JsonRow, SqliteExecutor};
