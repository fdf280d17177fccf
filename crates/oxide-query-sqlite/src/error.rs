//! Error types for query execution.

use oxide_query::CompileError;

/// Errors that can occur while executing a query document.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// The document did not compile.
    #[error("Compilation failed: {0}")]
    Compile(#[from] CompileError),

    /// Database error while materializing, querying or cleaning up.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type alias for execution.
pub type Result<T> = std::result::Result<T, ExecuteError>;
