//! Execution backend boundary.
//!
//! The compiler never talks to a database directly. Resolvers materialize
//! their temporary relations through an [`ExecutionBackend`], which is either
//! a dry-run [`NoOpBackend`] or a live backend. [`StagingBackend`] is a live
//! backend that records the statements so an asynchronous executor can replay
//! them on the connection that later runs the compiled plan.

use oxide_query_core::ast::{CreateTableStatement, InsertStatement, Statement};
use thiserror::Error;
use tracing::debug;

/// Errors reported by an execution backend.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendError {
    /// Description of the failure.
    pub message: String,
}

impl BackendError {
    /// Creates a backend error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Receives the side effects of compilation.
pub trait ExecutionBackend {
    /// Returns true if statements reach a real session. Resolvers skip data
    /// materialization when this is false.
    fn is_live(&self) -> bool;

    /// Creates a temporary relation.
    ///
    /// # Errors
    ///
    /// Returns a `BackendError` if the relation cannot be created.
    fn create_temp_relation(
        &mut self,
        statement: &CreateTableStatement,
    ) -> Result<(), BackendError>;

    /// Inserts rows into a relation.
    ///
    /// # Errors
    ///
    /// Returns a `BackendError` if the rows cannot be inserted.
    fn insert_rows(&mut self, statement: &InsertStatement) -> Result<(), BackendError>;
}

/// Dry-run backend: nothing is materialized.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpBackend;

impl NoOpBackend {
    /// Creates a no-op backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ExecutionBackend for NoOpBackend {
    fn is_live(&self) -> bool {
        false
    }

    fn create_temp_relation(
        &mut self,
        _statement: &CreateTableStatement,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn insert_rows(&mut self, _statement: &InsertStatement) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Live backend that records materialization statements in order.
#[derive(Debug, Default, Clone)]
pub struct StagingBackend {
    statements: Vec<Statement>,
}

impl StagingBackend {
    /// Creates an empty staging backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the staged statements in execution order.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Consumes the backend, returning the staged statements.
    #[must_use]
    pub fn into_statements(self) -> Vec<Statement> {
        self.statements
    }

    /// Returns the names of the temporary relations created so far.
    #[must_use]
    pub fn temp_relations(&self) -> Vec<&str> {
        self.statements
            .iter()
            .filter_map(|s| match s {
                Statement::CreateTable(create) => Some(create.name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns true if nothing has been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl ExecutionBackend for StagingBackend {
    fn is_live(&self) -> bool {
        true
    }

    fn create_temp_relation(
        &mut self,
        statement: &CreateTableStatement,
    ) -> Result<(), BackendError> {
        debug!(relation = %statement.name, "Staging temporary relation");
        self.statements.push(Statement::CreateTable(statement.clone()));
        Ok(())
    }

    fn insert_rows(&mut self, statement: &InsertStatement) -> Result<(), BackendError> {
        debug!(
            relation = %statement.table,
            rows = statement.rows.len(),
            "Staging rows"
        );
        self.statements.push(Statement::Insert(statement.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use oxide_query_core::ast::{ColumnDef, DataType, Expr};

    use super::*;

    fn create(name: &str) -> CreateTableStatement {
        CreateTableStatement {
            name: String::from(name),
            temporary: true,
            if_not_exists: false,
            columns: vec![ColumnDef::new("pk_id", DataType::Integer).primary_key()],
        }
    }

    #[test]
    fn test_noop_backend_is_not_live() {
        let mut backend = NoOpBackend::new();
        assert!(!backend.is_live());
        assert!(backend.create_temp_relation(&create("t")).is_ok());
    }

    #[test]
    fn test_staging_backend_records_in_order() {
        let mut backend = StagingBackend::new();
        assert!(backend.is_live());
        assert!(backend.is_empty());

        backend.create_temp_relation(&create("temp__a__1")).unwrap();
        backend
            .insert_rows(&InsertStatement {
                table: String::from("temp__a__1"),
                columns: vec![String::from("x")],
                rows: vec![vec![Expr::literal(1_i64)]],
            })
            .unwrap();

        assert_eq!(backend.temp_relations(), vec!["temp__a__1"]);
        let statements = backend.into_statements();
        assert!(matches!(statements[0], Statement::CreateTable(_)));
        assert!(matches!(statements[1], Statement::Insert(_)));
    }
}
