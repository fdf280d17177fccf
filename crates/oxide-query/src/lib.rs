//! # oxide-query
//!
//! Compiles JSON query documents into composed SQL plans.
//!
//! This crate provides:
//! - A typed [`QueryDocument`] model deserialized with serde
//! - An explicit [`Catalog`] of relations and resolvers
//! - A [`FunctionRegistry`] of names callable from expression snippets
//! - The predicate compiler for `where`/`having`/join filters
//! - The plan builder ([`QueryCompiler`]) that composes subqueries, unions,
//!   CTEs, joins, grouping, ordering and pagination into one [`Query`]
//! - The [`Resolver`] protocol for procedural relations
//!
//! ## Quick Start
//!
//! ```rust
//! use oxide_query::{Catalog, FunctionRegistry, QueryCompiler, RelationSchema};
//! use oxide_query_core::ast::DataType;
//! use oxide_query_core::dialect::GenericDialect;
//!
//! let catalog = Catalog::new().relation(
//!     RelationSchema::new("User", "user_account")
//!         .column("id", DataType::Integer)
//!         .column("name", DataType::Text),
//! );
//! let functions = FunctionRegistry::standard();
//!
//! let compiled = QueryCompiler::new(&catalog, &functions)
//!     .compile_json(
//!         r#"{
//!             "select": {"User": {"id": {}, "name": {}}},
//!             "where": {"User.name__LIKE": "J%"},
//!             "limit": 10
//!         }"#,
//!     )
//!     .unwrap();
//!
//! let (sql, params) = compiled.to_sql(&GenericDialect::new());
//! assert_eq!(
//!     sql,
//!     "SELECT user_account.id, user_account.name FROM user_account \
//!      WHERE user_account.name LIKE ? LIMIT 10"
//! );
//! assert_eq!(params.len(), 1);
//! ```
//!
//! ## Filter keys
//!
//! Filter documents map `Relation.field__OPERATOR` keys to values. The
//! reserved keys `and` and `or` nest documents:
//!
//! ```json
//! {
//!     "User.name__NE": null,
//!     "or": [{"User.id__LT": 10}, {"User.id__GT": 100}]
//! }
//! ```

pub mod backend;
pub mod catalog;
mod column;
pub mod context;
pub mod document;
mod error;
mod eval;
pub mod filter;
pub mod functions;
mod operand;
pub mod plan;
pub mod resolver;

pub use backend::{BackendError, ExecutionBackend, NoOpBackend, StagingBackend};
pub use catalog::{Catalog, RelationSchema};
pub use context::{CompilationContext, CompileOptions, RelationKind, RelationRef};
pub use document::{DebugMode, FilterDocument, QueryDocument};
pub use error::{CompileError, ResolverError, Result};
pub use eval::evaluate_snippet;
pub use functions::FunctionRegistry;
pub use operand::{Operand, Resolved};
pub use plan::{CompiledQuery, QueryCompiler};
pub use resolver::{
    ParamType, Resolver, ResolverArgs, ResolverParameter, ResolverState, TempRelation,
};

// Re-export the plan types callers need to render results.
pub use oxide_query_core::ast::Query;
pub use oxide_query_core::{SqlValue, ToSqlValue};
