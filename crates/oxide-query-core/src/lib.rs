//! # oxide-query-core
//!
//! Building blocks for compiling JSON query documents into SQL.
//!
//! This crate provides:
//! - A plan AST (`Query`, `SelectStatement`, `Expr`, CTEs, set operations)
//!   plus the DDL/DML used to materialize temporary relations
//! - Parameterized SQL rendering for generic, PostgreSQL and SQLite dialects
//! - A typestate `Select` builder
//! - A lexer and parser for the expression snippets embedded in documents
//!
//! ## Rendering
//!
//! Literals are always bound as parameters:
//!
//! ```rust
//! use oxide_query_core::builder::{Select, col};
//! use oxide_query_core::dialect::PostgresDialect;
//! use oxide_query_core::SqlValue;
//!
//! let user_input = "'; DROP TABLE users; --";
//! let (sql, params) = Select::new()
//!     .columns(&["id"])
//!     .from("users")
//!     .where_clause(col("name").eq(user_input))
//!     .build()
//!     .to_sql(&PostgresDialect::new());
//!
//! assert_eq!(sql, "SELECT id FROM users WHERE name = $1");
//! assert_eq!(params, vec![SqlValue::Text(String::from(user_input))]);
//! ```

pub mod ast;
pub mod builder;
pub mod dialect;
pub mod render;
pub mod snippet;
pub mod value;

pub use ast::{Expr, Query, Statement};
pub use builder::{col, lit, Select};
pub use dialect::Dialect;
pub use snippet::{parse as parse_snippet, ParseError};
pub use value::{SqlValue, ToSqlValue};
