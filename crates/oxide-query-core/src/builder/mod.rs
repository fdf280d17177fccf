//! Type-Safe Query Builder
//!
//! Builds [`crate::ast::Query`] values using the typestate pattern.
//!
//! # Example
//!
//! ```rust
//! use oxide_query_core::builder::{Select, col};
//! use oxide_query_core::dialect::GenericDialect;
//!
//! let (sql, params) = Select::new()
//!     .columns(&["id", "name"])
//!     .from("users")
//!     .where_clause(col("active").eq(1_i64))
//!     .build()
//!     .to_sql(&GenericDialect::new());
//!
//! assert_eq!(sql, "SELECT id, name FROM users WHERE active = ?");
//! assert_eq!(params.len(), 1);
//! ```

mod expr;
mod select;

pub use expr::{col, lit, Column};
pub use select::{HasColumns, HasFrom, NoColumns, NoFrom, Select};
