//! PostgreSQL dialect.

use super::Dialect;
use crate::ast::{BinaryOp, DataType};

/// PostgreSQL dialect: numbered placeholders, `~` regex operators and
/// `->` JSON access.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn binary_operator(&self, op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::RegexMatch => "~",
            BinaryOp::NotRegexMatch => "!~",
            other => other.as_str(),
        }
    }

    fn element_access_operator(&self) -> Option<&'static str> {
        Some("->")
    }

    fn map_data_type(&self, data_type: &DataType) -> String {
        match data_type {
            DataType::Blob => String::from("BYTEA"),
            DataType::Json => String::from("JSONB"),
            other => other.to_sql(),
        }
    }
}
