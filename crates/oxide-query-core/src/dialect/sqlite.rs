//! SQLite dialect.

use super::Dialect;
use crate::ast::{BinaryOp, DataType};

/// SQLite dialect.
///
/// SQLite's `LIKE` is already case-insensitive for ASCII, so `ILIKE` is
/// spelled `LIKE`. `REGEXP` needs a registered `regexp()` function.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn binary_operator(&self, op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::ILike => "LIKE",
            BinaryOp::NotILike => "NOT LIKE",
            other => other.as_str(),
        }
    }

    fn element_access_operator(&self) -> Option<&'static str> {
        Some("->")
    }

    fn limit_for_bare_offset(&self) -> Option<&'static str> {
        Some("-1")
    }

    fn supports_distinct_on(&self) -> bool {
        false
    }

    fn parenthesized_set_operands(&self) -> bool {
        false
    }

    fn map_data_type(&self, data_type: &DataType) -> String {
        // SQLite has dynamic typing with type affinity
        match data_type {
            DataType::Smallint | DataType::Integer | DataType::Bigint | DataType::Boolean => {
                String::from("INTEGER")
            }
            DataType::Real | DataType::Double | DataType::Numeric { .. } => String::from("REAL"),
            DataType::Varchar(_)
            | DataType::Text
            | DataType::Date
            | DataType::Time
            | DataType::Timestamp
            | DataType::Interval
            | DataType::Json => String::from("TEXT"),
            DataType::Blob => String::from("BLOB"),
            DataType::Custom(name) => name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_dialect() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.placeholder(7), "?");
        assert_eq!(dialect.binary_operator(BinaryOp::NotILike), "NOT LIKE");
        assert_eq!(dialect.binary_operator(BinaryOp::RegexMatch), "REGEXP");
        assert_eq!(dialect.limit_for_bare_offset(), Some("-1"));
        assert_eq!(dialect.map_data_type(&DataType::Timestamp), "TEXT");
        assert!(!dialect.supports_distinct_on());
        assert!(!dialect.parenthesized_set_operands());
    }
}
