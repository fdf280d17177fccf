//! Column and literal helpers for building predicates.

use crate::ast::{BinaryOp, Expr};
use crate::value::ToSqlValue;

/// Creates a column reference.
#[must_use]
pub fn col(name: &str) -> Column {
    Column {
        table: None,
        name: String::from(name),
    }
}

/// Creates a literal expression.
#[must_use]
pub fn lit<T: ToSqlValue>(value: T) -> Expr {
    Expr::literal(value)
}

/// A column reference.
#[derive(Debug, Clone)]
pub struct Column {
    /// Optional table qualifier.
    pub table: Option<String>,
    /// Column name.
    pub name: String,
}

impl Column {
    /// Creates a qualified column reference.
    #[must_use]
    pub fn qualified(table: &str, name: &str) -> Self {
        Self {
            table: Some(String::from(table)),
            name: String::from(name),
        }
    }

    fn compare<T: ToSqlValue>(self, op: BinaryOp, value: T) -> Expr {
        Expr::from(self).binary(op, Expr::literal(value))
    }

    /// Creates an equality expression.
    #[must_use]
    pub fn eq<T: ToSqlValue>(self, value: T) -> Expr {
        self.compare(BinaryOp::Eq, value)
    }

    /// Creates an inequality expression.
    #[must_use]
    pub fn not_eq<T: ToSqlValue>(self, value: T) -> Expr {
        self.compare(BinaryOp::NotEq, value)
    }

    /// Creates a less-than expression.
    #[must_use]
    pub fn lt<T: ToSqlValue>(self, value: T) -> Expr {
        self.compare(BinaryOp::Lt, value)
    }

    /// Creates a less-than-or-equal expression.
    #[must_use]
    pub fn lt_eq<T: ToSqlValue>(self, value: T) -> Expr {
        self.compare(BinaryOp::LtEq, value)
    }

    /// Creates a greater-than expression.
    #[must_use]
    pub fn gt<T: ToSqlValue>(self, value: T) -> Expr {
        self.compare(BinaryOp::Gt, value)
    }

    /// Creates a greater-than-or-equal expression.
    #[must_use]
    pub fn gt_eq<T: ToSqlValue>(self, value: T) -> Expr {
        self.compare(BinaryOp::GtEq, value)
    }

    /// Creates a LIKE expression.
    #[must_use]
    pub fn like<T: ToSqlValue>(self, pattern: T) -> Expr {
        self.compare(BinaryOp::Like, pattern)
    }

    /// Creates an IS NULL expression.
    #[must_use]
    pub fn is_null(self) -> Expr {
        Expr::from(self).is(Expr::null())
    }

    /// Creates an IS NOT NULL expression.
    #[must_use]
    pub fn is_not_null(self) -> Expr {
        Expr::from(self).is_not(Expr::null())
    }

    /// Turns the column into an ascending sort key.
    #[must_use]
    pub fn asc(self) -> Expr {
        Expr::from(self).asc()
    }

    /// Turns the column into a descending sort key.
    #[must_use]
    pub fn desc(self) -> Expr {
        Expr::from(self).desc()
    }
}

impl From<Column> for Expr {
    fn from(column: Column) -> Self {
        Self::Column {
            table: column.table,
            name: column.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_comparisons() {
        assert_eq!(col("age").gt(18_i64).to_string(), "age > 18");
        assert_eq!(
            Column::qualified("t", "name").like("a%").to_string(),
            "t.name LIKE 'a%'"
        );
        assert_eq!(col("deleted").is_null().to_string(), "deleted IS NULL");
    }

    #[test]
    fn test_lit() {
        assert_eq!(lit("it's").to_string(), "'it''s'");
    }
}
