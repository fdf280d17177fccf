//! Values produced while compiling document values and snippets.

use oxide_query_core::ast::{DataType, Expr, OrderBy};
use oxide_query_core::SqlValue;

use crate::context::RelationRef;
use crate::error::{CompileError, Result};
use crate::functions::{Function, Method};

/// The result of compiling one document value or snippet node.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A constant.
    Literal(SqlValue),
    /// A reference to a relation column.
    ColumnRef(Expr),
    /// Any other backend expression.
    Expression(Expr),
    /// Something that is not a value yet.
    Resolved(Resolved),
}

/// Intermediate results of snippet evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// A relation, waiting for attribute access.
    Relation(RelationRef),
    /// A function, waiting to be called.
    Function(Function),
    /// A method bound to its receiver, waiting to be called.
    Method {
        /// The receiver.
        receiver: Expr,
        /// The method.
        method: Method,
    },
    /// A SQL type, usable as a cast target.
    Type(DataType),
    /// Aggregate arguments with their ordering, spliced into the enclosing
    /// aggregate call.
    AggregateOrder {
        /// Aggregate arguments.
        args: Vec<Expr>,
        /// Ordering inside the aggregate.
        order_by: Vec<OrderBy>,
    },
}

impl Operand {
    /// Returns a short description, used in errors.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::ColumnRef(_) => "column",
            Self::Expression(_) => "expression",
            Self::Resolved(Resolved::Relation(_)) => "relation",
            Self::Resolved(Resolved::Function(_)) => "function",
            Self::Resolved(Resolved::Method { .. }) => "method",
            Self::Resolved(Resolved::Type(_)) => "type",
            Self::Resolved(Resolved::AggregateOrder { .. }) => "aggregate ordering",
        }
    }

    /// Returns the text of a text literal.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Literal(value) => value.as_text(),
            _ => None,
        }
    }

    /// Converts the operand into a backend expression.
    ///
    /// # Errors
    ///
    /// Returns `NotAValue` for relations, uncalled functions and the other
    /// intermediate results.
    pub fn into_expr(self, snippet: &str) -> Result<Expr> {
        match self {
            Self::Literal(value) => Ok(Expr::Literal(value)),
            Self::ColumnRef(expr) | Self::Expression(expr) => Ok(expr),
            Self::Resolved(_) => Err(CompileError::NotAValue {
                what: String::from(self.describe()),
                snippet: String::from(snippet),
            }),
        }
    }
}

impl From<Expr> for Operand {
    fn from(expr: Expr) -> Self {
        match expr {
            Expr::Literal(value) => Self::Literal(value),
            column @ Expr::Column { .. } => Self::ColumnRef(column),
            other => Self::Expression(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_expr() {
        assert_eq!(
            Operand::from(Expr::literal(1_i64)),
            Operand::Literal(SqlValue::Int(1))
        );
        assert!(matches!(
            Operand::from(Expr::qualified_column("t", "c")),
            Operand::ColumnRef(_)
        ));
        assert!(matches!(
            Operand::from(Expr::column("c").desc()),
            Operand::Expression(_)
        ));
    }

    #[test]
    fn test_resolved_is_not_a_value() {
        let operand = Operand::Resolved(Resolved::Type(DataType::Integer));
        match operand.into_expr("INTEGER") {
            Err(CompileError::NotAValue { what, snippet }) => {
                assert_eq!(what, "type");
                assert_eq!(snippet, "INTEGER");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
