//! Expression AST types.

use super::statement::{NullOrdering, OrderBy, OrderDirection, Query};
use super::types::DataType;
use crate::value::{SqlValue, ToSqlValue};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Is,
    IsNot,

    // Logical
    And,
    Or,

    // String
    Concat,
    Like,
    NotLike,
    ILike,
    NotILike,
    RegexMatch,
    NotRegexMatch,
}

impl BinaryOp {
    /// Returns the generic SQL spelling of the operator.
    ///
    /// Dialects may override the spelling of the pattern operators, see
    /// [`crate::dialect::Dialect::binary_operator`].
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Concat => "||",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::ILike => "ILIKE",
            Self::NotILike => "NOT ILIKE",
            Self::RegexMatch => "REGEXP",
            Self::NotRegexMatch => "NOT REGEXP",
        }
    }

    /// Returns the precedence of the operator (higher = binds tighter).
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq
            | Self::NotEq
            | Self::Lt
            | Self::LtEq
            | Self::Gt
            | Self::GtEq
            | Self::Is
            | Self::IsNot => 3,
            Self::Like
            | Self::NotLike
            | Self::ILike
            | Self::NotILike
            | Self::RegexMatch
            | Self::NotRegexMatch => 4,
            Self::Add | Self::Sub | Self::Concat => 8,
            Self::Mul | Self::Div | Self::Mod => 9,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
    /// Logical NOT
    Not,
}

impl UnaryOp {
    /// Returns the SQL representation of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "NOT",
        }
    }
}

/// A function call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// The function name.
    pub name: String,
    /// The arguments.
    pub args: Vec<Expr>,
    /// Whether DISTINCT was specified.
    pub distinct: bool,
    /// Ordering inside the aggregate (`array_agg(x ORDER BY y)`).
    pub order_by: Vec<OrderBy>,
    /// Aggregate filter (`FILTER (WHERE ...)`).
    pub filter: Option<Box<Expr>>,
}

impl FunctionCall {
    /// Creates a plain function call.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            args,
            distinct: false,
            order_by: vec![],
            filter: None,
        }
    }
}

/// An SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Literal(SqlValue),

    /// A column reference (optionally qualified with table name or alias).
    Column {
        /// Table name or alias (optional).
        table: Option<String>,
        /// Column name.
        name: String,
    },

    /// A binary expression.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },

    /// A unary expression.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },

    /// A function call.
    Function(FunctionCall),

    /// A window function call (`f(...) OVER (...)`).
    Window {
        /// The windowed call.
        function: Box<Expr>,
        /// PARTITION BY expressions.
        partition_by: Vec<Expr>,
        /// ORDER BY entries.
        order_by: Vec<OrderBy>,
    },

    /// Searched CASE expression.
    Case {
        /// WHEN/THEN clauses.
        when_clauses: Vec<(Expr, Expr)>,
        /// ELSE clause.
        else_clause: Option<Box<Expr>>,
    },

    /// CAST expression.
    Cast {
        /// Expression to cast.
        expr: Box<Expr>,
        /// Target type.
        data_type: DataType,
    },

    /// Element access into a semi-structured value (`expr['key']`).
    Index {
        /// The container expression.
        expr: Box<Expr>,
        /// The key or position.
        key: SqlValue,
    },

    /// A sort key (`expr DESC NULLS LAST`), usable as a value inside
    /// aggregate and window orderings.
    Ordered(Box<OrderBy>),

    /// `DISTINCT expr`, as used inside aggregate arguments.
    Distinct(Box<Expr>),

    /// An expression carrying an output label.
    Labeled {
        /// The labeled expression.
        expr: Box<Expr>,
        /// The label.
        label: String,
    },

    /// EXISTS test over a query.
    Exists {
        /// The tested query.
        query: Box<Query>,
        /// Whether this is NOT EXISTS.
        negated: bool,
    },

    /// A scalar subquery.
    Subquery(Box<Query>),

    /// Parenthesized expression.
    Paren(Box<Expr>),

    /// Wildcard (*).
    Wildcard {
        /// Table qualifier (optional).
        table: Option<String>,
    },
}

impl Expr {
    /// Creates a new column reference.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column {
            table: None,
            name: name.into(),
        }
    }

    /// Creates a new qualified column reference.
    #[must_use]
    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Column {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// Creates a literal from anything convertible to a `SqlValue`.
    #[must_use]
    pub fn literal<T: ToSqlValue>(value: T) -> Self {
        Self::Literal(value.to_sql_value())
    }

    /// Creates a NULL literal.
    #[must_use]
    pub const fn null() -> Self {
        Self::Literal(SqlValue::Null)
    }

    /// Creates a function call expression.
    #[must_use]
    pub fn function(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Function(FunctionCall::new(name, args))
    }

    /// Creates a binary expression.
    #[must_use]
    pub fn binary(self, op: BinaryOp, right: Self) -> Self {
        Self::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    /// Creates an equality expression.
    #[must_use]
    pub fn eq(self, right: Self) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    /// Creates an inequality expression.
    #[must_use]
    pub fn not_eq(self, right: Self) -> Self {
        self.binary(BinaryOp::NotEq, right)
    }

    /// Creates a less-than expression.
    #[must_use]
    pub fn lt(self, right: Self) -> Self {
        self.binary(BinaryOp::Lt, right)
    }

    /// Creates a greater-than expression.
    #[must_use]
    pub fn gt(self, right: Self) -> Self {
        self.binary(BinaryOp::Gt, right)
    }

    /// Creates an AND expression.
    #[must_use]
    pub fn and(self, right: Self) -> Self {
        self.binary(BinaryOp::And, right)
    }

    /// Creates an OR expression.
    #[must_use]
    pub fn or(self, right: Self) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    /// Creates an IS expression.
    #[must_use]
    pub fn is(self, right: Self) -> Self {
        self.binary(BinaryOp::Is, right)
    }

    /// Creates an IS NOT expression.
    #[must_use]
    pub fn is_not(self, right: Self) -> Self {
        self.binary(BinaryOp::IsNot, right)
    }

    /// Creates a NOT expression.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    /// Wraps the expression into an ascending sort key.
    #[must_use]
    pub fn asc(self) -> Self {
        Self::Ordered(Box::new(OrderBy::new(self)))
    }

    /// Wraps the expression into a descending sort key.
    #[must_use]
    pub fn desc(self) -> Self {
        Self::Ordered(Box::new(OrderBy::new(self).direction(OrderDirection::Desc)))
    }

    /// Attaches an output label.
    #[must_use]
    pub fn label(self, label: impl Into<String>) -> Self {
        Self::Labeled {
            expr: Box::new(self.unlabeled()),
            label: label.into(),
        }
    }

    /// Strips an output label, if any.
    #[must_use]
    pub fn unlabeled(self) -> Self {
        match self {
            Self::Labeled { expr, .. } => *expr,
            other => other,
        }
    }

    /// Converts the expression into an ORDER BY entry, keeping an existing
    /// direction and null ordering when the expression is already a sort key.
    #[must_use]
    pub fn into_order_by(self) -> OrderBy {
        match self.unlabeled() {
            Self::Ordered(order) => *order,
            other => OrderBy::new(other),
        }
    }

    /// Sets the null ordering of a sort key, turning a plain expression into
    /// an ascending sort key first.
    #[must_use]
    pub fn nulls(self, nulls: NullOrdering) -> Self {
        let mut order = self.into_order_by();
        order.nulls = Some(nulls);
        Self::Ordered(Box::new(order))
    }

    /// Joins predicates with AND, or returns `None` for an empty list.
    #[must_use]
    pub fn conjunction(predicates: Vec<Self>) -> Option<Self> {
        predicates.into_iter().reduce(Self::and)
    }

    /// Joins predicates with OR, or returns `None` for an empty list.
    #[must_use]
    pub fn disjunction(predicates: Vec<Self>) -> Option<Self> {
        predicates.into_iter().reduce(Self::or)
    }
}
