//! Snippet syntax tree.

use super::Span;
use crate::value::SqlValue;

/// A parsed snippet node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// What the node is.
    pub kind: NodeKind,
    /// Where it came from.
    pub span: Span,
}

/// A named argument (`order_by=...`).
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordArg {
    /// Argument name.
    pub name: String,
    /// Argument value.
    pub value: Node,
}

/// Node kinds.
///
/// Only [`Literal`](NodeKind::Literal), [`Name`](NodeKind::Name),
/// [`Call`](NodeKind::Call) and [`Attribute`](NodeKind::Attribute) can be
/// evaluated. The remaining shapes are parsed so that evaluation can report
/// them precisely instead of failing with a syntax error.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A constant: number, string or boolean.
    Literal(SqlValue),
    /// A bare identifier.
    Name(String),
    /// A call with positional and keyword arguments.
    Call {
        /// The called expression.
        callee: Box<Node>,
        /// Positional arguments.
        args: Vec<Node>,
        /// Keyword arguments.
        keywords: Vec<KeywordArg>,
    },
    /// Member access (`receiver.name`).
    Attribute {
        /// The accessed value.
        receiver: Box<Node>,
        /// The member name.
        name: String,
    },
    /// Subscript (`receiver[index]`).
    Subscript {
        /// The subscripted value.
        receiver: Box<Node>,
        /// The index expression.
        index: Box<Node>,
    },
    /// Infix operator expression.
    BinaryOp {
        /// Left operand.
        left: Box<Node>,
        /// Operator text.
        op: &'static str,
        /// Right operand.
        right: Box<Node>,
    },
    /// Prefix operator expression.
    UnaryOp {
        /// Operator text.
        op: &'static str,
        /// Operand.
        operand: Box<Node>,
    },
    /// List display (`[a, b]`).
    List(Vec<Node>),
}

impl Node {
    /// Creates a node.
    #[must_use]
    pub const fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns a short description of the node shape, used in errors.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match &self.kind {
            NodeKind::Literal(_) => "literal",
            NodeKind::Name(_) => "name",
            NodeKind::Call { .. } => "call",
            NodeKind::Attribute { .. } => "attribute",
            NodeKind::Subscript { .. } => "subscript",
            NodeKind::BinaryOp { .. } => "binary operator",
            NodeKind::UnaryOp { .. } => "unary operator",
            NodeKind::List(_) => "list",
        }
    }
}
