//! Token types for the snippet lexer.

use super::Span;

/// Token kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// An identifier (`coalesce`, `User`, `__add__`).
    Identifier(String),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// String literal, quotes removed.
    String(String),

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    /// `=`, separating keyword arguments from their values.
    Assign,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    /// A lexical error.
    Error(String),
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Returns the operator text for operator tokens.
    #[must_use]
    pub const fn operator_str(&self) -> Option<&'static str> {
        match self {
            Self::Plus => Some("+"),
            Self::Minus => Some("-"),
            Self::Star => Some("*"),
            Self::Slash => Some("/"),
            Self::Percent => Some("%"),
            Self::EqEq => Some("=="),
            Self::NotEq => Some("!="),
            Self::Lt => Some("<"),
            Self::LtEq => Some("<="),
            Self::Gt => Some(">"),
            Self::GtEq => Some(">="),
            _ => None,
        }
    }
}

/// A token with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// The source span.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true if this is the end-of-input token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}
