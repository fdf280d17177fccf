//! Expression snippets.
//!
//! Column and filter values may carry short call/attribute expressions such
//! as `coalesce(User.account_balance, 0).desc()`. This module turns the text
//! into a [`Node`] tree. Binding names and producing SQL expressions happens
//! in the compiler.
//!
//! ```rust
//! use oxide_query_core::snippet::{parse, NodeKind};
//!
//! let node = parse("count(User.id)").unwrap();
//! assert!(matches!(node.kind, NodeKind::Call { .. }));
//! ```

mod error;
mod lexer;
mod node;
mod parser;
mod span;
mod token;

pub use error::ParseError;
pub use lexer::Lexer;
pub use node::{KeywordArg, Node, NodeKind};
pub use parser::Parser;
pub use span::Span;
pub use token::{Token, TokenKind};

/// Parses a complete snippet.
///
/// # Errors
///
/// Returns a `ParseError` if the text is not exactly one expression.
pub fn parse(input: &str) -> Result<Node, ParseError> {
    Parser::new(input).parse()
}

/// Returns true if a value string should be parsed as a snippet rather than
/// treated as a column reference or plain text.
#[must_use]
pub fn looks_like_snippet(value: &str) -> bool {
    value.contains('(') && value.contains(')')
}
