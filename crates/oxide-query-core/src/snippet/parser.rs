//! Recursive descent parser for expression snippets.

use super::error::ParseError;
use super::node::{KeywordArg, Node, NodeKind};
use super::{Lexer, Span, Token, TokenKind};
use crate::value::SqlValue;

/// Snippet parser.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Creates a new parser for the given input.
    #[must_use]
    pub fn new(input: &str) -> Self {
        Self {
            tokens: Lexer::new(input).tokenize(),
            pos: 0,
        }
    }

    /// Parses one complete expression. Trailing input is an error.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a single valid expression.
    pub fn parse(&mut self) -> Result<Node, ParseError> {
        let node = self.parse_expression()?;
        if !self.current().is_eof() {
            return Err(ParseError::unexpected(
                "end of input",
                self.current().kind.clone(),
                self.current().span,
            ));
        }
        Ok(node)
    }

    fn current(&self) -> &Token {
        // The token list always ends with Eof and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        core::mem::discriminant(&self.current().kind) == core::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected(
                expected,
                self.current().kind.clone(),
                self.current().span,
            ))
        }
    }

    fn parse_expression(&mut self) -> Result<Node, ParseError> {
        let left = self.parse_additive()?;
        let op = match &self.current().kind {
            kind @ (TokenKind::EqEq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq) => kind.operator_str(),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let right = self.parse_additive()?;
                Ok(binary(left, op, right))
            }
            None => Ok(left),
        }
    }

    fn parse_additive(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_term()?;
        while let Some(op @ ("+" | "-")) = self.current().kind.operator_str() {
            self.advance();
            let right = self.parse_term()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_unary()?;
        while let Some(op @ ("*" | "/" | "%")) = self.current().kind.operator_str() {
            self.advance();
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, ParseError> {
        let op = match self.current().kind {
            TokenKind::Minus => "-",
            TokenKind::Plus => "+",
            _ => return self.parse_postfix(),
        };
        let op_span = self.advance().span;

        // A sign directly on a number is part of the literal.
        let folded = match (op, &self.current().kind) {
            ("-", TokenKind::Integer(i)) => Some(SqlValue::Int(-i)),
            ("-", TokenKind::Float(f)) => Some(SqlValue::Float(-f)),
            ("+", TokenKind::Integer(i)) => Some(SqlValue::Int(*i)),
            ("+", TokenKind::Float(f)) => Some(SqlValue::Float(*f)),
            _ => None,
        };
        if let Some(value) = folded {
            let span = op_span.merge(self.advance().span);
            return Ok(Node::new(NodeKind::Literal(value), span));
        }

        let operand = self.parse_unary()?;
        let span = op_span.merge(operand.span);
        Ok(Node::new(
            NodeKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Node, ParseError> {
        let mut node = self.parse_primary()?;
        loop {
            match self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let token = self.advance();
                    let name = match token.kind {
                        TokenKind::Identifier(name) => name,
                        other => {
                            return Err(ParseError::unexpected("attribute name", other, token.span));
                        }
                    };
                    let span = node.span.merge(token.span);
                    node = Node::new(
                        NodeKind::Attribute {
                            receiver: Box::new(node),
                            name,
                        },
                        span,
                    );
                }
                TokenKind::LeftParen => {
                    self.advance();
                    node = self.parse_call(node)?;
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let close = self.expect(&TokenKind::RightBracket, "']'")?;
                    let span = node.span.merge(close.span);
                    node = Node::new(
                        NodeKind::Subscript {
                            receiver: Box::new(node),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => return Ok(node),
            }
        }
    }

    /// Parses call arguments after the opening parenthesis.
    fn parse_call(&mut self, callee: Node) -> Result<Node, ParseError> {
        let mut args = vec![];
        let mut keywords: Vec<KeywordArg> = vec![];

        while !self.check(&TokenKind::RightParen) {
            let keyword_name = match (&self.current().kind, self.peek_kind(1)) {
                (TokenKind::Identifier(name), TokenKind::Assign) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword_name {
                self.advance();
                self.advance();
                let value = self.parse_expression()?;
                keywords.push(KeywordArg { name, value });
            } else {
                if let Some(last) = keywords.last() {
                    return Err(ParseError::new(
                        "Positional argument follows keyword argument",
                        last.value.span,
                    ));
                }
                args.push(self.parse_expression()?);
            }

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else if !self.check(&TokenKind::RightParen) {
                return Err(ParseError::unexpected(
                    "',' or ')'",
                    self.current().kind.clone(),
                    self.current().span,
                ));
            }
        }

        let close = self.advance();
        let span = callee.span.merge(close.span);
        Ok(Node::new(
            NodeKind::Call {
                callee: Box::new(callee),
                args,
                keywords,
            },
            span,
        ))
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let token = self.advance();
        let span = token.span;
        match token.kind {
            TokenKind::Identifier(name) => {
                let kind = match name.as_str() {
                    "True" | "true" => NodeKind::Literal(SqlValue::Bool(true)),
                    "False" | "false" => NodeKind::Literal(SqlValue::Bool(false)),
                    _ => NodeKind::Name(name),
                };
                Ok(Node::new(kind, span))
            }
            TokenKind::Integer(i) => Ok(Node::new(NodeKind::Literal(SqlValue::Int(i)), span)),
            TokenKind::Float(f) => Ok(Node::new(NodeKind::Literal(SqlValue::Float(f)), span)),
            TokenKind::String(s) => Ok(Node::new(NodeKind::Literal(SqlValue::Text(s)), span)),
            TokenKind::LeftParen => {
                let mut inner = self.parse_expression()?;
                let close = self.expect(&TokenKind::RightParen, "')'")?;
                inner.span = span.merge(close.span);
                Ok(inner)
            }
            TokenKind::LeftBracket => {
                let mut items = vec![];
                while !self.check(&TokenKind::RightBracket) {
                    items.push(self.parse_expression()?);
                    if !self.check(&TokenKind::RightBracket) {
                        self.expect(&TokenKind::Comma, "',' or ']'")?;
                    }
                }
                let close = self.advance();
                Ok(Node::new(NodeKind::List(items), span.merge(close.span)))
            }
            TokenKind::Error(message) => Err(ParseError::new(message, span)),
            other => Err(ParseError::unexpected("expression", other, span)),
        }
    }
}

fn binary(left: Node, op: &'static str, right: Node) -> Node {
    let span: Span = left.span.merge(right.span);
    Node::new(
        NodeKind::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    )
}
