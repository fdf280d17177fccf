#![allow(dead_code)]

use oxide_query_core::dialect::{GenericDialect, PostgresDialect, SqliteDialect};
use oxide_query_core::snippet::{Node, Parser};
use oxide_query_core::{ParseError, Query, SqlValue};

pub fn parse(snippet: &str) -> Node {
    Parser::new(snippet)
        .parse()
        .unwrap_or_else(|e| panic!("Failed to parse: {snippet}\nError: {e:?}"))
}

pub fn parse_err(snippet: &str) -> ParseError {
    Parser::new(snippet)
        .parse()
        .expect_err(&format!("Expected parse error for: {snippet}"))
}

pub fn generic(query: &Query) -> (String, Vec<SqlValue>) {
    query.to_sql(&GenericDialect::new())
}

pub fn postgres(query: &Query) -> (String, Vec<SqlValue>) {
    query.to_sql(&PostgresDialect::new())
}

pub fn sqlite(query: &Query) -> (String, Vec<SqlValue>) {
    query.to_sql(&SqliteDialect::new())
}

/// Asserts that the number of placeholders matches the parameter count for
/// every dialect.
pub fn assert_placeholders_match(query: &Query) {
    let (sql, params) = generic(query);
    assert_eq!(
        sql.matches('?').count(),
        params.len(),
        "Placeholder mismatch in: {sql}"
    );
    let (sql, params) = postgres(query);
    for index in 1..=params.len() {
        assert!(sql.contains(&format!("${index}")), "Missing ${index} in: {sql}");
    }
}
