//! SQL Dialect support.
//!
//! Different databases spell placeholders, pattern operators and a few
//! keywords differently. Rendering asks the dialect for each of these.

mod generic;
mod postgres;
mod sqlite;

pub use generic::GenericDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::ast::{BinaryOp, DataType};

/// Words that are always quoted when used as identifiers.
const RESERVED_WORDS: &[&str] = &[
    "all", "and", "as", "asc", "by", "case", "cast", "check", "create", "default", "desc",
    "distinct", "else", "end", "exists", "false", "from", "group", "having", "in", "index",
    "insert", "into", "is", "join", "key", "like", "limit", "not", "null", "offset", "on", "or",
    "order", "primary", "recursive", "select", "table", "then", "true", "union", "user",
    "values", "when", "where", "with",
];

/// Trait for SQL dialect-specific behavior.
pub trait Dialect {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Returns the placeholder for the parameter at `index` (1-based).
    fn placeholder(&self, _index: usize) -> String {
        String::from("?")
    }

    /// Returns the spelling of a binary operator.
    fn binary_operator(&self, op: BinaryOp) -> &'static str {
        op.as_str()
    }

    /// Returns the keyword used for temporary tables.
    fn temporary_keyword(&self) -> &'static str {
        "TEMPORARY"
    }

    /// Returns the infix operator used for element access into JSON values,
    /// or `None` to render subscript brackets.
    fn element_access_operator(&self) -> Option<&'static str> {
        None
    }

    /// Returns the LIMIT value to emit when only an OFFSET is present, for
    /// dialects that cannot express OFFSET on its own.
    fn limit_for_bare_offset(&self) -> Option<&'static str> {
        None
    }

    /// Returns true if `SELECT DISTINCT ON (...)` is understood. Dialects
    /// without it fall back to plain `DISTINCT`.
    fn supports_distinct_on(&self) -> bool {
        true
    }

    /// Returns true if a set-operation operand may be wrapped in bare
    /// parentheses. Dialects without it get a `SELECT * FROM (...)`
    /// subselect instead.
    fn parenthesized_set_operands(&self) -> bool {
        true
    }

    /// Maps a data type to the dialect's spelling.
    fn map_data_type(&self, data_type: &DataType) -> String {
        data_type.to_sql()
    }

    /// Quotes an identifier if necessary.
    ///
    /// Plain lower-case identifiers that are not reserved words are emitted
    /// bare. Everything else is quoted, doubling embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        if is_plain_identifier(name) {
            return String::from(name);
        }
        let quote = self.identifier_quote();
        let escaped = name.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }
}

/// Returns true if `name` can be emitted without quoting.
#[must_use]
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED_WORDS.contains(&name)
}

/// Looks up a dialect by name (`generic`, `postgres`/`postgresql`, `sqlite`).
#[must_use]
pub fn dialect_by_name(name: &str) -> Option<Box<dyn Dialect + Send + Sync>> {
    match name.to_ascii_lowercase().as_str() {
        "generic" => Some(Box::new(GenericDialect::new())),
        "postgres" | "postgresql" => Some(Box::new(PostgresDialect::new())),
        "sqlite" => Some(Box::new(SqliteDialect::new())),
        _ => None,
    }
}
