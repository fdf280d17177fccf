//! Error types for query compilation.

use oxide_query_core::ParseError;
use thiserror::Error;

use crate::backend::BackendError;

/// Errors raised while compiling a query document.
///
/// Every error is fatal for the `compile` call that produced it and carries
/// the offending key or snippet.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A snippet names something that is neither bound in the context, a
    /// catalog relation, nor a column of the current relation.
    #[error("could not resolve identifier '{name}' in '{snippet}'")]
    UnresolvedIdentifier {
        /// The unresolved name.
        name: String,
        /// The snippet it appeared in.
        snippet: String,
    },

    /// A relation is absent from both the catalog and the derived relations.
    #[error("unknown relation '{relation}' referenced by '{key}'")]
    UnknownRelation {
        /// The relation name.
        relation: String,
        /// The document key that referenced it.
        key: String,
    },

    /// A relation has no column with the given name.
    #[error("relation '{relation}' has no column '{column}'")]
    UnknownColumn {
        /// The relation name.
        relation: String,
        /// The column name.
        column: String,
    },

    /// A filter key lacks the `__operator` suffix.
    #[error("malformed filter key '{key}': expected 'Relation.field__OPERATOR'")]
    MalformedFilterKey {
        /// The filter key.
        key: String,
    },

    /// A filter operator is not in the operator table.
    #[error("unsupported operator '{operator}' in filter key '{key}'")]
    UnsupportedOperator {
        /// The operator text.
        operator: String,
        /// The filter key.
        key: String,
    },

    /// A document field has a value of the wrong shape.
    #[error("'{field}' expects {expected}, found {found}")]
    TypeMismatch {
        /// The document field.
        field: String,
        /// Description of the accepted shape.
        expected: &'static str,
        /// The value that was supplied.
        found: String,
    },

    /// A required resolver parameter was not supplied.
    #[error("resolver '{resolver}' requires parameter '{parameter}'")]
    MissingParameter {
        /// The resolver name.
        resolver: String,
        /// The parameter name.
        parameter: String,
    },

    /// A snippet contains a node shape outside the supported grammar.
    #[error("{shape} expressions are not supported in '{snippet}'")]
    UnsupportedExpressionNode {
        /// The node shape.
        shape: &'static str,
        /// The snippet.
        snippet: String,
    },

    /// A member lookup found nothing on the evaluated receiver.
    #[error("unknown attribute '{attribute}' in '{snippet}'")]
    UnknownAttribute {
        /// The attribute name.
        attribute: String,
        /// The snippet.
        snippet: String,
    },

    /// A call was made with the wrong arguments, or on something that is not
    /// callable.
    #[error("invalid call to '{callee}' in '{snippet}': {reason}")]
    InvalidCall {
        /// The called function or method.
        callee: String,
        /// The snippet.
        snippet: String,
        /// What was wrong with the call.
        reason: String,
    },

    /// A relation, function or type name was used where a value is required.
    #[error("{what} cannot be used as a value in '{snippet}'")]
    NotAValue {
        /// Description of the misused binding.
        what: String,
        /// The snippet.
        snippet: String,
    },

    /// A snippet is not syntactically valid.
    #[error("invalid expression '{snippet}': {source}")]
    Snippet {
        /// The snippet.
        snippet: String,
        /// The parse error.
        #[source]
        source: ParseError,
    },

    /// Documents nest deeper than the configured limit.
    #[error("document too deeply nested (maximum depth {max_depth})")]
    DocumentTooDeep {
        /// The configured limit.
        max_depth: usize,
    },

    /// A document is structurally inconsistent.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// A document could not be deserialized.
    #[error("invalid document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// A resolver rejected its arguments or failed to produce data.
    #[error("resolver '{resolver}' failed: {source}")]
    Resolver {
        /// The resolver name.
        resolver: String,
        /// The resolver error.
        #[source]
        source: ResolverError,
    },

    /// The execution backend failed while materializing a resolver.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Errors raised by resolver implementations.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// An argument has the wrong type or format.
    #[error("parameter '{name}' expects {expected}, found {found}")]
    InvalidParameter {
        /// The parameter name.
        name: String,
        /// The expected type.
        expected: &'static str,
        /// The supplied value.
        found: String,
    },

    /// The row-production hook failed.
    #[error("row production failed: {0}")]
    RowProduction(String),

    /// The query hook failed.
    #[error("query production failed: {0}")]
    Query(String),
}

/// Result type alias for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;
