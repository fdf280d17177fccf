//! Predicate compilation for `where`, `having`, join and `whens` documents.

use oxide_query_core::ast::{BinaryOp, Expr};
use oxide_query_core::SqlValue;
use tracing::debug;

use crate::column::compile_value;
use crate::context::{CompilationContext, RelationRef};
use crate::document::{FilterClause, FilterDocument, ValueSpec};
use crate::error::{CompileError, Result};

/// Operators of the `Relation.field__OPERATOR` key grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// `=`, or `IS` against booleans and NULL.
    Eq,
    /// `!=`, or `IS NOT` against booleans and NULL.
    Ne,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `NOT ILIKE`
    NotILike,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// Regular expression match.
    Re,
    /// Negated regular expression match.
    NotRe,
    /// `EXISTS (relation)`
    Exists,
    /// `NOT EXISTS (relation)`
    NotExists,
}

impl FilterOperator {
    /// Parses an operator name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name.to_ascii_uppercase().as_str() {
            "EQ" => Self::Eq,
            "NE" => Self::Ne,
            "LIKE" => Self::Like,
            "NOT_LIKE" => Self::NotLike,
            "NOT_ILIKE" => Self::NotILike,
            "LT" => Self::Lt,
            "LTE" => Self::Lte,
            "GT" => Self::Gt,
            "GTE" => Self::Gte,
            "RE" => Self::Re,
            "NOT_RE" => Self::NotRe,
            "EXISTS" => Self::Exists,
            "NOT_EXISTS" => Self::NotExists,
            _ => return None,
        };
        Some(op)
    }

    /// Returns true for the existence tests, which target a relation rather
    /// than a field.
    #[must_use]
    pub const fn is_existence(&self) -> bool {
        matches!(self, Self::Exists | Self::NotExists)
    }

    /// Builds the comparison of `column` with `value`, or `None` for the
    /// existence tests.
    ///
    /// Equality against a boolean or NULL compiles to an identity test.
    #[must_use]
    pub fn apply(self, column: Expr, value: Expr) -> Option<Expr> {
        let identity = matches!(value, Expr::Literal(SqlValue::Bool(_) | SqlValue::Null));
        let op = match self {
            Self::Eq if identity => BinaryOp::Is,
            Self::Ne if identity => BinaryOp::IsNot,
            Self::Eq => BinaryOp::Eq,
            Self::Ne => BinaryOp::NotEq,
            Self::Like => BinaryOp::Like,
            Self::NotLike => BinaryOp::NotLike,
            Self::NotILike => BinaryOp::NotILike,
            Self::Lt => BinaryOp::Lt,
            Self::Lte => BinaryOp::LtEq,
            Self::Gt => BinaryOp::Gt,
            Self::Gte => BinaryOp::GtEq,
            Self::Re => BinaryOp::RegexMatch,
            Self::NotRe => BinaryOp::NotRegexMatch,
            Self::Exists | Self::NotExists => return None,
        };
        Some(column.binary(op, value))
    }
}

/// A parsed filter key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterKey<'k> {
    /// The relation name.
    pub relation: &'k str,
    /// The field name; `None` for `name__exists` keys.
    pub field: Option<&'k str>,
    /// The operator.
    pub operator: FilterOperator,
}

impl<'k> FilterKey<'k> {
    /// Parses `Relation.field__OPERATOR` or `name__exists`/`name__not_exists`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedFilterKey` when the shape is wrong and
    /// `UnsupportedOperator` when the operator is not in the table.
    pub fn parse(key: &'k str) -> Result<Self> {
        let malformed = || CompileError::MalformedFilterKey {
            key: String::from(key),
        };
        let (relation, field, operator) = match key.split_once('.') {
            Some((relation, rest)) => {
                let (field, operator) = rest.split_once("__").ok_or_else(malformed)?;
                (relation, Some(field), operator)
            }
            None => {
                let (relation, operator) = key.split_once("__").ok_or_else(malformed)?;
                (relation, None, operator)
            }
        };
        if relation.is_empty() || field.is_some_and(str::is_empty) {
            return Err(malformed());
        }
        let operator =
            FilterOperator::from_name(operator).ok_or_else(|| CompileError::UnsupportedOperator {
                operator: String::from(operator),
                key: String::from(key),
            })?;
        if field.is_none() && !operator.is_existence() {
            return Err(malformed());
        }
        Ok(Self {
            relation,
            field,
            operator,
        })
    }
}

/// Compiles a filter document into predicates the caller ANDs together.
/// An empty document yields no predicates.
///
/// # Errors
///
/// Returns `MalformedFilterKey`, `UnsupportedOperator`, `UnknownRelation`,
/// `UnknownColumn`, or the errors of value compilation.
pub fn compile_filter(
    filter: &FilterDocument,
    ctx: &mut CompilationContext<'_>,
    current: Option<&RelationRef>,
) -> Result<Vec<Expr>> {
    let mut predicates = Vec::with_capacity(filter.clauses().len());
    for clause in filter.clauses() {
        match clause {
            FilterClause::And(nested) => {
                if let Some(predicate) = Expr::conjunction(compile_filter(nested, ctx, current)?) {
                    predicates.push(predicate);
                }
            }
            FilterClause::Or(members) => {
                let mut alternatives = Vec::with_capacity(members.len());
                for member in members {
                    if let Some(predicate) =
                        Expr::conjunction(compile_filter(member, ctx, current)?)
                    {
                        alternatives.push(predicate);
                    }
                }
                if let Some(predicate) = Expr::disjunction(alternatives) {
                    predicates.push(predicate);
                }
            }
            FilterClause::Condition { key, value } => {
                predicates.push(compile_condition(key, value, ctx, current)?);
            }
        }
    }
    Ok(predicates)
}

fn compile_condition(
    key: &str,
    value: &ValueSpec,
    ctx: &mut CompilationContext<'_>,
    current: Option<&RelationRef>,
) -> Result<Expr> {
    let parsed = FilterKey::parse(key)?;
    let relation = ctx.require_relation(parsed.relation, key)?;

    if parsed.operator.is_existence() {
        debug!(key, relation = %relation.name, "Compiled existence test");
        return Ok(Expr::Exists {
            query: Box::new(relation.row_query()),
            negated: parsed.operator == FilterOperator::NotExists,
        });
    }

    let field = parsed.field.unwrap_or_default();
    let column = relation.column(field)?;
    ctx.touch(&relation.source);
    let value = compile_value(value, ctx, current)?.into_expr(key)?;
    debug!(key, "Compiled filter condition");
    parsed
        .operator
        .apply(column, value)
        .ok_or_else(|| CompileError::UnsupportedOperator {
            operator: format!("{:?}", parsed.operator),
            key: String::from(key),
        })
}
