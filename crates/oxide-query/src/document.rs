//! Typed query documents.
//!
//! Documents are validated for shape when they are deserialized. Fields whose
//! shape errors are reported as [`CompileError::TypeMismatch`] (`limit`,
//! `offset`, `distinct`, `group_by`) are kept as [`Checked`] values and
//! validated when the compiler reaches them.

use std::fmt;
use std::marker::PhantomData;

use oxide_query_core::ast::SetOperator;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::CompileError;

/// A string-keyed map that keeps keys in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts a value, replacing an existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<'a, V> IntoIterator for &'a OrderedMap<V> {
    type Item = &'a (String, V);
    type IntoIter = std::slice::Iter<'a, (String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

struct OrderedMapVisitor<V> {
    marker: PhantomData<V>,
}

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor {
            marker: PhantomData,
        })
    }
}

/// A field value whose shape is checked at compile time rather than at
/// deserialization time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Checked<T> {
    /// The value has the expected shape.
    Valid(T),
    /// The raw value, which has some other shape.
    Invalid(Value),
}

impl<T> Checked<T> {
    /// Returns the valid value.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` naming `field` if the value had the wrong shape.
    pub fn valid(&self, field: &str, expected: &'static str) -> crate::Result<&T> {
        match self {
            Self::Valid(value) => Ok(value),
            Self::Invalid(found) => Err(CompileError::TypeMismatch {
                field: String::from(field),
                expected,
                found: found.to_string(),
            }),
        }
    }
}

/// `distinct`: a flag, or the list of `Relation.field` columns to be
/// distinct on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DistinctSpec {
    /// `SELECT DISTINCT` when true.
    Flag(bool),
    /// `SELECT DISTINCT ON (...)`.
    Columns(Vec<String>),
}

/// Sort direction in `order_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    /// Descending.
    #[serde(alias = "DESC")]
    Desc,
}

/// One `order_by` entry. Entries are emitted by ascending `index`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortSpec {
    /// Position of the sort key.
    pub index: usize,
    /// Direction.
    #[serde(default)]
    pub dir: SortDirection,
    /// Sort NULLs after all other values.
    #[serde(default)]
    pub nulls_last: bool,
}

/// Output format requested by `debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    /// HTML-escaped SQL block.
    Html,
    /// Plain SQL text with inlined literals.
    Str,
}

/// `cte`: wraps the compiled query as a named common table expression.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CteSpec {
    /// The CTE name, bound in the context.
    pub name: String,
    /// Whether the CTE is recursive.
    #[serde(default)]
    pub recursive: bool,
}

/// `union` / `union_all` body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnionSpec {
    /// Name the union result is bound under.
    pub name: String,
    /// Left operand. Bound under its `alias` before `right` is compiled.
    pub left: QueryDocument,
    /// Right operand.
    pub right: QueryDocument,
    /// Optional CTE wrapping the union.
    #[serde(default)]
    pub cte: Option<CteSpec>,
}

/// A joined relation.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinSpec {
    /// Columns of the joined relation to add to the select list.
    #[serde(default)]
    pub select: OrderedMap<ColumnSpec>,
    /// Join predicate. An empty predicate produces a cross join.
    #[serde(default, rename = "where")]
    pub filter: FilterDocument,
}

/// A select-list entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    /// A column reference or expression snippet.
    Expr(String),
    /// Structured options.
    Options(ColumnOptions),
}

/// Structured select-list entry.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnOptions {
    /// Output label.
    #[serde(default)]
    pub label: Option<String>,
    /// Apply DISTINCT to the column.
    #[serde(default)]
    pub distinct: bool,
    /// Explicit value for the column.
    #[serde(default)]
    pub value: Option<ValueSpec>,
    /// Conditional branches; compiles to a CASE expression.
    #[serde(default)]
    pub whens: Option<Vec<WhenThen>>,
    /// Fallback value of a CASE expression.
    #[serde(default, rename = "else_")]
    pub else_value: Option<ValueSpec>,
    /// Aggregate snippet, filtered by `where`.
    #[serde(default)]
    pub select: Option<String>,
    /// Aggregate filter applied to `select`.
    #[serde(default, rename = "where")]
    pub filter: FilterDocument,
}

/// One `whens` branch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhenThen {
    /// The branch condition.
    pub when: FilterDocument,
    /// The branch value.
    pub then: ValueSpec,
}

/// A value on the right-hand side of a filter, or in `value`/`then`/`else_`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    /// JSON null.
    Null,
    /// Boolean constant.
    Bool(bool),
    /// Integer constant.
    Integer(i64),
    /// Floating point constant.
    Float(f64),
    /// Column reference, snippet, or text constant.
    Text(String),
    /// Structured column.
    Spec(Box<ColumnOptions>),
}

/// A `where`/`having`/`when` document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterDocument {
    clauses: Vec<FilterClause>,
}

/// One entry of a filter document.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    /// `and`: a nested document whose predicates are ANDed.
    And(FilterDocument),
    /// `or`: each member's predicates are ANDed, members are ORed.
    Or(Vec<FilterDocument>),
    /// `Relation.field__OPERATOR`, or `name__exists`.
    Condition {
        /// The raw key.
        key: String,
        /// The compared value.
        value: ValueSpec,
    },
}

impl FilterDocument {
    /// Creates an empty filter.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Adds a clause.
    #[must_use]
    pub fn clause(mut self, clause: FilterClause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Adds a field condition.
    #[must_use]
    pub fn condition(self, key: impl Into<String>, value: ValueSpec) -> Self {
        self.clause(FilterClause::Condition {
            key: key.into(),
            value,
        })
    }

    /// Returns the clauses in document order.
    #[must_use]
    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    /// Returns true if the document has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

struct FilterVisitor;

impl<'de> Visitor<'de> for FilterVisitor {
    type Value = FilterDocument;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a filter document")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut clauses = Vec::new();
        while let Some(key) = access.next_key::<String>()? {
            let clause = if key.eq_ignore_ascii_case("and") {
                FilterClause::And(access.next_value()?)
            } else if key.eq_ignore_ascii_case("or") {
                FilterClause::Or(access.next_value()?)
            } else {
                FilterClause::Condition {
                    value: access.next_value()?,
                    key,
                }
            };
            clauses.push(clause);
        }
        Ok(FilterDocument { clauses })
    }
}

impl<'de> Deserialize<'de> for FilterDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FilterVisitor)
    }
}

/// The compilation unit.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryDocument {
    /// Relation name to output-column specs. A key of the form `Name()`
    /// references a resolver.
    pub select: OrderedMap<OrderedMap<ColumnSpec>>,
    /// Joined relations.
    #[serde(default)]
    pub joins: OrderedMap<JoinSpec>,
    /// Row filter.
    #[serde(default, rename = "where")]
    pub filter: FilterDocument,
    /// Aggregate filter.
    #[serde(default)]
    pub having: FilterDocument,
    /// Row limit.
    #[serde(default)]
    pub limit: Option<Checked<u64>>,
    /// Row offset.
    #[serde(default)]
    pub offset: Option<Checked<u64>>,
    /// `Relation.field` to sort spec.
    #[serde(default)]
    pub order_by: OrderedMap<SortSpec>,
    /// `Relation.field` grouping keys.
    #[serde(default)]
    pub group_by: Option<Checked<Vec<String>>>,
    /// Row de-duplication.
    #[serde(default)]
    pub distinct: Option<Checked<DistinctSpec>>,
    /// Named derived relations, compiled in order.
    #[serde(default)]
    pub subqueries: OrderedMap<QueryDocument>,
    /// Wraps this document as a common table expression.
    #[serde(default)]
    pub cte: Option<CteSpec>,
    /// Set union of two documents.
    #[serde(default)]
    pub union: Option<Box<UnionSpec>>,
    /// Set union of two documents, keeping duplicates.
    #[serde(default)]
    pub union_all: Option<Box<UnionSpec>>,
    /// Resolver parameter values.
    #[serde(default)]
    pub resolver_args: Map<String, Value>,
    /// Name the document is bound under when it is the left side of a union.
    #[serde(default)]
    pub alias: Option<String>,
    /// Requests a rendering of the compiled statement.
    #[serde(default)]
    pub debug: Option<DebugMode>,
}

impl QueryDocument {
    /// Parses a document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` if the text is not a well-formed document.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Converts a JSON value into a document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` if the value is not a well-formed document.
    pub fn from_value(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the union body and its operator, if any.
    ///
    /// # Errors
    ///
    /// Returns `MalformedDocument` if both `union` and `union_all` are set.
    pub fn union_body(&self) -> crate::Result<Option<(&UnionSpec, SetOperator)>> {
        match (&self.union, &self.union_all) {
            (Some(_), Some(_)) => Err(CompileError::MalformedDocument(String::from(
                "'union' and 'union_all' are mutually exclusive",
            ))),
            (Some(union), None) => Ok(Some((union, SetOperator::Union))),
            (None, Some(union)) => Ok(Some((union, SetOperator::UnionAll))),
            (None, None) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_select_keys_keep_document_order() {
        let doc = QueryDocument::from_value(json!({
            "select": {"User": {"name": {}, "id": {}, "fullname": {}}}
        }))
        .unwrap();

        let columns = doc.select.get("User").unwrap();
        assert_eq!(
            columns.keys().collect::<Vec<_>>(),
            vec!["name", "id", "fullname"]
        );
    }

    #[test]
    fn test_filter_clauses() {
        let doc = QueryDocument::from_value(json!({
            "select": {"User": {"id": {}}},
            "where": {
                "OR": [{"User.id__EQ": 1}, {"User.id__EQ": 2}],
                "And": {"User.name__LIKE": "%a%"},
                "User.id__NE": 5,
                "subq1__exists": {}
            }
        }))
        .unwrap();

        let clauses = doc.filter.clauses();
        assert_eq!(clauses.len(), 4);
        assert!(matches!(&clauses[0], FilterClause::Or(members) if members.len() == 2));
        assert!(matches!(&clauses[1], FilterClause::And(inner) if inner.clauses().len() == 1));
        assert_eq!(
            clauses[2],
            FilterClause::Condition {
                key: String::from("User.id__NE"),
                value: ValueSpec::Integer(5),
            }
        );
        assert!(matches!(
            &clauses[3],
            FilterClause::Condition { value: ValueSpec::Spec(_), .. }
        ));
    }

    #[test]
    fn test_value_spec_variants() {
        let values: Vec<ValueSpec> =
            serde_json::from_value(json!([null, true, 3, 2.5, "User.id", {"value": 1}]))
                .unwrap();
        assert_eq!(values[0], ValueSpec::Null);
        assert_eq!(values[1], ValueSpec::Bool(true));
        assert_eq!(values[2], ValueSpec::Integer(3));
        assert_eq!(values[3], ValueSpec::Float(2.5));
        assert_eq!(values[4], ValueSpec::Text(String::from("User.id")));
        assert!(matches!(&values[5], ValueSpec::Spec(spec) if spec.value.is_some()));
    }

    #[test]
    fn test_column_specs() {
        let doc = QueryDocument::from_value(json!({
            "select": {"User": {
                "total": "count(User.id)",
                "email": {
                    "whens": [{"when": {"User.id__EQ": 1}, "then": "a@b.c"}],
                    "else_": "User.name"
                },
                "user_count": {"select": "count(id)", "where": {"User.id__NE": 5}}
            }}
        }))
        .unwrap();

        let columns = doc.select.get("User").unwrap();
        assert_eq!(
            columns.get("total"),
            Some(&ColumnSpec::Expr(String::from("count(User.id)")))
        );
        let Some(ColumnSpec::Options(email)) = columns.get("email") else {
            panic!("expected structured column");
        };
        assert_eq!(email.whens.as_ref().map(Vec::len), Some(1));
        assert_eq!(email.else_value, Some(ValueSpec::Text(String::from("User.name"))));
        let Some(ColumnSpec::Options(count)) = columns.get("user_count") else {
            panic!("expected structured column");
        };
        assert_eq!(count.select.as_deref(), Some("count(id)"));
        assert!(!count.filter.is_empty());
    }

    #[test]
    fn test_checked_fields() {
        let doc = QueryDocument::from_value(json!({
            "select": {"User": {"id": {}}},
            "limit": -1,
            "offset": 10,
            "distinct": ["User.id"],
            "group_by": "User.id"
        }))
        .unwrap();

        assert!(matches!(
            doc.limit.as_ref().unwrap().valid("limit", "a non-negative integer"),
            Err(CompileError::TypeMismatch { .. })
        ));
        assert_eq!(
            doc.offset.as_ref().unwrap().valid("offset", "a non-negative integer").unwrap(),
            &10
        );
        assert_eq!(
            doc.distinct.as_ref().unwrap().valid("distinct", "a flag").unwrap(),
            &DistinctSpec::Columns(vec![String::from("User.id")])
        );
        assert!(doc.group_by.as_ref().unwrap().valid("group_by", "a list").is_err());
    }

    #[test]
    fn test_order_by_and_union() {
        let doc = QueryDocument::from_value(json!({
            "select": {"U": {"id": {}}},
            "order_by": {"User.name": {"index": 1}, "User.id": {"index": 0, "dir": "desc"}},
            "union_all": {
                "name": "U",
                "left": {"select": {"Role": {"id": {}}}, "alias": "base"},
                "right": {"select": {"base": {"id": {}}}},
                "cte": {"name": "U", "recursive": true}
            }
        }))
        .unwrap();

        let sort = doc.order_by.get("User.id").unwrap();
        assert_eq!(sort.index, 0);
        assert_eq!(sort.dir, SortDirection::Desc);
        assert_eq!(doc.order_by.get("User.name").unwrap().dir, SortDirection::Asc);

        let (union, op) = doc.union_body().unwrap().unwrap();
        assert_eq!(op, SetOperator::UnionAll);
        assert_eq!(union.left.alias.as_deref(), Some("base"));
        assert!(union.cte.as_ref().unwrap().recursive);
    }

    #[test]
    fn test_both_unions_are_malformed() {
        let union = json!({
            "name": "U",
            "left": {"select": {"Role": {"id": {}}}},
            "right": {"select": {"Role": {"id": {}}}}
        });
        let doc = QueryDocument::from_value(json!({
            "select": {"U": {"id": {}}},
            "union": union.clone(),
            "union_all": union
        }))
        .unwrap();
        assert!(matches!(
            doc.union_body(),
            Err(CompileError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = QueryDocument::from_json(r#"{"select": {}, "limt": 5}"#).unwrap_err();
        assert!(matches!(err, CompileError::InvalidDocument(_)));
    }

    #[test]
    fn test_missing_select_is_rejected() {
        assert!(QueryDocument::from_json(r#"{"limit": 5}"#).is_err());
    }
}
