//! Pagination, de-duplication, grouping and ordering.

use std::collections::BTreeMap;

use oxide_query_core::ast::{Distinct, Expr, NullOrdering, OrderBy, OrderDirection, SelectColumn};

use crate::context::{CompilationContext, RelationRef};
use crate::document::{DistinctSpec, QueryDocument, SortDirection};
use crate::error::{CompileError, Result};

const REFERENCE: &str = "'Relation.field' references";

fn split_reference<'r>(field: &str, reference: &'r str) -> Result<(&'r str, &'r str)> {
    reference
        .split_once('.')
        .filter(|(relation, column)| !relation.is_empty() && !column.is_empty())
        .ok_or_else(|| CompileError::TypeMismatch {
            field: String::from(field),
            expected: REFERENCE,
            found: format!("\"{reference}\""),
        })
}

fn column_of(
    relation: &RelationRef,
    column: &str,
    ctx: &mut CompilationContext<'_>,
) -> Result<Expr> {
    let expr = relation.column(column)?;
    ctx.touch(&relation.source);
    Ok(expr)
}

/// Resolves `Relation.field` against derived relations and the catalog.
fn reference(field: &str, reference: &str, ctx: &mut CompilationContext<'_>) -> Result<Expr> {
    let (relation, column) = split_reference(field, reference)?;
    let relation = ctx.require_relation(relation, reference)?;
    column_of(&relation, column, ctx)
}

/// Returns the validated `limit` and `offset`.
///
/// # Errors
///
/// Returns `TypeMismatch` unless both are absent or non-negative integers.
pub fn pagination(doc: &QueryDocument) -> Result<(Option<u64>, Option<u64>)> {
    let limit = doc
        .limit
        .as_ref()
        .map(|limit| limit.valid("limit", "a non-negative integer"))
        .transpose()?
        .copied();
    let offset = doc
        .offset
        .as_ref()
        .map(|offset| offset.valid("offset", "a non-negative integer"))
        .transpose()?
        .copied();
    Ok((limit, offset))
}

/// Compiles `distinct`: `true` de-duplicates rows, a column list compiles to
/// `DISTINCT ON`.
///
/// # Errors
///
/// Returns `TypeMismatch` for other shapes and the errors of reference
/// resolution.
pub fn distinct(doc: &QueryDocument, ctx: &mut CompilationContext<'_>) -> Result<Option<Distinct>> {
    let Some(spec) = &doc.distinct else {
        return Ok(None);
    };
    match spec.valid("distinct", "a boolean or a list of 'Relation.field' references")? {
        DistinctSpec::Flag(true) => Ok(Some(Distinct::Rows)),
        DistinctSpec::Flag(false) => Ok(None),
        DistinctSpec::Columns(columns) if columns.is_empty() => Ok(Some(Distinct::Rows)),
        DistinctSpec::Columns(columns) => {
            let exprs = columns
                .iter()
                .map(|column| reference("distinct", column, ctx))
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(Distinct::On(exprs)))
        }
    }
}

/// Compiles `group_by`. Grouping keys always name catalog relations.
///
/// # Errors
///
/// Returns `TypeMismatch` for malformed references and `UnknownRelation`
/// for relations missing from the catalog.
pub fn group_by(doc: &QueryDocument, ctx: &mut CompilationContext<'_>) -> Result<Vec<Expr>> {
    let Some(group_by) = &doc.group_by else {
        return Ok(Vec::new());
    };
    let keys = group_by.valid("group_by", "a list of 'Relation.field' references")?;
    let catalog = ctx.catalog();
    keys.iter()
        .map(|key| {
            let (relation, column) = split_reference("group_by", key)?;
            let schema = catalog
                .get_relation(relation)
                .ok_or_else(|| CompileError::UnknownRelation {
                    relation: String::from(relation),
                    key: key.clone(),
                })?;
            column_of(&RelationRef::catalog(schema), column, ctx)
        })
        .collect()
}

/// Compiles `order_by`, emitting entries by ascending `index` whatever the
/// key order of the document.
///
/// Keys are `Relation.field` references, or the output name of a select
/// column.
///
/// # Errors
///
/// Returns `TypeMismatch` when two entries share an index, and the errors of
/// reference resolution.
pub fn order_by(
    doc: &QueryDocument,
    columns: &[SelectColumn],
    ctx: &mut CompilationContext<'_>,
) -> Result<Vec<OrderBy>> {
    let mut by_index = BTreeMap::new();
    for (key, spec) in doc.order_by.iter() {
        let expr = if key.contains('.') {
            reference("order_by", key, ctx)?
        } else if columns.iter().any(|c| c.output_name() == Some(key)) {
            Expr::column(key)
        } else {
            return Err(CompileError::UnknownColumn {
                relation: String::from("select"),
                column: String::from(key),
            });
        };
        let mut entry = OrderBy::new(expr).direction(match spec.dir {
            SortDirection::Asc => OrderDirection::Asc,
            SortDirection::Desc => OrderDirection::Desc,
        });
        if spec.nulls_last {
            entry = entry.nulls(NullOrdering::Last);
        }
        if by_index.insert(spec.index, entry).is_some() {
            return Err(CompileError::TypeMismatch {
                field: String::from("order_by"),
                expected: "unique index values",
                found: format!("duplicate index {}", spec.index),
            });
        }
    }
    Ok(by_index.into_values().collect())
}

#[cfg(test)]
mod tests {
    use oxide_query_core::ast::DataType;

    use super::*;
    use crate::backend::NoOpBackend;
    use crate::catalog::{Catalog, RelationSchema};
    use crate::functions::FunctionRegistry;

    fn catalog() -> Catalog {
        Catalog::new().relation(
            RelationSchema::new("User", "user_account")
                .column("id", DataType::Integer)
                .column("name", DataType::Text),
        )
    }

    fn with_context<T>(f: impl FnOnce(&mut CompilationContext<'_>) -> T) -> T {
        let catalog = catalog();
        let functions = FunctionRegistry::new();
        let mut backend = NoOpBackend::new();
        let mut ctx = CompilationContext::new(&catalog, &functions, &mut backend);
        f(&mut ctx)
    }

    fn doc(json: &str) -> QueryDocument {
        QueryDocument::from_json(json).unwrap()
    }

    #[test]
    fn test_pagination() {
        let d = doc(r#"{"select": {}, "limit": 10, "offset": 0}"#);
        assert_eq!(pagination(&d).unwrap(), (Some(10), Some(0)));

        let d = doc(r#"{"select": {}, "limit": "ten"}"#);
        match pagination(&d) {
            Err(CompileError::TypeMismatch { field, .. }) => assert_eq!(field, "limit"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(pagination(&doc(r#"{"select": {}, "offset": -1}"#)).is_err());
    }

    #[test]
    fn test_distinct() {
        with_context(|ctx| {
            let d = doc(r#"{"select": {}, "distinct": true}"#);
            assert_eq!(distinct(&d, ctx).unwrap(), Some(Distinct::Rows));

            let d = doc(r#"{"select": {}, "distinct": false}"#);
            assert_eq!(distinct(&d, ctx).unwrap(), None);

            let d = doc(r#"{"select": {}, "distinct": ["User.name"]}"#);
            assert_eq!(
                distinct(&d, ctx).unwrap(),
                Some(Distinct::On(vec![Expr::qualified_column("user_account", "name")]))
            );

            let d = doc(r#"{"select": {}, "distinct": 3}"#);
            assert!(matches!(
                distinct(&d, ctx),
                Err(CompileError::TypeMismatch { .. })
            ));
        });
    }

    #[test]
    fn test_group_by() {
        with_context(|ctx| {
            let d = doc(r#"{"select": {}, "group_by": ["User.id", "User.name"]}"#);
            assert_eq!(group_by(&d, ctx).unwrap().len(), 2);

            let d = doc(r#"{"select": {}, "group_by": "User.id"}"#);
            assert!(matches!(
                group_by(&d, ctx),
                Err(CompileError::TypeMismatch { .. })
            ));

            let d = doc(r#"{"select": {}, "group_by": ["id"]}"#);
            assert!(matches!(
                group_by(&d, ctx),
                Err(CompileError::TypeMismatch { .. })
            ));

            let d = doc(r#"{"select": {}, "group_by": ["Nope.id"]}"#);
            assert!(matches!(
                group_by(&d, ctx),
                Err(CompileError::UnknownRelation { .. })
            ));
        });
    }

    #[test]
    fn test_order_by_follows_index() {
        with_context(|ctx| {
            let d = doc(
                r#"{"select": {}, "order_by": {
                    "User.name": {"index": 2, "dir": "desc", "nulls_last": true},
                    "User.id": {"index": 1, "dir": "asc"}
                }}"#,
            );
            let entries = order_by(&d, &[], ctx).unwrap();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].expr, Expr::qualified_column("user_account", "id"));
            assert_eq!(entries[1].direction, OrderDirection::Desc);
            assert_eq!(entries[1].nulls, Some(NullOrdering::Last));
        });
    }

    #[test]
    fn test_order_by_output_name() {
        with_context(|ctx| {
            let d = doc(r#"{"select": {}, "order_by": {"total": {"index": 0}}}"#);
            let columns = [SelectColumn::with_alias(Expr::literal(1_i64), "total")];
            let entries = order_by(&d, &columns, ctx).unwrap();
            assert_eq!(entries[0].expr, Expr::column("total"));

            assert!(matches!(
                order_by(&d, &[], ctx),
                Err(CompileError::UnknownColumn { .. })
            ));
        });
    }

    #[test]
    fn test_order_by_duplicate_index() {
        with_context(|ctx| {
            let d = doc(
                r#"{"select": {}, "order_by": {
                    "User.name": {"index": 1},
                    "User.id": {"index": 1}
                }}"#,
            );
            assert!(matches!(
                order_by(&d, &[], ctx),
                Err(CompileError::TypeMismatch { .. })
            ));
        });
    }
}
