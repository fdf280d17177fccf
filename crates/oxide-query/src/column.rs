//! Column specs and document values.
//!
//! A select entry compiles to one [`SelectColumn`]. Its expression comes from
//! `whens` (a CASE), `value`, `select`, or the column key itself, which may be
//! a plain column name, a snippet, or a JSON path such as
//! `account_details['address'][0]`.

use std::sync::OnceLock;

use oxide_query_core::ast::{Expr, SelectColumn};
use oxide_query_core::snippet::looks_like_snippet;
use oxide_query_core::SqlValue;
use regex::Regex;

use crate::context::{CompilationContext, RelationRef};
use crate::document::{ColumnOptions, ColumnSpec, FilterDocument, ValueSpec, WhenThen};
use crate::error::{CompileError, Result};
use crate::eval::evaluate_snippet;
use crate::filter::compile_filter;
use crate::functions::apply_distinct;
use crate::operand::Operand;

/// Compiles one entry of a `select` block.
///
/// # Errors
///
/// Returns the errors of snippet evaluation and filter compilation, or
/// `UnknownColumn` when the key names no column of `relation`.
pub fn compile_select_column(
    key: &str,
    spec: &ColumnSpec,
    relation: &RelationRef,
    ctx: &mut CompilationContext<'_>,
) -> Result<SelectColumn> {
    match spec {
        ColumnSpec::Expr(text) => {
            let expr = if relation.columns.iter().any(|c| c == text) {
                ctx.touch(&relation.source);
                relation.column(text)?
            } else {
                compile_text(text, ctx, Some(relation))?.into_expr(text)?
            };
            let (expr, label) = split_label(expr);
            let alias = match (&label, &expr) {
                (Some(_), _) => label,
                (None, Expr::Column { name, .. }) if name == key => None,
                (None, _) => Some(String::from(key)),
            };
            Ok(SelectColumn { expr, alias })
        }
        ColumnSpec::Options(options) => compile_options(Some(key), options, ctx, Some(relation)),
    }
}

/// Compiles a structured column spec. `key` is the output column name when
/// the spec is a select entry, and `None` when it is a nested value.
///
/// # Errors
///
/// Returns `MalformedDocument` for a nested spec that names no value.
pub fn compile_options(
    key: Option<&str>,
    options: &ColumnOptions,
    ctx: &mut CompilationContext<'_>,
    current: Option<&RelationRef>,
) -> Result<SelectColumn> {
    let context = key.unwrap_or("value");
    let (expr, computed) = if let Some(whens) = &options.whens {
        let expr = case_expression(whens, options.else_value.as_ref(), ctx, current, context)?;
        (expr, true)
    } else if let Some(value) = &options.value {
        let expr = compile_value(value, ctx, current)?.into_expr(context)?;
        (expr, true)
    } else if let Some(select) = &options.select {
        (compile_text(select, ctx, current)?.into_expr(select)?, true)
    } else if let Some(key) = key {
        column_from_key(key, ctx, current)?
    } else {
        return Err(CompileError::MalformedDocument(String::from(
            "a nested column spec needs 'value', 'whens' or 'select'",
        )));
    };

    let expr = if options.filter.is_empty() {
        expr
    } else {
        restrict(expr, &options.filter, ctx, current, context)?
    };
    let (mut expr, label) = split_label(expr);
    if options.distinct {
        expr = apply_distinct(expr);
    }
    let alias = options
        .label
        .clone()
        .or(label)
        .or_else(|| key.filter(|_| computed).map(String::from));
    Ok(SelectColumn { expr, alias })
}

/// Compiles a document value: a literal, a reference or snippet string, or
/// a nested column spec.
///
/// # Errors
///
/// Returns the errors of [`compile_text`] and [`compile_options`].
pub fn compile_value(
    value: &ValueSpec,
    ctx: &mut CompilationContext<'_>,
    current: Option<&RelationRef>,
) -> Result<Operand> {
    match value {
        ValueSpec::Null => Ok(Operand::Literal(SqlValue::Null)),
        ValueSpec::Bool(b) => Ok(Operand::Literal(SqlValue::Bool(*b))),
        ValueSpec::Integer(i) => Ok(Operand::Literal(SqlValue::Int(*i))),
        ValueSpec::Float(f) => Ok(Operand::Literal(SqlValue::Float(*f))),
        ValueSpec::Text(text) => compile_text(text, ctx, current),
        ValueSpec::Spec(options) => {
            let column = compile_options(None, options, ctx, current)?;
            Ok(Operand::from(column.expr))
        }
    }
}

/// Compiles a string value.
///
/// Strings holding both parentheses are snippets. Dotted strings naming a
/// column of a known relation (`User.id`, optionally with a `__suffix`) are
/// column references. Anything else is a text literal.
///
/// # Errors
///
/// Returns the errors of snippet evaluation.
pub fn compile_text(
    text: &str,
    ctx: &mut CompilationContext<'_>,
    current: Option<&RelationRef>,
) -> Result<Operand> {
    if looks_like_snippet(text) {
        return evaluate_snippet(text, ctx, current);
    }
    if let Some((relation_name, rest)) = text.split_once('.') {
        let field = rest.split_once("__").map_or(rest, |(field, _)| field);
        if let Some(relation) = ctx.lookup_relation(relation_name) {
            if relation.has_column(field) {
                ctx.touch(&relation.source);
                return relation.column(field).map(Operand::ColumnRef);
            }
        }
    }
    Ok(Operand::Literal(SqlValue::Text(String::from(text))))
}

fn case_expression(
    whens: &[WhenThen],
    else_value: Option<&ValueSpec>,
    ctx: &mut CompilationContext<'_>,
    current: Option<&RelationRef>,
    context: &str,
) -> Result<Expr> {
    let mut when_clauses = Vec::with_capacity(whens.len());
    for when_then in whens {
        let condition = Expr::conjunction(compile_filter(&when_then.when, ctx, current)?)
            .ok_or_else(|| {
                CompileError::MalformedDocument(format!("empty 'when' in column '{context}'"))
            })?;
        let then = compile_value(&when_then.then, ctx, current)?.into_expr(context)?;
        when_clauses.push((condition, then));
    }
    let else_clause = match else_value {
        Some(value) => Some(Box::new(compile_value(value, ctx, current)?.into_expr(context)?)),
        None => None,
    };
    Ok(Expr::Case {
        when_clauses,
        else_clause,
    })
}

/// Restricts a column to the rows matching `filter`: an aggregate gets a
/// FILTER clause, any other expression becomes `CASE WHEN ... THEN expr END`.
fn restrict(
    expr: Expr,
    filter: &FilterDocument,
    ctx: &mut CompilationContext<'_>,
    current: Option<&RelationRef>,
    context: &str,
) -> Result<Expr> {
    let Some(condition) = Expr::conjunction(compile_filter(filter, ctx, current)?) else {
        return Ok(expr);
    };
    let (expr, label) = split_label(expr);
    let restricted = match expr {
        Expr::Function(mut call) => {
            call.filter = Some(Box::new(condition));
            Expr::Function(call)
        }
        other => Expr::Case {
            when_clauses: vec![(condition, other)],
            else_clause: None,
        },
    };
    tracing::debug!(column = context, "Restricted column with filter");
    Ok(match label {
        Some(label) => restricted.label(label),
        None => restricted,
    })
}

fn column_from_key(
    key: &str,
    ctx: &mut CompilationContext<'_>,
    current: Option<&RelationRef>,
) -> Result<(Expr, bool)> {
    if looks_like_snippet(key) {
        let expr = evaluate_snippet(key, ctx, current)?.into_expr(key)?;
        return Ok((expr, true));
    }
    let Some(relation) = current else {
        return Err(CompileError::UnresolvedIdentifier {
            name: String::from(key),
            snippet: String::from(key),
        });
    };
    let expr = match parse_json_path(key) {
        Some((column, path)) => path.into_iter().fold(relation.column(column)?, |expr, key| {
            Expr::Index {
                expr: Box::new(expr),
                key,
            }
        }),
        None => relation.column(key)?,
    };
    ctx.touch(&relation.source);
    let computed = !matches!(expr, Expr::Column { .. });
    Ok((expr, computed))
}

fn split_label(expr: Expr) -> (Expr, Option<String>) {
    match expr {
        Expr::Labeled { expr, label } => (*expr, Some(label)),
        other => (other, None),
    }
}

fn json_path_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^([A-Za-z_][A-Za-z0-9_]*)((?:\[(?:'[^']*'|"[^"]*"|-?[0-9]+)\])+)$"#)
            .expect("Invalid JSON path regex")
    })
}

fn json_segment_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\[(?:'([^']*)'|"([^"]*)"|(-?[0-9]+))\]"#).expect("Invalid JSON segment regex")
    })
}

/// Splits `column['key'][0]` into the column name and its element path.
fn parse_json_path(key: &str) -> Option<(&str, Vec<SqlValue>)> {
    let captures = json_path_regex().captures(key)?;
    let column = captures.get(1)?.as_str();
    let segments = captures.get(2)?.as_str();
    let path = json_segment_regex()
        .captures_iter(segments)
        .filter_map(|segment| {
            if let Some(text) = segment.get(1).or_else(|| segment.get(2)) {
                Some(SqlValue::Text(String::from(text.as_str())))
            } else {
                segment
                    .get(3)
                    .and_then(|n| n.as_str().parse::<i64>().ok())
                    .map(SqlValue::Int)
            }
        })
        .collect();
    Some((column, path))
}

#[cfg(test)]
mod tests {
    use oxide_query_core::ast::DataType;
    use oxide_query_core::dialect::GenericDialect;

    use super::*;
    use crate::backend::NoOpBackend;
    use crate::catalog::{Catalog, RelationSchema};
    use crate::functions::FunctionRegistry;

    fn catalog() -> Catalog {
        Catalog::new().relation(
            RelationSchema::new("User", "user_account")
                .column("id", DataType::Integer)
                .column("name", DataType::Text)
                .nullable_column("account_details", DataType::Json),
        )
    }

    fn compile(key: &str, spec: &str) -> Result<SelectColumn> {
        let catalog = catalog();
        let functions = FunctionRegistry::standard();
        let mut backend = NoOpBackend::new();
        let mut ctx = CompilationContext::new(&catalog, &functions, &mut backend);
        let user = RelationRef::catalog(catalog.get_relation("User").unwrap());
        let spec: ColumnSpec = serde_json::from_str(spec).unwrap();
        compile_select_column(key, &spec, &user, &mut ctx)
    }

    fn render(column: &SelectColumn) -> String {
        column.expr.to_sql_inline(&GenericDialect::new())
    }

    #[test]
    fn test_plain_column_has_no_alias() {
        let column = compile("id", "{}").unwrap();
        assert_eq!(column.expr, Expr::qualified_column("user_account", "id"));
        assert_eq!(column.alias, None);

        let labeled = compile("id", r#"{"label": "user_id"}"#).unwrap();
        assert_eq!(labeled.alias.as_deref(), Some("user_id"));
    }

    #[test]
    fn test_unknown_column() {
        assert!(matches!(
            compile("missing", "{}"),
            Err(CompileError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_json_path() {
        let column = compile("account_details['address'][0]", "{}").unwrap();
        assert_eq!(render(&column), "user_account.account_details['address'][0]");
        assert_eq!(column.alias.as_deref(), Some("account_details['address'][0]"));
    }

    #[test]
    fn test_parse_json_path() {
        let (column, path) = parse_json_path(r#"details["a"]['b'][-1]"#).unwrap();
        assert_eq!(column, "details");
        assert_eq!(
            path,
            vec![
                SqlValue::Text(String::from("a")),
                SqlValue::Text(String::from("b")),
                SqlValue::Int(-1)
            ]
        );
        assert!(parse_json_path("details").is_none());
        assert!(parse_json_path("details[").is_none());
    }

    #[test]
    fn test_snippet_key_is_labeled_by_key() {
        let column = compile("count(User.id)", r#"{"label": "n"}"#).unwrap();
        assert_eq!(render(&column), "count(user_account.id)");
        assert_eq!(column.alias.as_deref(), Some("n"));

        let column = compile("coalesce(User.name, 'x')", "{}").unwrap();
        assert_eq!(column.alias.as_deref(), Some("coalesce(User.name, 'x')"));
    }

    #[test]
    fn test_snippet_label_method() {
        let column = compile("User.id.label('uid')", "{}").unwrap();
        assert_eq!(column.expr, Expr::qualified_column("user_account", "id"));
        assert_eq!(column.alias.as_deref(), Some("uid"));
    }

    #[test]
    fn test_value_and_distinct() {
        let column = compile("kind", r#"{"value": "member"}"#).unwrap();
        assert_eq!(render(&column), "'member'");
        assert_eq!(column.alias.as_deref(), Some("kind"));

        let column = compile("name", r#"{"distinct": true}"#).unwrap();
        assert_eq!(render(&column), "DISTINCT user_account.name");
    }

    #[test]
    fn test_whens_compile_to_case() {
        let column = compile(
            "size",
            r#"{"whens": [
                {"when": {"User.id__LT": 10}, "then": "small"},
                {"when": {"User.id__GTE": 10}, "then": {"value": "User.name"}}
            ], "else_": "unknown"}"#,
        )
        .unwrap();
        assert_eq!(
            render(&column),
            "CASE WHEN user_account.id < 10 THEN 'small' \
             WHEN user_account.id >= 10 THEN user_account.name ELSE 'unknown' END"
        );
        assert_eq!(column.alias.as_deref(), Some("size"));
    }

    #[test]
    fn test_select_with_where_filters_aggregate() {
        let column = compile(
            "big",
            r#"{"select": "count(User.id)", "where": {"User.id__GT": 5}}"#,
        )
        .unwrap();
        assert_eq!(
            render(&column),
            "count(user_account.id) FILTER (WHERE user_account.id > 5)"
        );
    }

    #[test]
    fn test_string_spec() {
        let column = compile("who", r#""User.name""#).unwrap();
        assert_eq!(column.expr, Expr::qualified_column("user_account", "name"));
        assert_eq!(column.alias.as_deref(), Some("who"));

        let column = compile("name", r#""name""#).unwrap();
        assert_eq!(column.alias, None);
    }

    #[test]
    fn test_compile_text() {
        let catalog = catalog();
        let functions = FunctionRegistry::new();
        let mut backend = NoOpBackend::new();
        let mut ctx = CompilationContext::new(&catalog, &functions, &mut backend);

        assert_eq!(
            compile_text("User.id__EQ", &mut ctx, None).unwrap(),
            Operand::ColumnRef(Expr::qualified_column("user_account", "id"))
        );
        assert_eq!(
            compile_text("john.doe@example.com", &mut ctx, None).unwrap(),
            Operand::Literal(SqlValue::Text(String::from("john.doe@example.com")))
        );
        assert_eq!(
            compile_text("plain", &mut ctx, None).unwrap(),
            Operand::Literal(SqlValue::Text(String::from("plain")))
        );
    }
}
