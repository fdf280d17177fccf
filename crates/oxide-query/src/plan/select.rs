//! Recursive document compilation.

use oxide_query_core::ast::{
    Cte, Expr, JoinClause, JoinType, Query, SelectColumn, SelectStatement, TableRef,
};
use tracing::debug;

use super::clauses;
use crate::column::compile_select_column;
use crate::context::{CompilationContext, RelationKind, RelationRef};
use crate::document::{ColumnSpec, QueryDocument};
use crate::error::{CompileError, Result};
use crate::filter::compile_filter;
use crate::resolver::ResolverInvocation;

/// A compiled document with its effective pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDocument {
    /// The document's query. CTE definitions live in the context until the
    /// top-level compilation attaches them.
    pub query: Query,
    /// Effective LIMIT.
    pub limit: Option<u64>,
    /// Effective OFFSET.
    pub offset: Option<u64>,
}

/// Compiles one document against the context.
///
/// # Errors
///
/// Returns any compilation error; the first error aborts the compilation.
pub fn compile_document(
    doc: &QueryDocument,
    ctx: &mut CompilationContext<'_>,
) -> Result<CompiledDocument> {
    ctx.enter(&doc.resolver_args)?;
    debug!(depth = ctx.depth(), relations = doc.select.len(), "Compiling document");
    let built = build(doc, ctx);
    let sources = ctx.leave();
    let (mut select, limit, offset) = built?;

    let joined: Vec<&TableRef> = select.joins.iter().map(|join| &join.table).collect();
    let from: Vec<TableRef> = sources
        .into_iter()
        .filter(|source| !joined.contains(&source))
        .collect();
    for source in from {
        select.add_from(source);
    }
    if select.from.is_empty() && !select.joins.is_empty() {
        return Err(CompileError::MalformedDocument(String::from(
            "joins need at least one selected relation",
        )));
    }

    let mut query = Query::select(select);
    if let Some(cte) = &doc.cte {
        query = wrap_cte(&cte.name, cte.recursive, query, ctx);
    }
    Ok(CompiledDocument {
        query,
        limit,
        offset,
    })
}

type Built = (SelectStatement, Option<u64>, Option<u64>);

fn build(doc: &QueryDocument, ctx: &mut CompilationContext<'_>) -> Result<Built> {
    bind_union(doc, ctx)?;

    for (name, subquery) in doc.subqueries.iter() {
        let compiled = compile_document(subquery, ctx)?;
        debug!(subquery = name, "Bound subquery");
        ctx.bind_subquery(RelationRef::derived(
            name,
            compiled.query,
            RelationKind::Subquery,
        ));
    }

    let (join_columns, joins) = compile_joins(doc, ctx)?;

    let mut select = SelectStatement::new();
    let mut selected = Vec::with_capacity(doc.select.len());
    for (relation_key, columns) in doc.select.iter() {
        let relation = select_relation(relation_key, ctx)?;
        ctx.touch(&relation.source);
        for (key, spec) in columns.iter() {
            select
                .columns
                .push(compile_select_column(key, spec, &relation, ctx)?);
        }
        selected.push(relation);
    }
    if select.columns.is_empty() {
        select.columns = selected
            .iter()
            .map(|relation| {
                SelectColumn::new(Expr::Wildcard {
                    table: Some(String::from(relation.qualifier())),
                })
            })
            .collect();
    }
    select.columns.extend(join_columns);
    select.joins = joins;

    select.having = Expr::conjunction(compile_filter(&doc.having, ctx, None)?);
    select.where_clause = Expr::conjunction(compile_filter(&doc.filter, ctx, None)?);

    let (limit, offset) = clauses::pagination(doc)?;
    select.limit = limit;
    select.offset = offset;
    select.distinct = clauses::distinct(doc, ctx)?;
    select.group_by = clauses::group_by(doc, ctx)?;
    select.order_by = clauses::order_by(doc, &select.columns, ctx)?;
    Ok((select, limit, offset))
}

/// Compiles `union`/`union_all` and binds its operands and result.
fn bind_union(doc: &QueryDocument, ctx: &mut CompilationContext<'_>) -> Result<()> {
    let Some((union, op)) = doc.union_body()? else {
        return Ok(());
    };
    let left = compile_document(&union.left, ctx)?.query;
    let columns = left.output_columns();
    if let Some(alias) = &union.left.alias {
        ctx.bind(RelationRef::derived(
            alias,
            left.clone(),
            RelationKind::UnionOperand,
        ));
    }
    if let Some(cte) = union.cte.as_ref().filter(|cte| cte.recursive) {
        ctx.bind(RelationRef::cte(&cte.name, &cte.name, columns.clone()));
    }
    let right = compile_document(&union.right, ctx)?.query;
    let combined = Query::set_operation(left, op, right);
    debug!(union = %union.name, operator = op.as_str(), "Compiled union");

    match &union.cte {
        Some(cte) => {
            ctx.add_cte(Cte {
                name: cte.name.clone(),
                recursive: cte.recursive,
                query: Box::new(combined),
            });
            ctx.bind(RelationRef::cte(&cte.name, &cte.name, columns.clone()));
            if union.name != cte.name {
                ctx.bind(RelationRef::cte(&union.name, &cte.name, columns));
            }
        }
        None => ctx.bind(RelationRef::derived(
            &union.name,
            combined,
            RelationKind::Union,
        )),
    }
    Ok(())
}

type CompiledJoins = (Vec<SelectColumn>, Vec<JoinClause>);

fn compile_joins(doc: &QueryDocument, ctx: &mut CompilationContext<'_>) -> Result<CompiledJoins> {
    let mut columns = Vec::new();
    let mut joins = Vec::with_capacity(doc.joins.len());
    for (name, join) in doc.joins.iter() {
        let relation = ctx.require_relation(name, name)?;
        let on = Expr::conjunction(compile_filter(&join.filter, ctx, Some(&relation))?);
        for (key, spec) in join.select.iter() {
            let mut column = compile_select_column(key, spec, &relation, ctx)?;
            let labeled = matches!(spec, ColumnSpec::Options(options) if options.label.is_some());
            if !labeled {
                column.alias = Some(format!("{}_{key}", name.to_lowercase()));
            }
            columns.push(column);
        }
        debug!(relation = name, "Compiled join");
        joins.push(JoinClause {
            join_type: if on.is_some() {
                JoinType::Inner
            } else {
                JoinType::Cross
            },
            table: relation.source,
            on,
        });
    }
    Ok((columns, joins))
}

/// Resolves a `select` key: a resolver reference `Name()`, a derived
/// relation or a catalog relation.
fn select_relation(key: &str, ctx: &mut CompilationContext<'_>) -> Result<RelationRef> {
    let Some(name) = key.strip_suffix("()") else {
        return ctx.require_relation(key, key);
    };
    let resolver = ctx
        .catalog()
        .instantiate_resolver(name)
        .ok_or_else(|| CompileError::UnknownRelation {
            relation: String::from(name),
            key: String::from(key),
        })?;
    let ordinal = ctx.resolver_invocations(name);
    let invocation = ResolverInvocation::new(resolver, ctx.compilation_id(), ordinal)
        .validate(&ctx.resolver_args())?;
    if let Some(bound) = ctx.resolver_binding(name, invocation.args()).cloned() {
        debug!(resolver = name, "Reusing resolver relation");
        ctx.bind(bound.clone());
        return Ok(bound);
    }
    let (invocation, query) = invocation.materialize(ctx.backend())?.produce_query()?;
    let relation = RelationRef::derived(name, query, RelationKind::Resolver);
    ctx.bind_resolver(invocation.args().clone(), relation.clone());
    Ok(relation)
}

/// Registers `query` as a CTE and returns a query reading all of its
/// columns.
fn wrap_cte(name: &str, recursive: bool, query: Query, ctx: &mut CompilationContext<'_>) -> Query {
    let columns = query.output_columns();
    ctx.add_cte(Cte {
        name: String::from(name),
        recursive,
        query: Box::new(query),
    });
    let relation = RelationRef::cte(name, name, columns);
    let mut select = SelectStatement::new();
    select.columns = if relation.columns.is_empty() {
        vec![SelectColumn::new(Expr::Wildcard {
            table: Some(String::from(name)),
        })]
    } else {
        relation
            .columns
            .iter()
            .map(|column| SelectColumn::new(Expr::qualified_column(name, column.clone())))
            .collect()
    };
    select.from.push(relation.source.clone());
    debug!(cte = name, recursive, "Bound common table expression");
    ctx.bind(relation);
    Query::select(select)
}
