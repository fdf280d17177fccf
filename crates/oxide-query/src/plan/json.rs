//! Tracks which result columns carry JSON documents.

use oxide_query_core::ast::{Cte, Expr, Query, QueryBody, SelectStatement, TableRef};

use crate::catalog::Catalog;

/// Returns the output names of `query`'s columns that hold JSON.
///
/// A column is JSON when it reads a catalog column declared `JSON`, reads
/// such a column through a subquery or CTE, or extracts an element from one.
pub fn json_output_columns(query: &Query, catalog: &Catalog) -> Vec<String> {
    JsonColumns {
        catalog,
        ctes: &query.with,
        visiting: Vec::new(),
    }
    .output_columns(query)
}

struct JsonColumns<'a> {
    catalog: &'a Catalog,
    ctes: &'a [Cte],
    visiting: Vec<&'a str>,
}

impl<'a> JsonColumns<'a> {
    fn output_columns(&mut self, query: &'a Query) -> Vec<String> {
        let select = match &query.body {
            QueryBody::Select(select) => select,
            QueryBody::SetOperation { left, .. } => return self.output_columns(left),
        };
        let mut out = Vec::new();
        for column in &select.columns {
            if let Some(name) = column.output_name() {
                if self.is_json(&column.expr, select) {
                    out.push(String::from(name));
                }
            }
        }
        out
    }

    fn is_json(&mut self, expr: &'a Expr, select: &'a SelectStatement) -> bool {
        match expr {
            Expr::Index { .. } => true,
            Expr::Labeled { expr, .. } | Expr::Paren(expr) => self.is_json(expr, select),
            Expr::Column {
                table: Some(qualifier),
                name,
            } => sources(select)
                .find(|source| source.qualifier() == qualifier)
                .is_some_and(|source| self.source_column_is_json(source, name)),
            Expr::Column { table: None, name } => {
                let single: Vec<&TableRef> = sources(select).collect();
                single.len() == 1 && self.source_column_is_json(single[0], name)
            }
            _ => false,
        }
    }

    fn source_column_is_json(&mut self, source: &'a TableRef, column: &str) -> bool {
        match source {
            TableRef::Subquery { query, .. } => {
                self.output_columns(query).iter().any(|c| c == column)
            }
            TableRef::Table { name, .. } => {
                let ctes = self.ctes;
                if let Some(cte) = ctes.iter().find(|cte| cte.name == *name) {
                    if self.visiting.contains(&cte.name.as_str()) {
                        return false;
                    }
                    self.visiting.push(&cte.name);
                    let found = self.output_columns(&cte.query).iter().any(|c| c == column);
                    self.visiting.pop();
                    return found;
                }
                self.catalog
                    .relation_for_table(name)
                    .and_then(|relation| relation.get_column(column))
                    .is_some_and(|c| c.data_type.is_json())
            }
        }
    }
}

fn sources(select: &SelectStatement) -> impl Iterator<Item = &TableRef> {
    select
        .from
        .iter()
        .chain(select.joins.iter().map(|join| &join.table))
}
