//! SELECT builder using the typestate pattern.
//!
//! Resolver query hooks use this to describe the query over their backing
//! relation. `build()` is only available once both columns and FROM are set.

use std::marker::PhantomData;

use crate::ast::{
    Distinct, Expr, JoinClause, JoinType, OrderBy, Query, SelectColumn, SelectStatement, TableRef,
};

// Typestate markers (zero-sized types)

/// Marker: No columns specified yet.
pub struct NoColumns;
/// Marker: Columns have been specified.
pub struct HasColumns;
/// Marker: No FROM clause specified yet.
pub struct NoFrom;
/// Marker: FROM clause has been specified.
pub struct HasFrom;

/// A SELECT builder producing a [`Query`].
pub struct Select<Cols, From> {
    statement: SelectStatement,
    _state: PhantomData<(Cols, From)>,
}

impl Select<NoColumns, NoFrom> {
    /// Creates a new SELECT builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            statement: SelectStatement::new(),
            _state: PhantomData,
        }
    }
}

impl Default for Select<NoColumns, NoFrom> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Cols, From> Select<Cols, From> {
    fn transition<C, F>(self) -> Select<C, F> {
        Select {
            statement: self.statement,
            _state: PhantomData,
        }
    }
}

// Transition: NoColumns -> HasColumns
impl<From> Select<NoColumns, From> {
    /// Selects unqualified columns by name.
    #[must_use]
    pub fn columns(mut self, cols: &[&str]) -> Select<HasColumns, From> {
        self.statement
            .columns
            .extend(cols.iter().map(|c| SelectColumn::new(Expr::column(*c))));
        self.transition()
    }

    /// Selects arbitrary expressions, each with an optional alias.
    #[must_use]
    pub fn exprs(mut self, exprs: Vec<(Expr, Option<&str>)>) -> Select<HasColumns, From> {
        self.statement
            .columns
            .extend(exprs.into_iter().map(|(expr, alias)| SelectColumn {
                expr,
                alias: alias.map(String::from),
            }));
        self.transition()
    }

    /// Selects all columns (*).
    #[must_use]
    pub fn all(mut self) -> Select<HasColumns, From> {
        self.statement
            .columns
            .push(SelectColumn::new(Expr::Wildcard { table: None }));
        self.transition()
    }
}

// Transition: NoFrom -> HasFrom
impl<Cols> Select<Cols, NoFrom> {
    /// Specifies the table to select from.
    #[must_use]
    pub fn from(mut self, table: &str) -> Select<Cols, HasFrom> {
        self.statement.from.push(TableRef::table(table));
        self.transition()
    }

    /// Specifies a derived table to select from.
    #[must_use]
    pub fn from_subquery(mut self, query: Query, alias: &str) -> Select<Cols, HasFrom> {
        self.statement.from.push(TableRef::subquery(query, alias));
        self.transition()
    }
}

// Methods available after FROM
impl<Cols> Select<Cols, HasFrom> {
    /// Adds a WHERE clause, ANDed with any previous one.
    #[must_use]
    pub fn where_clause(mut self, expr: Expr) -> Self {
        self.statement.where_clause = match self.statement.where_clause.take() {
            Some(existing) => Some(existing.and(expr)),
            None => Some(expr),
        };
        self
    }

    /// Adds an INNER JOIN.
    #[must_use]
    pub fn join(mut self, table: &str, on: Expr) -> Self {
        self.statement.joins.push(JoinClause {
            join_type: JoinType::Inner,
            table: TableRef::table(table),
            on: Some(on),
        });
        self
    }

    /// Adds a LEFT JOIN.
    #[must_use]
    pub fn left_join(mut self, table: &str, on: Expr) -> Self {
        self.statement.joins.push(JoinClause {
            join_type: JoinType::Left,
            table: TableRef::table(table),
            on: Some(on),
        });
        self
    }
}

// Methods available with columns
impl<From> Select<HasColumns, From> {
    /// Sets DISTINCT.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.statement.distinct = Some(Distinct::Rows);
        self
    }
}

impl Select<HasColumns, HasFrom> {
    /// Adds GROUP BY columns.
    #[must_use]
    pub fn group_by(mut self, cols: &[&str]) -> Self {
        self.statement
            .group_by
            .extend(cols.iter().map(|c| Expr::column(*c)));
        self
    }

    /// Adds a HAVING clause.
    #[must_use]
    pub fn having(mut self, expr: Expr) -> Self {
        self.statement.having = Some(expr);
        self
    }

    /// Adds an ORDER BY entry. Sort keys built with `desc()` keep their
    /// direction.
    #[must_use]
    pub fn order_by(mut self, expr: Expr) -> Self {
        self.statement.order_by.push(expr.into_order_by());
        self
    }

    /// Adds a prepared ORDER BY entry.
    #[must_use]
    pub fn order_by_entry(mut self, order: OrderBy) -> Self {
        self.statement.order_by.push(order);
        self
    }

    /// Adds a LIMIT clause.
    #[must_use]
    pub const fn limit(mut self, n: u64) -> Self {
        self.statement.limit = Some(n);
        self
    }

    /// Adds an OFFSET clause.
    #[must_use]
    pub const fn offset(mut self, n: u64) -> Self {
        self.statement.offset = Some(n);
        self
    }

    /// Builds the query.
    #[must_use]
    pub fn build(self) -> Query {
        Query::select(self.statement)
    }
}
