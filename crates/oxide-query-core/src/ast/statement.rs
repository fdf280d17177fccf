//! Query and statement AST types.

use super::expression::Expr;
use super::types::ColumnDef;

/// Order direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Ascending order (default).
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl OrderDirection {
    /// Returns the SQL representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Null ordering for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrdering {
    /// NULLs come first.
    First,
    /// NULLs come last.
    Last,
}

impl NullOrdering {
    /// Returns the SQL representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::First => "NULLS FIRST",
            Self::Last => "NULLS LAST",
        }
    }
}

/// An ORDER BY clause entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// The expression to order by.
    pub expr: Expr,
    /// The direction (ASC or DESC).
    pub direction: OrderDirection,
    /// Null ordering (optional).
    pub nulls: Option<NullOrdering>,
}

impl OrderBy {
    /// Creates an ascending entry without explicit null ordering.
    #[must_use]
    pub const fn new(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Asc,
            nulls: None,
        }
    }

    /// Sets the direction.
    #[must_use]
    pub const fn direction(mut self, direction: OrderDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the null ordering.
    #[must_use]
    pub const fn nulls(mut self, nulls: NullOrdering) -> Self {
        self.nulls = Some(nulls);
        self
    }
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// INNER JOIN.
    Inner,
    /// LEFT OUTER JOIN.
    Left,
    /// CROSS JOIN.
    Cross,
}

impl JoinType {
    /// Returns the SQL representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "JOIN",
            Self::Left => "LEFT JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// The type of join.
    pub join_type: JoinType,
    /// The joined relation.
    pub table: TableRef,
    /// The join condition (for non-CROSS joins).
    pub on: Option<Expr>,
}

/// A relation reference in a FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// A table, temporary table or CTE name.
    Table {
        /// Table name.
        name: String,
        /// Alias.
        alias: Option<String>,
    },
    /// A derived table.
    Subquery {
        /// The subquery.
        query: Box<Query>,
        /// Alias (required for subqueries).
        alias: String,
    },
}

impl TableRef {
    /// Creates a simple table reference.
    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        Self::Table {
            name: name.into(),
            alias: None,
        }
    }

    /// Creates an aliased derived table.
    #[must_use]
    pub fn subquery(query: Query, alias: impl Into<String>) -> Self {
        Self::Subquery {
            query: Box::new(query),
            alias: alias.into(),
        }
    }

    /// Adds an alias to this table reference.
    #[must_use]
    pub fn alias(self, alias: impl Into<String>) -> Self {
        match self {
            Self::Table { name, .. } => Self::Table {
                name,
                alias: Some(alias.into()),
            },
            Self::Subquery { query, .. } => Self::Subquery {
                query,
                alias: alias.into(),
            },
        }
    }

    /// Returns the name column references use to qualify this relation.
    #[must_use]
    pub fn qualifier(&self) -> &str {
        match self {
            Self::Table {
                alias: Some(alias), ..
            } => alias,
            Self::Table { name, .. } => name,
            Self::Subquery { alias, .. } => alias,
        }
    }
}

/// DISTINCT mode of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub enum Distinct {
    /// `SELECT DISTINCT`.
    Rows,
    /// `SELECT DISTINCT ON (...)`.
    On(Vec<Expr>),
}

/// A column in SELECT clause.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    /// The expression.
    pub expr: Expr,
    /// Column alias.
    pub alias: Option<String>,
}

impl SelectColumn {
    /// Creates a new select column.
    #[must_use]
    pub const fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    /// Creates a select column with an alias.
    #[must_use]
    pub fn with_alias(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    /// Returns the name the column has in the result set, if known.
    #[must_use]
    pub fn output_name(&self) -> Option<&str> {
        match (&self.alias, &self.expr) {
            (Some(alias), _) => Some(alias),
            (None, Expr::Column { name, .. }) => Some(name),
            _ => None,
        }
    }
}

/// A SELECT statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    /// DISTINCT mode.
    pub distinct: Option<Distinct>,
    /// The columns to select.
    pub columns: Vec<SelectColumn>,
    /// The FROM list.
    pub from: Vec<TableRef>,
    /// Joins, attached to the first FROM entry.
    pub joins: Vec<JoinClause>,
    /// The WHERE clause.
    pub where_clause: Option<Expr>,
    /// GROUP BY expressions.
    pub group_by: Vec<Expr>,
    /// HAVING clause.
    pub having: Option<Expr>,
    /// ORDER BY clauses.
    pub order_by: Vec<OrderBy>,
    /// LIMIT clause.
    pub limit: Option<u64>,
    /// OFFSET clause.
    pub offset: Option<u64>,
}

impl SelectStatement {
    /// Creates an empty SELECT.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a FROM entry unless an equal entry is already present.
    pub fn add_from(&mut self, table: TableRef) {
        if !self.from.contains(&table) {
            self.from.push(table);
        }
    }
}

/// A common table expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    /// The CTE name.
    pub name: String,
    /// Whether the CTE is recursive.
    pub recursive: bool,
    /// The defining query.
    pub query: Box<Query>,
}

/// Set operators combining two queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    /// UNION (duplicates removed).
    Union,
    /// UNION ALL.
    UnionAll,
}

impl SetOperator {
    /// Returns the SQL representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::UnionAll => "UNION ALL",
        }
    }
}

/// The body of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    /// A single SELECT.
    Select(Box<SelectStatement>),
    /// A set operation over two queries.
    SetOperation {
        /// Left operand.
        left: Box<Query>,
        /// Operator.
        op: SetOperator,
        /// Right operand.
        right: Box<Query>,
    },
}

/// A complete query: optional WITH list followed by a body.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Common table expressions, rendered as one WITH list.
    pub with: Vec<Cte>,
    /// The query body.
    pub body: QueryBody,
}

impl Query {
    /// Wraps a SELECT into a query without CTEs.
    #[must_use]
    pub fn select(select: SelectStatement) -> Self {
        Self {
            with: vec![],
            body: QueryBody::Select(Box::new(select)),
        }
    }

    /// Combines two queries with a set operator.
    #[must_use]
    pub fn set_operation(left: Self, op: SetOperator, right: Self) -> Self {
        Self {
            with: vec![],
            body: QueryBody::SetOperation {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
        }
    }

    /// Adds a CTE definition unless one with the same name is present.
    pub fn add_cte(&mut self, cte: Cte) {
        if !self.with.iter().any(|c| c.name == cte.name) {
            self.with.push(cte);
        }
    }

    /// Returns the SELECT body, if the query is not a set operation.
    #[must_use]
    pub fn as_select(&self) -> Option<&SelectStatement> {
        match &self.body {
            QueryBody::Select(select) => Some(select),
            QueryBody::SetOperation { .. } => None,
        }
    }

    /// Returns the names of the result columns, following the left operand
    /// of set operations.
    #[must_use]
    pub fn output_columns(&self) -> Vec<String> {
        match &self.body {
            QueryBody::Select(select) => select
                .columns
                .iter()
                .filter_map(SelectColumn::output_name)
                .map(String::from)
                .collect(),
            QueryBody::SetOperation { left, .. } => left.output_columns(),
        }
    }
}

/// CREATE TABLE statement, used for resolver backing relations.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    /// Table name.
    pub name: String,
    /// Whether the table is temporary.
    pub temporary: bool,
    /// Whether to add IF NOT EXISTS.
    pub if_not_exists: bool,
    /// Column definitions.
    pub columns: Vec<ColumnDef>,
}

/// Multi-row INSERT ... VALUES statement.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    /// Table name.
    pub table: String,
    /// Column names.
    pub columns: Vec<String>,
    /// Rows of values.
    pub rows: Vec<Vec<Expr>>,
}

/// DROP TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    /// Table name.
    pub name: String,
    /// Whether to add IF EXISTS.
    pub if_exists: bool,
}

/// A SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A query.
    Query(Query),
    /// CREATE TABLE.
    CreateTable(CreateTableStatement),
    /// INSERT.
    Insert(InsertStatement),
    /// DROP TABLE.
    DropTable(DropTableStatement),
}
