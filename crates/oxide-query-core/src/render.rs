//! SQL rendering with parameter collection.
//!
//! [`SqlWriter`] walks the AST and produces SQL text for a given dialect.
//! In parameterized mode every non-keyword literal becomes a placeholder and
//! its value is collected in order. In inline mode literals are escaped into
//! the text, which is only meant for debug output.

use core::fmt;

use crate::ast::{
    BinaryOp, ColumnDef, CreateTableStatement, Cte, Distinct, DropTableStatement, Expr,
    FunctionCall, InsertStatement, JoinClause, OrderBy, Query, QueryBody, SelectColumn,
    SelectStatement, Statement, TableRef, UnaryOp,
};
use crate::dialect::{Dialect, GenericDialect};
use crate::value::SqlValue;

/// Accumulates SQL text and bound parameters.
pub struct SqlWriter<'d> {
    dialect: &'d dyn Dialect,
    inline: bool,
    sql: String,
    params: Vec<SqlValue>,
}

impl<'d> SqlWriter<'d> {
    /// Creates a writer producing parameterized SQL.
    #[must_use]
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            inline: false,
            sql: String::new(),
            params: vec![],
        }
    }

    /// Creates a writer producing SQL with escaped inline literals.
    #[must_use]
    pub fn inline(dialect: &'d dyn Dialect) -> Self {
        Self {
            inline: true,
            ..Self::new(dialect)
        }
    }

    /// Returns the SQL text and the collected parameters.
    #[must_use]
    pub fn finish(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.params)
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn ident(&mut self, name: &str) {
        let quoted = self.dialect.quote_identifier(name);
        self.sql.push_str(&quoted);
    }

    fn value(&mut self, value: &SqlValue) {
        match value {
            // Keywords, never bound.
            SqlValue::Null | SqlValue::Bool(_) => self.push(&value.to_sql_inline()),
            _ if self.inline => self.push(&value.to_sql_inline()),
            _ => {
                self.params.push(value.clone());
                let placeholder = self.dialect.placeholder(self.params.len());
                self.push(&placeholder);
            }
        }
    }

    fn comma_separated<T>(&mut self, items: &[T], mut write: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            write(self, item);
        }
    }

    /// Writes any statement.
    pub fn write_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Query(query) => self.write_query(query),
            Statement::CreateTable(create) => self.write_create_table(create),
            Statement::Insert(insert) => self.write_insert(insert),
            Statement::DropTable(drop) => self.write_drop_table(drop),
        }
    }

    /// Writes a query with its WITH list.
    pub fn write_query(&mut self, query: &Query) {
        if !query.with.is_empty() {
            self.push("WITH ");
            if query.with.iter().any(|cte| cte.recursive) {
                self.push("RECURSIVE ");
            }
            self.comma_separated(&query.with, Self::write_cte);
            self.push(" ");
        }
        match &query.body {
            QueryBody::Select(select) => self.write_select(select),
            QueryBody::SetOperation { left, op, right } => {
                self.write_set_operand(left, false);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.write_set_operand(right, true);
            }
        }
    }

    fn write_cte(&mut self, cte: &Cte) {
        self.ident(&cte.name);
        self.push(" AS (");
        self.write_query(&cte.query);
        self.push(")");
    }

    fn write_set_operand(&mut self, query: &Query, right_side: bool) {
        let needs_parens = !query.with.is_empty()
            || match &query.body {
                QueryBody::Select(select) => {
                    !select.order_by.is_empty() || select.limit.is_some() || select.offset.is_some()
                }
                QueryBody::SetOperation { .. } => right_side,
            };
        if !needs_parens {
            self.write_query(query);
        } else if self.dialect.parenthesized_set_operands() {
            self.push("(");
            self.write_query(query);
            self.push(")");
        } else {
            self.push("SELECT * FROM (");
            self.write_query(query);
            self.push(")");
        }
    }

    /// Writes a SELECT statement.
    pub fn write_select(&mut self, select: &SelectStatement) {
        self.push("SELECT ");
        match &select.distinct {
            Some(Distinct::Rows) => self.push("DISTINCT "),
            Some(Distinct::On(_)) if !self.dialect.supports_distinct_on() => {
                self.push("DISTINCT ");
            }
            Some(Distinct::On(exprs)) => {
                self.push("DISTINCT ON (");
                self.comma_separated(exprs, Self::write_expr);
                self.push(") ");
            }
            None => {}
        }

        if select.columns.is_empty() {
            self.push("*");
        } else {
            self.comma_separated(&select.columns, Self::write_select_column);
        }

        if let Some((first, rest)) = select.from.split_first() {
            self.push(" FROM ");
            self.write_table_ref(first);
            for join in &select.joins {
                self.write_join(join);
            }
            for table in rest {
                self.push(", ");
                self.write_table_ref(table);
            }
        }

        if let Some(where_clause) = &select.where_clause {
            self.push(" WHERE ");
            self.write_expr(where_clause);
        }

        if !select.group_by.is_empty() {
            self.push(" GROUP BY ");
            self.comma_separated(&select.group_by, Self::write_expr);
        }

        if let Some(having) = &select.having {
            self.push(" HAVING ");
            self.write_expr(having);
        }

        if !select.order_by.is_empty() {
            self.push(" ORDER BY ");
            self.comma_separated(&select.order_by, Self::write_order_by);
        }

        match (select.limit, self.dialect.limit_for_bare_offset()) {
            (Some(limit), _) => self.push(&format!(" LIMIT {limit}")),
            (None, Some(unbounded)) if select.offset.is_some() => {
                self.push(" LIMIT ");
                self.push(unbounded);
            }
            _ => {}
        }
        if let Some(offset) = select.offset {
            self.push(&format!(" OFFSET {offset}"));
        }
    }

    fn write_select_column(&mut self, column: &SelectColumn) {
        self.write_expr(&column.expr);
        if let Some(alias) = &column.alias {
            self.push(" AS ");
            self.ident(alias);
        }
    }

    fn write_table_ref(&mut self, table: &TableRef) {
        match table {
            TableRef::Table { name, alias } => {
                self.ident(name);
                if let Some(alias) = alias {
                    self.push(" AS ");
                    self.ident(alias);
                }
            }
            TableRef::Subquery { query, alias } => {
                self.push("(");
                self.write_query(query);
                self.push(") AS ");
                self.ident(alias);
            }
        }
    }

    fn write_join(&mut self, join: &JoinClause) {
        self.push(" ");
        self.push(join.join_type.as_str());
        self.push(" ");
        self.write_table_ref(&join.table);
        if let Some(on) = &join.on {
            self.push(" ON ");
            self.write_expr(on);
        }
    }

    fn write_order_by(&mut self, order: &OrderBy) {
        self.write_expr(&order.expr);
        self.push(" ");
        self.push(order.direction.as_str());
        if let Some(nulls) = order.nulls {
            self.push(" ");
            self.push(nulls.as_str());
        }
    }

    /// Writes an expression.
    pub fn write_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(value) => self.value(value),
            Expr::Column { table, name } => {
                if let Some(table) = table {
                    self.ident(table);
                    self.push(".");
                }
                self.ident(name);
            }
            Expr::Binary { left, op, right } => {
                self.write_operand(left, *op, false);
                self.push(" ");
                self.push(self.dialect.binary_operator(*op));
                self.push(" ");
                self.write_operand(right, *op, true);
            }
            Expr::Unary { op, operand } => {
                match op {
                    UnaryOp::Not => self.push("NOT "),
                    UnaryOp::Neg => self.push(op.as_str()),
                }
                if matches!(**operand, Expr::Binary { .. }) {
                    self.push("(");
                    self.write_expr(operand);
                    self.push(")");
                } else {
                    self.write_expr(operand);
                }
            }
            Expr::Function(call) => self.write_function(call),
            Expr::Window {
                function,
                partition_by,
                order_by,
            } => {
                self.write_expr(function);
                self.push(" OVER (");
                if !partition_by.is_empty() {
                    self.push("PARTITION BY ");
                    self.comma_separated(partition_by, Self::write_expr);
                    if !order_by.is_empty() {
                        self.push(" ");
                    }
                }
                if !order_by.is_empty() {
                    self.push("ORDER BY ");
                    self.comma_separated(order_by, Self::write_order_by);
                }
                self.push(")");
            }
            Expr::Case {
                when_clauses,
                else_clause,
            } => {
                self.push("CASE");
                for (condition, result) in when_clauses {
                    self.push(" WHEN ");
                    self.write_expr(condition);
                    self.push(" THEN ");
                    self.write_expr(result);
                }
                if let Some(else_clause) = else_clause {
                    self.push(" ELSE ");
                    self.write_expr(else_clause);
                }
                self.push(" END");
            }
            Expr::Cast { expr, data_type } => {
                self.push("CAST(");
                self.write_expr(expr);
                self.push(" AS ");
                let mapped = self.dialect.map_data_type(data_type);
                self.push(&mapped);
                self.push(")");
            }
            Expr::Index { expr, key } => {
                self.write_expr(expr);
                match self.dialect.element_access_operator() {
                    Some(op) => {
                        self.push(" ");
                        self.push(op);
                        self.push(" ");
                        self.push(&key.to_sql_inline());
                    }
                    None => {
                        self.push("[");
                        self.push(&key.to_sql_inline());
                        self.push("]");
                    }
                }
            }
            Expr::Ordered(order) => self.write_order_by(order),
            Expr::Distinct(inner) => {
                self.push("DISTINCT ");
                self.write_expr(inner);
            }
            Expr::Labeled { expr, .. } => self.write_expr(expr),
            Expr::Exists { query, negated } => {
                if *negated {
                    self.push("NOT ");
                }
                self.push("EXISTS (");
                self.write_query(query);
                self.push(")");
            }
            Expr::Subquery(query) => {
                self.push("(");
                self.write_query(query);
                self.push(")");
            }
            Expr::Paren(inner) => {
                self.push("(");
                self.write_expr(inner);
                self.push(")");
            }
            Expr::Wildcard { table } => {
                if let Some(table) = table {
                    self.ident(table);
                    self.push(".");
                }
                self.push("*");
            }
        }
    }

    fn write_operand(&mut self, expr: &Expr, parent: BinaryOp, right_side: bool) {
        let needs_parens = match expr {
            Expr::Binary { op, .. } => {
                op.precedence() < parent.precedence()
                    || (right_side
                        && op.precedence() == parent.precedence()
                        && !(*op == parent
                            && matches!(
                                op,
                                BinaryOp::And | BinaryOp::Or | BinaryOp::Add | BinaryOp::Mul
                            )))
            }
            _ => false,
        };
        if needs_parens {
            self.push("(");
            self.write_expr(expr);
            self.push(")");
        } else {
            self.write_expr(expr);
        }
    }

    fn write_function(&mut self, call: &FunctionCall) {
        self.push(&call.name);
        self.push("(");
        if call.distinct {
            self.push("DISTINCT ");
        }
        self.comma_separated(&call.args, Self::write_expr);
        if !call.order_by.is_empty() {
            self.push(" ORDER BY ");
            self.comma_separated(&call.order_by, Self::write_order_by);
        }
        self.push(")");
        if let Some(filter) = &call.filter {
            self.push(" FILTER (WHERE ");
            self.write_expr(filter);
            self.push(")");
        }
    }

    fn write_column_def(&mut self, column: &ColumnDef) {
        self.ident(&column.name);
        self.push(" ");
        let mapped = self.dialect.map_data_type(&column.data_type);
        self.push(&mapped);
        if !column.nullable {
            self.push(" NOT NULL");
        }
        if column.primary_key {
            self.push(" PRIMARY KEY");
        }
    }

    /// Writes a CREATE TABLE statement.
    pub fn write_create_table(&mut self, create: &CreateTableStatement) {
        self.push("CREATE ");
        if create.temporary {
            self.push(self.dialect.temporary_keyword());
            self.push(" ");
        }
        self.push("TABLE ");
        if create.if_not_exists {
            self.push("IF NOT EXISTS ");
        }
        self.ident(&create.name);
        self.push(" (");
        self.comma_separated(&create.columns, Self::write_column_def);
        self.push(")");
    }

    /// Writes a multi-row INSERT statement.
    pub fn write_insert(&mut self, insert: &InsertStatement) {
        self.push("INSERT INTO ");
        self.ident(&insert.table);
        self.push(" (");
        self.comma_separated(&insert.columns, |w, c| w.ident(c));
        self.push(") VALUES ");
        self.comma_separated(&insert.rows, |w, row| {
            w.push("(");
            w.comma_separated(row, Self::write_expr);
            w.push(")");
        });
    }

    /// Writes a DROP TABLE statement.
    pub fn write_drop_table(&mut self, drop: &DropTableStatement) {
        self.push("DROP TABLE ");
        if drop.if_exists {
            self.push("IF EXISTS ");
        }
        self.ident(&drop.name);
    }
}

macro_rules! impl_rendering {
    ($ty:ty, $method:ident) => {
        impl $ty {
            /// Renders parameterized SQL for `dialect`.
            #[must_use]
            pub fn to_sql(&self, dialect: &dyn Dialect) -> (String, Vec<SqlValue>) {
                let mut writer = SqlWriter::new(dialect);
                writer.$method(self);
                writer.finish()
            }

            /// Renders SQL with escaped inline literals, for debugging.
            #[must_use]
            pub fn to_sql_inline(&self, dialect: &dyn Dialect) -> String {
                let mut writer = SqlWriter::inline(dialect);
                writer.$method(self);
                writer.finish().0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_sql_inline(&GenericDialect::new()))
            }
        }
    };
}

impl_rendering!(Statement, write_statement);
impl_rendering!(Query, write_query);
impl_rendering!(Expr, write_expr);
