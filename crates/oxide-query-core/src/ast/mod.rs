//! Abstract Syntax Tree (AST) types for compiled query plans.

mod expression;
mod statement;
mod types;

pub use expression::{BinaryOp, Expr, FunctionCall, UnaryOp};
pub use statement::{
    CreateTableStatement, Cte, Distinct, DropTableStatement, InsertStatement, JoinClause,
    JoinType, NullOrdering, OrderBy, OrderDirection, Query, QueryBody, SelectColumn,
    SelectStatement, SetOperator, Statement, TableRef,
};
pub use types::{ColumnDef, DataType};
