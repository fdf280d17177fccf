#![allow(dead_code)]

use oxide_query::{
    Catalog, CompileError, CompiledQuery, FunctionRegistry, ParamType, QueryCompiler,
    RelationSchema, Resolver, ResolverArgs, ResolverError, ResolverParameter, TempRelation,
};
use oxide_query_core::ast::{ColumnDef, DataType, Query};
use oxide_query_core::builder::{col, Select};
use oxide_query_core::dialect::GenericDialect;
use oxide_query_core::SqlValue;

/// Role hierarchy as (id, parent id) pairs.
pub const ROLES: &[(i64, Option<i64>)] = &[(1, None), (2, Some(1)), (3, Some(1)), (4, Some(2))];

/// Expands a role into itself and all of its descendants, with their depth.
#[derive(Debug, Default)]
pub struct RecursiveRoles;

impl Resolver for RecursiveRoles {
    fn name(&self) -> &str {
        "RecursiveRoles"
    }

    fn parameters(&self) -> Vec<ResolverParameter> {
        vec![
            ResolverParameter::new("role_id", ParamType::Integer)
                .optional()
                .default_value(1_i64),
        ]
    }

    fn columns(&self) -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("role_id", DataType::Integer),
            ColumnDef::new("depth", DataType::Integer),
        ]
    }

    fn produce_rows(&mut self, args: &ResolverArgs) -> Result<Vec<Vec<SqlValue>>, ResolverError> {
        let root = args
            .int("role_id")
            .ok_or_else(|| ResolverError::RowProduction(String::from("role_id is NULL")))?;
        let mut rows = Vec::new();
        let mut frontier = vec![(root, 0_i64)];
        while let Some((id, depth)) = frontier.pop() {
            rows.push(vec![SqlValue::Int(id), SqlValue::Int(depth)]);
            frontier.extend(
                ROLES
                    .iter()
                    .filter(|(_, parent)| *parent == Some(id))
                    .map(|(child, _)| (*child, depth + 1)),
            );
        }
        Ok(rows)
    }

    fn query(&self, relation: &TempRelation, _args: &ResolverArgs) -> Result<Query, ResolverError> {
        Ok(Select::new()
            .columns(&["role_id", "depth"])
            .from(relation.name())
            .build())
    }
}

/// Emits the integers from 1 to `x`.
#[derive(Debug, Default)]
pub struct Foo;

impl Resolver for Foo {
    fn name(&self) -> &str {
        "Foo"
    }

    fn parameters(&self) -> Vec<ResolverParameter> {
        vec![ResolverParameter::new("x", ParamType::Integer)]
    }

    fn columns(&self) -> Vec<ColumnDef> {
        vec![ColumnDef::new("value", DataType::Integer)]
    }

    fn produce_rows(&mut self, args: &ResolverArgs) -> Result<Vec<Vec<SqlValue>>, ResolverError> {
        let upto = args.int("x").unwrap_or(0);
        Ok((1..=upto).map(|n| vec![SqlValue::Int(n)]).collect())
    }

    fn query(&self, relation: &TempRelation, args: &ResolverArgs) -> Result<Query, ResolverError> {
        let upto = args.int("x").unwrap_or(0);
        Ok(Select::new()
            .columns(&["value"])
            .from(relation.name())
            .where_clause(col("value").lt_eq(upto))
            .build())
    }
}

pub fn catalog() -> Catalog {
    Catalog::new()
        .relation(
            RelationSchema::new("User", "user_account")
                .column("id", DataType::Integer)
                .column("date_create", DataType::Timestamp)
                .column("name", DataType::Text)
                .nullable_column("fullname", DataType::Text)
                .nullable_column("account_balance", DataType::Numeric {
                    precision: None,
                    scale: None,
                })
                .nullable_column("account_details", DataType::Json),
        )
        .relation(
            RelationSchema::new("Address", "address")
                .column("id", DataType::Integer)
                .column("email_address", DataType::Text)
                .column("user_id", DataType::Integer),
        )
        .relation(
            RelationSchema::new("Role", "role")
                .column("id", DataType::Integer)
                .column("name", DataType::Text)
                .nullable_column("parent_role_id", DataType::Integer),
        )
        .relation(
            RelationSchema::new("Reservation", "reservation")
                .column("id", DataType::Integer)
                .column("date_time_start", DataType::Timestamp)
                .column("date_time_end", DataType::Timestamp)
                .column("resource_id", DataType::Integer),
        )
        .with_resolver::<RecursiveRoles>()
        .with_resolver::<Foo>()
}

pub fn compile(json: &str) -> Result<CompiledQuery, CompileError> {
    let catalog = catalog();
    let functions = FunctionRegistry::standard();
    QueryCompiler::new(&catalog, &functions).compile_json(json)
}

/// Compiles a document and renders it with inline literals.
pub fn sql(json: &str) -> String {
    compile(json)
        .unwrap_or_else(|e| panic!("Failed to compile: {json}\nError: {e}"))
        .to_sql_inline(&GenericDialect::new())
}

pub fn compile_err(json: &str) -> CompileError {
    compile(json).expect_err(&format!("Expected compile error for: {json}"))
}
