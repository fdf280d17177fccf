#![allow(dead_code)]

use oxide_query::{
    Catalog, FunctionRegistry, ParamType, Resolver, ResolverArgs, ResolverError,
    ResolverParameter, TempRelation,
};
use oxide_query_core::ast::{ColumnDef, DataType, Query};
use oxide_query_core::builder::Select;
use oxide_query_core::SqlValue;
use oxide_query_sqlite::{connect, SqliteExecutor};
use sqlx::SqlitePool;

pub const CATALOG: &str = r#"{
    "relations": [
        {"name": "User", "table": "user_account", "columns": [
            {"name": "id", "type": "INTEGER"},
            {"name": "date_create", "type": "TIMESTAMP"},
            {"name": "name", "type": "TEXT"},
            {"name": "fullname", "type": "TEXT", "nullable": true},
            {"name": "account_balance", "type": "REAL", "nullable": true},
            {"name": "account_details", "type": "JSON", "nullable": true}
        ]},
        {"name": "Address", "table": "address", "columns": [
            {"name": "id", "type": "INTEGER"},
            {"name": "email_address", "type": "TEXT"},
            {"name": "user_id", "type": "INTEGER"}
        ]},
        {"name": "Role", "columns": [
            {"name": "id", "type": "INTEGER"},
            {"name": "name", "type": "TEXT"},
            {"name": "parent_role_id", "type": "INTEGER", "nullable": true}
        ]}
    ]
}"#;

const SCHEMA: &[&str] = &[
    "CREATE TABLE user_account (
        id INTEGER PRIMARY KEY,
        date_create TEXT NOT NULL,
        name TEXT NOT NULL,
        fullname TEXT,
        account_balance REAL,
        account_details JSON
    )",
    "CREATE TABLE address (
        id INTEGER PRIMARY KEY,
        email_address TEXT NOT NULL,
        user_id INTEGER NOT NULL REFERENCES user_account(id)
    )",
    "CREATE TABLE role (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        parent_role_id INTEGER REFERENCES role(id)
    )",
    r#"INSERT INTO user_account VALUES
        (1, '2024-01-01 00:00:00', 'alice', 'Alice Archer', 10.5,
            '{"address": ["1 Main St", "2 Side St"], "tier": "gold"}'),
        (2, '2024-02-01 00:00:00', 'bob', NULL, NULL, NULL),
        (3, '2024-03-01 00:00:00', 'carol', 'Carol Cole', 3.0, '{"address": [], "tier": "basic"}')"#,
    "INSERT INTO address VALUES
        (1, 'alice@example.com', 1),
        (2, 'alice@work.example', 1),
        (3, 'carol@example.com', 3)",
    "INSERT INTO role VALUES
        (1, 'root', NULL),
        (2, 'admin', 1),
        (3, 'editor', 1),
        (4, 'moderator', 2)",
];

/// Role hierarchy as (id, parent id) pairs, mirroring the `role` table.
const ROLES: &[(i64, Option<i64>)] = &[(1, None), (2, Some(1)), (3, Some(1)), (4, Some(2))];

/// Expands a role into itself and its descendants, with their depth.
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

pub fn catalog() -> Catalog {
    Catalog::from_json(CATALOG)
        .expect("Failed to load catalog")
        .with_resolver::<RecursiveRoles>()
}

pub async fn seed(pool: &SqlitePool) {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .expect("Failed to seed database");
    }
}

pub async fn executor() -> SqliteExecutor {
    let pool = connect("sqlite::memory:").await.expect("Failed to connect");
    seed(&pool).await;
    SqliteExecutor::new(pool, catalog(), FunctionRegistry::standard())
}

/// Number of temporary tables left on the pool's connection.
pub async fn temp_table_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT count(*) FROM sqlite_temp_master WHERE type = 'table'")
        .fetch_one(pool)
        .await
        .expect("Failed to inspect temporary tables")
}
