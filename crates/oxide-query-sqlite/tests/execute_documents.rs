//! Documents executed end to end against an in-memory SQLite database.

mod common;
use common::*;

use oxide_query::{Catalog, CompileError, FunctionRegistry, QueryDocument};
use oxide_query_sqlite::{connect, ExecuteError, JsonRow, SqliteExecutor};
use serde_json::{json, Value};

fn column(rows: &[JsonRow], name: &str) -> Vec<Value> {
    rows.iter().map(|row| row[name].clone()).collect()
}

#[tokio::test]
async fn select_with_ordering_and_pagination() {
    let executor = executor().await;
    let rows = executor
        .execute_json(
            r#"{"select": {"User": {"name": {}}},
                "order_by": {"User.id": {"index": 0, "dir": "desc"}},
                "limit": 2}"#,
        )
        .await
        .unwrap();
    assert_eq!(column(&rows, "name"), vec![json!("carol"), json!("bob")]);
}

#[tokio::test]
async fn bare_offset_is_accepted() {
    let executor = executor().await;
    let rows = executor
        .execute_json(
            r#"{"select": {"User": {"id": {}}},
                "order_by": {"User.id": {"index": 0, "dir": "asc"}},
                "offset": 1}"#,
        )
        .await
        .unwrap();
    assert_eq!(column(&rows, "id"), vec![json!(2), json!(3)]);
}

#[tokio::test]
async fn null_filters_and_nested_or() {
    let executor = executor().await;
    let rows = executor
        .execute_json(
            r#"{"select": {"User": {"name": {}}},
                "where": {"or": [
                    {"User.fullname__EQ": null},
                    {"and": [{"User.account_balance__GT": 5}, {"User.name__LIKE": "a%"}]}
                ]},
                "order_by": {"User.id": {"index": 0, "dir": "asc"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(column(&rows, "name"), vec![json!("alice"), json!("bob")]);
}

#[tokio::test]
async fn regular_expression_filters() {
    let executor = executor().await;
    let matching = executor
        .execute_json(
            r#"{"select": {"User": {"name": {}}},
                "where": {"User.name__RE": "^(a|c)"},
                "order_by": {"User.id": {"index": 0, "dir": "asc"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(column(&matching, "name"), vec![json!("alice"), json!("carol")]);

    let others = executor
        .execute_json(
            r#"{"select": {"User": {"name": {}}}, "where": {"User.name__NOT_RE": "^(a|c)"}}"#,
        )
        .await
        .unwrap();
    assert_eq!(column(&others, "name"), vec![json!("bob")]);
}

#[tokio::test]
async fn joins_and_grouping() {
    let executor = executor().await;
    let rows = executor
        .execute_json(
            r#"{"select": {"User": {"name": {}, "count()": {"label": "addresses"}}},
                "joins": {"Address": {
                    "select": {},
                    "where": {"Address.user_id__EQ": "User.id"}
                }},
                "group_by": ["User.name"],
                "order_by": {"addresses": {"index": 0, "dir": "desc"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], json!("alice"));
    assert_eq!(rows[0]["addresses"], json!(2));
    assert_eq!(rows[1]["addresses"], json!(1));
}

#[tokio::test]
async fn subquery_feeds_outer_filter() {
    let executor = executor().await;
    let rows = executor
        .execute_json(
            r#"{"select": {"rich": {"name": {}}},
                "subqueries": {"rich": {
                    "select": {"User": {"name": {}, "account_balance": {}}},
                    "where": {"User.account_balance__GTE": 3}
                }},
                "where": {"rich.name__NE": "carol"}}"#,
        )
        .await
        .unwrap();
    assert_eq!(column(&rows, "name"), vec![json!("alice")]);
}

#[tokio::test]
async fn recursive_cte_walks_hierarchy() {
    let executor = executor().await;
    let rows = executor
        .execute_json(
            r#"{"select": {"role_tree": {"id": {}, "name": {}}},
                "union_all": {
                    "name": "role_tree",
                    "left": {"select": {"Role": {"id": {}, "name": {}}},
                             "where": {"Role.id__EQ": 2}},
                    "right": {"select": {"Role": {"id": {}, "name": {}}},
                              "where": {"Role.parent_role_id__EQ": "role_tree.id"}},
                    "cte": {"recursive": true, "name": "role_tree"}
                },
                "order_by": {"role_tree.id": {"index": 0, "dir": "asc"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(column(&rows, "name"), vec![json!("admin"), json!("moderator")]);
}

#[tokio::test]
async fn resolver_rows_are_queried_and_dropped() {
    let executor = executor().await;
    let rows = executor
        .execute_json(
            r#"{"select": {"Role": {"name": {}}, "RecursiveRoles()": {"depth": {}}},
                "where": {"Role.id__EQ": "RecursiveRoles.role_id"},
                "resolver_args": {"role_id": 2},
                "order_by": {"Role.id": {"index": 0, "dir": "asc"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(column(&rows, "name"), vec![json!("admin"), json!("moderator")]);
    assert_eq!(column(&rows, "depth"), vec![json!(0), json!(1)]);
    assert_eq!(temp_table_count(executor.pool()).await, 0);
}

#[tokio::test]
async fn resolver_args_differ_between_subqueries() {
    let executor = executor().await;
    let rows = executor
        .execute_json(
            r#"{"select": {"admins": {"role_id": {"label": "admin_role"}},
                           "editors": {"role_id": {"label": "editor_role"}}},
                "subqueries": {
                    "admins": {"select": {"RecursiveRoles()": {"role_id": {}}},
                               "resolver_args": {"role_id": 2}},
                    "editors": {"select": {"RecursiveRoles()": {"role_id": {}}},
                                "resolver_args": {"role_id": 3}}
                },
                "order_by": {"admins.role_id": {"index": 0, "dir": "asc"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(column(&rows, "admin_role"), vec![json!(2), json!(4)]);
    assert_eq!(column(&rows, "editor_role"), vec![json!(3), json!(3)]);
    assert_eq!(temp_table_count(executor.pool()).await, 0);
}

#[tokio::test]
async fn json_columns_come_back_as_documents() {
    let executor = executor().await;
    let rows = executor
        .execute_json(
            r#"{"select": {"User": {
                    "name": {},
                    "account_details": {},
                    "account_details['address'][0]": {"label": "first_address"}
                }},
                "order_by": {"User.id": {"index": 0, "dir": "asc"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(
        rows[0]["account_details"],
        json!({"address": ["1 Main St", "2 Side St"], "tier": "gold"})
    );
    assert_eq!(rows[0]["first_address"], json!("1 Main St"));
    assert_eq!(rows[1]["account_details"], Value::Null);
    assert_eq!(rows[2]["first_address"], Value::Null);
    assert_eq!(rows[2]["name"], json!("carol"));
}

#[tokio::test]
async fn resolver_relations_are_dropped_when_the_query_fails() {
    let pool = connect("sqlite::memory:").await.unwrap();
    seed(&pool).await;
    let catalog = Catalog::from_json(
        r#"{"relations": [{"name": "Ghost", "columns": [{"name": "id", "type": "INTEGER"}]}]}"#,
    )
    .unwrap()
    .with_resolver::<RecursiveRoles>();
    let executor = SqliteExecutor::new(pool, catalog, FunctionRegistry::standard());

    let result = executor
        .execute_json(r#"{"select": {"RecursiveRoles()": {"depth": {}}, "Ghost": {"id": {}}}}"#)
        .await;
    assert!(matches!(result, Err(ExecuteError::Database(_))));
    assert_eq!(temp_table_count(executor.pool()).await, 0);
}

#[tokio::test]
async fn compile_errors_touch_nothing() {
    let executor = executor().await;
    let result = executor
        .execute_json(r#"{"select": {"RecursiveRoles()": {}, "Ghost": {"id": {}}}}"#)
        .await;
    assert!(matches!(
        result,
        Err(ExecuteError::Compile(CompileError::UnknownRelation { .. }))
    ));
    assert_eq!(temp_table_count(executor.pool()).await, 0);
}

#[tokio::test]
async fn explain_uses_requested_debug_rendering() {
    let executor = executor().await;
    let plain = QueryDocument::from_json(
        r#"{"select": {"User": {"id": {}}}, "where": {"User.name__LT": "b"}}"#,
    )
    .unwrap();
    assert_eq!(
        executor.explain(&plain).unwrap(),
        "SELECT user_account.id FROM user_account WHERE user_account.name < 'b'"
    );

    let html = QueryDocument::from_json(
        r#"{"select": {"User": {"id": {}}}, "where": {"User.id__LT": 5}, "debug": "html"}"#,
    )
    .unwrap();
    let rendered = executor.explain(&html).unwrap();
    assert!(rendered.contains("user_account.id &lt; 5"), "{rendered}");
    assert!(rendered.contains("language-sql"), "{rendered}");
}

#[tokio::test]
async fn file_database_keeps_data_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("query.db").display());

    let pool = connect(&url).await.unwrap();
    seed(&pool).await;
    pool.close().await;

    let executor = SqliteExecutor::new(
        connect(&url).await.unwrap(),
        catalog(),
        FunctionRegistry::standard(),
    );
    let rows = executor
        .execute_json(
            r#"{"select": {"RecursiveRoles()": {"role_id": {}}},
                "order_by": {"RecursiveRoles.role_id": {"index": 0, "dir": "asc"}}}"#,
        )
        .await
        .unwrap();
    assert_eq!(
        column(&rows, "role_id"),
        vec![json!(1), json!(2), json!(3), json!(4)]
    );
}
