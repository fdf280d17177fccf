//! Tests for the node shapes produced by realistic snippets.

mod common;
use common::*;

use oxide_query_core::snippet::NodeKind;
use oxide_query_core::SqlValue;

fn callee_name(node: &oxide_query_core::snippet::Node) -> String {
    match &node.kind {
        NodeKind::Call { callee, .. } => match &callee.kind {
            NodeKind::Name(name) => name.clone(),
            NodeKind::Attribute { name, .. } => name.clone(),
            other => panic!("Unexpected callee {other:?}"),
        },
        other => panic!("Expected call, got {other:?}"),
    }
}

#[test]
fn aggregate_with_nested_ordering() {
    let node = parse("array_agg(aggregate_order_by(User.id, coalesce(User.account_balance, 0).desc()))");
    assert_eq!(callee_name(&node), "array_agg");
    let NodeKind::Call { args, .. } = &node.kind else {
        panic!("Expected call");
    };
    assert_eq!(callee_name(&args[0]), "aggregate_order_by");
}

#[test]
fn dunder_method_with_cast() {
    let node = parse("User.date_create.__add__(cast('100 DAYS', INTERVAL))");
    assert_eq!(callee_name(&node), "__add__");
    let NodeKind::Call { args, .. } = &node.kind else {
        panic!("Expected call");
    };
    let NodeKind::Call { args: cast_args, .. } = &args[0].kind else {
        panic!("Expected cast call");
    };
    assert!(matches!(&cast_args[0].kind, NodeKind::Literal(SqlValue::Text(s)) if s == "100 DAYS"));
    assert!(matches!(&cast_args[1].kind, NodeKind::Name(n) if n == "INTERVAL"));
}

#[test]
fn label_with_string_argument() {
    let node = parse("count(Address.id).label('n_addresses')");
    assert_eq!(callee_name(&node), "label");
}

#[test]
fn window_with_keyword_ordering() {
    let node = parse("over(lag(Reservation.date_time_end), order_by=Reservation.resource_id.desc())");
    let NodeKind::Call { keywords, .. } = &node.kind else {
        panic!("Expected call");
    };
    assert_eq!(keywords[0].name, "order_by");
}

#[test]
fn null_spellings_are_names() {
    assert!(matches!(parse("None").kind, NodeKind::Name(ref n) if n == "None"));
    assert!(matches!(parse("null").kind, NodeKind::Name(ref n) if n == "null"));
}

#[test]
fn spans_cover_whole_call() {
    let node = parse("  count(x)  ");
    assert_eq!((node.span.start, node.span.end), (2, 10));
}
