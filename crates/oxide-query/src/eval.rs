//! Snippet evaluation.
//!
//! Evaluation is a structural recursion over the four supported node kinds.
//! Identifiers resolve against the context (functions, types and derived
//! relations), then catalog relations, then the columns of the relation the
//! snippet appears under. Anything else a snippet can spell is rejected.

use oxide_query_core::snippet::{self, Node, NodeKind};
use tracing::debug;

use crate::context::{CompilationContext, RelationRef};
use crate::error::{CompileError, Result};
use crate::functions::{call_type, Binding, Method};
use crate::operand::{Operand, Resolved};

/// Parses and evaluates a snippet.
///
/// # Errors
///
/// Returns `Snippet` for syntax errors and the evaluation errors of
/// [`evaluate`].
pub fn evaluate_snippet(
    text: &str,
    ctx: &mut CompilationContext<'_>,
    current: Option<&RelationRef>,
) -> Result<Operand> {
    let node = snippet::parse(text).map_err(|source| CompileError::Snippet {
        snippet: String::from(text),
        source,
    })?;
    let operand = evaluate(&node, text, ctx, current)?;
    debug!(snippet = text, result = operand.describe(), "Evaluated snippet");
    Ok(operand)
}

/// Evaluates a parsed snippet node.
///
/// # Errors
///
/// Returns `UnresolvedIdentifier`, `UnknownAttribute`, `UnknownColumn`,
/// `InvalidCall`, `NotAValue` or `UnsupportedExpressionNode`.
pub fn evaluate(
    node: &Node,
    text: &str,
    ctx: &mut CompilationContext<'_>,
    current: Option<&RelationRef>,
) -> Result<Operand> {
    match &node.kind {
        NodeKind::Literal(value) => Ok(Operand::Literal(value.clone())),
        NodeKind::Name(name) => resolve_name(name, text, ctx, current),
        NodeKind::Call {
            callee,
            args,
            keywords,
        } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, text, ctx, current))
                .collect::<Result<Vec<_>>>()?;
            let keywords = keywords
                .iter()
                .map(|kw| Ok((kw.name.clone(), evaluate(&kw.value, text, ctx, current)?)))
                .collect::<Result<Vec<_>>>()?;
            let callee = evaluate(callee, text, ctx, current)?;
            call(callee, args, keywords, text)
        }
        NodeKind::Attribute { receiver, name } => {
            let receiver = evaluate(receiver, text, ctx, current)?;
            attribute(receiver, name, text, ctx)
        }
        NodeKind::Subscript { .. }
        | NodeKind::BinaryOp { .. }
        | NodeKind::UnaryOp { .. }
        | NodeKind::List(_) => Err(CompileError::UnsupportedExpressionNode {
            shape: node.shape(),
            snippet: String::from(text),
        }),
    }
}

fn resolve_name(
    name: &str,
    text: &str,
    ctx: &mut CompilationContext<'_>,
    current: Option<&RelationRef>,
) -> Result<Operand> {
    match ctx.functions().get(name) {
        Some(Binding::Function(function)) => {
            return Ok(Operand::Resolved(Resolved::Function(function.clone())))
        }
        Some(Binding::Type(data_type)) => {
            return Ok(Operand::Resolved(Resolved::Type(data_type.clone())))
        }
        None => {}
    }
    if let Some(relation) = ctx.lookup_relation(name) {
        return Ok(Operand::Resolved(Resolved::Relation(relation)));
    }
    if let Some(relation) = current {
        if relation.columns.iter().any(|c| c == name) {
            ctx.touch(&relation.source);
            return relation.column(name).map(Operand::ColumnRef);
        }
    }
    if name.eq_ignore_ascii_case("none") || name.eq_ignore_ascii_case("null") {
        return Ok(Operand::Literal(oxide_query_core::SqlValue::Null));
    }
    Err(CompileError::UnresolvedIdentifier {
        name: String::from(name),
        snippet: String::from(text),
    })
}

fn attribute(
    receiver: Operand,
    name: &str,
    text: &str,
    ctx: &mut CompilationContext<'_>,
) -> Result<Operand> {
    let unknown = || CompileError::UnknownAttribute {
        attribute: String::from(name),
        snippet: String::from(text),
    };
    match receiver {
        Operand::Resolved(Resolved::Relation(relation)) => {
            let column = relation.column(name)?;
            ctx.touch(&relation.source);
            Ok(Operand::ColumnRef(column))
        }
        Operand::Literal(_) | Operand::ColumnRef(_) | Operand::Expression(_) => {
            let method = Method::from_name(name).ok_or_else(unknown)?;
            let receiver = receiver.into_expr(text)?;
            Ok(Operand::Resolved(Resolved::Method { receiver, method }))
        }
        Operand::Resolved(_) => Err(unknown()),
    }
}

fn call(
    callee: Operand,
    args: Vec<Operand>,
    keywords: Vec<(String, Operand)>,
    text: &str,
) -> Result<Operand> {
    match callee {
        Operand::Resolved(Resolved::Function(function)) => function.call(args, keywords, text),
        Operand::Resolved(Resolved::Method { receiver, method }) => {
            method.apply(receiver, args, keywords, text)
        }
        Operand::Resolved(Resolved::Type(data_type)) if keywords.is_empty() => {
            call_type(&data_type, &args, text)
        }
        other => Err(CompileError::InvalidCall {
            callee: String::from(other.describe()),
            snippet: String::from(text),
            reason: String::from("value is not callable"),
        }),
    }
}
