//! Functions, types and methods available to expression snippets.
//!
//! A [`FunctionRegistry`] holds the names a snippet can call directly
//! (`coalesce(...)`, `count(...)`, `INTERVAL`). [`Method`]s are reached
//! through attribute access on a value (`User.id.desc()`).

use std::collections::BTreeMap;

use oxide_query_core::ast::{BinaryOp, DataType, Expr, FunctionCall, NullOrdering, OrderBy};
use oxide_query_core::SqlValue;

use crate::error::{CompileError, Result};
use crate::operand::{Operand, Resolved};

/// A callable binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Function {
    /// A SQL function rendered by name.
    Sql(String),
    /// `aggregate_order_by(target, key, ...)`: ordering inside an aggregate.
    AggregateOrderBy,
    /// `over(call, partition_by=..., order_by=...)`: window call.
    Over,
    /// `cast(value, TYPE)`.
    Cast,
    /// `func_filter(aggregate, predicate, ...)`: aggregate FILTER clause.
    Filter,
}

/// A name bound in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// A callable.
    Function(Function),
    /// A SQL type.
    Type(DataType),
}

/// Names snippets can call or reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRegistry {
    bindings: BTreeMap<String, Binding>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = Self {
            bindings: BTreeMap::new(),
        };
        registry.register("array_agg", Function::Sql(String::from("array_agg")));
        registry.register("coalesce", Function::Sql(String::from("coalesce")));
        registry
    }
}

const STANDARD_FUNCTIONS: &[&str] = &[
    "count",
    "sum",
    "avg",
    "min",
    "max",
    "lag",
    "lead",
    "row_number",
    "rank",
];

const STANDARD_TYPES: &[&str] = &[
    "INTERVAL", "INTEGER", "BIGINT", "SMALLINT", "REAL", "FLOAT", "NUMERIC", "TEXT", "VARCHAR",
    "DATE", "TIME", "TIMESTAMP", "BOOLEAN", "JSON",
];

impl FunctionRegistry {
    /// Creates a registry with the base bindings (`array_agg`, `coalesce`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the base bindings plus aggregates, window
    /// functions, `over`, `aggregate_order_by`, `cast`, `func_filter` and the
    /// SQL type names.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for name in STANDARD_FUNCTIONS {
            registry.register(*name, Function::Sql(String::from(*name)));
        }
        registry.register("aggregate_order_by", Function::AggregateOrderBy);
        registry.register("over", Function::Over);
        registry.register("cast", Function::Cast);
        registry.register("func_filter", Function::Filter);
        for name in STANDARD_TYPES {
            let data_type = match *name {
                "FLOAT" => DataType::Double,
                other => DataType::from_name(other),
            };
            registry.register_type(*name, data_type);
        }
        registry
    }

    /// Binds a callable under `name`.
    pub fn register(&mut self, name: impl Into<String>, function: Function) {
        self.bindings.insert(name.into(), Binding::Function(function));
    }

    /// Binds a SQL type under `name`.
    pub fn register_type(&mut self, name: impl Into<String>, data_type: DataType) {
        self.bindings.insert(name.into(), Binding::Type(data_type));
    }

    /// Binds a plain SQL function rendered as `name(...)` (builder form).
    #[must_use]
    pub fn with_function(mut self, name: &str) -> Self {
        self.register(name, Function::Sql(String::from(name)));
        self
    }

    /// Looks up a binding.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Returns the bound names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

fn invalid(callee: &str, snippet: &str, reason: impl Into<String>) -> CompileError {
    CompileError::InvalidCall {
        callee: String::from(callee),
        snippet: String::from(snippet),
        reason: reason.into(),
    }
}

fn cast_target(callee: &str, operand: Operand, snippet: &str) -> Result<DataType> {
    match operand {
        Operand::Resolved(Resolved::Type(data_type)) => Ok(data_type),
        Operand::Literal(SqlValue::Text(name)) => Ok(DataType::from_name(&name)),
        other => Err(invalid(
            callee,
            snippet,
            format!("expected a type, found {}", other.describe()),
        )),
    }
}

fn window(
    function: Expr,
    keywords: Vec<(String, Operand)>,
    callee: &str,
    snippet: &str,
) -> Result<Expr> {
    let mut partition_by = Vec::new();
    let mut order_by = Vec::new();
    for (name, value) in keywords {
        match name.as_str() {
            "partition_by" => partition_by.push(value.into_expr(snippet)?),
            "order_by" => order_by.push(value.into_expr(snippet)?.into_order_by()),
            other => {
                return Err(invalid(
                    callee,
                    snippet,
                    format!("unexpected keyword argument '{other}'"),
                ))
            }
        }
    }
    Ok(Expr::Window {
        function: Box::new(function),
        partition_by,
        order_by,
    })
}

fn with_filter(aggregate: Expr, predicates: Vec<Expr>, callee: &str, snippet: &str) -> Result<Expr> {
    let Expr::Function(mut call) = aggregate.unlabeled() else {
        return Err(invalid(callee, snippet, "FILTER applies to aggregate calls only"));
    };
    call.filter = Expr::conjunction(predicates).map(Box::new);
    Ok(Expr::Function(call))
}

fn expect_no_keywords(keywords: &[(String, Operand)], callee: &str, snippet: &str) -> Result<()> {
    match keywords.first() {
        Some((name, _)) => Err(invalid(
            callee,
            snippet,
            format!("unexpected keyword argument '{name}'"),
        )),
        None => Ok(()),
    }
}

fn single_argument(
    mut args: Vec<Operand>,
    callee: &str,
    snippet: &str,
) -> Result<Operand> {
    if args.len() != 1 {
        return Err(invalid(
            callee,
            snippet,
            format!("expected 1 argument, found {}", args.len()),
        ));
    }
    args.pop()
        .ok_or_else(|| invalid(callee, snippet, "missing argument"))
}

impl Function {
    /// Returns the name used in errors.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Sql(name) => name,
            Self::AggregateOrderBy => "aggregate_order_by",
            Self::Over => "over",
            Self::Cast => "cast",
            Self::Filter => "func_filter",
        }
    }

    /// Calls the function with evaluated arguments.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCall` if the arguments do not fit the function, or
    /// `NotAValue` if an argument is not a value.
    pub fn call(
        &self,
        args: Vec<Operand>,
        keywords: Vec<(String, Operand)>,
        snippet: &str,
    ) -> Result<Operand> {
        let callee = self.name();
        match self {
            Self::Sql(name) => {
                expect_no_keywords(&keywords, callee, snippet)?;
                let mut call = FunctionCall::new(name.clone(), Vec::new());
                for arg in args {
                    match arg {
                        Operand::Resolved(Resolved::AggregateOrder {
                            args: inner,
                            order_by,
                        }) => {
                            call.args.extend(inner);
                            call.order_by.extend(order_by);
                        }
                        other => call.args.push(other.into_expr(snippet)?),
                    }
                }
                if call.args.is_empty() && name.eq_ignore_ascii_case("count") {
                    call.args.push(Expr::Wildcard { table: None });
                }
                Ok(Operand::Expression(Expr::Function(call)))
            }
            Self::AggregateOrderBy => {
                expect_no_keywords(&keywords, callee, snippet)?;
                if args.len() < 2 {
                    return Err(invalid(
                        callee,
                        snippet,
                        "expected a target and at least one sort key",
                    ));
                }
                let mut args = args.into_iter();
                let target = match args.next() {
                    Some(target) => target.into_expr(snippet)?,
                    None => return Err(invalid(callee, snippet, "missing target")),
                };
                let order_by = args
                    .map(|key| key.into_expr(snippet).map(Expr::into_order_by))
                    .collect::<Result<Vec<OrderBy>>>()?;
                Ok(Operand::Resolved(Resolved::AggregateOrder {
                    args: vec![target],
                    order_by,
                }))
            }
            Self::Over => {
                let function = single_argument(args, callee, snippet)?.into_expr(snippet)?;
                window(function, keywords, callee, snippet).map(Operand::Expression)
            }
            Self::Cast => {
                expect_no_keywords(&keywords, callee, snippet)?;
                if args.len() != 2 {
                    return Err(invalid(
                        callee,
                        snippet,
                        format!("expected 2 arguments, found {}", args.len()),
                    ));
                }
                let mut args = args.into_iter();
                let (Some(value), Some(target)) = (args.next(), args.next()) else {
                    return Err(invalid(callee, snippet, "missing argument"));
                };
                Ok(Operand::Expression(Expr::Cast {
                    expr: Box::new(value.into_expr(snippet)?),
                    data_type: cast_target(callee, target, snippet)?,
                }))
            }
            Self::Filter => {
                expect_no_keywords(&keywords, callee, snippet)?;
                let mut args = args.into_iter();
                let aggregate = match args.next() {
                    Some(aggregate) => aggregate.into_expr(snippet)?,
                    None => return Err(invalid(callee, snippet, "missing aggregate")),
                };
                let predicates = args
                    .map(|p| p.into_expr(snippet))
                    .collect::<Result<Vec<_>>>()?;
                with_filter(aggregate, predicates, callee, snippet).map(Operand::Expression)
            }
        }
    }
}

/// Calls a SQL type, e.g. `VARCHAR(30)` or `NUMERIC(10, 2)`.
///
/// # Errors
///
/// Returns `InvalidCall` for non-integer arguments.
pub fn call_type(data_type: &DataType, args: &[Operand], snippet: &str) -> Result<Operand> {
    let sizes = args
        .iter()
        .map(|arg| match arg {
            Operand::Literal(SqlValue::Int(n)) => u32::try_from(*n).ok(),
            _ => None,
        })
        .collect::<Option<Vec<u32>>>()
        .ok_or_else(|| invalid(&data_type.to_sql(), snippet, "expected integer arguments"))?;
    let narrow = |n: u32| u16::try_from(n).ok();
    let data_type = match (data_type, sizes.as_slice()) {
        (_, []) => data_type.clone(),
        (DataType::Varchar(_), [length]) => DataType::Varchar(Some(*length)),
        (DataType::Numeric { .. }, [precision]) => DataType::Numeric {
            precision: narrow(*precision),
            scale: None,
        },
        (DataType::Numeric { .. }, [precision, scale]) => DataType::Numeric {
            precision: narrow(*precision),
            scale: narrow(*scale),
        },
        _ => {
            return Err(invalid(
                &data_type.to_sql(),
                snippet,
                "type does not take arguments",
            ))
        }
    };
    Ok(Operand::Resolved(Resolved::Type(data_type)))
}

/// Methods reachable through attribute access on a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `.asc()`
    Asc,
    /// `.desc()`
    Desc,
    /// `.nulls_first()`
    NullsFirst,
    /// `.nulls_last()`
    NullsLast,
    /// `.label('name')`
    Label,
    /// `.distinct()`
    Distinct,
    /// `.is_(value)`
    Is,
    /// `.is_not(value)`
    IsNot,
    /// `.like(pattern)`
    Like,
    /// `.ilike(pattern)`
    ILike,
    /// `.cast(TYPE)`
    Cast,
    /// `.filter(predicate, ...)`
    Filter,
    /// `.over(partition_by=..., order_by=...)`
    Over,
    /// Binary operator dunders (`__add__`, `__eq__`, ...).
    Operator(BinaryOp),
}

impl Method {
    /// Looks up a method by attribute name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let method = match name {
            "asc" => Self::Asc,
            "desc" => Self::Desc,
            "nulls_first" | "nullsfirst" => Self::NullsFirst,
            "nulls_last" | "nullslast" => Self::NullsLast,
            "label" => Self::Label,
            "distinct" => Self::Distinct,
            "is_" => Self::Is,
            "is_not" | "isnot" => Self::IsNot,
            "like" => Self::Like,
            "ilike" => Self::ILike,
            "cast" => Self::Cast,
            "filter" => Self::Filter,
            "over" => Self::Over,
            "__add__" => Self::Operator(BinaryOp::Add),
            "__sub__" => Self::Operator(BinaryOp::Sub),
            "__mul__" => Self::Operator(BinaryOp::Mul),
            "__truediv__" => Self::Operator(BinaryOp::Div),
            "__mod__" => Self::Operator(BinaryOp::Mod),
            "__eq__" => Self::Operator(BinaryOp::Eq),
            "__ne__" => Self::Operator(BinaryOp::NotEq),
            "__lt__" => Self::Operator(BinaryOp::Lt),
            "__le__" => Self::Operator(BinaryOp::LtEq),
            "__gt__" => Self::Operator(BinaryOp::Gt),
            "__ge__" => Self::Operator(BinaryOp::GtEq),
            _ => return None,
        };
        Some(method)
    }

    /// Returns the attribute name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
            Self::NullsFirst => "nulls_first",
            Self::NullsLast => "nulls_last",
            Self::Label => "label",
            Self::Distinct => "distinct",
            Self::Is => "is_",
            Self::IsNot => "is_not",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::Cast => "cast",
            Self::Filter => "filter",
            Self::Over => "over",
            Self::Operator(op) => match op {
                BinaryOp::Add => "__add__",
                BinaryOp::Sub => "__sub__",
                BinaryOp::Mul => "__mul__",
                BinaryOp::Div => "__truediv__",
                BinaryOp::Mod => "__mod__",
                BinaryOp::Eq => "__eq__",
                BinaryOp::NotEq => "__ne__",
                BinaryOp::Lt => "__lt__",
                BinaryOp::LtEq => "__le__",
                BinaryOp::Gt => "__gt__",
                BinaryOp::GtEq => "__ge__",
                other => other.as_str(),
            },
        }
    }

    /// Applies the method to its receiver.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCall` if the arguments do not fit the method.
    pub fn apply(
        self,
        receiver: Expr,
        args: Vec<Operand>,
        keywords: Vec<(String, Operand)>,
        snippet: &str,
    ) -> Result<Operand> {
        let callee = self.name();
        if self != Self::Over {
            expect_no_keywords(&keywords, callee, snippet)?;
        }
        let no_arguments = |args: &[Operand]| {
            if args.is_empty() {
                Ok(())
            } else {
                Err(invalid(callee, snippet, "expected no arguments"))
            }
        };
        let operand = |args: Vec<Operand>| {
            single_argument(args, callee, snippet).and_then(|arg| arg.into_expr(snippet))
        };

        let expr = match self {
            Self::Asc => {
                no_arguments(&args)?;
                receiver.asc()
            }
            Self::Desc => {
                no_arguments(&args)?;
                receiver.desc()
            }
            Self::NullsFirst => {
                no_arguments(&args)?;
                receiver.nulls(NullOrdering::First)
            }
            Self::NullsLast => {
                no_arguments(&args)?;
                receiver.nulls(NullOrdering::Last)
            }
            Self::Distinct => {
                no_arguments(&args)?;
                apply_distinct(receiver)
            }
            Self::Label => {
                let label = single_argument(args, callee, snippet)?;
                let Some(label) = label.as_text() else {
                    return Err(invalid(callee, snippet, "expected a text label"));
                };
                receiver.label(label)
            }
            Self::Cast => {
                let target = single_argument(args, callee, snippet)?;
                Expr::Cast {
                    expr: Box::new(receiver),
                    data_type: cast_target(callee, target, snippet)?,
                }
            }
            Self::Filter => {
                let predicates = args
                    .into_iter()
                    .map(|p| p.into_expr(snippet))
                    .collect::<Result<Vec<_>>>()?;
                with_filter(receiver, predicates, callee, snippet)?
            }
            Self::Over => {
                if !args.is_empty() {
                    return Err(invalid(callee, snippet, "expected keyword arguments only"));
                }
                window(receiver, keywords, callee, snippet)?
            }
            Self::Is => receiver.is(operand(args)?),
            Self::IsNot => receiver.is_not(operand(args)?),
            Self::Like => receiver.binary(BinaryOp::Like, operand(args)?),
            Self::ILike => receiver.binary(BinaryOp::ILike, operand(args)?),
            Self::Operator(op) => receiver.binary(op, operand(args)?),
        };
        Ok(Operand::from(expr))
    }
}

/// Marks an expression DISTINCT: the DISTINCT flag of a function call, or a
/// `DISTINCT expr` wrapper otherwise. Labels are preserved.
#[must_use]
pub fn apply_distinct(expr: Expr) -> Expr {
    match expr {
        Expr::Labeled { expr, label } => apply_distinct(*expr).label(label),
        Expr::Function(mut call) => {
            call.distinct = true;
            Expr::Function(call)
        }
        other => Expr::Distinct(Box::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use oxide_query_core::ast::OrderDirection;

    use super::*;

    fn column(name: &str) -> Operand {
        Operand::ColumnRef(Expr::qualified_column("user_account", name))
    }

    #[test]
    fn test_base_bindings() {
        let registry = FunctionRegistry::new();
        assert!(registry.get("array_agg").is_some());
        assert!(registry.get("coalesce").is_some());
        assert!(registry.get("count").is_none());
    }

    #[test]
    fn test_standard_bindings() {
        let registry = FunctionRegistry::standard();
        assert_eq!(
            registry.get("over"),
            Some(&Binding::Function(Function::Over))
        );
        assert_eq!(
            registry.get("INTERVAL"),
            Some(&Binding::Type(DataType::Interval))
        );
        assert_eq!(registry.get("FLOAT"), Some(&Binding::Type(DataType::Double)));
        assert!(registry.names().any(|n| n == "row_number"));
    }

    #[test]
    fn test_custom_function() {
        let registry = FunctionRegistry::new().with_function("lower");
        assert_eq!(
            registry.get("lower"),
            Some(&Binding::Function(Function::Sql(String::from("lower"))))
        );
    }

    #[test]
    fn test_count_without_arguments() {
        let result = Function::Sql(String::from("count"))
            .call(vec![], vec![], "count()")
            .unwrap();
        let Operand::Expression(Expr::Function(call)) = result else {
            panic!("expected a function call");
        };
        assert_eq!(call.args, vec![Expr::Wildcard { table: None }]);
    }

    #[test]
    fn test_aggregate_order_by_splices_into_call() {
        let ordering = Function::AggregateOrderBy
            .call(
                vec![
                    column("id"),
                    Operand::Expression(Expr::qualified_column("user_account", "id").desc()),
                ],
                vec![],
                "s",
            )
            .unwrap();
        let result = Function::Sql(String::from("array_agg"))
            .call(vec![ordering], vec![], "s")
            .unwrap();
        let Operand::Expression(Expr::Function(call)) = result else {
            panic!("expected a function call");
        };
        assert_eq!(call.args.len(), 1);
        assert_eq!(call.order_by.len(), 1);
        assert_eq!(call.order_by[0].direction, OrderDirection::Desc);
    }

    #[test]
    fn test_sql_function_rejects_keywords() {
        let result = Function::Sql(String::from("coalesce")).call(
            vec![column("id")],
            vec![(String::from("x"), Operand::Literal(SqlValue::Int(1)))],
            "s",
        );
        assert!(matches!(result, Err(CompileError::InvalidCall { .. })));
    }

    #[test]
    fn test_over_with_keywords() {
        let call = Function::Sql(String::from("row_number"))
            .call(vec![], vec![], "s")
            .unwrap();
        let result = Function::Over
            .call(
                vec![call],
                vec![
                    (String::from("partition_by"), column("name")),
                    (String::from("order_by"), column("id")),
                ],
                "s",
            )
            .unwrap();
        let Operand::Expression(Expr::Window {
            partition_by,
            order_by,
            ..
        }) = result
        else {
            panic!("expected a window call");
        };
        assert_eq!(partition_by.len(), 1);
        assert_eq!(order_by.len(), 1);
    }

    #[test]
    fn test_cast_accepts_type_or_name() {
        let by_type = Function::Cast
            .call(
                vec![column("id"), Operand::Resolved(Resolved::Type(DataType::Text))],
                vec![],
                "s",
            )
            .unwrap();
        let by_name = Function::Cast
            .call(
                vec![column("id"), Operand::Literal(SqlValue::Text(String::from("text")))],
                vec![],
                "s",
            )
            .unwrap();
        assert_eq!(by_type, by_name);

        let wrong = Function::Cast.call(vec![column("id"), column("name")], vec![], "s");
        assert!(matches!(wrong, Err(CompileError::InvalidCall { .. })));
    }

    #[test]
    fn test_func_filter_requires_aggregate() {
        let count = Function::Sql(String::from("count"))
            .call(vec![column("id")], vec![], "s")
            .unwrap();
        let predicate = Operand::Expression(
            Expr::qualified_column("user_account", "id").gt(Expr::literal(1_i64)),
        );
        let result = Function::Filter
            .call(vec![count, predicate.clone()], vec![], "s")
            .unwrap();
        let Operand::Expression(Expr::Function(call)) = result else {
            panic!("expected a function call");
        };
        assert!(call.filter.is_some());

        let wrong = Function::Filter.call(vec![column("id"), predicate], vec![], "s");
        assert!(matches!(wrong, Err(CompileError::InvalidCall { .. })));
    }

    #[test]
    fn test_call_type_with_sizes() {
        let varchar = call_type(
            &DataType::Varchar(None),
            &[Operand::Literal(SqlValue::Int(30))],
            "VARCHAR(30)",
        )
        .unwrap();
        assert_eq!(
            varchar,
            Operand::Resolved(Resolved::Type(DataType::Varchar(Some(30))))
        );
        assert!(call_type(
            &DataType::Integer,
            &[Operand::Literal(SqlValue::Int(3))],
            "INTEGER(3)"
        )
        .is_err());
    }

    #[test]
    fn test_method_names_round_trip() {
        for name in ["desc", "nulls_last", "is_", "__truediv__", "__ge__", "over"] {
            assert_eq!(Method::from_name(name).map(|m| m.name()), Some(name));
        }
        assert_eq!(Method::from_name("nullslast"), Some(Method::NullsLast));
        assert_eq!(Method::from_name("upper"), None);
    }

    #[test]
    fn test_method_apply() {
        let receiver = Expr::qualified_column("user_account", "id");
        let desc = Method::Desc
            .apply(receiver.clone(), vec![], vec![], "s")
            .unwrap();
        assert_eq!(desc, Operand::Expression(receiver.clone().desc()));

        let label = Method::Label
            .apply(
                receiver.clone(),
                vec![Operand::Literal(SqlValue::Text(String::from("uid")))],
                vec![],
                "s",
            )
            .unwrap();
        assert_eq!(label, Operand::Expression(receiver.clone().label("uid")));

        let sum = Method::Operator(BinaryOp::Add)
            .apply(
                receiver.clone(),
                vec![Operand::Literal(SqlValue::Int(1))],
                vec![],
                "s",
            )
            .unwrap();
        assert_eq!(
            sum,
            Operand::Expression(receiver.clone().binary(BinaryOp::Add, Expr::literal(1_i64)))
        );

        let wrong = Method::Desc.apply(receiver, vec![column("id")], vec![], "s");
        assert!(matches!(wrong, Err(CompileError::InvalidCall { .. })));
    }

    #[test]
    fn test_apply_distinct() {
        let call = Expr::function("count", vec![Expr::column("id")]).label("n");
        let Expr::Labeled { expr, label } = apply_distinct(call) else {
            panic!("label was dropped");
        };
        assert_eq!(label, "n");
        assert!(matches!(*expr, Expr::Function(FunctionCall { distinct: true, .. })));

        assert_eq!(
            apply_distinct(Expr::column("id")),
            Expr::Distinct(Box::new(Expr::column("id")))
        );
    }
}
