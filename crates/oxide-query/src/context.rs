//! Compilation context.
//!
//! One [`CompilationContext`] is threaded through a whole top-level
//! compilation. Named derived relations (subqueries, union operands and
//! results, CTEs, resolver outputs) are bound as compilation proceeds, so a
//! binding is visible to everything compiled after it and to nothing compiled
//! before it.

use std::sync::atomic::{AtomicU64, Ordering};

use oxide_query_core::ast::{Cte, Expr, Query, SelectStatement, TableRef};
use serde_json::{Map, Value};

use crate::backend::ExecutionBackend;
use crate::catalog::{Catalog, RelationSchema};
use crate::error::{CompileError, Result};
use crate::functions::FunctionRegistry;
use crate::resolver::ResolverArgs;

static NEXT_COMPILATION_ID: AtomicU64 = AtomicU64::new(1);

/// Compiler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Maximum nesting of documents (subqueries, union operands).
    pub max_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { max_depth: 32 }
    }
}

/// Where a relation binding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// A catalog relation.
    Catalog,
    /// An entry of `subqueries`.
    Subquery,
    /// The left operand of a union, bound under its `alias`.
    UnionOperand,
    /// The result of a union.
    Union,
    /// A common table expression.
    Cte,
    /// A resolver output.
    Resolver,
}

/// A relation as seen by the compiler: a FROM entry plus its columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationRef {
    /// The name documents use for the relation.
    pub name: String,
    /// The FROM entry.
    pub source: TableRef,
    /// Known output columns. Empty when the relation's columns are unknown,
    /// in which case any column name is accepted.
    pub columns: Vec<String>,
    /// Origin of the binding.
    pub kind: RelationKind,
}

impl RelationRef {
    /// Wraps a catalog relation.
    #[must_use]
    pub fn catalog(schema: &RelationSchema) -> Self {
        Self {
            name: schema.name.clone(),
            source: TableRef::table(schema.table.clone()),
            columns: schema.columns().iter().map(|c| c.name.clone()).collect(),
            kind: RelationKind::Catalog,
        }
    }

    /// Binds a compiled query as a derived table aliased `name`.
    #[must_use]
    pub fn derived(name: impl Into<String>, query: Query, kind: RelationKind) -> Self {
        let name = name.into();
        let columns = query.output_columns();
        Self {
            source: TableRef::subquery(query, name.clone()),
            name,
            columns,
            kind,
        }
    }

    /// Binds a reference to the CTE `cte_name` under `name`.
    #[must_use]
    pub fn cte(name: impl Into<String>, cte_name: &str, columns: Vec<String>) -> Self {
        let name = name.into();
        let source = if name == cte_name {
            TableRef::table(cte_name)
        } else {
            TableRef::table(cte_name).alias(name.clone())
        };
        Self {
            name,
            source,
            columns,
            kind: RelationKind::Cte,
        }
    }

    /// Returns the name column references are qualified with.
    #[must_use]
    pub fn qualifier(&self) -> &str {
        self.source.qualifier()
    }

    /// Returns true if the relation exposes `column`.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.is_empty() || self.columns.iter().any(|c| c == column)
    }

    /// Returns a qualified reference to `column`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownColumn` if the relation does not expose the column.
    pub fn column(&self, column: &str) -> Result<Expr> {
        if self.has_column(column) {
            Ok(Expr::qualified_column(self.qualifier(), column))
        } else {
            Err(CompileError::UnknownColumn {
                relation: self.name.clone(),
                column: String::from(column),
            })
        }
    }

    /// Returns a query producing the relation's rows, for existence tests.
    #[must_use]
    pub fn row_query(&self) -> Query {
        match &self.source {
            TableRef::Subquery { query, .. } => (**query).clone(),
            TableRef::Table { .. } => {
                let mut select = SelectStatement::new();
                select.from.push(self.source.clone());
                Query::select(select)
            }
        }
    }
}

/// The mutable binding environment of one compilation.
pub struct CompilationContext<'a> {
    catalog: &'a Catalog,
    functions: &'a FunctionRegistry,
    backend: &'a mut dyn ExecutionBackend,
    options: CompileOptions,
    compilation_id: u64,
    subqueries: Vec<RelationRef>,
    bindings: Vec<RelationRef>,
    resolvers: Vec<(ResolverArgs, RelationRef)>,
    ctes: Vec<Cte>,
    scopes: Vec<Vec<TableRef>>,
    resolver_args: Vec<Map<String, Value>>,
}

impl<'a> CompilationContext<'a> {
    /// Creates a context with a fresh compilation id.
    pub fn new(
        catalog: &'a Catalog,
        functions: &'a FunctionRegistry,
        backend: &'a mut dyn ExecutionBackend,
    ) -> Self {
        Self {
            catalog,
            functions,
            backend,
            options: CompileOptions::default(),
            compilation_id: NEXT_COMPILATION_ID.fetch_add(1, Ordering::Relaxed),
            subqueries: Vec::new(),
            bindings: Vec::new(),
            resolvers: Vec::new(),
            ctes: Vec::new(),
            scopes: Vec::new(),
            resolver_args: Vec::new(),
        }
    }

    /// Replaces the compiler settings.
    #[must_use]
    pub const fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the id that makes this compilation's temporary relations
    /// unique.
    #[must_use]
    pub const fn compilation_id(&self) -> u64 {
        self.compilation_id
    }

    /// Returns the catalog.
    #[must_use]
    pub const fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Returns the function bindings.
    #[must_use]
    pub const fn functions(&self) -> &'a FunctionRegistry {
        self.functions
    }

    /// Returns the execution backend.
    pub fn backend(&mut self) -> &mut dyn ExecutionBackend {
        &mut *self.backend
    }

    /// Returns the current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Binds an entry of `subqueries`.
    pub fn bind_subquery(&mut self, relation: RelationRef) {
        self.subqueries.push(relation);
    }

    /// Binds a derived relation in the general namespace.
    pub fn bind(&mut self, relation: RelationRef) {
        self.bindings.push(relation);
    }

    /// Binds a resolver output invoked with `args`.
    pub fn bind_resolver(&mut self, args: ResolverArgs, relation: RelationRef) {
        self.resolvers.push((args, relation.clone()));
        self.bind(relation);
    }

    /// Returns an earlier invocation of resolver `name` with the same
    /// validated arguments.
    #[must_use]
    pub fn resolver_binding(&self, name: &str, args: &ResolverArgs) -> Option<&RelationRef> {
        self.resolvers
            .iter()
            .find(|(bound_args, relation)| relation.name == name && bound_args == args)
            .map(|(_, relation)| relation)
    }

    /// Returns how many times resolver `name` has been invoked so far.
    #[must_use]
    pub fn resolver_invocations(&self, name: &str) -> usize {
        self.resolvers
            .iter()
            .filter(|(_, relation)| relation.name == name)
            .count()
    }

    /// Looks up a derived relation; later bindings shadow earlier ones and
    /// the subqueries namespace is searched first.
    #[must_use]
    pub fn derived(&self, name: &str) -> Option<&RelationRef> {
        self.subqueries
            .iter()
            .rev()
            .find(|r| r.name == name)
            .or_else(|| self.bindings.iter().rev().find(|r| r.name == name))
    }

    /// Looks up a relation: derived relations first, then the catalog.
    #[must_use]
    pub fn lookup_relation(&self, name: &str) -> Option<RelationRef> {
        self.derived(name).cloned().or_else(|| {
            self.catalog
                .get_relation(name)
                .map(RelationRef::catalog)
        })
    }

    /// Looks up a relation, failing with `UnknownRelation`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRelation` naming `key` if the relation is unbound.
    pub fn require_relation(&self, name: &str, key: &str) -> Result<RelationRef> {
        self.lookup_relation(name)
            .ok_or_else(|| CompileError::UnknownRelation {
                relation: String::from(name),
                key: String::from(key),
            })
    }

    /// Registers a CTE definition for the top-level WITH list.
    pub fn add_cte(&mut self, cte: Cte) {
        self.ctes.retain(|c| c.name != cte.name);
        self.ctes.push(cte);
    }

    /// Removes and returns the collected CTE definitions.
    pub fn take_ctes(&mut self) -> Vec<Cte> {
        std::mem::take(&mut self.ctes)
    }

    /// Returns the resolver arguments in effect.
    #[must_use]
    pub fn resolver_args(&self) -> Map<String, Value> {
        self.resolver_args.last().cloned().unwrap_or_default()
    }

    /// Enters a document: checks the depth limit, opens a FROM scope and
    /// layers the document's resolver arguments over the inherited ones.
    ///
    /// # Errors
    ///
    /// Returns `DocumentTooDeep` past the configured depth.
    pub(crate) fn enter(&mut self, resolver_args: &Map<String, Value>) -> Result<()> {
        if self.scopes.len() >= self.options.max_depth {
            return Err(CompileError::DocumentTooDeep {
                max_depth: self.options.max_depth,
            });
        }
        let mut args = self.resolver_args();
        for (name, value) in resolver_args {
            args.insert(name.clone(), value.clone());
        }
        self.resolver_args.push(args);
        self.scopes.push(Vec::new());
        Ok(())
    }

    /// Leaves a document, returning the relations it referenced in order.
    pub(crate) fn leave(&mut self) -> Vec<TableRef> {
        self.resolver_args.pop();
        self.scopes.pop().unwrap_or_default()
    }

    /// Records that the current document reads from `source`.
    pub(crate) fn touch(&mut self, source: &TableRef) {
        if let Some(scope) = self.scopes.last_mut() {
            if !scope.contains(source) {
                scope.push(source.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use oxide_query_core::ast::DataType;
    use oxide_query_core::builder::Select;

    use super::*;
    use crate::backend::NoOpBackend;

    fn catalog() -> Catalog {
        Catalog::new().relation(
            RelationSchema::new("User", "user_account")
                .column("id", DataType::Integer)
                .column("name", DataType::Text),
        )
    }

    #[test]
    fn test_compilation_ids_are_unique() {
        let catalog = catalog();
        let functions = FunctionRegistry::new();
        let mut a = NoOpBackend::new();
        let mut b = NoOpBackend::new();
        let first = CompilationContext::new(&catalog, &functions, &mut a);
        let second = CompilationContext::new(&catalog, &functions, &mut b);
        assert_ne!(first.compilation_id(), second.compilation_id());
    }

    #[test]
    fn test_derived_relations_shadow_catalog() {
        let catalog = catalog();
        let functions = FunctionRegistry::new();
        let mut backend = NoOpBackend::new();
        let mut ctx = CompilationContext::new(&catalog, &functions, &mut backend);

        let user = ctx.lookup_relation("User").unwrap();
        assert_eq!(user.kind, RelationKind::Catalog);
        assert_eq!(user.qualifier(), "user_account");

        let query = Select::new().columns(&["id"]).from("user_account").build();
        ctx.bind_subquery(RelationRef::derived("User", query, RelationKind::Subquery));
        let user = ctx.lookup_relation("User").unwrap();
        assert_eq!(user.kind, RelationKind::Subquery);
        assert_eq!(user.qualifier(), "User");
        assert_eq!(user.columns, vec![String::from("id")]);
    }

    #[test]
    fn test_relation_columns() {
        let relation = RelationRef::catalog(catalog().get_relation("User").unwrap());
        assert_eq!(
            relation.column("id").unwrap(),
            Expr::qualified_column("user_account", "id")
        );
        assert!(matches!(
            relation.column("missing"),
            Err(CompileError::UnknownColumn { .. })
        ));

        let open = RelationRef::cte("U", "roles", vec![]);
        assert!(open.has_column("anything"));
        assert_eq!(open.qualifier(), "U");
    }

    #[test]
    fn test_depth_limit() {
        let catalog = catalog();
        let functions = FunctionRegistry::new();
        let mut backend = NoOpBackend::new();
        let mut ctx = CompilationContext::new(&catalog, &functions, &mut backend)
            .with_options(CompileOptions { max_depth: 2 });

        let args = Map::new();
        ctx.enter(&args).unwrap();
        ctx.enter(&args).unwrap();
        assert_eq!(ctx.depth(), 2);
        assert!(matches!(
            ctx.enter(&args),
            Err(CompileError::DocumentTooDeep { max_depth: 2 })
        ));
    }

    #[test]
    fn test_resolver_args_are_layered() {
        let catalog = catalog();
        let functions = FunctionRegistry::new();
        let mut backend = NoOpBackend::new();
        let mut ctx = CompilationContext::new(&catalog, &functions, &mut backend);

        let outer: Map<String, Value> = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        let inner: Map<String, Value> = serde_json::from_str(r#"{"b": 3}"#).unwrap();
        ctx.enter(&outer).unwrap();
        ctx.enter(&inner).unwrap();
        let args = ctx.resolver_args();
        assert_eq!(args.get("a"), Some(&Value::from(1)));
        assert_eq!(args.get("b"), Some(&Value::from(3)));
        ctx.leave();
        assert_eq!(ctx.resolver_args().get("b"), Some(&Value::from(2)));
    }

    #[test]
    fn test_resolver_bindings_match_on_arguments() {
        use crate::resolver::{validate_parameters, ParamType, ResolverParameter};

        let catalog = catalog();
        let functions = FunctionRegistry::new();
        let mut backend = NoOpBackend::new();
        let mut ctx = CompilationContext::new(&catalog, &functions, &mut backend);

        let parameters = [ResolverParameter::new("x", ParamType::Integer)];
        let args = |text: &str| {
            let supplied: Map<String, Value> = serde_json::from_str(text).unwrap();
            validate_parameters("Foo", &parameters, &supplied).unwrap()
        };
        let query = Select::new().columns(&["value"]).from("temp__foo__1").build();
        ctx.bind_resolver(
            args(r#"{"x": 2}"#),
            RelationRef::derived("Foo", query, RelationKind::Resolver),
        );

        assert!(ctx.resolver_binding("Foo", &args(r#"{"x": 2}"#)).is_some());
        assert!(ctx.resolver_binding("Foo", &args(r#"{"x": 7}"#)).is_none());
        assert_eq!(ctx.resolver_invocations("Foo"), 1);
        assert_eq!(ctx.resolver_invocations("Bar"), 0);
        assert_eq!(
            ctx.derived("Foo").map(|r| r.kind),
            Some(RelationKind::Resolver)
        );
    }

    #[test]
    fn test_touch_collects_sources_once() {
        let catalog = catalog();
        let functions = FunctionRegistry::new();
        let mut backend = NoOpBackend::new();
        let mut ctx = CompilationContext::new(&catalog, &functions, &mut backend);

        ctx.enter(&Map::new()).unwrap();
        ctx.touch(&TableRef::table("user_account"));
        ctx.touch(&TableRef::table("address"));
        ctx.touch(&TableRef::table("user_account"));
        assert_eq!(
            ctx.leave(),
            vec![TableRef::table("user_account"), TableRef::table("address")]
        );
    }
}
