//! Plan builder.
//!
//! [`QueryCompiler`] turns a [`QueryDocument`] into one composed [`Query`].
//! Within a document, union operands are compiled first, then `subqueries`
//! in document order, then joins, the select list, filters, pagination,
//! de-duplication, grouping and ordering. Common table expressions from any
//! depth are hoisted into the WITH list of the top-level query.

mod clauses;
mod json;
mod select;

use ironhtml::typed::Element;
use ironhtml_elements::{Code, Div};
use oxide_query_core::ast::Query;
use oxide_query_core::dialect::Dialect;
use oxide_query_core::SqlValue;
use tracing::info;

pub use select::{compile_document, CompiledDocument};

use crate::backend::{ExecutionBackend, NoOpBackend};
use crate::catalog::Catalog;
use crate::context::{CompilationContext, CompileOptions};
use crate::document::{DebugMode, QueryDocument};
use crate::error::Result;
use crate::functions::FunctionRegistry;

/// The result of a top-level compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// The composed plan, with every CTE in its WITH list.
    pub query: Query,
    /// Effective LIMIT of the top-level document.
    pub limit: Option<u64>,
    /// Effective OFFSET of the top-level document.
    pub offset: Option<u64>,
    /// The rendering requested by the document's `debug` key.
    pub debug: Option<DebugMode>,
    /// Id used to name this compilation's temporary relations.
    pub compilation_id: u64,
    /// Output columns holding JSON documents.
    pub json_columns: Vec<String>,
}

impl CompiledQuery {
    /// Renders parameterized SQL for `dialect`.
    #[must_use]
    pub fn to_sql(&self, dialect: &dyn Dialect) -> (String, Vec<SqlValue>) {
        self.query.to_sql(dialect)
    }

    /// Renders SQL with inline literals for `dialect`.
    #[must_use]
    pub fn to_sql_inline(&self, dialect: &dyn Dialect) -> String {
        self.query.to_sql_inline(dialect)
    }

    /// Renders the statement in the format requested by `debug`, if any.
    ///
    /// `str` yields the SQL with inline literals; `html` wraps it in an
    /// escaped `<code>` block.
    #[must_use]
    pub fn debug_output(&self, dialect: &dyn Dialect) -> Option<String> {
        let sql = self.to_sql_inline(dialect);
        match self.debug? {
            DebugMode::Str => Some(sql),
            DebugMode::Html => Some(
                Element::<Div>::new()
                    .class("query-debug")
                    .child::<Code, _>(|c| c.class("language-sql").text(&sql))
                    .render(),
            ),
        }
    }
}

/// Compiles query documents against a catalog and function registry.
///
/// The compiler holds only shared, read-only state; each call to
/// [`QueryCompiler::compile`] threads its own [`CompilationContext`].
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    catalog: &'a Catalog,
    functions: &'a FunctionRegistry,
    options: CompileOptions,
}

impl<'a> QueryCompiler<'a> {
    /// Creates a compiler with default options.
    #[must_use]
    pub fn new(catalog: &'a Catalog, functions: &'a FunctionRegistry) -> Self {
        Self {
            catalog,
            functions,
            options: CompileOptions::default(),
        }
    }

    /// Replaces the compile options.
    #[must_use]
    pub const fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Compiles a document, materializing resolver relations through
    /// `backend`.
    ///
    /// # Errors
    ///
    /// Returns the first compilation error encountered.
    pub fn compile(
        &self,
        doc: &QueryDocument,
        backend: &mut dyn ExecutionBackend,
    ) -> Result<CompiledQuery> {
        let mut ctx = CompilationContext::new(self.catalog, self.functions, backend)
            .with_options(self.options);
        let compiled = compile_document(doc, &mut ctx)?;
        let mut query = compiled.query;
        for cte in ctx.take_ctes() {
            query.add_cte(cte);
        }
        info!(
            compilation_id = ctx.compilation_id(),
            ctes = query.with.len(),
            limit = compiled.limit,
            offset = compiled.offset,
            "Compiled query document"
        );
        let json_columns = json::json_output_columns(&query, self.catalog);
        Ok(CompiledQuery {
            json_columns,
            query,
            limit: compiled.limit,
            offset: compiled.offset,
            debug: doc.debug,
            compilation_id: ctx.compilation_id(),
        })
    }

    /// Compiles a document without materializing anything.
    ///
    /// # Errors
    ///
    /// Returns the first compilation error encountered.
    pub fn compile_dry_run(&self, doc: &QueryDocument) -> Result<CompiledQuery> {
        self.compile(doc, &mut NoOpBackend::new())
    }

    /// Parses and compiles a JSON document without materializing anything.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` for malformed JSON and the first compilation
    /// error otherwise.
    pub fn compile_json(&self, text: &str) -> Result<CompiledQuery> {
        self.compile_dry_run(&QueryDocument::from_json(text)?)
    }
}
