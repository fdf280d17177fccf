//! Resolver protocol.
//!
//! A resolver is a virtual table: a procedural data source that declares a
//! parameter schema and a column schema, produces rows, and returns a query
//! over its own temporary relation. Documents reference it in `select` as
//! `"Name()"`, with parameters taken from `resolver_args`.
//!
//! Each invocation walks a fixed lifecycle, enforced by the type of
//! [`ResolverInvocation`]:
//!
//! ```text
//! Declared -> Instantiated -> ParametersValidated
//!          -> DataMaterialized | MaterializationSkipped -> QueryProduced
//! ```
//!
//! Materialization is skipped when the backend is not live. Parameters are
//! validated in every mode, before anything is materialized.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use oxide_query_core::ast::{
    ColumnDef, CreateTableStatement, DataType, Expr, InsertStatement, Query, TableRef,
};
use oxide_query_core::{SqlValue, ToSqlValue};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::backend::ExecutionBackend;
use crate::error::{CompileError, ResolverError};

/// A procedural relation.
pub trait Resolver: Send {
    /// Stable name, used for catalog lookup and temporary relation naming.
    fn name(&self) -> &str;

    /// Declared parameters.
    fn parameters(&self) -> Vec<ResolverParameter>;

    /// Declared columns of the backing relation, without the synthetic key.
    fn columns(&self) -> Vec<ColumnDef>;

    /// Produces the rows to materialize. Each row holds one value per
    /// declared column, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns a `ResolverError` if rows cannot be produced; this aborts the
    /// compilation.
    fn produce_rows(
        &mut self,
        args: &ResolverArgs,
    ) -> Result<Vec<Vec<SqlValue>>, ResolverError>;

    /// Returns the query that defines the relation, expressed over `relation`.
    ///
    /// # Errors
    ///
    /// Returns a `ResolverError` if the query cannot be built.
    fn query(
        &self,
        relation: &TempRelation,
        args: &ResolverArgs,
    ) -> Result<Query, ResolverError>;
}

/// Primitive types accepted for resolver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// 64-bit integer.
    Integer,
    /// Floating point number.
    Float,
    /// Text.
    Text,
    /// Boolean.
    Boolean,
    /// Calendar date, `YYYY-MM-DD`.
    Date,
    /// Date and time, RFC 3339 or `YYYY-MM-DD HH:MM:SS`.
    DateTime,
    /// Time of day, `HH:MM[:SS]`.
    Time,
    /// Any JSON value, passed on as its text.
    Json,
}

impl ParamType {
    /// Returns a human-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "an integer",
            Self::Float => "a number",
            Self::Text => "a string",
            Self::Boolean => "a boolean",
            Self::Date => "a date (YYYY-MM-DD)",
            Self::DateTime => "a datetime",
            Self::Time => "a time (HH:MM:SS)",
            Self::Json => "a JSON value",
        }
    }

    /// Converts a supplied JSON value. `null` converts to SQL NULL for every
    /// type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the value does not have this type.
    pub fn convert(self, name: &str, value: &Value) -> Result<SqlValue, ResolverError> {
        if value.is_null() {
            return Ok(SqlValue::Null);
        }
        let converted = match self {
            Self::Integer => value.as_i64().map(SqlValue::Int),
            Self::Float => value.as_f64().map(SqlValue::Float),
            Self::Text => value.as_str().map(|s| SqlValue::Text(String::from(s))),
            Self::Boolean => value.as_bool().map(SqlValue::Bool),
            Self::Date => value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .map(|d| SqlValue::Text(d.to_string())),
            Self::DateTime => value.as_str().and_then(parse_datetime).map(SqlValue::Text),
            Self::Time => value
                .as_str()
                .and_then(|s| {
                    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                        .ok()
                })
                .map(|t| SqlValue::Text(t.to_string())),
            Self::Json => Some(SqlValue::Text(value.to_string())),
        };
        converted.ok_or_else(|| ResolverError::InvalidParameter {
            name: String::from(name),
            expected: self.as_str(),
            found: value.to_string(),
        })
    }
}

fn parse_datetime(text: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.to_rfc3339());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|dt| dt.to_string())
}

/// Default value of a parameter.
#[derive(Clone)]
pub enum ParamDefault {
    /// A constant.
    Value(SqlValue),
    /// A zero-argument supplier, invoked at validation time.
    Supplier(Arc<dyn Fn() -> SqlValue + Send + Sync>),
}

impl ParamDefault {
    /// Returns the default value, invoking the supplier if needed.
    #[must_use]
    pub fn resolve(&self) -> SqlValue {
        match self {
            Self::Value(value) => value.clone(),
            Self::Supplier(supplier) => supplier(),
        }
    }
}

impl fmt::Debug for ParamDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

/// A declared resolver parameter.
#[derive(Debug, Clone)]
pub struct ResolverParameter {
    /// Parameter name, as used in `resolver_args`.
    pub name: String,
    /// Expected type.
    pub param_type: ParamType,
    /// Value used when the parameter is optional and absent.
    pub default: Option<ParamDefault>,
    /// Whether the parameter may be omitted.
    pub optional: bool,
}

impl ResolverParameter {
    /// Declares a required parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: None,
            optional: false,
        }
    }

    /// Marks the parameter as optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Sets a constant default.
    #[must_use]
    pub fn default_value(mut self, value: impl ToSqlValue) -> Self {
        self.default = Some(ParamDefault::Value(value.to_sql_value()));
        self
    }

    /// Sets a supplier default.
    #[must_use]
    pub fn default_with(
        mut self,
        supplier: impl Fn() -> SqlValue + Send + Sync + 'static,
    ) -> Self {
        self.default = Some(ParamDefault::Supplier(Arc::new(supplier)));
        self
    }
}

/// Validated resolver arguments, in parameter declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverArgs {
    values: Vec<(String, SqlValue)>,
}

impl ResolverArgs {
    /// Returns the value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns an integer parameter.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            SqlValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a text parameter.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_text()
    }

    /// Iterates over the arguments.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    fn push(&mut self, name: String, value: SqlValue) {
        self.values.push((name, value));
    }
}

/// Validates supplied arguments against declared parameters.
///
/// # Errors
///
/// Returns `MissingParameter` for an absent required parameter, and a
/// `Resolver` error for a value of the wrong type.
pub fn validate_parameters(
    resolver: &str,
    parameters: &[ResolverParameter],
    supplied: &Map<String, Value>,
) -> crate::Result<ResolverArgs> {
    let mut args = ResolverArgs::default();
    for parameter in parameters {
        let value = match supplied.get(&parameter.name) {
            Some(value) => parameter
                .param_type
                .convert(&parameter.name, value)
                .map_err(|source| CompileError::Resolver {
                    resolver: String::from(resolver),
                    source,
                })?,
            None if !parameter.optional => {
                return Err(CompileError::MissingParameter {
                    resolver: String::from(resolver),
                    parameter: parameter.name.clone(),
                });
            }
            None => parameter
                .default
                .as_ref()
                .map_or(SqlValue::Null, ParamDefault::resolve),
        };
        args.push(parameter.name.clone(), value);
    }
    Ok(args)
}

/// The temporary relation backing one resolver invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TempRelation {
    name: String,
    columns: Vec<ColumnDef>,
}

impl TempRelation {
    /// Name of the synthetic primary key column.
    pub const PRIMARY_KEY: &'static str = "pk_id";

    /// Creates the relation for an invocation of `resolver` within the
    /// compilation identified by `compilation_id`. `ordinal` counts earlier
    /// invocations of the same resolver in that compilation; every one after
    /// the first gets a `_<ordinal>` suffix.
    #[must_use]
    pub fn new(
        resolver: &str,
        compilation_id: u64,
        ordinal: usize,
        columns: Vec<ColumnDef>,
    ) -> Self {
        let base = format!("temp__{}__{compilation_id}", snake_case(resolver));
        let name = if ordinal == 0 {
            base
        } else {
            format!("{base}_{ordinal}")
        };
        Self { name, columns }
    }

    /// Returns the relation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared columns.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Returns a column of the relation, qualified with its name.
    #[must_use]
    pub fn column(&self, name: &str) -> Expr {
        Expr::qualified_column(self.name.clone(), name)
    }

    /// Returns the relation as a FROM entry.
    #[must_use]
    pub fn table_ref(&self) -> TableRef {
        TableRef::table(self.name.clone())
    }

    /// Returns the CREATE statement, including the synthetic key.
    #[must_use]
    pub fn create_statement(&self) -> CreateTableStatement {
        let mut columns = vec![ColumnDef::new(Self::PRIMARY_KEY, DataType::Integer).primary_key()];
        columns.extend(self.columns.iter().cloned());
        CreateTableStatement {
            name: self.name.clone(),
            temporary: true,
            if_not_exists: false,
            columns,
        }
    }

    /// Returns the INSERT statement for `rows`.
    ///
    /// # Errors
    ///
    /// Returns `RowProduction` if a row does not have one value per column.
    pub fn insert_statement(
        &self,
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<InsertStatement, ResolverError> {
        let width = self.columns.len();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                if row.len() == width {
                    Ok(row.into_iter().map(Expr::Literal).collect())
                } else {
                    Err(ResolverError::RowProduction(format!(
                        "row {i} has {} values, expected {width}",
                        row.len()
                    )))
                }
            })
            .collect::<Result<Vec<Vec<Expr>>, _>>()?;
        Ok(InsertStatement {
            table: self.name.clone(),
            columns: self.columns.iter().map(|c| c.name.clone()).collect(),
            rows,
        })
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else if c.is_alphanumeric() {
            out.push(c);
            prev_lower = true;
        } else {
            out.push('_');
            prev_lower = false;
        }
    }
    out
}

/// Lifecycle states of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    /// Registered in the catalog.
    Declared,
    /// A fresh instance exists for this invocation.
    Instantiated,
    /// Arguments were validated.
    ParametersValidated,
    /// Rows were written to the temporary relation.
    DataMaterialized,
    /// Materialization was skipped for a dry run.
    MaterializationSkipped,
    /// The defining query was produced.
    QueryProduced,
}

/// Marker: the resolver is registered but not yet instantiated.
#[derive(Debug, Clone, Copy)]
pub struct Declared;

/// Marker: the invocation has a fresh resolver instance.
#[derive(Debug, Clone, Copy)]
pub struct Instantiated;

/// Marker: arguments are validated.
#[derive(Debug, Clone, Copy)]
pub struct Validated;

/// Marker: materialization ran or was skipped.
#[derive(Debug, Clone, Copy)]
pub struct Materialized;

/// One invocation of a resolver, owned by a single compilation.
pub struct ResolverInvocation<Stage> {
    resolver: Box<dyn Resolver>,
    relation: TempRelation,
    args: ResolverArgs,
    state: ResolverState,
    _stage: PhantomData<Stage>,
}

impl<Stage> ResolverInvocation<Stage> {
    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ResolverState {
        self.state
    }

    /// Returns the backing relation.
    #[must_use]
    pub const fn relation(&self) -> &TempRelation {
        &self.relation
    }

    /// Returns the resolver name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.resolver.name()
    }

    /// Returns the validated arguments (empty before validation).
    #[must_use]
    pub const fn args(&self) -> &ResolverArgs {
        &self.args
    }

    fn advance<Next>(self, state: ResolverState) -> ResolverInvocation<Next> {
        debug!(resolver = %self.resolver.name(), ?state, "Resolver state change");
        ResolverInvocation {
            resolver: self.resolver,
            relation: self.relation,
            args: self.args,
            state,
            _stage: PhantomData,
        }
    }

    fn failure(&self, source: ResolverError) -> CompileError {
        CompileError::Resolver {
            resolver: String::from(self.resolver.name()),
            source,
        }
    }
}

impl ResolverInvocation<Instantiated> {
    /// Starts an invocation with a fresh instance. `ordinal` is the number of
    /// earlier invocations of the same resolver in this compilation.
    #[must_use]
    pub fn new(resolver: Box<dyn Resolver>, compilation_id: u64, ordinal: usize) -> Self {
        let relation = TempRelation::new(
            resolver.name(),
            compilation_id,
            ordinal,
            resolver.columns(),
        );
        ResolverInvocation::<Declared> {
            resolver,
            relation,
            args: ResolverArgs::default(),
            state: ResolverState::Declared,
            _stage: PhantomData,
        }
        .advance(ResolverState::Instantiated)
    }

    /// Validates the supplied arguments.
    ///
    /// # Errors
    ///
    /// Returns `MissingParameter` or a `Resolver` error.
    pub fn validate(
        mut self,
        supplied: &Map<String, Value>,
    ) -> crate::Result<ResolverInvocation<Validated>> {
        let parameters = self.resolver.parameters();
        self.args = validate_parameters(self.resolver.name(), &parameters, supplied)?;
        Ok(self.advance(ResolverState::ParametersValidated))
    }
}

impl ResolverInvocation<Validated> {
    /// Produces rows and writes them to the temporary relation when the
    /// backend is live.
    ///
    /// # Errors
    ///
    /// Returns a `Resolver` error if row production fails, or a `Backend`
    /// error if the backend rejects a statement.
    pub fn materialize(
        mut self,
        backend: &mut dyn ExecutionBackend,
    ) -> crate::Result<ResolverInvocation<Materialized>> {
        if !backend.is_live() {
            warn!(
                resolver = %self.resolver.name(),
                "Dry run: skipping resolver materialization"
            );
            return Ok(self.advance(ResolverState::MaterializationSkipped));
        }

        let rows = self
            .resolver
            .produce_rows(&self.args)
            .map_err(|e| self.failure(e))?;
        let insert = self
            .relation
            .insert_statement(rows)
            .map_err(|e| self.failure(e))?;

        info!(
            resolver = %self.resolver.name(),
            relation = %self.relation.name(),
            rows = insert.rows.len(),
            "Materializing resolver"
        );
        backend.create_temp_relation(&self.relation.create_statement())?;
        if !insert.rows.is_empty() {
            backend.insert_rows(&insert)?;
        }
        Ok(self.advance(ResolverState::DataMaterialized))
    }
}

impl ResolverInvocation<Materialized> {
    /// Invokes the query hook.
    ///
    /// # Errors
    ///
    /// Returns a `Resolver` error if the hook fails.
    pub fn produce_query(self) -> crate::Result<(ResolverInvocation<Materialized>, Query)> {
        let query = self
            .resolver
            .query(&self.relation, &self.args)
            .map_err(|e| self.failure(e))?;
        Ok((self.advance(ResolverState::QueryProduced), query))
    }
}
