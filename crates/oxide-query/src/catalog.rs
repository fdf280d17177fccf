//! Schema catalog.
//!
//! The catalog maps relation names used in documents to backend tables and
//! their columns, and resolver names to resolver factories. It is built once
//! and shared by reference between compilations; the compiler never mutates
//! it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use oxide_query_core::ast::{DataType, Expr};
use serde::Deserialize;
use tracing::info;

use crate::resolver::Resolver;

/// Metadata of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Column type.
    pub data_type: DataType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
}

/// A relation known to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSchema {
    /// Name used in documents, e.g. `User`.
    pub name: String,
    /// Backend table name, e.g. `user_account`.
    pub table: String,
    columns: Vec<ColumnSchema>,
}

impl RelationSchema {
    /// Creates a relation without columns.
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Adds a NOT NULL column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(ColumnSchema {
            name: name.into(),
            data_type,
            nullable: false,
        });
        self
    }

    /// Adds a nullable column.
    #[must_use]
    pub fn nullable_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(ColumnSchema {
            name: name.into(),
            data_type,
            nullable: true,
        });
        self
    }

    /// Returns the columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns a column reference qualified with the table name.
    #[must_use]
    pub fn column_expr(&self, name: &str) -> Option<Expr> {
        self.get_column(name)
            .map(|c| Expr::qualified_column(self.table.clone(), c.name.clone()))
    }
}

/// Creates a fresh resolver instance.
pub type ResolverFactory = Arc<dyn Fn() -> Box<dyn Resolver> + Send + Sync>;

/// Registry of relations and resolvers.
#[derive(Clone, Default)]
pub struct Catalog {
    relations: BTreeMap<String, RelationSchema>,
    resolvers: BTreeMap<String, ResolverFactory>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .field("resolvers", &self.resolvers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a relation, replacing one with the same name.
    pub fn add_relation(&mut self, relation: RelationSchema) {
        self.relations.insert(relation.name.clone(), relation);
    }

    /// Adds a relation (builder form).
    #[must_use]
    pub fn relation(mut self, relation: RelationSchema) -> Self {
        self.add_relation(relation);
        self
    }

    /// Looks up a relation by document name.
    #[must_use]
    pub fn get_relation(&self, name: &str) -> Option<&RelationSchema> {
        self.relations.get(name)
    }

    /// Looks up a relation by the database table it reads.
    #[must_use]
    pub fn relation_for_table(&self, table: &str) -> Option<&RelationSchema> {
        self.relations.values().find(|r| r.table == table)
    }

    /// Returns the names of all relations.
    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Registers a resolver type under the name its instances report.
    pub fn register_resolver<R: Resolver + Default + 'static>(&mut self) {
        let name = R::default().name().to_string();
        self.register_resolver_fn(name, || -> Box<dyn Resolver> { Box::new(R::default()) });
    }

    /// Registers a resolver factory under an explicit name.
    pub fn register_resolver_fn(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Resolver> + Send + Sync + 'static,
    ) {
        self.resolvers.insert(name.into(), Arc::new(factory));
    }

    /// Registers a resolver type (builder form).
    #[must_use]
    pub fn with_resolver<R: Resolver + Default + 'static>(mut self) -> Self {
        self.register_resolver::<R>();
        self
    }

    /// Returns true if a resolver is registered under `name`.
    #[must_use]
    pub fn has_resolver(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }

    /// Creates a fresh instance of the named resolver.
    #[must_use]
    pub fn instantiate_resolver(&self, name: &str) -> Option<Box<dyn Resolver>> {
        self.resolvers.get(name).map(|factory| factory())
    }

    /// Builds a catalog from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDocument` if the text is not a valid catalog.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        let config: CatalogConfig = serde_json::from_str(text)?;
        Ok(Self::from_config(config))
    }

    /// Builds a catalog from a deserialized configuration.
    #[must_use]
    pub fn from_config(config: CatalogConfig) -> Self {
        let mut catalog = Self::new();
        for relation in config.relations {
            let mut schema = RelationSchema::new(
                relation.name.clone(),
                relation.table.unwrap_or_else(|| relation.name.to_lowercase()),
            );
            for column in relation.columns {
                let data_type = DataType::from_name(&column.type_name);
                schema = if column.nullable {
                    schema.nullable_column(column.name, data_type)
                } else {
                    schema.column(column.name, data_type)
                };
            }
            catalog.add_relation(schema);
        }
        info!(relations = catalog.relations.len(), "Loaded catalog");
        catalog
    }
}

/// JSON form of a catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Relations.
    pub relations: Vec<RelationConfig>,
}

/// JSON form of a relation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationConfig {
    /// Document name.
    pub name: String,
    /// Backend table; defaults to the lower-cased name.
    #[serde(default)]
    pub table: Option<String>,
    /// Columns.
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
}

/// JSON form of a column.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnConfig {
    /// Column name.
    pub name: String,
    /// SQL type name, e.g. `INTEGER` or `VARCHAR(30)`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the column accepts NULL.
    #[serde(default)]
    pub nullable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "relations": [
            {
                "name": "User",
                "table": "user_account",
                "columns": [
                    {"name": "id", "type": "INTEGER"},
                    {"name": "fullname", "type": "TEXT", "nullable": true},
                    {"name": "account_details", "type": "JSON", "nullable": true}
                ]
            },
            {"name": "Role", "columns": [{"name": "id", "type": "integer"}]}
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let catalog = Catalog::from_json(CATALOG).unwrap();

        let user = catalog.get_relation("User").unwrap();
        assert_eq!(user.table, "user_account");
        assert_eq!(user.columns().len(), 3);
        assert!(user.get_column("fullname").unwrap().nullable);
        assert!(user.get_column("account_details").unwrap().data_type.is_json());

        let role = catalog.get_relation("Role").unwrap();
        assert_eq!(role.table, "role");
        assert_eq!(role.get_column("id").unwrap().data_type, DataType::Integer);
    }

    #[test]
    fn test_lookups_are_case_sensitive() {
        let catalog = Catalog::from_json(CATALOG).unwrap();
        assert!(catalog.get_relation("user").is_none());
        assert!(catalog.get_relation("User").unwrap().get_column("ID").is_none());
    }

    #[test]
    fn test_column_expr() {
        let user = RelationSchema::new("User", "user_account").column("id", DataType::Integer);
        assert_eq!(
            user.column_expr("id"),
            Some(Expr::qualified_column("user_account", "id"))
        );
        assert_eq!(user.column_expr("missing"), None);
    }

    #[test]
    fn test_invalid_catalog() {
        assert!(Catalog::from_json(r#"{"relations": [{"columns": []}]}"#).is_err());
    }
}
