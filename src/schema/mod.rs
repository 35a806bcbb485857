//! Table column metadata, loaded from the database and cached per table.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SqlGlueError;
use crate::provider::ProviderMetadata;
use crate::typemap::{DbType, TypeFacets};

mod cache;

pub use cache::{SchemaKey, TableSchemaCache};

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbColumn {
    pub name: String,
    /// 1-based position.
    pub ordinal: i64,
    /// Type as the provider spells it (`nvarchar`, `INTEGER`, `int(10) unsigned`).
    pub provider_type: String,
    pub db_type: Option<DbType>,
    pub is_nullable: bool,
    pub is_key: bool,
    pub is_identity: bool,
    pub is_readonly: bool,
    pub is_computed: bool,
    pub max_length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
}

impl DbColumn {
    #[must_use]
    pub fn new(name: impl Into<String>, db_type: Option<DbType>) -> Self {
        DbColumn {
            name: name.into(),
            ordinal: 0,
            provider_type: String::new(),
            db_type,
            is_nullable: true,
            is_key: false,
            is_identity: false,
            is_readonly: false,
            is_computed: false,
            max_length: None,
            precision: None,
            scale: None,
        }
    }

    #[must_use]
    pub fn with_ordinal(mut self, ordinal: i64) -> Self {
        self.ordinal = ordinal;
        self
    }

    #[must_use]
    pub fn with_provider_type(mut self, provider_type: impl Into<String>) -> Self {
        self.provider_type = provider_type.into();
        self
    }

    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    #[must_use]
    pub fn with_key(mut self, key: bool) -> Self {
        self.is_key = key;
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: bool) -> Self {
        self.is_identity = identity;
        self
    }

    #[must_use]
    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.is_readonly = readonly;
        self
    }

    #[must_use]
    pub fn with_computed(mut self, computed: bool) -> Self {
        self.is_computed = computed;
        self
    }

    #[must_use]
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    #[must_use]
    pub fn with_precision(mut self, precision: u8, scale: Option<u8>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn facets(&self) -> TypeFacets {
        TypeFacets {
            max_length: self.max_length,
            precision: self.precision,
            scale: self.scale,
        }
    }

    /// Whether inserts and updates may set this column.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !(self.is_identity || self.is_readonly || self.is_computed)
    }
}

/// Columns of one table, scoped to a provider and database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    provider: Arc<ProviderMetadata>,
    database: Option<String>,
    schema_name: Option<String>,
    table_name: String,
    columns: Vec<DbColumn>,
}

impl TableSchema {
    #[must_use]
    pub fn provider(&self) -> &Arc<ProviderMetadata> {
        &self.provider
    }

    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    #[must_use]
    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[must_use]
    pub fn columns(&self) -> &[DbColumn] {
        &self.columns
    }

    /// Column by name, ignoring case.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&DbColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &DbColumn> {
        self.columns.iter().filter(|c| c.is_key)
    }

    #[must_use]
    pub fn identity_column(&self) -> Option<&DbColumn> {
        self.columns.iter().find(|c| c.is_identity)
    }

    pub fn writable_columns(&self) -> impl Iterator<Item = &DbColumn> {
        self.columns.iter().filter(|c| c.is_writable())
    }

    /// Quoted, schema-qualified table name.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.schema_name {
            Some(schema) => format!(
                "{}.{}",
                self.provider.quote_part(schema),
                self.provider.quote_part(&self.table_name)
            ),
            None => self.provider.quote_part(&self.table_name),
        }
    }

    /// `CREATE TABLE` statement for this schema in the provider's dialect.
    /// Computed columns are left out.
    ///
    /// # Errors
    /// `SqlGlueError::NotSupported` when a column type has no DDL rendering.
    pub fn create_table_sql(&self) -> Result<String, SqlGlueError> {
        let dialect = self.provider.dialect();
        let mapper = dialect.type_mapper();
        let mut lines = Vec::with_capacity(self.columns.len() + 1);
        let mut key_declared = false;

        for column in self.columns.iter().filter(|c| !c.is_computed) {
            let mut line = format!(
                "{} {}",
                self.provider.quote_part(&column.name),
                mapper.column_ddl(column)?
            );
            match dialect.identity_clause() {
                Some(clause) if column.is_identity => {
                    line.push(' ');
                    line.push_str(clause);
                    key_declared |= dialect.identity_declares_key();
                    if !dialect.identity_declares_key() {
                        line.push_str(" NOT NULL");
                    }
                }
                _ if !column.is_nullable => line.push_str(" NOT NULL"),
                _ => {}
            }
            lines.push(line);
        }

        let keys: Vec<String> = self
            .key_columns()
            .map(|c| self.provider.quote_part(&c.name))
            .collect();
        if !keys.is_empty() && !key_declared {
            lines.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        Ok(format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.qualified_name(),
            lines.join(",\n  ")
        ))
    }

    /// Start a builder pre-filled with this schema.
    #[must_use]
    pub fn to_builder(&self) -> TableSchemaBuilder {
        TableSchemaBuilder {
            provider: Arc::clone(&self.provider),
            database: self.database.clone(),
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            columns: self.columns.clone(),
        }
    }
}

/// The only way to change a column list: add or remove columns, then `build`.
#[derive(Debug, Clone)]
pub struct TableSchemaBuilder {
    provider: Arc<ProviderMetadata>,
    database: Option<String>,
    schema_name: Option<String>,
    table_name: String,
    columns: Vec<DbColumn>,
}

impl TableSchemaBuilder {
    #[must_use]
    pub fn new(provider: Arc<ProviderMetadata>, table_name: impl Into<String>) -> Self {
        TableSchemaBuilder {
            database: provider.database.clone(),
            provider,
            schema_name: None,
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn schema_name(mut self, schema_name: Option<String>) -> Self {
        self.schema_name = schema_name;
        self
    }

    #[must_use]
    pub fn database(mut self, database: Option<String>) -> Self {
        self.database = database;
        self
    }

    /// # Errors
    /// `SqlGlueError::ArgumentError` for an empty or duplicate column name.
    pub fn add_column(&mut self, column: DbColumn) -> Result<&mut Self, SqlGlueError> {
        if column.name.trim().is_empty() {
            return Err(SqlGlueError::ArgumentError("column name is empty".into()));
        }
        if self
            .columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&column.name))
        {
            return Err(SqlGlueError::ArgumentError(format!(
                "column '{}' already exists in '{}'",
                column.name, self.table_name
            )));
        }
        self.columns.push(column);
        Ok(self)
    }

    /// Remove a column by name, ignoring case. Returns whether one was removed.
    pub fn remove_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| !c.name.eq_ignore_ascii_case(name));
        self.columns.len() != before
    }

    /// Finish the schema, renumbering ordinals from 1.
    ///
    /// # Errors
    /// `SqlGlueError::ArgumentError` when the table name is empty.
    pub fn build(self) -> Result<TableSchema, SqlGlueError> {
        if self.table_name.trim().is_empty() {
            return Err(SqlGlueError::ArgumentError("table name is empty".into()));
        }
        let columns = self
            .columns
            .into_iter()
            .zip(1..)
            .map(|(column, ordinal)| column.with_ordinal(ordinal))
            .collect();
        Ok(TableSchema {
            provider: self.provider,
            database: self.database,
            schema_name: self.schema_name,
            table_name: self.table_name,
            columns,
        })
    }
}
