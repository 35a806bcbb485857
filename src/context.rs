//! [`DbContext`] ties one connection to the shared metadata services; [`TableCommands`]
//! offers record-level select, insert, update and delete on one table.

use std::marker::PhantomData;
use std::sync::{Arc, LazyLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::client::DbConnection;
use crate::command::CommandSource;
use crate::dialect::Dialect;
use crate::error::SqlGlueError;
use crate::materialize::materialize_all;
use crate::provider::{ProviderKind, ProviderMetadata, ProviderMetadataResolver, ResolverOptions};
use crate::reader::ResultSetReader;
use crate::record::Record;
use crate::schema::{DbColumn, TableSchema, TableSchemaCache};

/// Provider-metadata and table-schema caches shared by contexts.
#[derive(Debug, Default)]
pub struct MetadataServices {
    pub providers: ProviderMetadataResolver,
    pub schemas: TableSchemaCache,
}

static GLOBAL_SERVICES: LazyLock<Arc<MetadataServices>> =
    LazyLock::new(|| Arc::new(MetadataServices::default()));

impl MetadataServices {
    #[must_use]
    pub fn new(options: ResolverOptions) -> Self {
        Self {
            providers: ProviderMetadataResolver::new(options),
            schemas: TableSchemaCache::new(),
        }
    }

    /// Process-wide instance used by [`DbContext::open`].
    #[must_use]
    pub fn global() -> Arc<MetadataServices> {
        Arc::clone(&GLOBAL_SERVICES)
    }
}

/// A connection with its resolved provider metadata.
pub struct DbContext {
    conn: Box<dyn DbConnection>,
    provider: Arc<ProviderMetadata>,
    services: Arc<MetadataServices>,
}

impl DbContext {
    /// Open `conn` if needed and resolve its provider through the global services.
    ///
    /// # Errors
    /// See [`ProviderMetadataResolver::resolve`].
    pub async fn open(conn: Box<dyn DbConnection>) -> Result<Self, SqlGlueError> {
        Self::with_services(conn, MetadataServices::global()).await
    }

    /// Like [`DbContext::open`] with an isolated set of caches.
    ///
    /// # Errors
    /// See [`ProviderMetadataResolver::resolve`].
    pub async fn with_services(
        mut conn: Box<dyn DbConnection>,
        services: Arc<MetadataServices>,
    ) -> Result<Self, SqlGlueError> {
        let provider = services.providers.resolve(conn.as_mut()).await?;
        Ok(Self {
            conn,
            provider,
            services,
        })
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<ProviderMetadata> {
        &self.provider
    }

    #[must_use]
    pub fn dialect(&self) -> &'static dyn Dialect {
        self.provider.dialect()
    }

    #[must_use]
    pub fn services(&self) -> &Arc<MetadataServices> {
        &self.services
    }

    pub fn connection_mut(&mut self) -> &mut dyn DbConnection {
        self.conn.as_mut()
    }

    #[must_use]
    pub fn into_connection(self) -> Box<dyn DbConnection> {
        self.conn
    }

    /// A new single-use command builder on this connection.
    pub fn command(&mut self) -> CommandSource<'_> {
        CommandSource::new(self.conn.as_mut(), Arc::clone(&self.provider))
    }

    /// Record-level commands for `table` (optionally `schema.table`).
    pub fn table<T: Record>(&mut self, table: &str) -> TableCommands<'_, T> {
        TableCommands {
            ctx: self,
            table: table.to_string(),
            schema_name: None,
            _record: PhantomData,
        }
    }

    /// # Errors
    /// See [`TableSchemaCache::load`].
    pub async fn table_schema(
        &mut self,
        table: &str,
        schema: Option<&str>,
    ) -> Result<Arc<TableSchema>, SqlGlueError> {
        self.services
            .schemas
            .load(self.conn.as_mut(), &self.provider, table, schema)
            .await
    }

    /// # Errors
    /// The driver's error.
    pub async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlGlueError> {
        self.conn.execute_batch(sql).await
    }

    /// # Errors
    /// The driver's error.
    pub async fn begin_transaction(&mut self) -> Result<(), SqlGlueError> {
        self.conn.begin_transaction().await
    }

    /// # Errors
    /// The driver's error.
    pub async fn commit(&mut self) -> Result<(), SqlGlueError> {
        self.conn.commit().await
    }

    /// # Errors
    /// The driver's error.
    pub async fn rollback(&mut self) -> Result<(), SqlGlueError> {
        self.conn.rollback().await
    }
}

/// How an inserted row is read back.
enum Reselect {
    /// Insert and select in one batch.
    SameBatch(String),
    /// Select through the last-inserted clause after the insert.
    After(String),
    /// Select by the record's key values.
    ByKey(Vec<&'static str>),
}

/// Select, insert, update and delete records of type `T` in one table. Columns are matched
/// to record fields by name, ignoring case.
pub struct TableCommands<'c, T> {
    ctx: &'c mut DbContext,
    table: String,
    schema_name: Option<String>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> TableCommands<'_, T> {
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema_name = Some(schema.into());
        self
    }

    /// Cached schema of the table.
    ///
    /// # Errors
    /// See [`TableSchemaCache::load`].
    pub async fn schema(&mut self) -> Result<Arc<TableSchema>, SqlGlueError> {
        self.ctx
            .table_schema(&self.table, self.schema_name.as_deref())
            .await
    }

    /// Record fields backed by a column accepted by `keep`.
    fn fields(schema: &TableSchema, keep: impl Fn(&DbColumn) -> bool) -> Vec<&'static str> {
        T::shape()
            .fields()
            .iter()
            .filter(|f| f.db_type.is_some())
            .filter(|f| schema.column(f.name).is_some_and(&keep))
            .map(|f| f.name)
            .collect()
    }

    fn key_fields(&self, schema: &TableSchema) -> Result<Vec<&'static str>, SqlGlueError> {
        let keys = Self::fields(schema, |c| c.is_key);
        if keys.is_empty() || keys.len() != schema.key_columns().count() {
            return Err(SqlGlueError::InvalidOperation(format!(
                "table '{}' has no key that the record type covers",
                self.table
            )));
        }
        Ok(keys)
    }

    /// # Errors
    /// Schema, driver or mapping errors.
    pub async fn all(&mut self) -> Result<Vec<T>, SqlGlueError> {
        let schema = self.schema().await?;
        self.ctx
            .command()
            .select_from(&schema.qualified_name(), &[])
            .query_as()
            .await
    }

    /// One page of rows, ordered by the key when the table has one.
    ///
    /// # Errors
    /// `NotSupported` on dialects without pagination, plus schema, driver or mapping errors.
    pub async fn page(&mut self, skip: u64, take: u64) -> Result<Vec<T>, SqlGlueError> {
        let schema = self.schema().await?;
        let order = schema
            .key_columns()
            .map(|c| self.ctx.provider.quote_part(&c.name))
            .collect::<Vec<_>>();
        let mut source = self.ctx.command();
        source.select_from(&schema.qualified_name(), &[]);
        if !order.is_empty() {
            source.append(&format!("ORDER BY {}", order.join(", ")));
        }
        source.skip(skip).take(take).query_as().await
    }

    /// Row whose single key column equals `key`.
    ///
    /// # Errors
    /// `InvalidOperation` when the table does not have exactly one key column, plus schema,
    /// driver or mapping errors.
    pub async fn find<K: Serialize + ?Sized + 'static>(
        &mut self,
        key: &K,
    ) -> Result<Option<T>, SqlGlueError> {
        let schema = self.schema().await?;
        let keys = self.key_fields(&schema)?;
        let &[key_field] = keys.as_slice() else {
            return Err(SqlGlueError::InvalidOperation(format!(
                "find needs a single key column; '{}' has {}",
                self.table,
                keys.len()
            )));
        };
        let rows = self
            .ctx
            .command()
            .select_from(&schema.qualified_name(), &[])
            .where_equals(&[key_field])
            .param(key_field, key)
            .query_as::<T>()
            .await?;
        Ok(rows.into_iter().next())
    }

    fn insert_text(&self, schema: &TableSchema, fields: &[&str]) -> String {
        let table = schema.qualified_name();
        if !fields.is_empty() {
            let columns = fields
                .iter()
                .map(|f| self.ctx.provider.quote_part(f))
                .collect::<Vec<_>>()
                .join(", ");
            let values = fields
                .iter()
                .map(|f| self.ctx.provider.parameter_name(f))
                .collect::<Vec<_>>()
                .join(", ");
            format!("INSERT INTO {table} ({columns}) VALUES ({values})")
        } else if self.ctx.provider.kind == ProviderKind::MySql {
            format!("INSERT INTO {table} () VALUES ()")
        } else {
            format!("INSERT INTO {table} DEFAULT VALUES")
        }
    }

    /// Insert without reading the row back. Returns the affected row count.
    ///
    /// # Errors
    /// Schema, binding or driver errors.
    pub async fn insert_only(&mut self, record: &T) -> Result<usize, SqlGlueError> {
        let schema = self.schema().await?;
        let fields = Self::fields(&schema, DbColumn::is_writable);
        let text = self.insert_text(&schema, &fields);
        self.ctx.command().text(text).params_from(record).execute().await
    }

    /// Insert `record` and return the stored row, re-selected through the identity column
    /// (the dialect's last-inserted clause) or otherwise by key.
    ///
    /// Unless the connection already has a transaction open, the insert and the re-select
    /// run in one transaction that is rolled back when either fails.
    ///
    /// # Errors
    /// - `InvalidOperation` when the table has neither identity nor key columns the record
    ///   covers; nothing is inserted in that case.
    /// - `NotSupported` when the dialect has no last-inserted clause.
    /// - Schema, binding, driver or mapping errors.
    pub async fn insert(&mut self, record: &T) -> Result<T, SqlGlueError> {
        let schema = self.schema().await?;
        let fields = Self::fields(&schema, DbColumn::is_writable);
        let insert = self.insert_text(&schema, &fields);
        let dialect = self.ctx.dialect();
        let table = schema.qualified_name();

        let reselect = match schema.identity_column() {
            Some(identity) => {
                let text = format!(
                    "SELECT * FROM {table} WHERE {} = {}",
                    self.ctx.provider.quote_part(&identity.name),
                    dialect.last_inserted_clause(schema.table_name())?
                );
                if dialect.reselect_in_same_batch() {
                    Reselect::SameBatch(format!("SET NOCOUNT ON; {insert}; {text}"))
                } else {
                    Reselect::After(text)
                }
            }
            None => Reselect::ByKey(self.key_fields(&schema)?),
        };

        let owns_transaction = !self.ctx.conn.in_transaction();
        if owns_transaction {
            self.ctx.begin_transaction().await?;
        }
        let outcome = self.insert_and_reselect(record, &table, insert, reselect).await;
        if owns_transaction {
            match &outcome {
                Ok(_) => self.ctx.commit().await?,
                Err(_) => {
                    if let Err(e) = self.ctx.rollback().await {
                        warn!(table = %table, error = %e, "rolling back a failed insert failed");
                    }
                }
            }
        }
        let row = outcome?;
        debug!(table = %table, "inserted and re-selected row");
        Ok(row)
    }

    async fn insert_and_reselect(
        &mut self,
        record: &T,
        table: &str,
        insert: String,
        reselect: Reselect,
    ) -> Result<T, SqlGlueError> {
        let rows = match reselect {
            Reselect::SameBatch(batch) => {
                self.ctx.command().text(batch).params_from(record).query().await?
            }
            Reselect::After(text) => {
                self.ctx.command().text(insert).params_from(record).execute().await?;
                self.ctx.command().text(text).query().await?
            }
            Reselect::ByKey(keys) => {
                self.ctx.command().text(insert).params_from(record).execute().await?;
                self.ctx
                    .command()
                    .select_from(table, &[])
                    .where_equals(&keys)
                    .params_from(record)
                    .query()
                    .await?
            }
        };
        materialize_all::<T, _>(ResultSetReader::new(rows))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SqlGlueError::ExecutionError(format!("inserted row in '{table}' could not be re-selected"))
            })
    }

    /// Update the row matching the record's key. Returns the affected row count.
    ///
    /// # Errors
    /// `InvalidOperation` without key columns, plus schema, binding or driver errors.
    pub async fn update(&mut self, record: &T) -> Result<usize, SqlGlueError> {
        let schema = self.schema().await?;
        let keys = self.key_fields(&schema)?;
        let fields = Self::fields(&schema, |c| c.is_writable() && !c.is_key);
        if fields.is_empty() {
            return Ok(0);
        }
        self.ctx
            .command()
            .update(&schema.qualified_name(), &fields)
            .where_equals(&keys)
            .params_from(record)
            .execute()
            .await
    }

    /// Delete the row matching the record's key. Returns the affected row count.
    ///
    /// # Errors
    /// `InvalidOperation` without key columns, plus schema, binding or driver errors.
    pub async fn delete(&mut self, record: &T) -> Result<usize, SqlGlueError> {
        let schema = self.schema().await?;
        let keys = self.key_fields(&schema)?;
        self.ctx
            .command()
            .delete_from(&schema.qualified_name())
            .where_equals(&keys)
            .params_from(record)
            .execute()
            .await
    }
}
