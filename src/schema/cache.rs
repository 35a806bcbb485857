use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;

use super::{TableSchema, TableSchemaBuilder};
use crate::cache::{CacheService, MutexCache};
use crate::client::{ConnectionState, DbConnection};
use crate::error::SqlGlueError;
use crate::provider::ProviderMetadata;

/// Cache key for a table schema: provider, database, table and schema, case-folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaKey(u64);

impl SchemaKey {
    #[must_use]
    pub fn new(
        provider: &ProviderMetadata,
        database: Option<&str>,
        table: &str,
        schema: Option<&str>,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        provider.key.hash(&mut hasher);
        database.map(str::to_ascii_lowercase).hash(&mut hasher);
        table.to_ascii_lowercase().hash(&mut hasher);
        schema.map(str::to_ascii_lowercase).hash(&mut hasher);
        SchemaKey(hasher.finish())
    }
}

/// Loads table schemas on first access and keeps them for the life of the cache.
#[derive(Debug)]
pub struct TableSchemaCache<C = MutexCache<SchemaKey, TableSchema>> {
    cache: C,
}

impl Default for TableSchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TableSchemaCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache(MutexCache::new())
    }
}

impl<C> TableSchemaCache<C>
where
    C: CacheService<SchemaKey, TableSchema>,
{
    #[must_use]
    pub fn with_cache(cache: C) -> Self {
        Self { cache }
    }

    /// Schema of `table` (optionally `schema.table` or with an explicit `schema`).
    ///
    /// # Errors
    /// - `ArgumentError` for an empty table name, for a closed connection without a
    ///   database, or when the table has no columns.
    /// - Any driver error raised by the column query.
    pub async fn load(
        &self,
        conn: &mut dyn DbConnection,
        provider: &Arc<ProviderMetadata>,
        table: &str,
        schema: Option<&str>,
    ) -> Result<Arc<TableSchema>, SqlGlueError> {
        let (table, schema) = split_qualified(table, schema);
        if table.is_empty() {
            return Err(SqlGlueError::ArgumentError("table name is empty".into()));
        }
        if conn.state() != ConnectionState::Open {
            if conn.database().is_none() {
                return Err(SqlGlueError::ArgumentError(
                    "connection is not open and has no database".into(),
                ));
            }
            conn.open().await?;
        }

        let database = conn.database().or_else(|| provider.database.clone());
        let key = SchemaKey::new(provider, database.as_deref(), &table, schema.as_deref());
        let provider = Arc::clone(provider);

        self.cache
            .get_or_try_create(key, || async move {
                let dialect = provider.dialect();
                let mut command = dialect.columns_query(&provider, &table, schema.as_deref());
                command.timeout = Some(provider.default_timeout);
                let rows = conn.query(&command).await?;
                let columns = dialect.parse_columns(&rows)?;
                if columns.is_empty() {
                    return Err(SqlGlueError::ArgumentError(format!(
                        "table '{table}' not found"
                    )));
                }
                debug!(
                    table = %table,
                    schema = ?schema,
                    columns = columns.len(),
                    "loaded table schema"
                );

                let mut builder = TableSchemaBuilder::new(Arc::clone(&provider), table)
                    .schema_name(schema.or_else(|| provider.default_schema.clone()))
                    .database(database);
                for column in columns {
                    builder.add_column(column)?;
                }
                builder.build()
            })
            .await
    }
}

fn split_qualified(table: &str, schema: Option<&str>) -> (String, Option<String>) {
    let unquote = |s: &str| s.trim().trim_matches(['[', ']', '`', '"']).to_string();
    match (schema, table.rsplit_once('.')) {
        (None, Some((owner, name))) => (unquote(name), Some(unquote(owner))),
        _ => (unquote(table), schema.map(unquote).filter(|s| !s.is_empty())),
    }
}
