//! Provider metadata: which dialect a connection speaks and how it quotes names and
//! parameters. Resolved once per (connection string, database, connection type) and cached.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheService, MutexCache};
use crate::client::{ConnectionState, DbConnection};
use crate::dialect::{Dialect, dialect_for};
use crate::error::SqlGlueError;

/// Database product family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ProviderKind {
    SqlServer,
    MySql,
    Sqlite,
    Unknown,
}

impl ProviderKind {
    /// Classify a driver type name.
    ///
    /// # Errors
    /// Returns `SqlGlueError::ArgumentError` when the name is empty.
    pub fn classify(connection_type: &str) -> Result<Self, SqlGlueError> {
        let name = connection_type.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(SqlGlueError::ArgumentError(
                "connection type name is empty; cannot resolve a provider".into(),
            ));
        }
        let kind = if ["sqlclient", "sqlserver", "mssql", "tiberius"]
            .iter()
            .any(|n| name.contains(n))
        {
            ProviderKind::SqlServer
        } else if name.contains("mysql") || name.contains("mariadb") {
            ProviderKind::MySql
        } else if name.contains("sqlite") {
            ProviderKind::Sqlite
        } else {
            ProviderKind::Unknown
        };
        Ok(kind)
    }
}

/// Cache key for provider metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetadataKey(u64);

impl MetadataKey {
    #[must_use]
    pub fn new(connection_string: &str, database: Option<&str>, connection_type: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        connection_string.hash(&mut hasher);
        database.hash(&mut hasher);
        connection_type.hash(&mut hasher);
        MetadataKey(hasher.finish())
    }
}

/// Resolved dialect facts for one logical connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub kind: ProviderKind,
    pub connection_type: String,
    pub database: Option<String>,
    pub quote_prefix: String,
    pub quote_suffix: String,
    pub parameter_prefix: String,
    pub default_schema: Option<String>,
    pub default_timeout: Duration,
    pub key: MetadataKey,
}

impl ProviderMetadata {
    /// Metadata with the dialect's built-in conventions.
    #[must_use]
    pub fn for_kind(
        kind: ProviderKind,
        connection_string: &str,
        connection_type: &str,
        database: Option<String>,
    ) -> Self {
        let dialect = dialect_for(kind);
        let (prefix, suffix) = dialect.default_quotes();
        ProviderMetadata {
            kind,
            connection_type: connection_type.to_string(),
            default_schema: dialect.default_schema(database.as_deref()),
            key: MetadataKey::new(connection_string, database.as_deref(), connection_type),
            database,
            quote_prefix: prefix.to_string(),
            quote_suffix: suffix.to_string(),
            parameter_prefix: dialect.parameter_prefix().to_string(),
            default_timeout: ResolverOptions::DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn dialect(&self) -> &'static dyn Dialect {
        dialect_for(self.kind)
    }

    /// Quote a single identifier part, doubling embedded closing quotes.
    #[must_use]
    pub fn quote_part(&self, name: &str) -> String {
        let (prefix, suffix) = (self.quote_prefix.as_str(), self.quote_suffix.as_str());
        if name.len() >= prefix.len() + suffix.len()
            && !prefix.is_empty()
            && name.starts_with(prefix)
            && name.ends_with(suffix)
        {
            return name.to_string();
        }
        let escaped = if suffix.is_empty() {
            name.to_string()
        } else {
            name.replace(suffix, &format!("{suffix}{suffix}"))
        };
        format!("{prefix}{escaped}{suffix}")
    }

    /// Quote a possibly schema-qualified name (`dbo.Orders` → `[dbo].[Orders]`).
    #[must_use]
    pub fn quote_identifier(&self, name: &str) -> String {
        name.split('.')
            .map(|part| self.quote_part(part.trim()))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Parameter marker for `name` (`id` → `@id`). An existing marker is replaced.
    #[must_use]
    pub fn parameter_name(&self, name: &str) -> String {
        format!("{}{}", self.parameter_prefix, strip_parameter_prefix(name))
    }
}

/// Drop a leading `@`, `$` or `:` parameter marker.
#[must_use]
pub fn strip_parameter_prefix(name: &str) -> &str {
    name.trim_start_matches(['@', '$', ':'])
}

/// Resolver settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub default_timeout: Duration,
}

impl ResolverOptions {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            default_timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

/// Resolves and caches [`ProviderMetadata`] for live connections.
#[derive(Debug)]
pub struct ProviderMetadataResolver<C = MutexCache<MetadataKey, ProviderMetadata>> {
    cache: C,
    options: ResolverOptions,
}

impl Default for ProviderMetadataResolver {
    fn default() -> Self {
        Self::new(ResolverOptions::default())
    }
}

impl ProviderMetadataResolver {
    #[must_use]
    pub fn new(options: ResolverOptions) -> Self {
        Self::with_cache(MutexCache::new(), options)
    }
}

impl<C> ProviderMetadataResolver<C>
where
    C: CacheService<MetadataKey, ProviderMetadata>,
{
    #[must_use]
    pub fn with_cache(cache: C, options: ResolverOptions) -> Self {
        Self { cache, options }
    }

    #[must_use]
    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    /// Resolve the metadata for `conn`, opening it first if it is closed.
    ///
    /// # Errors
    /// - `ArgumentError` when the connection type name is empty.
    /// - `NotSupported` for an unknown dialect whose driver reports no conventions.
    /// - Any error raised while opening the connection.
    pub async fn resolve(
        &self,
        conn: &mut dyn DbConnection,
    ) -> Result<Arc<ProviderMetadata>, SqlGlueError> {
        let kind = ProviderKind::classify(conn.connection_type())?;
        if conn.state() != ConnectionState::Open {
            conn.open().await?;
        }

        let connection_type = conn.connection_type().to_string();
        let connection_string = conn.connection_string().to_string();
        let database = conn.database();
        let conventions = conn.command_conventions();
        let key = MetadataKey::new(&connection_string, database.as_deref(), &connection_type);
        let timeout = self.options.default_timeout;

        self.cache
            .get_or_try_create(key, || async move {
                if kind == ProviderKind::Unknown && conventions.is_none() {
                    return Err(SqlGlueError::NotSupported(format!(
                        "no dialect for connection type '{connection_type}' and the driver reports no conventions"
                    )));
                }
                let mut meta =
                    ProviderMetadata::for_kind(kind, &connection_string, &connection_type, database);
                if let Some(conv) = conventions {
                    if !conv.quote_prefix.is_empty() {
                        meta.quote_prefix = conv.quote_prefix;
                        meta.quote_suffix = conv.quote_suffix;
                    }
                    if !conv.parameter_prefix.is_empty() {
                        meta.parameter_prefix = conv.parameter_prefix;
                    }
                }
                meta.default_timeout = timeout;
                debug!(
                    kind = ?meta.kind,
                    connection_type = %meta.connection_type,
                    database = ?meta.database,
                    "resolved provider metadata"
                );
                Ok(meta)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_driver_names() {
        assert_eq!(
            ProviderKind::classify("tiberius::Client").unwrap(),
            ProviderKind::SqlServer
        );
        assert_eq!(
            ProviderKind::classify("System.Data.SqlClient.SqlConnection").unwrap(),
            ProviderKind::SqlServer
        );
        assert_eq!(ProviderKind::classify("MySqlConnector").unwrap(), ProviderKind::MySql);
        assert_eq!(
            ProviderKind::classify("rusqlite::Connection").unwrap(),
            ProviderKind::Sqlite
        );
        assert_eq!(ProviderKind::classify("odbc").unwrap(), ProviderKind::Unknown);
        assert!(matches!(
            ProviderKind::classify("  "),
            Err(SqlGlueError::ArgumentError(_))
        ));
    }

    #[test]
    fn quoting_escapes_and_splits_schema() {
        let meta = ProviderMetadata::for_kind(ProviderKind::SqlServer, "cs", "tiberius", None);
        assert_eq!(meta.quote_identifier("dbo.Orders"), "[dbo].[Orders]");
        assert_eq!(meta.quote_part("we]ird"), "[we]]ird]");
        assert_eq!(meta.quote_part("[already]"), "[already]");

        let mysql = ProviderMetadata::for_kind(ProviderKind::MySql, "cs", "mysql", Some("shop".into()));
        assert_eq!(mysql.quote_identifier("orders"), "`orders`");
        assert_eq!(mysql.default_schema.as_deref(), Some("shop"));
    }

    #[test]
    fn parameter_names_use_dialect_prefix() {
        let sqlite = ProviderMetadata::for_kind(ProviderKind::Sqlite, "cs", "rusqlite", None);
        assert_eq!(sqlite.parameter_name("@id"), "$id");
        assert_eq!(sqlite.default_schema.as_deref(), Some("main"));
        assert_eq!(sqlite.default_timeout, Duration::from_secs(30));
    }
}
