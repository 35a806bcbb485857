//! Dialect metadata, table-schema caching, fluent commands and row mapping over
//! rusqlite and tiberius connections.
//!
//! The entry point is [`DbContext`], which binds one [`DbConnection`] to the shared
//! provider-metadata and table-schema caches:
//!
//! ```rust,no_run
//! use sql_glue::prelude::*;
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Person {
//!     id: i64,
//!     name: String,
//! }
//!
//! sql_glue::record_shape!(Person { id: i64, name: String });
//!
//! # async fn demo() -> Result<(), SqlGlueError> {
//! let conn = SqliteOptions::new(":memory:".into()).connection();
//! let mut ctx = DbContext::open(Box::new(conn)).await?;
//! ctx.execute_batch("CREATE TABLE people (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)")
//!     .await?;
//!
//! let inserted = ctx
//!     .table::<Person>("people")
//!     .insert(&Person { id: 0, name: "alice".into() })
//!     .await?;
//! assert_eq!(inserted.id, 1);
//!
//! let page: Vec<Person> = ctx
//!     .command()
//!     .select_from("people", &[])
//!     .skip(0)
//!     .take(10)
//!     .query_as()
//!     .await?;
//! # let _ = page;
//! # Ok(()) }
//! ```

pub mod binder;
pub mod cache;
pub mod client;
pub mod command;
pub mod context;
pub mod dialect;
pub mod error;
pub mod materialize;
pub mod prelude;
pub mod provider;
pub mod reader;
pub mod record;
pub mod results;
pub mod schema;
pub mod translation;
pub mod typemap;
pub mod types;

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use client::{CommandConventions, ConnectionState, DbConnection};
pub use command::{BoundCommand, Command, CommandSource, DbParameter, ParameterCollection};
pub use context::{DbContext, MetadataServices, TableCommands};
pub use error::SqlGlueError;
pub use materialize::DynamicRow;
pub use provider::{ProviderKind, ProviderMetadata, ProviderMetadataResolver, ResolverOptions};
pub use record::{FieldDescriptor, Record, RecordShape};
pub use results::{CustomDbRow, ResultSet};
pub use schema::{DbColumn, TableSchema, TableSchemaBuilder, TableSchemaCache};
pub use typemap::{DbType, DbTypeMapper};
pub use types::{ParameterDirection, RowValues};

#[doc(hidden)]
pub use serde_json;
