//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::client::{ConnectionState, DbConnection};
pub use crate::command::{BoundCommand, Command, CommandSource, DbParameter};
pub use crate::context::{DbContext, MetadataServices, TableCommands};
pub use crate::error::SqlGlueError;
pub use crate::materialize::DynamicRow;
pub use crate::provider::{ProviderKind, ProviderMetadata, ResolverOptions};
pub use crate::record::Record;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::schema::{DbColumn, TableSchema};
pub use crate::typemap::{DbType, DbTypeMapper};
pub use crate::types::{ParameterDirection, RowValues};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnection, SqliteOptions};

#[cfg(feature = "mssql")]
pub use crate::mssql::{MssqlConnection, MssqlOptions};
