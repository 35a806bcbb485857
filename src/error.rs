use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "mssql")]
use tiberius;

#[derive(Debug, Error)]
pub enum SqlGlueError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    /// A precondition on an argument was violated (empty name, missing table, ...).
    #[error("Argument error: {0}")]
    ArgumentError(String),

    /// The object is in a state that does not allow the call (closed reader, missing transaction).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The command or builder was already finalized or disposed.
    #[error("Cannot access a disposed object: {0}")]
    ObjectDisposed(String),

    #[error("Invalid cast for field '{field}': {message}")]
    InvalidCast { field: String, message: String },

    /// The provider cannot do what was asked (unknown dialect, no pagination, ...).
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl SqlGlueError {
    pub(crate) fn invalid_cast(field: impl Into<String>, message: impl ToString) -> Self {
        SqlGlueError::InvalidCast {
            field: field.into(),
            message: message.to_string(),
        }
    }
}
