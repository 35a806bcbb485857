//! The database client surface everything else is layered on.
//!
//! A [`DbConnection`] knows how to open itself, report its identity (type name, connection
//! string, database) and run a finalized [`Command`]. Backends live in [`crate::sqlite`] and
//! [`crate::mssql`]; tests use `test_utils::ScriptedConnection`.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::command::{Command, DbParameter};
use crate::error::SqlGlueError;
use crate::results::ResultSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

/// Identifier quotes and parameter marker a driver reports for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConventions {
    pub quote_prefix: String,
    pub quote_suffix: String,
    pub parameter_prefix: String,
}

#[async_trait]
pub trait DbConnection: Send {
    /// Driver type name used to classify the dialect (`rusqlite::Connection`, `tiberius::Client`, ...).
    fn connection_type(&self) -> &str;

    fn connection_string(&self) -> &str;

    /// Current database, if the connection knows it.
    fn database(&self) -> Option<String>;

    fn state(&self) -> ConnectionState;

    /// Open the connection. Opening an open connection is a no-op.
    async fn open(&mut self) -> Result<(), SqlGlueError>;

    /// Conventions reported by the driver; `None` when it has no command builder.
    fn command_conventions(&self) -> Option<CommandConventions> {
        None
    }

    /// Native "add with value" parameter factory. Drivers without one return `None` and the
    /// binder falls back to the static type map.
    fn native_parameter(&self, _name: &str, _value: &JsonValue) -> Option<DbParameter> {
        None
    }

    /// Compile the command without running it.
    async fn prepare(&mut self, _command: &Command) -> Result<(), SqlGlueError> {
        Ok(())
    }

    async fn query(&mut self, command: &Command) -> Result<ResultSet, SqlGlueError>;

    /// Run a statement, returning the number of affected rows.
    async fn execute(&mut self, command: &Command) -> Result<usize, SqlGlueError>;

    /// Run parameterless SQL, possibly containing several statements.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlGlueError>;

    async fn begin_transaction(&mut self) -> Result<(), SqlGlueError>;

    async fn commit(&mut self) -> Result<(), SqlGlueError>;

    async fn rollback(&mut self) -> Result<(), SqlGlueError>;

    fn in_transaction(&self) -> bool;
}
