use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::client::{CommandConventions, ConnectionState, DbConnection};
use crate::command::{Command, DbParameter};
use crate::error::SqlGlueError;
use crate::results::ResultSet;

/// Stand-in for a driver's native parameter factory.
pub type NativeFactory = fn(&str, &JsonValue) -> Option<DbParameter>;

/// Every command a [`ScriptedConnection`] was asked to run, shared across clones.
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<Command>>>);

impl CommandLog {
    fn push(&self, command: Command) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }

    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.commands().into_iter().map(|c| c.text).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of logged commands whose text contains `fragment`.
    #[must_use]
    pub fn count_containing(&self, fragment: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.text.contains(fragment))
            .count()
    }

    #[must_use]
    pub fn last(&self) -> Option<Command> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

/// A [`DbConnection`] that answers from a script instead of a database.
///
/// Responses are matched by the first registered fragment contained in the command text.
/// Unmatched queries return an empty result set; executes return the configured row count.
///
/// ```rust
/// use sql_glue::prelude::*;
/// use sql_glue::test_utils::{ScriptedConnection, result_set};
///
/// # async fn demo() -> Result<(), SqlGlueError> {
/// let conn = ScriptedConnection::sql_server()
///     .respond("SCOPE_IDENTITY", result_set(&["id"], vec![vec![RowValues::Int(9)]]));
/// let log = conn.log();
/// let mut ctx = DbContext::open(Box::new(conn)).await?;
/// let id = ctx.command().text("SELECT SCOPE_IDENTITY()").scalar().await?;
/// assert_eq!(id, Some(RowValues::Int(9)));
/// assert_eq!(log.len(), 1);
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct ScriptedConnection {
    connection_type: String,
    connection_string: String,
    database: Option<String>,
    conventions: Option<CommandConventions>,
    native: Option<NativeFactory>,
    state: ConnectionState,
    responses: Vec<(String, ResultSet)>,
    failures: Vec<(String, String)>,
    rows_affected: usize,
    log: CommandLog,
    opens: Arc<AtomicUsize>,
    in_transaction: bool,
}

impl ScriptedConnection {
    #[must_use]
    pub fn new(connection_type: impl Into<String>) -> Self {
        Self {
            connection_type: connection_type.into(),
            connection_string: "Data Source=scripted".into(),
            database: Some("scripted".into()),
            conventions: None,
            native: None,
            state: ConnectionState::Closed,
            responses: Vec::new(),
            failures: Vec::new(),
            rows_affected: 1,
            log: CommandLog::default(),
            opens: Arc::new(AtomicUsize::new(0)),
            in_transaction: false,
        }
    }

    #[must_use]
    pub fn sql_server() -> Self {
        Self::new("SqlClient.SqlConnection")
    }

    #[must_use]
    pub fn mysql() -> Self {
        Self::new("MySqlConnector.MySqlConnection")
    }

    #[must_use]
    pub fn sqlite() -> Self {
        Self::new("rusqlite::Connection").with_database(Some("main"))
    }

    #[must_use]
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = connection_string.into();
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: Option<&str>) -> Self {
        self.database = database.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_conventions(mut self, prefix: &str, suffix: &str, parameter_prefix: &str) -> Self {
        self.conventions = Some(CommandConventions {
            quote_prefix: prefix.into(),
            quote_suffix: suffix.into(),
            parameter_prefix: parameter_prefix.into(),
        });
        self
    }

    #[must_use]
    pub fn with_native_factory(mut self, factory: NativeFactory) -> Self {
        self.native = Some(factory);
        self
    }

    /// Start in the open state.
    #[must_use]
    pub fn opened(mut self) -> Self {
        self.state = ConnectionState::Open;
        self
    }

    /// Answer queries whose text contains `fragment` with `result`.
    #[must_use]
    pub fn respond(mut self, fragment: impl Into<String>, result: ResultSet) -> Self {
        self.responses.push((fragment.into(), result));
        self
    }

    /// Fail any command whose text contains `fragment`.
    #[must_use]
    pub fn fail_on(mut self, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.push((fragment.into(), message.into()));
        self
    }

    #[must_use]
    pub fn with_rows_affected(mut self, rows_affected: usize) -> Self {
        self.rows_affected = rows_affected;
        self
    }

    /// Handle on the shared command log.
    #[must_use]
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Handle on the shared open counter.
    #[must_use]
    pub fn open_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opens)
    }

    fn ensure_open(&self) -> Result<(), SqlGlueError> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closed => Err(SqlGlueError::ConnectionError(
                "scripted connection is not open".into(),
            )),
        }
    }

    fn check_failure(&self, text: &str) -> Result<(), SqlGlueError> {
        match self.failures.iter().find(|(fragment, _)| text.contains(fragment.as_str())) {
            Some((_, message)) => Err(SqlGlueError::ExecutionError(message.clone())),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ScriptedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedConnection")
            .field("connection_type", &self.connection_type)
            .field("state", &self.state)
            .field("responses", &self.responses.len())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

#[async_trait]
impl DbConnection for ScriptedConnection {
    fn connection_type(&self) -> &str {
        &self.connection_type
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn database(&self) -> Option<String> {
        self.database.clone()
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn open(&mut self) -> Result<(), SqlGlueError> {
        if self.state == ConnectionState::Closed {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.state = ConnectionState::Open;
        }
        Ok(())
    }

    fn command_conventions(&self) -> Option<CommandConventions> {
        self.conventions.clone()
    }

    fn native_parameter(&self, name: &str, value: &JsonValue) -> Option<DbParameter> {
        self.native.and_then(|factory| factory(name, value))
    }

    async fn prepare(&mut self, command: &Command) -> Result<(), SqlGlueError> {
        self.ensure_open()?;
        self.check_failure(&command.text)
    }

    async fn query(&mut self, command: &Command) -> Result<ResultSet, SqlGlueError> {
        self.ensure_open()?;
        self.log.push(command.clone());
        self.check_failure(&command.text)?;
        Ok(self
            .responses
            .iter()
            .find(|(fragment, _)| command.text.contains(fragment.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }

    async fn execute(&mut self, command: &Command) -> Result<usize, SqlGlueError> {
        self.ensure_open()?;
        self.log.push(command.clone());
        self.check_failure(&command.text)?;
        Ok(self.rows_affected)
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlGlueError> {
        self.ensure_open()?;
        self.log.push(Command::new(sql));
        self.check_failure(sql)
    }

    async fn begin_transaction(&mut self) -> Result<(), SqlGlueError> {
        self.ensure_open()?;
        if self.in_transaction {
            return Err(SqlGlueError::InvalidOperation("transaction already in progress".into()));
        }
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SqlGlueError> {
        if !std::mem::replace(&mut self.in_transaction, false) {
            return Err(SqlGlueError::InvalidOperation("no transaction to commit".into()));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlGlueError> {
        if !std::mem::replace(&mut self.in_transaction, false) {
            return Err(SqlGlueError::InvalidOperation("no transaction to roll back".into()));
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    #[tokio::test]
    async fn clones_share_the_log_and_open_counter() -> Result<(), Box<dyn std::error::Error>> {
        let original = ScriptedConnection::sqlite().with_rows_affected(3);
        let log = original.log();
        let opens = original.open_counter();
        let mut conn = original.clone();

        assert!(conn.query(&Command::new("SELECT 1")).await.is_err());
        conn.open().await?;
        conn.open().await?;
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(conn.execute(&Command::new("DELETE FROM t")).await?, 3);
        assert_eq!(log.texts(), vec!["DELETE FROM t".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn responses_match_by_fragment() -> Result<(), Box<dyn std::error::Error>> {
        let mut conn = ScriptedConnection::sql_server()
            .opened()
            .respond("FROM a", ResultSet::from_rows(vec!["x"], vec![vec![RowValues::Int(1)]]))
            .fail_on("FROM broken", "boom");
        let rs = conn.query(&Command::new("SELECT x FROM a")).await?;
        assert_eq!(rs.scalar(), Some(&RowValues::Int(1)));
        assert!(conn.query(&Command::new("SELECT x FROM b")).await?.is_empty());
        assert!(matches!(
            conn.prepare(&Command::new("SELECT * FROM broken")).await,
            Err(SqlGlueError::ExecutionError(ref m)) if m == "boom"
        ));
        Ok(())
    }
}
