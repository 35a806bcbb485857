use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::debug;

use super::config::SqliteOptions;
use super::params::infer_parameter;
use super::query::{bind_parameters, build_result_set};
use crate::client::{ConnectionState, DbConnection};
use crate::command::{Command, DbParameter};
use crate::error::SqlGlueError;
use crate::results::ResultSet;

pub(crate) type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

const CONNECTION_TYPE: &str = "rusqlite::Connection";

/// A single rusqlite connection driven from async code.
pub struct SqliteConnection {
    options: SqliteOptions,
    connection_string: String,
    conn: Option<SharedSqliteConnection>,
    in_transaction: bool,
}

impl SqliteConnection {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        let connection_string = options.connection_string();
        Self {
            options,
            connection_string,
            conn: None,
            in_transaction: false,
        }
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }

    /// Run `func` against the raw rusqlite connection on the blocking pool.
    ///
    /// # Errors
    /// `ConnectionError` when the connection is closed, else whatever `func` returns.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, SqlGlueError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlGlueError> + Send + 'static,
        R: Send + 'static,
    {
        run_blocking(self.conn_handle()?, func).await
    }

    pub(crate) fn conn_handle(&self) -> Result<SharedSqliteConnection, SqlGlueError> {
        self.conn
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| SqlGlueError::ConnectionError("sqlite connection is not open".into()))
    }

    pub(crate) async fn open_now(&mut self) -> Result<(), SqlGlueError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let options = self.options.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<_, SqlGlueError> {
            let conn = rusqlite::Connection::open(&options.db_path)?;
            if let Some(timeout) = options.busy_timeout {
                conn.busy_timeout(timeout)?;
            }
            if options.wal {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            Ok(conn)
        })
        .await
        .map_err(|e| SqlGlueError::ConnectionError(format!("sqlite open join error: {e}")))??;
        debug!(path = %self.options.db_path, "opened sqlite connection");
        self.conn = Some(Arc::new(Mutex::new(conn)));
        Ok(())
    }

    async fn run_transaction_statement(&mut self, sql: &'static str) -> Result<(), SqlGlueError> {
        run_blocking(self.conn_handle()?, move |conn| {
            conn.execute_batch(sql)?;
            Ok(())
        })
        .await
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("options", &self.options)
            .field("open", &self.conn.is_some())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

pub(crate) async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, SqlGlueError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlGlueError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlGlueError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}

/// Busy timeout rusqlite installs when it opens a connection.
const DRIVER_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `func` under the command's busy timeout, then put the connection's own back.
fn with_busy_timeout<R>(
    conn: &mut rusqlite::Connection,
    timeout: Option<Duration>,
    configured: Option<Duration>,
    func: impl FnOnce(&mut rusqlite::Connection) -> Result<R, SqlGlueError>,
) -> Result<R, SqlGlueError> {
    let Some(timeout) = timeout else {
        return func(conn);
    };
    conn.busy_timeout(timeout)?;
    let result = func(conn);
    let restored = conn.busy_timeout(configured.unwrap_or(DRIVER_BUSY_TIMEOUT));
    let value = result?;
    restored?;
    Ok(value)
}

#[async_trait]
impl DbConnection for SqliteConnection {
    fn connection_type(&self) -> &str {
        CONNECTION_TYPE
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn database(&self) -> Option<String> {
        Some("main".to_string())
    }

    fn state(&self) -> ConnectionState {
        if self.conn.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    async fn open(&mut self) -> Result<(), SqlGlueError> {
        self.open_now().await
    }

    fn native_parameter(&self, name: &str, value: &JsonValue) -> Option<DbParameter> {
        Some(infer_parameter(name, value))
    }

    async fn prepare(&mut self, command: &Command) -> Result<(), SqlGlueError> {
        let sql = command.text.clone();
        run_blocking(self.conn_handle()?, move |conn| {
            conn.prepare(&sql)?;
            Ok(())
        })
        .await
    }

    async fn query(&mut self, command: &Command) -> Result<ResultSet, SqlGlueError> {
        let Command {
            text,
            parameters,
            timeout,
            ..
        } = command.clone();
        let configured = self.options.busy_timeout;
        run_blocking(self.conn_handle()?, move |conn| {
            with_busy_timeout(conn, timeout, configured, |conn| {
                let mut stmt = conn.prepare(&text)?;
                bind_parameters(&mut stmt, &parameters)?;
                build_result_set(&mut stmt)
            })
        })
        .await
    }

    async fn execute(&mut self, command: &Command) -> Result<usize, SqlGlueError> {
        let Command {
            text,
            parameters,
            timeout,
            ..
        } = command.clone();
        let configured = self.options.busy_timeout;
        run_blocking(self.conn_handle()?, move |conn| {
            with_busy_timeout(conn, timeout, configured, |conn| {
                let mut stmt = conn.prepare(&text)?;
                bind_parameters(&mut stmt, &parameters)?;
                Ok(stmt.raw_execute()?)
            })
        })
        .await
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlGlueError> {
        let sql = sql.to_owned();
        run_blocking(self.conn_handle()?, move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    async fn begin_transaction(&mut self) -> Result<(), SqlGlueError> {
        if self.in_transaction {
            return Err(SqlGlueError::InvalidOperation(
                "sqlite transaction already in progress".into(),
            ));
        }
        self.run_transaction_statement("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SqlGlueError> {
        if !self.in_transaction {
            return Err(SqlGlueError::InvalidOperation("no sqlite transaction to commit".into()));
        }
        self.run_transaction_statement("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlGlueError> {
        if !self.in_transaction {
            return Err(SqlGlueError::InvalidOperation("no sqlite transaction to roll back".into()));
        }
        self.in_transaction = false;
        self.run_transaction_statement("ROLLBACK").await
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParameterDirection, RowValues};

    #[tokio::test]
    async fn binds_named_parameters_case_insensitively() -> Result<(), Box<dyn std::error::Error>> {
        let mut conn = SqliteOptions::new(":memory:".into()).connection();
        assert_eq!(conn.state(), ConnectionState::Closed);
        conn.open().await?;
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);")
            .await?;

        let insert = Command::new("INSERT INTO t (id, name) VALUES ($Id, $name)")
            .with_parameter(DbParameter::new("id", RowValues::Int(7)))
            .with_parameter(DbParameter::new("@NAME", RowValues::Text("x".into())));
        assert_eq!(conn.execute(&insert).await?, 1);

        let rs = conn
            .query(
                &Command::new("SELECT name FROM t WHERE id = @id")
                    .with_parameter(DbParameter::new("ID", RowValues::Int(7))),
            )
            .await?;
        assert_eq!(rs.scalar(), Some(&RowValues::Text("x".into())));
        Ok(())
    }

    #[tokio::test]
    async fn missing_parameter_is_reported_by_name() -> Result<(), Box<dyn std::error::Error>> {
        let mut conn = SqliteOptions::new(":memory:".into()).connection();
        conn.open().await?;
        let err = conn
            .query(&Command::new("SELECT $missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, SqlGlueError::ParameterError(ref m) if m.contains("$missing")));
        Ok(())
    }

    #[tokio::test]
    async fn output_parameters_are_refused() -> Result<(), Box<dyn std::error::Error>> {
        let mut conn = SqliteOptions::new(":memory:".into()).connection();
        conn.open().await?;
        let command = Command::new("SELECT $total").with_parameter(
            DbParameter::new("total", RowValues::Int(0)).with_direction(ParameterDirection::Output),
        );
        let err = conn.query(&command).await.unwrap_err();
        assert!(matches!(err, SqlGlueError::NotSupported(ref m) if m.contains("total")));
        Ok(())
    }

    #[tokio::test]
    async fn closed_connection_refuses_commands() {
        let mut conn = SqliteOptions::new(":memory:".into()).connection();
        let err = conn.execute_batch("SELECT 1").await.unwrap_err();
        assert!(matches!(err, SqlGlueError::ConnectionError(_)));
    }

    #[tokio::test]
    async fn command_timeout_does_not_outlive_the_command() -> Result<(), Box<dyn std::error::Error>> {
        let mut conn = SqliteOptions::builder(":memory:".into())
            .busy_timeout(Duration::from_millis(1500))
            .finish()
            .connection();
        conn.open().await?;
        let select = Command::new("SELECT 1").with_timeout(Duration::from_secs(30));
        conn.query(&select).await?;
        conn.execute(&Command::new("CREATE TABLE t (id INTEGER)").with_timeout(Duration::from_secs(9)))
            .await?;

        let busy = conn
            .with_connection(|c| Ok(c.query_row("PRAGMA busy_timeout", [], |r| r.get::<_, i64>(0))?))
            .await?;
        assert_eq!(busy, 1500);
        Ok(())
    }

    #[tokio::test]
    async fn rollback_discards_work() -> Result<(), Box<dyn std::error::Error>> {
        let mut conn = SqliteOptions::new(":memory:".into()).connection();
        conn.open().await?;
        conn.execute_batch("CREATE TABLE t (id INTEGER);").await?;
        conn.begin_transaction().await?;
        assert!(conn.in_transaction());
        conn.execute_batch("INSERT INTO t VALUES (1);").await?;
        conn.rollback().await?;
        assert!(!conn.in_transaction());
        let rs = conn.query(&Command::new("SELECT COUNT(*) FROM t")).await?;
        assert_eq!(rs.scalar(), Some(&RowValues::Int(0)));
        Ok(())
    }
}
