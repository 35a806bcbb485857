use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tiberius::Query;
use tracing::{debug, warn};

use super::client::{MssqlClient, create_mssql_client};
use super::config::MssqlOptions;
use super::params::{bind_query_params, infer_parameter};
use super::query::build_result_set;
use crate::client::{CommandConventions, ConnectionState, DbConnection};
use crate::command::{Command, DbParameter};
use crate::error::SqlGlueError;
use crate::results::ResultSet;
use crate::translation::rewrite_named_to_positional;

const CONNECTION_TYPE: &str = "tiberius::Client";

pub struct MssqlConnection {
    options: MssqlOptions,
    connection_string: String,
    client: Option<MssqlClient>,
    in_transaction: bool,
}

impl MssqlConnection {
    #[must_use]
    pub fn new(options: MssqlOptions) -> Self {
        let connection_string = options.connection_string();
        Self {
            options,
            connection_string,
            client: None,
            in_transaction: false,
        }
    }

    fn client(&mut self) -> Result<&mut MssqlClient, SqlGlueError> {
        self.client
            .as_mut()
            .ok_or_else(|| SqlGlueError::ConnectionError("SQL Server connection is not open".into()))
    }

    async fn run_simple(&mut self, sql: &str) -> Result<(), SqlGlueError> {
        Query::new(sql)
            .execute(self.client()?)
            .await
            .map_err(|e| SqlGlueError::ExecutionError(format!("MSSQL batch error: {e}")))?;
        Ok(())
    }
}

impl fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("connection_string", &self.connection_string)
            .field("open", &self.client.is_some())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

/// `None` when `timeout` elapsed before `fut` finished.
async fn with_timeout<F, R>(timeout: Option<Duration>, fut: F) -> Option<Result<R, SqlGlueError>>
where
    F: Future<Output = Result<R, SqlGlueError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

impl MssqlConnection {
    /// Unwrap a timed call. A call cut off mid-exchange leaves unread packets on the
    /// stream, so the client is dropped and the connection reports closed.
    fn settle<R>(
        &mut self,
        outcome: Option<Result<R, SqlGlueError>>,
        timeout: Option<Duration>,
    ) -> Result<R, SqlGlueError> {
        outcome.unwrap_or_else(|| {
            let secs = timeout.map_or(0, |t| t.as_secs());
            warn!(server = %self.options.server, secs, "SQL Server command timed out; closing connection");
            self.client = None;
            self.in_transaction = false;
            Err(SqlGlueError::ExecutionError(format!(
                "command timed out after {secs}s; the connection was closed"
            )))
        })
    }
}

#[async_trait]
impl DbConnection for MssqlConnection {
    fn connection_type(&self) -> &str {
        CONNECTION_TYPE
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn database(&self) -> Option<String> {
        Some(self.options.database.clone())
    }

    fn state(&self) -> ConnectionState {
        if self.client.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    async fn open(&mut self) -> Result<(), SqlGlueError> {
        if self.client.is_none() {
            self.client = Some(create_mssql_client(&self.options).await?);
            debug!(server = %self.options.server, database = %self.options.database, "opened SQL Server connection");
        }
        Ok(())
    }

    fn command_conventions(&self) -> Option<CommandConventions> {
        Some(CommandConventions {
            quote_prefix: "[".into(),
            quote_suffix: "]".into(),
            parameter_prefix: "@".into(),
        })
    }

    fn native_parameter(&self, name: &str, value: &JsonValue) -> Option<DbParameter> {
        Some(infer_parameter(name, value))
    }

    async fn query(&mut self, command: &Command) -> Result<ResultSet, SqlGlueError> {
        command.parameters.ensure_inputs()?;
        let (sql, names) = rewrite_named_to_positional(&command.text);
        let values = command.parameters.values_for(&names)?;
        let query = bind_query_params(&sql, &values);
        let outcome = with_timeout(command.timeout, build_result_set(self.client()?, query)).await;
        self.settle(outcome, command.timeout)
    }

    async fn execute(&mut self, command: &Command) -> Result<usize, SqlGlueError> {
        command.parameters.ensure_inputs()?;
        let (sql, names) = rewrite_named_to_positional(&command.text);
        let values = command.parameters.values_for(&names)?;
        let query = bind_query_params(&sql, &values);
        let client = self.client()?;
        let outcome = with_timeout(command.timeout, async move {
            query
                .execute(client)
                .await
                .map_err(|e| SqlGlueError::ExecutionError(format!("MSSQL execute error: {e}")))
        })
        .await;
        let result = self.settle(outcome, command.timeout)?;
        let rows_affected: u64 = result.rows_affected().iter().sum();
        usize::try_from(rows_affected).map_err(|e| {
            SqlGlueError::ExecutionError(format!("Invalid rows affected count: {e}"))
        })
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlGlueError> {
        self.run_simple(sql).await
    }

    async fn begin_transaction(&mut self) -> Result<(), SqlGlueError> {
        if self.in_transaction {
            return Err(SqlGlueError::InvalidOperation(
                "SQL Server transaction already in progress".into(),
            ));
        }
        self.run_simple("BEGIN TRANSACTION").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SqlGlueError> {
        if !self.in_transaction {
            return Err(SqlGlueError::InvalidOperation("no SQL Server transaction to commit".into()));
        }
        self.run_simple("COMMIT TRANSACTION").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SqlGlueError> {
        if !self.in_transaction {
            return Err(SqlGlueError::InvalidOperation(
                "no SQL Server transaction to roll back".into(),
            ));
        }
        self.in_transaction = false;
        self.run_simple("ROLLBACK TRANSACTION").await
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}
