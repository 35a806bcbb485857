use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::{Command, ParameterCollection};
use crate::binder::ParameterBinder;
use crate::client::DbConnection;
use crate::error::SqlGlueError;
use crate::materialize::{DynamicRow, materialize_all, materialize_dynamic};
use crate::provider::ProviderMetadata;
use crate::reader::ResultSetReader;
use crate::record::Record;
use crate::results::ResultSet;
use crate::typemap::DbType;
use crate::types::{ParameterDirection, RowValues};

/// Fluent command builder bound to one connection.
///
/// Text and parameters accumulate through `&mut self` calls; [`CommandSource::finalize`]
/// (or any terminal method) detaches the builder from its connection, so each builder runs
/// exactly one command. Errors raised while building are held back and returned by
/// `finalize`.
pub struct CommandSource<'c> {
    conn: Option<&'c mut dyn DbConnection>,
    provider: Arc<ProviderMetadata>,
    text: String,
    parameters: ParameterCollection,
    skip: u64,
    take: u64,
    timeout: Option<Duration>,
    transactional: bool,
    deferred: Option<SqlGlueError>,
}

impl<'c> CommandSource<'c> {
    #[must_use]
    pub fn new(conn: &'c mut dyn DbConnection, provider: Arc<ProviderMetadata>) -> Self {
        Self {
            conn: Some(conn),
            provider,
            text: String::new(),
            parameters: ParameterCollection::new(),
            skip: 0,
            take: u64::MAX,
            timeout: None,
            transactional: false,
            deferred: None,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<ProviderMetadata> {
        &self.provider
    }

    /// Current text, before pagination.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterCollection {
        &self.parameters
    }

    fn defer(&mut self, result: Result<(), SqlGlueError>) {
        if let Err(e) = result {
            if self.deferred.is_none() {
                self.deferred = Some(e);
            }
        }
    }

    /// Replace the text.
    pub fn text(&mut self, sql: impl Into<String>) -> &mut Self {
        self.text = sql.into();
        self
    }

    /// Append a fragment, inserting a space when neither side has whitespace at the seam.
    pub fn append(&mut self, fragment: &str) -> &mut Self {
        let needs_space = !self.text.is_empty()
            && !self.text.ends_with(char::is_whitespace)
            && !fragment.starts_with(char::is_whitespace)
            && !fragment.is_empty();
        if needs_space {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
        self
    }

    /// Quoted table name; schema-qualified names are quoted per part.
    #[must_use]
    pub fn quote_table(&self, table: &str) -> String {
        self.provider.quote_identifier(table)
    }

    #[must_use]
    pub fn quote_field(&self, field: &str) -> String {
        self.provider.quote_part(field)
    }

    pub fn append_table(&mut self, table: &str) -> &mut Self {
        let quoted = self.quote_table(table);
        self.append(&quoted)
    }

    pub fn append_field(&mut self, field: &str) -> &mut Self {
        let quoted = self.quote_field(field);
        self.append(&quoted)
    }

    fn field_list(&self, fields: &[&str]) -> String {
        if fields.is_empty() {
            "*".to_string()
        } else {
            fields
                .iter()
                .map(|f| self.quote_field(f))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }

    fn assignments(&self, fields: &[&str], separator: &str) -> String {
        fields
            .iter()
            .map(|f| format!("{} = {}", self.quote_field(f), self.provider.parameter_name(f)))
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// `SELECT <fields|*> FROM <table>`.
    pub fn select_from(&mut self, table: &str, fields: &[&str]) -> &mut Self {
        let sql = format!("SELECT {} FROM {}", self.field_list(fields), self.quote_table(table));
        self.append(&sql)
    }

    /// `INSERT INTO <table> (<fields>) VALUES (<parameters>)`, one parameter per field.
    pub fn insert_into(&mut self, table: &str, fields: &[&str]) -> &mut Self {
        let values = fields
            .iter()
            .map(|f| self.provider.parameter_name(f))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({values})",
            self.quote_table(table),
            self.field_list(fields)
        );
        self.append(&sql)
    }

    /// `UPDATE <table> SET <field> = <parameter>, ...`.
    pub fn update(&mut self, table: &str, fields: &[&str]) -> &mut Self {
        let sql = format!(
            "UPDATE {} SET {}",
            self.quote_table(table),
            self.assignments(fields, ", ")
        );
        self.append(&sql)
    }

    pub fn delete_from(&mut self, table: &str) -> &mut Self {
        let sql = format!("DELETE FROM {}", self.quote_table(table));
        self.append(&sql)
    }

    /// `WHERE <field> = <parameter> AND ...`. Does nothing for an empty list.
    pub fn where_equals(&mut self, fields: &[&str]) -> &mut Self {
        if fields.is_empty() {
            return self;
        }
        let sql = format!("WHERE {}", self.assignments(fields, " AND "));
        self.append(&sql)
    }

    pub fn skip(&mut self, skip: u64) -> &mut Self {
        self.skip = skip;
        self
    }

    pub fn take(&mut self, take: u64) -> &mut Self {
        self.take = take;
        self
    }

    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Require the connection's open transaction at execution time.
    pub fn in_transaction(&mut self) -> &mut Self {
        self.transactional = true;
        self
    }

    fn binder(&mut self) -> ParameterBinder<'_> {
        ParameterBinder::new(&mut self.parameters, self.conn.as_deref())
    }

    /// Bind `value` by name; the type comes from the connection or the type map.
    pub fn param<T: Serialize + ?Sized + 'static>(&mut self, name: &str, value: &T) -> &mut Self {
        let result = self.binder().bind(name, value, None, ParameterDirection::Input);
        self.defer(result);
        self
    }

    pub fn param_typed<T: Serialize + ?Sized + 'static>(
        &mut self,
        name: &str,
        value: &T,
        db_type: DbType,
        direction: ParameterDirection,
    ) -> &mut Self {
        let result = self.binder().bind(name, value, Some(db_type), direction);
        self.defer(result);
        self
    }

    pub fn param_value(&mut self, name: &str, value: RowValues) -> &mut Self {
        let result = self
            .binder()
            .bind_value(name, value, None, ParameterDirection::Input);
        self.defer(result);
        self
    }

    /// Bind the basic fields of `record` that the current text references (all of them
    /// when the text is still empty).
    pub fn params_from<R: Record>(&mut self, record: &R) -> &mut Self {
        let text = self.text.clone();
        let result = self.binder().bind_record(record, &text).map(|_| ());
        self.defer(result);
        self
    }

    /// Detach from the connection and produce the executable command.
    ///
    /// # Errors
    /// - `ObjectDisposed` when called a second time.
    /// - The first error recorded while building.
    /// - `NotSupported` when paging is requested on a dialect without pagination.
    pub fn finalize(&mut self) -> Result<BoundCommand<'c>, SqlGlueError> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| SqlGlueError::ObjectDisposed("command source was already finalized".into()))?;
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }

        let mut text = std::mem::take(&mut self.text);
        if self.skip != 0 || self.take != u64::MAX {
            self.provider.dialect().paginate(&mut text, self.skip, self.take)?;
        }
        let command = Command {
            text,
            parameters: std::mem::take(&mut self.parameters),
            timeout: self.timeout.or(Some(self.provider.default_timeout)),
            requires_transaction: self.transactional,
        };
        Ok(BoundCommand {
            conn,
            command: Some(command),
        })
    }

    /// # Errors
    /// See [`CommandSource::finalize`] and [`BoundCommand::query`].
    pub async fn query(&mut self) -> Result<ResultSet, SqlGlueError> {
        self.finalize()?.query().await
    }

    /// Run the query and map every row onto `T`.
    ///
    /// # Errors
    /// See [`CommandSource::finalize`], [`BoundCommand::query`] and
    /// [`crate::materialize::read_record`].
    pub async fn query_as<T: Record>(&mut self) -> Result<Vec<T>, SqlGlueError> {
        let rows = self.query().await?;
        materialize_all(ResultSetReader::new(rows))
    }

    /// # Errors
    /// See [`CommandSource::finalize`] and [`BoundCommand::query`].
    pub async fn query_dynamic(&mut self) -> Result<Vec<DynamicRow>, SqlGlueError> {
        let rows = self.query().await?;
        materialize_dynamic(ResultSetReader::new(rows))
    }

    /// # Errors
    /// See [`CommandSource::finalize`] and [`BoundCommand::execute`].
    pub async fn execute(&mut self) -> Result<usize, SqlGlueError> {
        self.finalize()?.execute().await
    }

    /// First column of the first row, or `None` when the query returns no rows.
    ///
    /// # Errors
    /// See [`CommandSource::finalize`] and [`BoundCommand::query`].
    pub async fn scalar(&mut self) -> Result<Option<RowValues>, SqlGlueError> {
        self.finalize()?.scalar().await
    }

    /// Finalize and prepare the command, reporting success instead of an error.
    pub async fn try_prepare(&mut self) -> bool {
        match self.finalize() {
            Ok(mut bound) => bound.try_prepare().await,
            Err(_) => false,
        }
    }
}

/// A finalized command attached to its connection. It executes once; afterwards the
/// command and its parameters are released and further calls return `ObjectDisposed`.
pub struct BoundCommand<'c> {
    conn: &'c mut dyn DbConnection,
    command: Option<Command>,
}

impl BoundCommand<'_> {
    /// The pending command, if it has not run yet.
    #[must_use]
    pub fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    fn take_command(&mut self) -> Result<Command, SqlGlueError> {
        let command = self
            .command
            .take()
            .ok_or_else(|| SqlGlueError::ObjectDisposed("command was already executed".into()))?;
        if command.requires_transaction && !self.conn.in_transaction() {
            return Err(SqlGlueError::InvalidOperation(
                "command requires a transaction but the connection has none open".into(),
            ));
        }
        debug!(
            sql = %command.text,
            parameters = command.parameters.len(),
            "executing command"
        );
        Ok(command)
    }

    /// # Errors
    /// `ObjectDisposed` after the first execution, `InvalidOperation` when a required
    /// transaction is missing, or the driver's error.
    pub async fn query(&mut self) -> Result<ResultSet, SqlGlueError> {
        let command = self.take_command()?;
        self.conn.query(&command).await
    }

    /// # Errors
    /// Same as [`BoundCommand::query`].
    pub async fn execute(&mut self) -> Result<usize, SqlGlueError> {
        let command = self.take_command()?;
        self.conn.execute(&command).await
    }

    /// # Errors
    /// Same as [`BoundCommand::query`].
    pub async fn scalar(&mut self) -> Result<Option<RowValues>, SqlGlueError> {
        let rows = self.query().await?;
        Ok(rows.scalar().cloned())
    }

    /// Ask the driver to prepare the command. Any failure is reported as `false`; the
    /// command stays executable either way.
    pub async fn try_prepare(&mut self) -> bool {
        let Some(command) = self.command.as_ref() else {
            return false;
        };
        match self.conn.prepare(command).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "prepare failed");
                false
            }
        }
    }

    /// Release the command without running it.
    pub fn dispose(&mut self) {
        if let Some(mut command) = self.command.take() {
            command.parameters.clear();
        }
    }
}
