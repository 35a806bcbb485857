use std::time::Duration;

use super::connection::SqliteConnection;
use crate::error::SqlGlueError;

/// Options for a SQLite connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteOptions {
    pub db_path: String,
    pub busy_timeout: Option<Duration>,
    /// Switch the journal to WAL when opening.
    pub wal: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            busy_timeout: None,
            wal: false,
        }
    }

    #[must_use]
    pub fn builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Parse `Data Source=app.db;Default Timeout=5;Journal Mode=WAL`.
    ///
    /// # Errors
    /// `SqlGlueError::ConfigError` when there is no data source or a value does not parse.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, SqlGlueError> {
        let mut path = None;
        let mut options = SqliteOptions::new(String::new());
        for pair in connection_string.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                SqlGlueError::ConfigError(format!("malformed connection string entry '{pair}'"))
            })?;
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "data source" | "datasource" | "filename" => path = Some(value.to_string()),
                "default timeout" | "busy timeout" => {
                    let secs: u64 = value.parse().map_err(|_| {
                        SqlGlueError::ConfigError(format!("invalid timeout '{value}'"))
                    })?;
                    options.busy_timeout = Some(Duration::from_secs(secs));
                }
                "journal mode" => options.wal = value.eq_ignore_ascii_case("wal"),
                _ => {}
            }
        }
        options.db_path = path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SqlGlueError::ConfigError("connection string has no Data Source".into()))?;
        Ok(options)
    }

    /// Equivalent connection string.
    #[must_use]
    pub fn connection_string(&self) -> String {
        let mut cs = format!("Data Source={}", self.db_path);
        if let Some(timeout) = self.busy_timeout {
            cs.push_str(&format!(";Default Timeout={}", timeout.as_secs()));
        }
        if self.wal {
            cs.push_str(";Journal Mode=WAL");
        }
        cs
    }

    /// A closed connection using these options.
    #[must_use]
    pub fn connection(self) -> SqliteConnection {
        SqliteConnection::new(self)
    }
}

/// Fluent builder for [`SqliteOptions`].
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open a connection with the configured options.
    ///
    /// # Errors
    /// Returns the rusqlite error if the database cannot be opened.
    pub async fn connect(self) -> Result<SqliteConnection, SqlGlueError> {
        let mut conn = self.finish().connection();
        conn.open_now().await?;
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connection_strings() {
        let opts = SqliteOptions::from_connection_string(
            "Data Source=/tmp/app.db; Default Timeout=5; Journal Mode=WAL",
        )
        .unwrap();
        assert_eq!(opts.db_path, "/tmp/app.db");
        assert_eq!(opts.busy_timeout, Some(Duration::from_secs(5)));
        assert!(opts.wal);
        assert_eq!(
            opts.connection_string(),
            "Data Source=/tmp/app.db;Default Timeout=5;Journal Mode=WAL"
        );

        assert!(matches!(
            SqliteOptions::from_connection_string("Mode=ro"),
            Err(SqlGlueError::ConfigError(_))
        ));
    }
}
