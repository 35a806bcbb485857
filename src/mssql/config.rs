use tiberius::{AuthMethod, Config as TiberiusConfig};

use super::connection::MssqlConnection;
use crate::error::SqlGlueError;

pub(crate) const DEFAULT_PORT: u16 = 1433;

/// Options for a SQL Server connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MssqlOptions {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub port: Option<u16>,
    pub instance_name: Option<String>,
    pub trust_cert: bool,
}

impl MssqlOptions {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            server,
            database,
            user,
            password,
            port: None,
            instance_name: None,
            trust_cert: true,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_instance_name(mut self, instance_name: Option<String>) -> Self {
        self.instance_name = instance_name;
        self
    }

    /// Parse an ADO-style string such as
    /// `Server=tcp:db.local,1433;Database=app;User Id=sa;Password=secret`.
    ///
    /// # Errors
    /// `SqlGlueError::ConfigError` when the server or database is missing, or the port is invalid.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, SqlGlueError> {
        let mut opts = MssqlOptions::new(String::new(), String::new(), String::new(), String::new());
        for pair in connection_string.split(';').filter(|p| !p.trim().is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(SqlGlueError::ConfigError(format!(
                    "malformed connection string entry '{pair}'"
                )));
            };
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "server" | "data source" | "address" => opts.parse_server(&value)?,
                "database" | "initial catalog" => opts.database = value,
                "user id" | "uid" | "user" => opts.user = value,
                "password" | "pwd" => opts.password = value,
                "trustservercertificate" => opts.trust_cert = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
        if opts.server.is_empty() || opts.database.is_empty() {
            return Err(SqlGlueError::ConfigError(
                "connection string needs Server and Database".into(),
            ));
        }
        Ok(opts)
    }

    fn parse_server(&mut self, value: &str) -> Result<(), SqlGlueError> {
        let value = value.strip_prefix("tcp:").unwrap_or(value);
        let (host, port) = match value.split_once(',') {
            Some((host, port)) => {
                let port = port.trim().parse::<u16>().map_err(|_| {
                    SqlGlueError::ConfigError(format!("invalid port '{port}'"))
                })?;
                (host, Some(port))
            }
            None => (value, None),
        };
        let (host, instance) = match host.split_once('\\') {
            Some((host, instance)) => (host, Some(instance.to_string())),
            None => (host, None),
        };
        self.server = host.trim().to_string();
        self.port = port;
        self.instance_name = instance;
        Ok(())
    }

    /// ADO-style rendering; the password is left out.
    #[must_use]
    pub fn connection_string(&self) -> String {
        let mut server = self.server.clone();
        if let Some(instance) = &self.instance_name {
            server.push('\\');
            server.push_str(instance);
        }
        if let Some(port) = self.port {
            server.push_str(&format!(",{port}"));
        }
        format!("Server={server};Database={};User Id={}", self.database, self.user)
    }

    /// A closed connection using these options.
    #[must_use]
    pub fn connection(self) -> MssqlConnection {
        MssqlConnection::new(self)
    }
}

/// Fluent builder for MSSQL options.
#[derive(Debug, Clone)]
pub struct MssqlOptionsBuilder {
    opts: MssqlOptions,
}

impl MssqlOptionsBuilder {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            opts: MssqlOptions::new(server, database, user, password),
        }
    }

    #[must_use]
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn instance_name(mut self, instance_name: Option<String>) -> Self {
        self.opts.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn trust_cert(mut self, trust_cert: bool) -> Self {
        self.opts.trust_cert = trust_cert;
        self
    }

    #[must_use]
    pub fn finish(self) -> MssqlOptions {
        self.opts
    }
}

pub(crate) fn build_tiberius_config(opts: &MssqlOptions) -> TiberiusConfig {
    let mut config = TiberiusConfig::new();
    config.host(&opts.server);
    config.database(&opts.database);
    config.port(opts.port.unwrap_or(DEFAULT_PORT));
    config.authentication(AuthMethod::sql_server(&opts.user, &opts.password));
    if let Some(instance) = &opts.instance_name {
        config.instance_name(instance);
    }
    if opts.trust_cert {
        config.trust_cert();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ado_connection_strings() {
        let opts = MssqlOptions::from_connection_string(
            "Server=tcp:db.local\\SQLEXPRESS,1444;Initial Catalog=app;User Id=sa;Password=pw",
        )
        .unwrap();
        assert_eq!(opts.server, "db.local");
        assert_eq!(opts.instance_name.as_deref(), Some("SQLEXPRESS"));
        assert_eq!(opts.port, Some(1444));
        assert_eq!(opts.database, "app");
        assert_eq!(opts.password, "pw");
        assert_eq!(
            opts.connection_string(),
            "Server=db.local\\SQLEXPRESS,1444;Database=app;User Id=sa"
        );
    }

    #[test]
    fn missing_database_is_a_config_error() {
        assert!(matches!(
            MssqlOptions::from_connection_string("Server=x"),
            Err(SqlGlueError::ConfigError(_))
        ));
        assert!(matches!(
            MssqlOptions::from_connection_string("Server=x,abc;Database=d"),
            Err(SqlGlueError::ConfigError(_))
        ));
    }
}
