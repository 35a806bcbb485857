use tiberius::{Client, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::config::{MssqlOptions, build_tiberius_config};
use crate::error::SqlGlueError;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Connect a new tiberius client. Named instances are resolved through SQL Browser.
///
/// # Errors
/// Returns `SqlGlueError::ConnectionError` if the TCP or TDS handshake fails.
pub async fn create_mssql_client(opts: &MssqlOptions) -> Result<MssqlClient, SqlGlueError> {
    let config = build_tiberius_config(opts);

    let tcp = if opts.instance_name.is_some() {
        TcpStream::connect_named(&config).await.map_err(|e| {
            SqlGlueError::ConnectionError(format!("SQL Browser lookup failed: {e}"))
        })?
    } else {
        TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| SqlGlueError::ConnectionError(format!("TCP connection error: {e}")))?
    };
    tcp.set_nodelay(true)
        .map_err(|e| SqlGlueError::ConnectionError(format!("TCP configuration error: {e}")))?;

    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| SqlGlueError::ConnectionError(format!("SQL Server connection error: {e}")))
}
