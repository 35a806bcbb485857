//! SQL Server backend over tiberius.
//!
//! Named `@markers` in command text are rewritten to tiberius' positional `@P1..@Pn`
//! before binding; a name used twice reuses its position.

pub mod client;
pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use client::{MssqlClient, create_mssql_client};
pub use config::{MssqlOptions, MssqlOptionsBuilder};
pub use connection::MssqlConnection;
