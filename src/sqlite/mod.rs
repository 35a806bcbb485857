//! SQLite backend over rusqlite. Blocking calls run on tokio's blocking pool.

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
