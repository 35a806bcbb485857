//! Test doubles for code that talks to a [`crate::DbConnection`].

mod scripted;
mod test_helpers;

pub use scripted::{CommandLog, NativeFactory, ScriptedConnection};
pub use test_helpers::{create_test_row, result_set};
