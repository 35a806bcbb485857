//! Helper utilities for testing and development.

use std::sync::Arc;

use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<RowValues>) -> CustomDbRow {
    CustomDbRow::new(Arc::new(column_names), values)
}

/// Build a result set from string column names and rows.
#[must_use]
pub fn result_set(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
    ResultSet::from_rows(columns.to_vec(), rows)
}
