use std::sync::Arc;

use super::{DataReader, ReaderState, not_reading, out_of_range};
use crate::error::SqlGlueError;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

/// Reads the rows of a buffered [`ResultSet`].
#[derive(Debug)]
pub struct ResultSetReader {
    columns: Arc<Vec<String>>,
    rows: std::vec::IntoIter<CustomDbRow>,
    current: Option<CustomDbRow>,
    state: ReaderState,
}

impl ResultSetReader {
    #[must_use]
    pub fn new(results: ResultSet) -> Self {
        let columns = results
            .get_column_names()
            .cloned()
            .or_else(|| results.results.first().map(|r| Arc::clone(&r.column_names)))
            .unwrap_or_default();
        Self {
            columns,
            rows: results.results.into_iter(),
            current: None,
            state: ReaderState::Unread,
        }
    }
}

impl DataReader for ResultSetReader {
    fn read(&mut self) -> Result<bool, SqlGlueError> {
        if self.state == ReaderState::Closed {
            return Ok(false);
        }
        match self.rows.next() {
            Some(row) => {
                self.current = Some(row);
                self.state = ReaderState::Reading;
                Ok(true)
            }
            None => {
                self.close();
                Ok(false)
            }
        }
    }

    fn state(&self) -> ReaderState {
        self.state
    }

    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn field_name(&self, ordinal: usize) -> Result<&str, SqlGlueError> {
        self.columns
            .get(ordinal)
            .map(String::as_str)
            .ok_or_else(|| out_of_range(ordinal, self.columns.len()))
    }

    fn ordinal(&self, name: &str) -> Result<usize, SqlGlueError> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| SqlGlueError::InvalidOperation(format!("no field named '{name}'")))
    }

    fn value(&self, ordinal: usize) -> Result<RowValues, SqlGlueError> {
        let row = match (&self.current, self.state) {
            (Some(row), ReaderState::Reading) => row,
            _ => return Err(not_reading(self.state)),
        };
        row.get_by_index(ordinal)
            .cloned()
            .ok_or_else(|| out_of_range(ordinal, self.columns.len()))
    }

    fn close(&mut self) {
        self.state = ReaderState::Closed;
        self.current = None;
        self.rows = Vec::new().into_iter();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_rows_then_closes() {
        let set = ResultSet::from_rows(
            vec!["a"],
            vec![vec![RowValues::Int(1)], vec![RowValues::Null]],
        );
        let mut reader = ResultSetReader::new(set);
        assert!(reader.value(0).is_err());
        assert!(reader.read().unwrap());
        assert_eq!(reader.value(0).unwrap(), RowValues::Int(1));
        assert!(reader.read().unwrap());
        assert!(reader.is_null(0).unwrap());
        assert!(!reader.read().unwrap());
        assert_eq!(reader.state(), ReaderState::Closed);
        assert!(matches!(reader.value(0), Err(SqlGlueError::InvalidOperation(_))));
        assert_eq!(reader.ordinal("A").unwrap(), 0);
    }
}
