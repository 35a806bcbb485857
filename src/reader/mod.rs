//! Forward-only row readers.

use crate::error::SqlGlueError;
use crate::types::RowValues;

mod collection;
mod result_set;

pub use collection::CollectionDataReader;
pub use result_set::ResultSetReader;

/// Reader lifecycle: `Unread → Reading → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Unread,
    Reading,
    Closed,
}

pub trait DataReader: Send {
    /// Advance to the next row. Returns `false`, and closes the reader, at the end.
    ///
    /// # Errors
    /// Implementation specific; the in-memory readers never fail here.
    fn read(&mut self) -> Result<bool, SqlGlueError>;

    fn state(&self) -> ReaderState;

    fn field_count(&self) -> usize;

    /// # Errors
    /// `InvalidOperation` when the ordinal is out of range or the reader cannot answer.
    fn field_name(&self, ordinal: usize) -> Result<&str, SqlGlueError>;

    /// Ordinal of `name`, ignoring case.
    ///
    /// # Errors
    /// `InvalidOperation` when no field has that name.
    fn ordinal(&self, name: &str) -> Result<usize, SqlGlueError>;

    /// Value of the current row.
    ///
    /// # Errors
    /// `InvalidOperation` unless the reader is positioned on a row.
    fn value(&self, ordinal: usize) -> Result<RowValues, SqlGlueError>;

    /// # Errors
    /// Same as [`DataReader::value`].
    fn is_null(&self, ordinal: usize) -> Result<bool, SqlGlueError> {
        Ok(self.value(ordinal)?.is_null())
    }

    fn close(&mut self);

    /// Abandon any pending rows at the source.
    ///
    /// # Errors
    /// Implementation specific.
    fn cancel(&mut self) -> Result<(), SqlGlueError> {
        Ok(())
    }
}

pub(crate) fn not_reading(state: ReaderState) -> SqlGlueError {
    SqlGlueError::InvalidOperation(format!(
        "reader is {state:?}; call read() and check it returned true first"
    ))
}

pub(crate) fn out_of_range(ordinal: usize, count: usize) -> SqlGlueError {
    SqlGlueError::InvalidOperation(format!(
        "field ordinal {ordinal} is out of range ({count} fields)"
    ))
}
