use super::{DataReader, ReaderState, not_reading, out_of_range};
use crate::error::SqlGlueError;
use crate::record::{FieldDescriptor, Record};
use crate::typemap::row_value_from_json;
use crate::types::RowValues;

/// Presents an in-memory sequence of records as rows, one field per column.
///
/// `None` items are skipped. The iterator is dropped as soon as it is exhausted or the
/// reader is closed. Every accessor except [`DataReader::field_count`] requires the reader
/// to be positioned on a record.
pub struct CollectionDataReader<I, T> {
    items: Option<I>,
    current: Option<T>,
    state: ReaderState,
}

impl<I, T> CollectionDataReader<I, T>
where
    I: Iterator<Item = Option<T>> + Send,
    T: Record,
{
    pub fn new(items: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            items: Some(items.into_iter()),
            current: None,
            state: ReaderState::Unread,
        }
    }

    /// The record the reader is positioned on.
    #[must_use]
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn positioned(&self) -> Result<&T, SqlGlueError> {
        match (&self.current, self.state) {
            (Some(record), ReaderState::Reading) => Ok(record),
            _ => Err(not_reading(self.state)),
        }
    }

    fn field(&self, ordinal: usize) -> Result<&'static FieldDescriptor<T>, SqlGlueError> {
        let fields = T::shape().fields();
        fields
            .get(ordinal)
            .ok_or_else(|| out_of_range(ordinal, fields.len()))
    }
}

impl<I, T> DataReader for CollectionDataReader<I, T>
where
    I: Iterator<Item = Option<T>> + Send,
    T: Record,
{
    fn read(&mut self) -> Result<bool, SqlGlueError> {
        let Some(items) = self.items.as_mut() else {
            return Ok(false);
        };
        for item in items.by_ref() {
            if let Some(record) = item {
                self.current = Some(record);
                self.state = ReaderState::Reading;
                return Ok(true);
            }
        }
        self.close();
        Ok(false)
    }

    fn state(&self) -> ReaderState {
        self.state
    }

    fn field_count(&self) -> usize {
        T::shape().fields().len()
    }

    fn field_name(&self, ordinal: usize) -> Result<&str, SqlGlueError> {
        self.positioned()?;
        Ok(self.field(ordinal)?.name)
    }

    fn ordinal(&self, name: &str) -> Result<usize, SqlGlueError> {
        self.positioned()?;
        T::shape()
            .fields()
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| SqlGlueError::InvalidOperation(format!("no field named '{name}'")))
    }

    fn value(&self, ordinal: usize) -> Result<RowValues, SqlGlueError> {
        let record = self.positioned()?;
        let field = self.field(ordinal)?;
        let json = (field.get)(record).map_err(|e| SqlGlueError::invalid_cast(field.name, e))?;
        match field.db_type {
            Some(db_type) => row_value_from_json(&json, db_type, field.name),
            None if json.is_null() => Ok(RowValues::Null),
            None => Ok(RowValues::JSON(json)),
        }
    }

    fn close(&mut self) {
        self.items = None;
        self.current = None;
        self.state = ReaderState::Closed;
    }
}

impl<I, T> std::fmt::Debug for CollectionDataReader<I, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionDataReader")
            .field("state", &self.state)
            .field("exhausted", &self.items.is_none())
            .finish_non_exhaustive()
    }
}
