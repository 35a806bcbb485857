use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// One buffered row. Column names are shared by every row of the same [`ResultSet`].
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    /// Column names, in result order.
    pub column_names: Arc<Vec<String>>,
    /// Values, positionally aligned with `column_names`.
    pub rows: Vec<RowValues>,
    column_index: Arc<HashMap<String, usize>>,
}

fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        // first occurrence wins for duplicate names
        index.entry(name.to_ascii_lowercase()).or_insert(i);
    }
    index
}

impl CustomDbRow {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            rows,
            column_index,
        }
    }

    /// Index of `column_name`, matched case-insensitively.
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index
            .get(&column_name.to_ascii_lowercase())
            .copied()
    }

    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }
}

/// Rows returned by a query, fully buffered.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub results: Vec<CustomDbRow>,
    /// Rows read for queries; rows changed for statements.
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Build a result set from column names and row values in one go.
    #[must_use]
    pub fn from_rows<S: Into<String>>(columns: Vec<S>, rows: Vec<Vec<RowValues>>) -> ResultSet {
        let mut set = ResultSet::with_capacity(rows.len());
        set.set_column_names(Arc::new(columns.into_iter().map(Into::into).collect()));
        for row in rows {
            set.add_row_values(row);
        }
        set
    }

    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(index_columns(&column_names)));
        self.column_names = Some(column_names);
    }

    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Append a row. Rows added before column names are set are ignored.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        let (Some(column_names), Some(column_index)) = (&self.column_names, &self.column_index)
        else {
            return;
        };
        self.results.push(CustomDbRow {
            column_names: Arc::clone(column_names),
            rows: row_values,
            column_index: Arc::clone(column_index),
        });
        self.rows_affected += 1;
    }

    /// First value of the first row, if any.
    #[must_use]
    pub fn scalar(&self) -> Option<&RowValues> {
        self.results.first().and_then(|row| row.get_by_index(0))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case_and_prefer_first_duplicate() {
        let set = ResultSet::from_rows(
            vec!["Id", "Name", "name"],
            vec![vec![
                RowValues::Int(1),
                RowValues::Text("a".into()),
                RowValues::Text("b".into()),
            ]],
        );
        let row = &set.results[0];
        assert_eq!(row.get("ID"), Some(&RowValues::Int(1)));
        assert_eq!(row.get("NAME"), Some(&RowValues::Text("a".into())));
        assert_eq!(set.scalar(), Some(&RowValues::Int(1)));
        assert_eq!(set.rows_affected, 1);
    }

    #[test]
    fn rows_without_columns_are_dropped() {
        let mut set = ResultSet::default();
        set.add_row_values(vec![RowValues::Null]);
        assert!(set.is_empty());
    }
}
