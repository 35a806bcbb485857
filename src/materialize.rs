//! Turning reader rows into records or dynamic rows.

use std::collections::HashSet;

use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::error::SqlGlueError;
use crate::reader::{DataReader, ReaderState};
use crate::record::Record;
use crate::typemap::json_from_row_value;
use crate::types::RowValues;

/// Map the current row onto a new `T`. Fields are matched by name ignoring case; columns
/// without a matching field are ignored and `NULL` leaves the field at its default.
///
/// # Errors
/// `InvalidCast` naming the field whose value does not fit, or any reader error.
pub fn read_record<T: Record>(reader: &dyn DataReader) -> Result<T, SqlGlueError> {
    let shape = T::shape();
    let mut record = T::default();
    for ordinal in 0..reader.field_count() {
        let Some(field) = shape.field(reader.field_name(ordinal)?) else {
            continue;
        };
        let value = reader.value(ordinal)?;
        if value.is_null() {
            (field.reset)(&mut record);
            continue;
        }
        let json = json_from_row_value(&value, field.db_type, field.name)?;
        (field.set)(&mut record, json).map_err(|e| SqlGlueError::invalid_cast(field.name, e))?;
    }
    Ok(record)
}

/// A row with sanitized, unique field names.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRow {
    names: Vec<String>,
    values: Vec<RowValues>,
}

impl DynamicRow {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }

    /// JSON object keyed by field name. `NULL` becomes JSON `null`.
    ///
    /// # Errors
    /// `InvalidCast` for values JSON cannot hold (non-finite floats).
    pub fn into_json(self) -> Result<JsonValue, SqlGlueError> {
        let mut map = Map::with_capacity(self.names.len());
        for (name, value) in self.names.into_iter().zip(self.values) {
            let json = json_from_row_value(&value, None, &name)?;
            map.insert(name, json);
        }
        Ok(JsonValue::Object(map))
    }
}

/// Turn raw column names into usable identifiers: characters other than letters, digits
/// and `_` are dropped, a leading digit gets a `_` prefix, and blank or repeated names
/// become `Field_<ordinal>`, suffixed with `_<n>` when that name is taken too.
#[must_use]
pub fn sanitize_field_names<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(raw.len());
    raw.iter()
        .enumerate()
        .map(|(ordinal, name)| {
            let mut clean: String = name
                .as_ref()
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if clean.starts_with(|c: char| c.is_ascii_digit()) {
                clean.insert(0, '_');
            }
            if clean.is_empty() || !seen.insert(clean.to_lowercase()) {
                clean = format!("Field_{ordinal}");
                let mut suffix = 1;
                while !seen.insert(clean.to_lowercase()) {
                    clean = format!("Field_{ordinal}_{suffix}");
                    suffix += 1;
                }
            }
            clean
        })
        .collect()
}

/// Copy the current row into a [`DynamicRow`]. `NULL` values are kept as `RowValues::Null`.
///
/// # Errors
/// Any reader error.
pub fn read_dynamic(reader: &dyn DataReader) -> Result<DynamicRow, SqlGlueError> {
    let count = reader.field_count();
    let raw = (0..count)
        .map(|i| reader.field_name(i).map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;
    let values = (0..count)
        .map(|i| reader.value(i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DynamicRow {
        names: sanitize_field_names(&raw),
        values,
    })
}

/// Read every row into `T`, then dispose of the reader whether or not reading failed.
///
/// # Errors
/// The first mapping or reader error.
pub fn materialize_all<T: Record, R: DataReader>(mut reader: R) -> Result<Vec<T>, SqlGlueError> {
    let result = drain(&mut reader, |r| read_record::<T>(r));
    dispose(&mut reader);
    result
}

/// Read every row as a [`DynamicRow`], then dispose of the reader.
///
/// # Errors
/// The first reader error.
pub fn materialize_dynamic<R: DataReader>(mut reader: R) -> Result<Vec<DynamicRow>, SqlGlueError> {
    let result = drain(&mut reader, read_dynamic);
    dispose(&mut reader);
    result
}

fn drain<R, T, F>(reader: &mut R, mut map: F) -> Result<Vec<T>, SqlGlueError>
where
    R: DataReader,
    F: FnMut(&dyn DataReader) -> Result<T, SqlGlueError>,
{
    let mut out = Vec::new();
    while reader.read()? {
        out.push(map(&*reader)?);
    }
    Ok(out)
}

/// Close a reader. One left open by an error is cancelled first; a failing cancel is
/// logged and swallowed so the original error reaches the caller.
pub fn dispose(reader: &mut dyn DataReader) {
    if reader.state() == ReaderState::Closed {
        return;
    }
    if let Err(e) = reader.cancel() {
        warn!(error = %e, "cancelling an open reader failed");
    }
    reader.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{CollectionDataReader, ResultSetReader};
    use crate::results::ResultSet;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Account {
        id: i64,
        owner: String,
        active: bool,
        note: Option<String>,
    }

    crate::record_shape!(Account { id: i64, owner: String, active: bool, note: Option<String> });

    #[test]
    fn sanitizes_names() {
        let names = sanitize_field_names(&["1stName", "", "first name!", "first_name", "Id", "ID", "a-b"]);
        assert_eq!(
            names,
            vec!["_1stName", "Field_1", "firstname", "first_name", "Id", "Field_5", "ab"]
        );
    }

    #[test]
    fn fallback_names_never_collide_with_real_ones() {
        let names = sanitize_field_names(&["Field_1", "", "field_1_1", "x", "x"]);
        assert_eq!(names, vec!["Field_1", "Field_1_1", "Field_2", "x", "Field_4"]);
        let unique: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn maps_case_insensitively_and_resets_nulls() {
        let set = ResultSet::from_rows(
            vec!["ID", "Owner", "ACTIVE", "note", "extra"],
            vec![vec![
                RowValues::Int(3),
                RowValues::Text("kim".into()),
                RowValues::Int(1),
                RowValues::Null,
                RowValues::Float(1.5),
            ]],
        );
        let rows: Vec<Account> = materialize_all(ResultSetReader::new(set)).unwrap();
        assert_eq!(
            rows,
            vec![Account { id: 3, owner: "kim".into(), active: true, note: None }]
        );
    }

    #[test]
    fn mismatches_name_the_field() {
        let set = ResultSet::from_rows(vec!["id"], vec![vec![RowValues::Text("x".into())]]);
        let err = materialize_all::<Account, _>(ResultSetReader::new(set)).unwrap_err();
        assert!(matches!(err, SqlGlueError::InvalidCast { ref field, .. } if field == "id"));
    }

    #[test]
    fn collection_round_trip_reproduces_records() {
        let accounts = vec![
            Some(Account { id: 1, owner: "a".into(), active: true, note: Some("n".into()) }),
            None,
            Some(Account { id: 2, owner: "b".into(), active: false, note: None }),
        ];
        let expected: Vec<Account> = accounts.iter().flatten().cloned().collect();
        let reader: CollectionDataReader<_, Account> = CollectionDataReader::new(accounts);
        let back: Vec<Account> = materialize_all(reader).unwrap();
        assert_eq!(back, expected);
    }

    #[test]
    fn dynamic_rows_keep_nulls() {
        let set = ResultSet::from_rows(
            vec!["2nd", "2nd"],
            vec![vec![RowValues::Null, RowValues::Int(1)]],
        );
        let rows = materialize_dynamic(ResultSetReader::new(set)).unwrap();
        assert_eq!(rows[0].names(), &["_2nd".to_string(), "Field_1".to_string()]);
        assert_eq!(rows[0].get("_2ND"), Some(&RowValues::Null));
        assert_eq!(
            rows[0].clone().into_json().unwrap(),
            serde_json::json!({"_2nd": null, "Field_1": 1})
        );
    }
}
