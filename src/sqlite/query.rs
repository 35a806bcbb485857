use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::Value;

use super::params::row_value_to_sqlite_value;
use crate::command::ParameterCollection;
use crate::error::SqlGlueError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns the rusqlite error if the column cannot be read.
pub fn sqlite_extract_value_sync(row: &rusqlite::Row, idx: usize) -> Result<RowValues, SqlGlueError> {
    let value: Value = row.get(idx)?;
    match value {
        Value::Null => Ok(RowValues::Null),
        Value::Integer(i) => Ok(RowValues::Int(i)),
        Value::Real(f) => Ok(RowValues::Float(f)),
        Value::Text(s) => Ok(RowValues::Text(s)),
        Value::Blob(b) => Ok(RowValues::Blob(b)),
    }
}

/// Bind `parameters` to the statement's placeholders.
///
/// Named placeholders (`$x`, `@x`, `:x`) take the parameter with that name regardless of
/// marker or case. Anonymous `?` placeholders take parameters in insertion order.
///
/// # Errors
/// `SqlGlueError::ParameterError` when a placeholder has no value.
pub fn bind_parameters(
    stmt: &mut Statement<'_>,
    parameters: &ParameterCollection,
) -> Result<(), SqlGlueError> {
    parameters.ensure_inputs()?;
    let count = stmt.parameter_count();
    let names: Vec<Option<String>> = (1..=count)
        .map(|idx| stmt.parameter_name(idx).map(ToString::to_string))
        .collect();

    let mut positional = parameters.iter();
    for (idx, name) in (1..=count).zip(names) {
        let value = match name {
            Some(name) => parameters.find(&name).map(|p| &p.value).ok_or_else(|| {
                SqlGlueError::ParameterError(format!("parameter '{name}' is referenced but not bound"))
            })?,
            None => positional.next().map(|p| &p.value).ok_or_else(|| {
                SqlGlueError::ParameterError(format!("no value for positional parameter {idx}"))
            })?,
        };
        stmt.raw_bind_parameter(idx, row_value_to_sqlite_value(value))?;
    }
    Ok(())
}

/// Build a result set from a statement whose parameters are already bound.
///
/// # Errors
/// Returns `SqlGlueError` if query execution or value extraction fails.
pub fn build_result_set(stmt: &mut Statement<'_>) -> Result<ResultSet, SqlGlueError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value_sync(row, i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}
