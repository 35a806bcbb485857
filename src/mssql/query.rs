use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::TryStreamExt;
use tiberius::numeric::Numeric;
use tiberius::{FromSql, Query, Row, Uuid};

use super::client::MssqlClient;
use crate::error::SqlGlueError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Run `query` and collect the first result's rows.
///
/// # Errors
/// Returns `SqlGlueError::ExecutionError` if the query or row fetch fails.
pub async fn build_result_set(
    client: &mut MssqlClient,
    query: Query<'_>,
) -> Result<ResultSet, SqlGlueError> {
    let mut stream = query
        .query(client)
        .await
        .map_err(|e| SqlGlueError::ExecutionError(format!("SQL Server query error: {e}")))?;

    let columns = stream.columns().await.map_err(|e| {
        SqlGlueError::ExecutionError(format!("SQL Server column fetch error: {e}"))
    })?;
    let column_names: Vec<String> = columns
        .map(|cols| cols.iter().map(|col| col.name().to_string()).collect())
        .unwrap_or_default();
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(std::sync::Arc::new(column_names));

    let mut rows_stream = stream.into_row_stream();
    while let Some(row) = rows_stream.try_next().await.map_err(|e| {
        SqlGlueError::ExecutionError(format!("SQL Server row fetch error: {e}"))
    })? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(extract_value(&row, i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Read `idx` as `T`. `None` when the column holds a different type.
fn read_as<'a, T: FromSql<'a>>(
    row: &'a Row,
    idx: usize,
    map: impl FnOnce(T) -> RowValues,
) -> Option<RowValues> {
    match row.try_get::<T, _>(idx) {
        Ok(Some(val)) => Some(map(val)),
        Ok(None) => Some(RowValues::Null),
        Err(_) => None,
    }
}

/// Try each supported Rust type on the column. Decimals, GUIDs, times and offsets are
/// kept as text so no digits or offset are lost.
fn extract_value(row: &Row, idx: usize) -> Result<RowValues, SqlGlueError> {
    read_as::<i32>(row, idx, |v| RowValues::Int(i64::from(v)))
        .or_else(|| read_as::<i64>(row, idx, RowValues::Int))
        .or_else(|| read_as::<i16>(row, idx, |v| RowValues::Int(i64::from(v))))
        .or_else(|| read_as::<u8>(row, idx, |v| RowValues::Int(i64::from(v))))
        .or_else(|| read_as::<f32>(row, idx, |v| RowValues::Float(f64::from(v))))
        .or_else(|| read_as::<f64>(row, idx, RowValues::Float))
        .or_else(|| read_as::<Numeric>(row, idx, |v| RowValues::Text(v.to_string())))
        .or_else(|| read_as::<bool>(row, idx, RowValues::Bool))
        .or_else(|| read_as::<NaiveDateTime>(row, idx, RowValues::Timestamp))
        .or_else(|| {
            read_as::<NaiveDate>(row, idx, |v| {
                RowValues::Timestamp(NaiveDateTime::new(v, NaiveTime::MIN))
            })
        })
        .or_else(|| {
            read_as::<NaiveTime>(row, idx, |v| RowValues::Text(v.format("%H:%M:%S%.f").to_string()))
        })
        .or_else(|| {
            read_as::<DateTime<FixedOffset>>(row, idx, |v| RowValues::Text(v.to_rfc3339()))
        })
        .or_else(|| read_as::<Uuid>(row, idx, |v| RowValues::Text(v.to_string())))
        .or_else(|| read_as::<&str>(row, idx, |v| RowValues::Text(v.to_string())))
        .or_else(|| read_as::<&[u8]>(row, idx, |v| RowValues::Blob(v.to_vec())))
        .ok_or_else(|| {
            let column = row.columns().get(idx).map_or("?", |c| c.name());
            SqlGlueError::invalid_cast(column, "unsupported SQL Server column type")
        })
}
