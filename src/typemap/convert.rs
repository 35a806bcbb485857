use serde_json::{Number, Value as JsonValue};

use super::DbType;
use crate::error::SqlGlueError;
use crate::types::{RowValues, parse_timestamp};

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Convert a serialized value into the `RowValues` a parameter of `db_type` carries.
///
/// # Errors
/// Returns `SqlGlueError::InvalidCast` naming `field` when the value cannot represent `db_type`.
pub fn row_value_from_json(
    value: &JsonValue,
    db_type: DbType,
    field: &str,
) -> Result<RowValues, SqlGlueError> {
    if value.is_null() {
        return Ok(RowValues::Null);
    }

    let mismatch = || {
        SqlGlueError::invalid_cast(field, format!("cannot convert {value} to {db_type:?}"))
    };

    match db_type {
        DbType::Boolean => match value {
            JsonValue::Bool(b) => Ok(RowValues::Bool(*b)),
            JsonValue::Number(n) => n
                .as_i64()
                .map(|i| RowValues::Bool(i != 0))
                .ok_or_else(mismatch),
            JsonValue::String(s) => parse_flag(s).map(RowValues::Bool).ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        t if t.is_integer() => match value {
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(RowValues::Int(i))
                } else {
                    #[allow(clippy::cast_possible_truncation)]
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < 9.2e18)
                        .map(|f| RowValues::Int(f as i64))
                        .ok_or_else(mismatch)
                }
            }
            JsonValue::Bool(b) => Ok(RowValues::Int(i64::from(*b))),
            JsonValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(RowValues::Int)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        t if t.is_floating() => match value {
            JsonValue::Number(n) => n.as_f64().map(RowValues::Float).ok_or_else(mismatch),
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(RowValues::Float)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        DbType::DateTime | DbType::DateTime2 => match value {
            JsonValue::String(s) => Ok(parse_timestamp(s)
                .map_or_else(|| RowValues::Text(s.clone()), RowValues::Timestamp)),
            _ => Err(mismatch()),
        },
        DbType::Binary => match value {
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(mismatch)
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(RowValues::Blob),
            JsonValue::String(s) => Ok(RowValues::Blob(s.as_bytes().to_vec())),
            _ => Err(mismatch()),
        },
        DbType::Object => Ok(RowValues::JSON(value.clone())),
        _ => match value {
            JsonValue::String(s) => Ok(RowValues::Text(s.clone())),
            JsonValue::Array(_) | JsonValue::Object(_) => Ok(RowValues::Text(value.to_string())),
            other => Ok(RowValues::Text(other.to_string())),
        },
    }
}

/// Convert a `RowValues` read from a driver into a JSON value that deserializes into a field
/// whose registered type is `target`.
///
/// # Errors
/// Returns `SqlGlueError::InvalidCast` naming `field` for values JSON cannot represent.
pub fn json_from_row_value(
    value: &RowValues,
    target: Option<DbType>,
    field: &str,
) -> Result<JsonValue, SqlGlueError> {
    let json = match (value, target) {
        (RowValues::Null, _) => JsonValue::Null,
        (RowValues::Int(i), Some(DbType::Boolean)) => JsonValue::Bool(*i != 0),
        (RowValues::Text(s), Some(DbType::Boolean)) => {
            parse_flag(s).map_or_else(|| JsonValue::String(s.clone()), JsonValue::Bool)
        }
        (RowValues::Text(s), Some(DbType::DateTime | DbType::DateTime2)) => parse_timestamp(s)
            .map_or_else(
                || JsonValue::String(s.clone()),
                |ts| JsonValue::String(ts.format(ISO_FORMAT).to_string()),
            ),
        (RowValues::Text(s), Some(DbType::DateTimeOffset)) => parse_timestamp(s).map_or_else(
            || JsonValue::String(s.clone()),
            |ts| JsonValue::String(ts.and_utc().to_rfc3339()),
        ),
        (RowValues::Text(s), Some(t)) if t.is_integer() => s
            .trim()
            .parse::<i64>()
            .map_or_else(|_| JsonValue::String(s.clone()), JsonValue::from),
        (RowValues::Text(s), Some(t)) if t.is_floating() => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or_else(|| JsonValue::String(s.clone()), JsonValue::Number),
        (RowValues::Text(s), Some(DbType::Object)) => {
            serde_json::from_str(s).unwrap_or_else(|_| JsonValue::String(s.clone()))
        }
        (RowValues::Timestamp(ts), Some(DbType::Date)) => {
            JsonValue::String(ts.date().format("%Y-%m-%d").to_string())
        }
        (RowValues::Timestamp(ts), Some(DbType::Time)) => {
            JsonValue::String(ts.time().format("%H:%M:%S%.f").to_string())
        }
        (RowValues::Timestamp(ts), Some(DbType::DateTimeOffset)) => {
            JsonValue::String(ts.and_utc().to_rfc3339())
        }
        (RowValues::Timestamp(ts), _) => JsonValue::String(ts.format(ISO_FORMAT).to_string()),
        (RowValues::Float(f), _) => JsonValue::Number(Number::from_f64(*f).ok_or_else(|| {
            SqlGlueError::invalid_cast(field, format!("non-finite value {f}"))
        })?),
        (RowValues::Int(i), _) => JsonValue::from(*i),
        (RowValues::Text(s), _) => JsonValue::String(s.clone()),
        (RowValues::Bool(b), _) => JsonValue::Bool(*b),
        (RowValues::JSON(v), Some(t)) if t.is_textual() => match v {
            JsonValue::String(s) => JsonValue::String(s.clone()),
            other => JsonValue::String(other.to_string()),
        },
        (RowValues::JSON(v), _) => v.clone(),
        (RowValues::Blob(bytes), Some(t)) if t.is_textual() => {
            JsonValue::String(String::from_utf8_lossy(bytes).into_owned())
        }
        (RowValues::Blob(bytes), _) => {
            JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
        }
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_accept_numeric_strings_but_not_words() {
        assert_eq!(
            row_value_from_json(&json!("42"), DbType::Int32, "n").unwrap(),
            RowValues::Int(42)
        );
        let err = row_value_from_json(&json!("abc"), DbType::Int32, "n").unwrap_err();
        assert!(matches!(err, SqlGlueError::InvalidCast { ref field, .. } if field == "n"));
    }

    #[test]
    fn decimal_text_reads_as_a_number() {
        assert_eq!(
            json_from_row_value(&RowValues::Text("12.5000".into()), Some(DbType::Decimal), "d").unwrap(),
            json!(12.5)
        );
        assert_eq!(
            json_from_row_value(&RowValues::Text("n/a".into()), Some(DbType::Double), "d").unwrap(),
            json!("n/a")
        );
    }

    #[test]
    fn binary_round_trips_through_json_arrays() {
        let blob = RowValues::Blob(vec![0, 7, 255]);
        let json = json_from_row_value(&blob, Some(DbType::Binary), "b").unwrap();
        assert_eq!(json, json!([0, 7, 255]));
        assert_eq!(
            row_value_from_json(&json, DbType::Binary, "b").unwrap(),
            blob
        );
    }

    #[test]
    fn sqlite_style_flags_and_dates_are_coerced() {
        assert_eq!(
            json_from_row_value(&RowValues::Int(1), Some(DbType::Boolean), "f").unwrap(),
            json!(true)
        );
        assert_eq!(
            json_from_row_value(
                &RowValues::Text("2024-01-02 03:04:05".into()),
                Some(DbType::DateTime),
                "d"
            )
            .unwrap(),
            json!("2024-01-02T03:04:05")
        );
    }
}
