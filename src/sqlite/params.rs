use rusqlite::types::Value;
use serde_json::Value as JsonValue;

use crate::command::DbParameter;
use crate::typemap::DbType;
use crate::types::RowValues;

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

fn as_bytes(items: &[JsonValue]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
        .collect()
}

/// Parameter inferred from the serialized value alone, the way rusqlite's `ToSql`
/// impls would store it.
#[must_use]
pub fn infer_parameter(name: &str, value: &JsonValue) -> DbParameter {
    let (row_value, db_type) = match value {
        JsonValue::Null => (RowValues::Null, DbType::String),
        JsonValue::Bool(b) => (RowValues::Bool(*b), DbType::Boolean),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => (RowValues::Int(i), DbType::Int64),
            None => (RowValues::Float(n.as_f64().unwrap_or_default()), DbType::Double),
        },
        JsonValue::String(s) => (RowValues::Text(s.clone()), DbType::String),
        JsonValue::Array(items) if !items.is_empty() => match as_bytes(items) {
            Some(bytes) => (RowValues::Blob(bytes), DbType::Binary),
            None => (RowValues::Text(value.to_string()), DbType::String),
        },
        JsonValue::Array(_) => (RowValues::Text(value.to_string()), DbType::String),
        JsonValue::Object(_) => (RowValues::JSON(value.clone()), DbType::Object),
    };
    DbParameter::new(name, row_value).with_db_type(db_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inference_follows_json_shape() {
        let p = infer_parameter("$n", &json!(5));
        assert_eq!(p.name, "n");
        assert_eq!(p.value, RowValues::Int(5));
        assert_eq!(p.db_type, Some(DbType::Int64));

        assert_eq!(infer_parameter("b", &json!([1, 2])).value, RowValues::Blob(vec![1, 2]));
        assert_eq!(
            infer_parameter("t", &json!(["a"])).value,
            RowValues::Text("[\"a\"]".into())
        );
        assert_eq!(infer_parameter("x", &json!(1.5)).db_type, Some(DbType::Double));
    }

    #[test]
    fn booleans_and_timestamps_are_stored_as_sqlite_natives() {
        assert_eq!(row_value_to_sqlite_value(&RowValues::Bool(true)), Value::Integer(1));
        let ts = crate::types::parse_timestamp("2024-01-02 03:04:05").unwrap();
        assert_eq!(
            row_value_to_sqlite_value(&RowValues::Timestamp(ts)),
            Value::Text("2024-01-02 03:04:05".into())
        );
    }
}
