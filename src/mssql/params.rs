use serde_json::Value as JsonValue;
use tiberius::Query;

use crate::command::DbParameter;
use crate::typemap::DbType;
use crate::types::RowValues;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Bind values positionally onto a tiberius query whose text uses `@P1..@Pn`.
pub fn bind_query_params<'a>(query: &'a str, params: &[&RowValues]) -> Query<'a> {
    let mut query_builder = Query::new(query);

    for param in params {
        match param {
            RowValues::Int(i) => query_builder.bind(*i),
            RowValues::Float(f) => query_builder.bind(*f),
            RowValues::Text(s) => query_builder.bind(s.clone()),
            RowValues::Bool(b) => query_builder.bind(*b),
            RowValues::Timestamp(dt) => query_builder.bind(dt.format(ISO_FORMAT).to_string()),
            RowValues::Null => query_builder.bind(Option::<String>::None),
            RowValues::JSON(jsval) => query_builder.bind(jsval.to_string()),
            RowValues::Blob(bytes) => query_builder.bind(bytes.clone()),
        }
    }

    query_builder
}

/// Value-driven inference: the parameter type follows the JSON value.
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
        JsonValue::Array(items) => {
            let bytes: Option<Vec<u8>> = items
                .iter()
                .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            match bytes {
                Some(bytes) if !bytes.is_empty() => (RowValues::Blob(bytes), DbType::Binary),
                _ => (RowValues::Text(value.to_string()), DbType::String),
            }
        }
        JsonValue::Object(_) => (RowValues::Text(value.to_string()), DbType::String),
    };
    DbParameter::new(name, row_value).with_db_type(db_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_travel_as_text() {
        let p = infer_parameter("@doc", &json!({"a": 1}));
        assert_eq!(p.name, "doc");
        assert_eq!(p.value, RowValues::Text("{\"a\":1}".into()));
        assert_eq!(p.db_type, Some(DbType::String));
        assert_eq!(infer_parameter("f", &json!(true)).db_type, Some(DbType::Boolean));
    }
}
