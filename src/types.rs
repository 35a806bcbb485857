use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::typemap::DbType;

/// Values that can be stored in a database row or used as command parameters.
///
/// Every backend converts its native values to and from this enum, so the binder and the
/// materializer never branch on driver types:
/// ```rust
/// use sql_glue::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            return parse_timestamp(s);
        }
        None
    }

    /// The `DbType` a provider would infer for this value when no other type information exists.
    #[must_use]
    pub fn inferred_db_type(&self) -> DbType {
        match self {
            RowValues::Int(_) => DbType::Int64,
            RowValues::Float(_) => DbType::Double,
            RowValues::Text(_) | RowValues::Null => DbType::String,
            RowValues::Bool(_) => DbType::Boolean,
            RowValues::Timestamp(_) => DbType::DateTime,
            RowValues::JSON(_) => DbType::Object,
            RowValues::Blob(_) => DbType::Binary,
        }
    }
}

/// Parse the textual timestamp layouts the supported drivers hand back.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Direction of a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_accessor_accepts_integer_flags() {
        assert_eq!(RowValues::Int(1).as_bool(), Some(&true));
        assert_eq!(RowValues::Int(0).as_bool(), Some(&false));
        assert_eq!(RowValues::Int(2).as_bool(), None);
    }

    #[test]
    fn timestamps_parse_from_driver_text() {
        let ts = RowValues::Text("2024-03-01 10:11:12.5".into());
        assert_eq!(
            ts.as_timestamp().map(|t| t.to_string()),
            Some("2024-03-01 10:11:12.500".to_string())
        );
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }
}
