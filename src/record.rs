//! Record shapes: a per-type list of field descriptors used by the binder and the
//! materializer in place of runtime reflection.
//!
//! Implement [`Record`] with the [`record_shape!`](crate::record_shape) macro:
//!
//! ```rust
//! use sql_glue::{DbType, Record};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Item {
//!     id: i32,
//!     label: Option<String>,
//!     tags: Vec<String>,
//! }
//!
//! sql_glue::record_shape!(Item { id: i32, label: Option<String>, tags: Vec<String> });
//!
//! let shape = Item::shape();
//! assert_eq!(shape.field("ID").and_then(|f| f.db_type), Some(DbType::Int32));
//! // not a basic type, so the binder skips it
//! assert_eq!(shape.field("tags").and_then(|f| f.db_type), None);
//! ```

use std::fmt;

use serde_json::Value as JsonValue;

use crate::typemap::DbType;

/// Accessors for one field of `T`.
pub struct FieldDescriptor<T> {
    pub name: &'static str,
    /// `None` for types with no column mapping.
    pub db_type: Option<DbType>,
    pub get: fn(&T) -> Result<JsonValue, serde_json::Error>,
    pub set: fn(&mut T, JsonValue) -> Result<(), serde_json::Error>,
    /// Restore the field to its `Default` value.
    pub reset: fn(&mut T),
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("db_type", &self.db_type)
            .finish_non_exhaustive()
    }
}

/// Ordered field descriptors of a record type.
#[derive(Debug)]
pub struct RecordShape<T> {
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> RecordShape<T> {
    #[must_use]
    pub fn new(fields: Vec<FieldDescriptor<T>>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    /// Field by name, ignoring case.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }
}

/// A type that can be bound to parameters and materialized from rows.
pub trait Record: Default + Send + Sync + 'static {
    fn shape() -> &'static RecordShape<Self>;
}

/// Implement [`Record`] for a struct by listing its fields and their types.
/// Field types must implement `serde::Serialize` and `serde::de::DeserializeOwned`.
#[macro_export]
macro_rules! record_shape {
    ($ty:ty { $($field:ident : $fty:ty),* $(,)? }) => {
        impl $crate::record::Record for $ty {
            fn shape() -> &'static $crate::record::RecordShape<Self> {
                static SHAPE: ::std::sync::OnceLock<$crate::record::RecordShape<$ty>> =
                    ::std::sync::OnceLock::new();
                SHAPE.get_or_init(|| {
                    $crate::record::RecordShape::new(vec![
                        $(
                            $crate::record::FieldDescriptor {
                                name: stringify!($field),
                                db_type: $crate::typemap::DbTypeMapper::try_get_db_type_for::<$fty>(),
                                get: |record: &$ty| $crate::serde_json::to_value(&record.$field),
                                set: |record: &mut $ty, value| {
                                    record.$field = $crate::serde_json::from_value::<$fty>(value)?;
                                    Ok(())
                                },
                                reset: |record: &mut $ty| {
                                    record.$field = <$ty as ::std::default::Default>::default().$field;
                                },
                            },
                        )*
                    ])
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq)]
    struct Sample {
        id: i64,
        name: String,
        active: Option<bool>,
    }

    crate::record_shape!(Sample { id: i64, name: String, active: Option<bool> });

    #[test]
    fn accessors_round_trip_through_json() {
        let shape = Sample::shape();
        assert_eq!(shape.names().collect::<Vec<_>>(), vec!["id", "name", "active"]);

        let mut sample = Sample { id: 4, name: "x".into(), active: Some(true) };
        let name = shape.field("NAME").unwrap();
        assert_eq!((name.get)(&sample).unwrap(), json!("x"));
        (name.set)(&mut sample, json!("y")).unwrap();
        assert_eq!(sample.name, "y");
        assert!((name.set)(&mut sample, json!(5)).is_err());

        let active = shape.field("active").unwrap();
        assert_eq!(active.db_type, Some(DbType::Boolean));
        (active.reset)(&mut sample);
        assert_eq!(sample.active, None);
    }
}
