//! Rust type ⇄ provider-neutral `DbType` translation, value coercion and provider DDL types.
//!
//! Lookups are backed by a static dictionary keyed by [`TypeId`]; `T` and `Option<T>`
//! resolve to the same [`DbType`]. Unregistered types yield `None`.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

mod convert;
mod ddl;

pub use convert::{json_from_row_value, row_value_from_json};
pub use ddl::{
    MySqlTypeMapper, ProviderTypeMapper, SqlServerTypeMapper, SqliteTypeMapper, TypeFacets,
    parse_provider_type,
};

/// Provider-neutral column/parameter type. Discriminants are stable and match the
/// long-standing `DbType` numbering used by database client libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DbType {
    AnsiString = 0,
    Binary = 1,
    Byte = 2,
    Boolean = 3,
    Currency = 4,
    Date = 5,
    DateTime = 6,
    Decimal = 7,
    Double = 8,
    Guid = 9,
    Int16 = 10,
    Int32 = 11,
    Int64 = 12,
    Object = 13,
    SByte = 14,
    Single = 15,
    String = 16,
    Time = 17,
    UInt16 = 18,
    UInt32 = 19,
    UInt64 = 20,
    VarNumeric = 21,
    AnsiStringFixedLength = 22,
    StringFixedLength = 23,
    Xml = 25,
    DateTime2 = 26,
    DateTimeOffset = 27,
}

impl DbType {
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DbType::Byte
                | DbType::SByte
                | DbType::Int16
                | DbType::Int32
                | DbType::Int64
                | DbType::UInt16
                | DbType::UInt32
                | DbType::UInt64
        )
    }

    #[must_use]
    pub fn is_floating(self) -> bool {
        matches!(
            self,
            DbType::Single | DbType::Double | DbType::Decimal | DbType::Currency | DbType::VarNumeric
        )
    }

    #[must_use]
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            DbType::AnsiString
                | DbType::AnsiStringFixedLength
                | DbType::String
                | DbType::StringFixedLength
                | DbType::Xml
                | DbType::Guid
        )
    }
}

fn register<T: 'static>(map: &mut HashMap<TypeId, DbType>, db_type: DbType) {
    map.insert(TypeId::of::<T>(), db_type);
    map.insert(TypeId::of::<Option<T>>(), db_type);
}

static TYPE_MAP: LazyLock<HashMap<TypeId, DbType>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    register::<bool>(&mut map, DbType::Boolean);
    register::<i8>(&mut map, DbType::SByte);
    register::<i16>(&mut map, DbType::Int16);
    register::<i32>(&mut map, DbType::Int32);
    register::<i64>(&mut map, DbType::Int64);
    register::<u8>(&mut map, DbType::Byte);
    register::<u16>(&mut map, DbType::UInt16);
    register::<u32>(&mut map, DbType::UInt32);
    register::<u64>(&mut map, DbType::UInt64);
    register::<f32>(&mut map, DbType::Single);
    register::<f64>(&mut map, DbType::Double);
    register::<char>(&mut map, DbType::StringFixedLength);
    register::<String>(&mut map, DbType::String);
    register::<&'static str>(&mut map, DbType::String);
    register::<Vec<u8>>(&mut map, DbType::Binary);
    register::<NaiveDateTime>(&mut map, DbType::DateTime);
    register::<NaiveDate>(&mut map, DbType::Date);
    register::<NaiveTime>(&mut map, DbType::Time);
    register::<DateTime<Utc>>(&mut map, DbType::DateTimeOffset);
    register::<DateTime<FixedOffset>>(&mut map, DbType::DateTimeOffset);
    register::<serde_json::Value>(&mut map, DbType::Object);
    map.insert(TypeId::of::<str>(), DbType::String);
    map
});

/// Static Rust type → `DbType` dictionary.
pub struct DbTypeMapper;

impl DbTypeMapper {
    /// Look up the `DbType` registered for a `TypeId`.
    #[must_use]
    pub fn try_get_db_type(type_id: TypeId) -> Option<DbType> {
        TYPE_MAP.get(&type_id).copied()
    }

    /// Look up the `DbType` registered for `T`.
    ///
    /// ```rust
    /// use sql_glue::{DbType, DbTypeMapper};
    ///
    /// assert_eq!(DbTypeMapper::try_get_db_type_for::<i32>(), Some(DbType::Int32));
    /// assert_eq!(DbTypeMapper::try_get_db_type_for::<Option<i32>>(), Some(DbType::Int32));
    /// assert_eq!(DbTypeMapper::try_get_db_type_for::<std::time::Duration>(), None);
    /// ```
    #[must_use]
    pub fn try_get_db_type_for<T: ?Sized + 'static>() -> Option<DbType> {
        Self::try_get_db_type(TypeId::of::<T>())
    }

    /// Whether `T` is a "basic" type that maps straight onto a column.
    #[must_use]
    pub fn is_basic<T: ?Sized + 'static>() -> bool {
        Self::try_get_db_type_for::<T>().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_types_have_documented_values() {
        let expected: [(Option<DbType>, u8); 12] = [
            (DbTypeMapper::try_get_db_type_for::<bool>(), 3),
            (DbTypeMapper::try_get_db_type_for::<u8>(), 2),
            (DbTypeMapper::try_get_db_type_for::<i8>(), 14),
            (DbTypeMapper::try_get_db_type_for::<i16>(), 10),
            (DbTypeMapper::try_get_db_type_for::<i32>(), 11),
            (DbTypeMapper::try_get_db_type_for::<i64>(), 12),
            (DbTypeMapper::try_get_db_type_for::<f32>(), 15),
            (DbTypeMapper::try_get_db_type_for::<f64>(), 8),
            (DbTypeMapper::try_get_db_type_for::<String>(), 16),
            (DbTypeMapper::try_get_db_type_for::<Vec<u8>>(), 1),
            (DbTypeMapper::try_get_db_type_for::<NaiveDateTime>(), 6),
            (DbTypeMapper::try_get_db_type_for::<DateTime<FixedOffset>>(), 27),
        ];
        for (found, value) in expected {
            assert_eq!(found.map(|t| t as u8), Some(value));
        }
    }

    #[test]
    fn nullable_and_plain_types_agree() {
        assert_eq!(
            DbTypeMapper::try_get_db_type_for::<Option<u64>>(),
            DbTypeMapper::try_get_db_type_for::<u64>()
        );
        assert_eq!(
            DbTypeMapper::try_get_db_type_for::<Option<NaiveDate>>(),
            Some(DbType::Date)
        );
    }

    #[test]
    fn unregistered_types_are_not_found() {
        assert!(DbTypeMapper::try_get_db_type_for::<Vec<String>>().is_none());
        assert!(DbTypeMapper::try_get_db_type_for::<std::collections::HashMap<String, i32>>().is_none());
        assert!(!DbTypeMapper::is_basic::<Option<Option<i32>>>());
    }
}
