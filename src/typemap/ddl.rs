use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::DbType;
use crate::error::SqlGlueError;
use crate::schema::DbColumn;

static PROVIDER_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^(]+?)\s*(?:\(([^)]*)\))?\s*([A-Za-z ]*?)\s*$")
        .expect("provider type pattern is valid")
});

/// Length, precision and scale configured on a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeFacets {
    pub max_length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
}

/// A provider type string split into base name, argument list and trailing modifiers,
/// e.g. `int(10) unsigned` → (`int`, [`10`], `unsigned`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedType {
    pub base: String,
    pub args: Vec<String>,
    pub suffix: String,
}

impl fmt::Display for ParsedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if !self.args.is_empty() {
            write!(f, "({})", self.args.join(","))?;
        }
        if !self.suffix.is_empty() {
            write!(f, " {}", self.suffix)?;
        }
        Ok(())
    }
}

/// Split a provider type string such as `NVARCHAR(50)` or `decimal(10, 2)`.
#[must_use]
pub fn parse_provider_type(provider_type: &str) -> Option<ParsedType> {
    let caps = PROVIDER_TYPE.captures(provider_type)?;
    let base = caps.get(1)?.as_str().trim().to_string();
    if base.is_empty() {
        return None;
    }
    let args = caps
        .get(2)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let suffix = caps
        .get(3)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some(ParsedType { base, args, suffix })
}

const LENGTH_TYPES: [&str; 8] = [
    "CHAR",
    "VARCHAR",
    "NCHAR",
    "NVARCHAR",
    "BINARY",
    "VARBINARY",
    "CHARACTER",
    "VARYING CHARACTER",
];
const PRECISION_TYPES: [&str; 2] = ["DECIMAL", "NUMERIC"];

/// Provider-specific DDL rendering for `DbType`s and configured columns.
pub trait ProviderTypeMapper: Send + Sync + fmt::Debug {
    /// DDL type for a `DbType` with the given facets, or `None` when the provider has no mapping.
    fn ddl_type(&self, db_type: DbType, facets: TypeFacets) -> Option<String>;

    /// Reverse lookup from a provider type name (`nvarchar`, `INT UNSIGNED`, ...).
    fn db_type_for(&self, provider_type: &str) -> Option<DbType>;

    /// Render a length argument for `base` (upper case), e.g. `MAX` when past the provider limit.
    fn render_length(&self, _base: &str, length: u32) -> String {
        length.to_string()
    }

    /// DDL type for a column. An existing provider type string is parsed and the column's
    /// length/precision/scale re-applied to it; otherwise the type comes from the `DbType`.
    ///
    /// # Errors
    /// Returns `SqlGlueError::NotSupported` when the column carries neither a provider type
    /// nor a `DbType` the provider can render.
    fn column_ddl(&self, column: &DbColumn) -> Result<String, SqlGlueError> {
        let facets = column.facets();
        if let Some(mut parsed) = parse_provider_type(&column.provider_type) {
            let upper = parsed.base.to_ascii_uppercase();
            if LENGTH_TYPES.contains(&upper.as_str()) {
                if let Some(length) = facets.max_length {
                    parsed.args = vec![self.render_length(&upper, length)];
                }
            } else if PRECISION_TYPES.contains(&upper.as_str()) {
                if let Some(precision) = facets.precision {
                    let scale = facets
                        .scale
                        .map(|s| s.to_string())
                        .or_else(|| parsed.args.get(1).cloned())
                        .unwrap_or_else(|| "0".to_string());
                    parsed.args = vec![precision.to_string(), scale];
                } else if let Some(scale) = facets.scale {
                    let precision = parsed
                        .args
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "18".to_string());
                    parsed.args = vec![precision, scale.to_string()];
                }
            }
            return Ok(parsed.to_string());
        }

        column
            .db_type
            .and_then(|db_type| self.ddl_type(db_type, facets))
            .ok_or_else(|| {
                SqlGlueError::NotSupported(format!(
                    "no provider type for column '{}' ({:?})",
                    column.name, column.db_type
                ))
            })
    }
}

/// SQL Server type rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerTypeMapper;

impl ProviderTypeMapper for SqlServerTypeMapper {
    fn ddl_type(&self, db_type: DbType, facets: TypeFacets) -> Option<String> {
        let sized = |base: &str| {
            let len = facets
                .max_length
                .map_or_else(|| "MAX".to_string(), |l| self.render_length(base, l));
            format!("{base}({len})")
        };
        let fixed = |base: &str| format!("{base}({})", facets.max_length.unwrap_or(1));
        let ddl = match db_type {
            DbType::AnsiString => sized("VARCHAR"),
            DbType::AnsiStringFixedLength => fixed("CHAR"),
            DbType::String | DbType::Object => sized("NVARCHAR"),
            DbType::StringFixedLength => fixed("NCHAR"),
            DbType::Binary => sized("VARBINARY"),
            DbType::Xml => "XML".into(),
            DbType::Boolean => "BIT".into(),
            DbType::Byte => "TINYINT".into(),
            DbType::SByte | DbType::Int16 => "SMALLINT".into(),
            DbType::UInt16 | DbType::Int32 => "INT".into(),
            DbType::UInt32 | DbType::Int64 => "BIGINT".into(),
            DbType::UInt64 => "DECIMAL(20,0)".into(),
            DbType::Single => "REAL".into(),
            DbType::Double => "FLOAT".into(),
            DbType::Currency => "MONEY".into(),
            DbType::Decimal | DbType::VarNumeric => format!(
                "DECIMAL({},{})",
                facets.precision.unwrap_or(18),
                facets.scale.unwrap_or(0)
            ),
            DbType::Date => "DATE".into(),
            DbType::DateTime => "DATETIME".into(),
            DbType::DateTime2 => "DATETIME2".into(),
            DbType::DateTimeOffset => "DATETIMEOFFSET".into(),
            DbType::Time => "TIME".into(),
            DbType::Guid => "UNIQUEIDENTIFIER".into(),
        };
        Some(ddl)
    }

    fn db_type_for(&self, provider_type: &str) -> Option<DbType> {
        let parsed = parse_provider_type(provider_type)?;
        let db_type = match parsed.base.to_ascii_uppercase().as_str() {
            "VARCHAR" | "TEXT" => DbType::AnsiString,
            "CHAR" => DbType::AnsiStringFixedLength,
            "NVARCHAR" | "NTEXT" | "SYSNAME" => DbType::String,
            "NCHAR" => DbType::StringFixedLength,
            "VARBINARY" | "BINARY" | "IMAGE" | "TIMESTAMP" | "ROWVERSION" => DbType::Binary,
            "XML" => DbType::Xml,
            "BIT" => DbType::Boolean,
            "TINYINT" => DbType::Byte,
            "SMALLINT" => DbType::Int16,
            "INT" => DbType::Int32,
            "BIGINT" => DbType::Int64,
            "REAL" => DbType::Single,
            "FLOAT" => DbType::Double,
            "MONEY" | "SMALLMONEY" => DbType::Currency,
            "DECIMAL" | "NUMERIC" => DbType::Decimal,
            "DATE" => DbType::Date,
            "DATETIME" | "SMALLDATETIME" => DbType::DateTime,
            "DATETIME2" => DbType::DateTime2,
            "DATETIMEOFFSET" => DbType::DateTimeOffset,
            "TIME" => DbType::Time,
            "UNIQUEIDENTIFIER" => DbType::Guid,
            "SQL_VARIANT" => DbType::Object,
            _ => return None,
        };
        Some(db_type)
    }

    fn render_length(&self, base: &str, length: u32) -> String {
        let limit = if base.starts_with('N') { 4000 } else { 8000 };
        if length > limit {
            "MAX".to_string()
        } else {
            length.to_string()
        }
    }
}

/// MySQL / MariaDB type rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlTypeMapper;

impl ProviderTypeMapper for MySqlTypeMapper {
    fn ddl_type(&self, db_type: DbType, facets: TypeFacets) -> Option<String> {
        let text = |fallback: &str| match facets.max_length {
            Some(len) if len <= 65_535 => format!("VARCHAR({len})"),
            _ => fallback.to_string(),
        };
        let ddl = match db_type {
            DbType::AnsiString | DbType::String => text("LONGTEXT"),
            DbType::AnsiStringFixedLength | DbType::StringFixedLength => {
                format!("CHAR({})", facets.max_length.unwrap_or(1).min(255))
            }
            DbType::Binary => match facets.max_length {
                Some(len) if len <= 65_535 => format!("VARBINARY({len})"),
                _ => "LONGBLOB".to_string(),
            },
            DbType::Xml => "LONGTEXT".into(),
            DbType::Object => "JSON".into(),
            DbType::Boolean => "TINYINT(1)".into(),
            DbType::Byte => "TINYINT UNSIGNED".into(),
            DbType::SByte => "TINYINT".into(),
            DbType::Int16 => "SMALLINT".into(),
            DbType::UInt16 => "SMALLINT UNSIGNED".into(),
            DbType::Int32 => "INT".into(),
            DbType::UInt32 => "INT UNSIGNED".into(),
            DbType::Int64 => "BIGINT".into(),
            DbType::UInt64 => "BIGINT UNSIGNED".into(),
            DbType::Single => "FLOAT".into(),
            DbType::Double => "DOUBLE".into(),
            DbType::Decimal | DbType::Currency | DbType::VarNumeric => format!(
                "DECIMAL({},{})",
                facets.precision.unwrap_or(18),
                facets.scale.unwrap_or(0)
            ),
            DbType::Date => "DATE".into(),
            DbType::DateTime | DbType::DateTime2 => "DATETIME".into(),
            DbType::DateTimeOffset => "TIMESTAMP".into(),
            DbType::Time => "TIME".into(),
            DbType::Guid => "CHAR(36)".into(),
        };
        Some(ddl)
    }

    fn db_type_for(&self, provider_type: &str) -> Option<DbType> {
        let parsed = parse_provider_type(provider_type)?;
        let unsigned = parsed.suffix.to_ascii_lowercase().contains("unsigned")
            || parsed.base.to_ascii_lowercase().ends_with(" unsigned");
        let base = parsed.base.to_ascii_uppercase();
        let base = base.trim_end_matches(" UNSIGNED");
        let db_type = match base {
            "TINYINT" if parsed.args.first().map(String::as_str) == Some("1") => DbType::Boolean,
            "BOOL" | "BOOLEAN" | "BIT" => DbType::Boolean,
            "TINYINT" if unsigned => DbType::Byte,
            "TINYINT" => DbType::SByte,
            "SMALLINT" if unsigned => DbType::UInt16,
            "SMALLINT" => DbType::Int16,
            "MEDIUMINT" | "INT" | "INTEGER" if unsigned => DbType::UInt32,
            "MEDIUMINT" | "INT" | "INTEGER" => DbType::Int32,
            "BIGINT" if unsigned => DbType::UInt64,
            "BIGINT" => DbType::Int64,
            "FLOAT" => DbType::Single,
            "DOUBLE" | "REAL" => DbType::Double,
            "DECIMAL" | "NUMERIC" => DbType::Decimal,
            "CHAR" if parsed.args.first().map(String::as_str) == Some("36") => DbType::Guid,
            "CHAR" => DbType::StringFixedLength,
            "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
                DbType::String
            }
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                DbType::Binary
            }
            "JSON" => DbType::Object,
            "DATE" => DbType::Date,
            "DATETIME" => DbType::DateTime,
            "TIMESTAMP" => DbType::DateTimeOffset,
            "TIME" => DbType::Time,
            "YEAR" => DbType::Int16,
            _ => return None,
        };
        Some(db_type)
    }
}

/// SQLite type-affinity rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTypeMapper;

impl ProviderTypeMapper for SqliteTypeMapper {
    fn ddl_type(&self, db_type: DbType, _facets: TypeFacets) -> Option<String> {
        let ddl = match db_type {
            t if t.is_integer() => "INTEGER",
            DbType::Boolean => "INTEGER",
            DbType::Single | DbType::Double => "REAL",
            DbType::Decimal | DbType::Currency | DbType::VarNumeric => "NUMERIC",
            DbType::Binary => "BLOB",
            _ => "TEXT",
        };
        Some(ddl.to_string())
    }

    fn db_type_for(&self, provider_type: &str) -> Option<DbType> {
        let upper = provider_type.to_ascii_uppercase();
        let db_type = if upper.contains("BOOL") {
            DbType::Boolean
        } else if upper.contains("INT") {
            DbType::Int64
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            DbType::String
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            DbType::Binary
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            DbType::Double
        } else if upper.contains("DATE") || upper.contains("TIME") {
            DbType::DateTime
        } else {
            DbType::Decimal
        };
        Some(db_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base_arguments_and_suffix() {
        let parsed = parse_provider_type("int(10) unsigned").unwrap();
        assert_eq!(parsed.base, "int");
        assert_eq!(parsed.args, vec!["10".to_string()]);
        assert_eq!(parsed.suffix, "unsigned");
        assert_eq!(parsed.to_string(), "int(10) unsigned");

        let parsed = parse_provider_type("decimal(10, 2)").unwrap();
        assert_eq!(parsed.args, vec!["10".to_string(), "2".to_string()]);
        assert!(parse_provider_type("  ").is_none());
    }

    #[test]
    fn length_is_reapplied_to_existing_type() {
        let column = DbColumn::new("name", Some(DbType::String))
            .with_provider_type("NVARCHAR(50)")
            .with_max_length(512);
        assert_eq!(SqlServerTypeMapper.column_ddl(&column).unwrap(), "NVARCHAR(512)");

        let column = column.with_max_length(10_000);
        assert_eq!(SqlServerTypeMapper.column_ddl(&column).unwrap(), "NVARCHAR(MAX)");
    }

    #[test]
    fn precision_and_scale_are_reapplied() {
        let column = DbColumn::new("price", Some(DbType::Decimal))
            .with_provider_type("decimal(10,2)")
            .with_precision(18, Some(4));
        assert_eq!(MySqlTypeMapper.column_ddl(&column).unwrap(), "decimal(18,4)");
    }

    #[test]
    fn ddl_from_db_type_when_no_provider_type() {
        let column = DbColumn::new("name", Some(DbType::String)).with_max_length(512);
        assert_eq!(SqlServerTypeMapper.column_ddl(&column).unwrap(), "NVARCHAR(512)");
        assert_eq!(MySqlTypeMapper.column_ddl(&column).unwrap(), "VARCHAR(512)");
        assert_eq!(SqliteTypeMapper.column_ddl(&column).unwrap(), "TEXT");

        let untyped = DbColumn::new("blob", None);
        assert!(matches!(
            SqlServerTypeMapper.column_ddl(&untyped),
            Err(SqlGlueError::NotSupported(_))
        ));
    }

    #[test]
    fn reverse_lookup_handles_mysql_modifiers() {
        assert_eq!(MySqlTypeMapper.db_type_for("tinyint(1)"), Some(DbType::Boolean));
        assert_eq!(MySqlTypeMapper.db_type_for("int(10) unsigned"), Some(DbType::UInt32));
        assert_eq!(SqlServerTypeMapper.db_type_for("nvarchar"), Some(DbType::String));
        assert_eq!(SqliteTypeMapper.db_type_for("VARCHAR(20)"), Some(DbType::String));
        assert_eq!(SqliteTypeMapper.db_type_for("INTEGER"), Some(DbType::Int64));
    }
}
