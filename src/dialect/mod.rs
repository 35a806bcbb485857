//! One [`Dialect`] per database product: pagination, last-inserted-id clauses, column
//! discovery queries and DDL type rules.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::command::Command;
use crate::error::SqlGlueError;
use crate::provider::{ProviderKind, ProviderMetadata};
use crate::results::{CustomDbRow, ResultSet};
use crate::schema::DbColumn;
use crate::typemap::{DbType, ProviderTypeMapper, parse_provider_type};
use crate::types::RowValues;

mod generic;
mod mysql;
mod sqlite;
mod sqlserver;

pub use generic::GenericDialect;
pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;
pub use sqlserver::SqlServerDialect;

static ORDER_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\border\s+by\b").expect("order by pattern is valid"));

pub trait Dialect: Send + Sync + fmt::Debug {
    fn kind(&self) -> ProviderKind;

    /// Built-in quote characters, used when the driver reports none.
    fn default_quotes(&self) -> (&'static str, &'static str);

    fn parameter_prefix(&self) -> &'static str;

    fn default_schema(&self, database: Option<&str>) -> Option<String>;

    /// Quote one identifier with the built-in quotes.
    fn quote(&self, name: &str) -> String {
        let (prefix, suffix) = self.default_quotes();
        format!("{prefix}{}{suffix}", name.replace(suffix, &format!("{suffix}{suffix}")))
    }

    /// Append the dialect's pagination clause to `sql`.
    ///
    /// # Errors
    /// `SqlGlueError::NotSupported` when the dialect has no pagination syntax.
    fn paginate(&self, sql: &mut String, skip: u64, take: u64) -> Result<(), SqlGlueError>;

    /// Expression yielding the key generated by the last insert into `table`.
    ///
    /// # Errors
    /// `SqlGlueError::NotSupported` when the dialect has no such expression.
    fn last_inserted_clause(&self, table: &str) -> Result<String, SqlGlueError>;

    /// Whether the last-inserted clause only works inside the inserting batch.
    fn reselect_in_same_batch(&self) -> bool {
        false
    }

    /// Column-definition text making an identity column auto-generated.
    fn identity_clause(&self) -> Option<&'static str> {
        None
    }

    /// Whether the identity clause already declares the primary key.
    fn identity_declares_key(&self) -> bool {
        false
    }

    /// Query returning the column metadata of `table`.
    fn columns_query(
        &self,
        provider: &ProviderMetadata,
        table: &str,
        schema: Option<&str>,
    ) -> Command;

    /// Turn the rows of [`Dialect::columns_query`] into columns, in ordinal order.
    ///
    /// # Errors
    /// `SqlGlueError::InvalidCast` when a metadata row lacks a column name.
    fn parse_columns(&self, rows: &ResultSet) -> Result<Vec<DbColumn>, SqlGlueError> {
        rows.results
            .iter()
            .map(|row| information_schema_column(row, self.type_mapper()))
            .collect()
    }

    fn type_mapper(&self) -> &dyn ProviderTypeMapper;
}

static SQL_SERVER: SqlServerDialect = SqlServerDialect;
static MYSQL: MySqlDialect = MySqlDialect;
static SQLITE: SqliteDialect = SqliteDialect;
static GENERIC: GenericDialect = GenericDialect;

/// The dialect implementation for `kind`.
#[must_use]
pub fn dialect_for(kind: ProviderKind) -> &'static dyn Dialect {
    match kind {
        ProviderKind::SqlServer => &SQL_SERVER,
        ProviderKind::MySql => &MYSQL,
        ProviderKind::Sqlite => &SQLITE,
        ProviderKind::Unknown => &GENERIC,
    }
}

pub(crate) fn has_order_by(sql: &str) -> bool {
    ORDER_BY.is_match(sql)
}

pub(crate) fn push_clause(sql: &mut String, clause: &str) {
    let trimmed = sql.trim_end().len();
    sql.truncate(trimmed);
    if !sql.is_empty() {
        sql.push(' ');
    }
    sql.push_str(clause);
}

pub(crate) fn int_field(row: &CustomDbRow, name: &str) -> Option<i64> {
    match row.get(name)? {
        RowValues::Int(i) => Some(*i),
        RowValues::Bool(b) => Some(i64::from(*b)),
        #[allow(clippy::cast_possible_truncation)]
        RowValues::Float(f) => Some(*f as i64),
        RowValues::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn flag_field(row: &CustomDbRow, name: &str) -> bool {
    match row.get(name) {
        Some(RowValues::Text(s)) => matches!(
            s.trim().to_ascii_uppercase().as_str(),
            "YES" | "TRUE" | "1" | "Y"
        ),
        Some(_) => int_field(row, name).is_some_and(|i| i != 0),
        None => false,
    }
}

pub(crate) fn text_field(row: &CustomDbRow, name: &str) -> Option<String> {
    match row.get(name)? {
        RowValues::Text(s) => Some(s.clone()),
        RowValues::Null => None,
        RowValues::Int(i) => Some(i.to_string()),
        other => Some(format!("{other:?}")),
    }
}

/// Map a row aliased as `column_name, ordinal, data_type, is_nullable, max_length,
/// numeric_precision, numeric_scale, is_identity, is_computed, is_key`.
pub(crate) fn information_schema_column(
    row: &CustomDbRow,
    mapper: &dyn ProviderTypeMapper,
) -> Result<DbColumn, SqlGlueError> {
    let name = text_field(row, "column_name").ok_or_else(|| {
        SqlGlueError::invalid_cast("column_name", "column metadata row has no name")
    })?;
    let mut provider_type = text_field(row, "data_type").unwrap_or_default();
    let mut column = DbColumn::new(name, mapper.db_type_for(&provider_type))
        .with_ordinal(int_field(row, "ordinal").unwrap_or(0));

    match int_field(row, "max_length") {
        Some(-1) if parse_provider_type(&provider_type).is_some_and(|t| t.args.is_empty()) => {
            provider_type.push_str("(MAX)");
        }
        Some(len) if len > 0 => {
            column = column.with_max_length(u32::try_from(len).unwrap_or(u32::MAX));
        }
        _ => {}
    }
    if matches!(
        column.db_type,
        Some(DbType::Decimal | DbType::Currency | DbType::VarNumeric)
    ) {
        if let Some(precision) = int_field(row, "numeric_precision") {
            let scale = int_field(row, "numeric_scale").and_then(|s| u8::try_from(s).ok());
            column = column.with_precision(u8::try_from(precision).unwrap_or(u8::MAX), scale);
        }
    }

    let computed = flag_field(row, "is_computed");
    let rowversion = matches!(
        provider_type.to_ascii_lowercase().as_str(),
        "timestamp" | "rowversion"
    ) && column.db_type == Some(DbType::Binary);

    Ok(column
        .with_provider_type(provider_type)
        .with_nullable(flag_field(row, "is_nullable"))
        .with_key(flag_field(row, "is_key"))
        .with_identity(flag_field(row, "is_identity"))
        .with_computed(computed)
        .with_readonly(computed || rowversion))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_per_dialect() {
        let mut sql = "SELECT * FROM t".to_string();
        dialect_for(ProviderKind::SqlServer).paginate(&mut sql, 5, 10).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM t ORDER BY CURRENT_TIMESTAMP OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
        );

        let mut sql = "SELECT * FROM t order  by id".to_string();
        dialect_for(ProviderKind::SqlServer).paginate(&mut sql, 5, u64::MAX).unwrap();
        assert_eq!(sql, "SELECT * FROM t order  by id OFFSET 5 ROWS");

        let mut sql = "SELECT * FROM t".to_string();
        dialect_for(ProviderKind::Sqlite).paginate(&mut sql, 5, 10).unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT 10 OFFSET 5");

        let mut sql = "SELECT * FROM t".to_string();
        dialect_for(ProviderKind::Sqlite).paginate(&mut sql, 3, u64::MAX).unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT -1 OFFSET 3");

        let mut sql = "SELECT * FROM t".to_string();
        dialect_for(ProviderKind::MySql).paginate(&mut sql, 3, u64::MAX).unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT 18446744073709551615 OFFSET 3");

        let mut sql = "SELECT * FROM t".to_string();
        assert!(matches!(
            dialect_for(ProviderKind::Unknown).paginate(&mut sql, 1, 1),
            Err(SqlGlueError::NotSupported(_))
        ));
    }

    #[test]
    fn last_inserted_clauses() {
        assert_eq!(
            dialect_for(ProviderKind::SqlServer).last_inserted_clause("dbo.t").unwrap(),
            "SCOPE_IDENTITY()"
        );
        assert_eq!(
            dialect_for(ProviderKind::Sqlite).last_inserted_clause("[main].[o'k]").unwrap(),
            "last_insert_rowid()"
        );
        assert_eq!(
            dialect_for(ProviderKind::MySql).last_inserted_clause("t").unwrap(),
            "LAST_INSERT_ID()"
        );
        assert!(dialect_for(ProviderKind::Unknown).last_inserted_clause("t").is_err());
    }

    #[test]
    fn information_schema_rows_become_columns() {
        let rows = ResultSet::from_rows(
            vec![
                "column_name", "ordinal", "data_type", "is_nullable", "max_length",
                "numeric_precision", "numeric_scale", "is_identity", "is_computed", "is_key",
            ],
            vec![
                vec![
                    RowValues::Text("Id".into()), RowValues::Int(1), RowValues::Text("int".into()),
                    RowValues::Text("NO".into()), RowValues::Null, RowValues::Int(10),
                    RowValues::Int(0), RowValues::Int(1), RowValues::Int(0), RowValues::Int(1),
                ],
                vec![
                    RowValues::Text("Notes".into()), RowValues::Int(2),
                    RowValues::Text("nvarchar".into()), RowValues::Text("YES".into()),
                    RowValues::Int(-1), RowValues::Null, RowValues::Null, RowValues::Int(0),
                    RowValues::Int(0), RowValues::Int(0),
                ],
            ],
        );
        let columns = dialect_for(ProviderKind::SqlServer).parse_columns(&rows).unwrap();
        assert!(columns[0].is_identity && columns[0].is_key && !columns[0].is_nullable);
        assert_eq!(columns[0].db_type, Some(DbType::Int32));
        assert_eq!(columns[1].provider_type, "nvarchar(MAX)");
        assert!(columns[1].is_nullable);
    }
}
