use super::{Dialect, push_clause};
use crate::command::{Command, DbParameter};
use crate::error::SqlGlueError;
use crate::provider::{ProviderKind, ProviderMetadata};
use crate::typemap::{ProviderTypeMapper, SqlServerTypeMapper};
use crate::types::RowValues;

/// Fallback for drivers that report their own conventions but match no known product.
/// Column discovery uses plain `INFORMATION_SCHEMA`; there is no pagination syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl Dialect for GenericDialect {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Unknown
    }

    fn default_quotes(&self) -> (&'static str, &'static str) {
        ("[", "]")
    }

    fn parameter_prefix(&self) -> &'static str {
        "@"
    }

    fn default_schema(&self, _database: Option<&str>) -> Option<String> {
        None
    }

    fn paginate(&self, _sql: &mut String, skip: u64, take: u64) -> Result<(), SqlGlueError> {
        Err(SqlGlueError::NotSupported(format!(
            "pagination (skip {skip}, take {take}) for an unknown provider"
        )))
    }

    fn last_inserted_clause(&self, table: &str) -> Result<String, SqlGlueError> {
        Err(SqlGlueError::NotSupported(format!(
            "last inserted key of '{table}' for an unknown provider"
        )))
    }

    fn columns_query(
        &self,
        provider: &ProviderMetadata,
        table: &str,
        schema: Option<&str>,
    ) -> Command {
        let mut text = format!(
            "SELECT c.COLUMN_NAME AS column_name, c.ORDINAL_POSITION AS ordinal, \
             c.DATA_TYPE AS data_type, c.IS_NULLABLE AS is_nullable, \
             c.CHARACTER_MAXIMUM_LENGTH AS max_length, \
             c.NUMERIC_PRECISION AS numeric_precision, c.NUMERIC_SCALE AS numeric_scale, \
             0 AS is_identity, 0 AS is_computed, \
             CASE WHEN pk.COLUMN_NAME IS NULL THEN 0 ELSE 1 END AS is_key \
             FROM INFORMATION_SCHEMA.COLUMNS c \
             LEFT JOIN (SELECT ku.TABLE_SCHEMA, ku.TABLE_NAME, ku.COLUMN_NAME \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE ku \
             ON tc.CONSTRAINT_NAME = ku.CONSTRAINT_NAME AND tc.TABLE_SCHEMA = ku.TABLE_SCHEMA \
             WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY') pk \
             ON pk.TABLE_SCHEMA = c.TABLE_SCHEMA AND pk.TABLE_NAME = c.TABLE_NAME AND pk.COLUMN_NAME = c.COLUMN_NAME \
             WHERE c.TABLE_NAME = {}",
            provider.parameter_name("table")
        );
        let mut command = Command::new(String::new())
            .with_parameter(DbParameter::new("table", RowValues::Text(table.to_string())));
        if let Some(schema) = schema.map(str::to_string).or_else(|| provider.default_schema.clone()) {
            text.push_str(&format!(" AND c.TABLE_SCHEMA = {}", provider.parameter_name("schema")));
            command = command.with_parameter(DbParameter::new("schema", RowValues::Text(schema)));
        }
        push_clause(&mut text, "ORDER BY c.ORDINAL_POSITION");
        command.text = text;
        command
    }

    fn type_mapper(&self) -> &dyn ProviderTypeMapper {
        &SqlServerTypeMapper
    }
}
