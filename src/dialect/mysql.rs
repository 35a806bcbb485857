use super::{Dialect, push_clause};
use crate::command::{Command, DbParameter};
use crate::error::SqlGlueError;
use crate::provider::{ProviderKind, ProviderMetadata};
use crate::typemap::{MySqlTypeMapper, ProviderTypeMapper};
use crate::types::RowValues;

/// MySQL and MariaDB. The database doubles as the schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MySql
    }

    fn default_quotes(&self) -> (&'static str, &'static str) {
        ("`", "`")
    }

    fn parameter_prefix(&self) -> &'static str {
        "@"
    }

    fn default_schema(&self, database: Option<&str>) -> Option<String> {
        database.map(str::to_string)
    }

    fn paginate(&self, sql: &mut String, skip: u64, take: u64) -> Result<(), SqlGlueError> {
        push_clause(sql, &format!("LIMIT {take} OFFSET {skip}"));
        Ok(())
    }

    fn last_inserted_clause(&self, _table: &str) -> Result<String, SqlGlueError> {
        Ok("LAST_INSERT_ID()".to_string())
    }

    fn identity_clause(&self) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    fn columns_query(
        &self,
        provider: &ProviderMetadata,
        table: &str,
        schema: Option<&str>,
    ) -> Command {
        let schema = schema
            .map(str::to_string)
            .or_else(|| provider.default_schema.clone())
            .or_else(|| provider.database.clone());
        let mut text = format!(
            "SELECT COLUMN_NAME AS column_name, ORDINAL_POSITION AS ordinal, \
             COLUMN_TYPE AS data_type, IS_NULLABLE AS is_nullable, \
             CHARACTER_MAXIMUM_LENGTH AS max_length, \
             NUMERIC_PRECISION AS numeric_precision, NUMERIC_SCALE AS numeric_scale, \
             CASE WHEN EXTRA LIKE '%auto_increment%' THEN 1 ELSE 0 END AS is_identity, \
             CASE WHEN EXTRA LIKE '%GENERATED%' THEN 1 ELSE 0 END AS is_computed, \
             CASE WHEN COLUMN_KEY = 'PRI' THEN 1 ELSE 0 END AS is_key \
             FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = {}",
            provider.parameter_name("table")
        );
        let mut command = Command::new(String::new())
            .with_parameter(DbParameter::new("table", RowValues::Text(table.to_string())));
        match schema {
            Some(schema) => {
                text.push_str(&format!(" AND TABLE_SCHEMA = {}", provider.parameter_name("schema")));
                command = command.with_parameter(DbParameter::new("schema", RowValues::Text(schema)));
            }
            None => text.push_str(" AND TABLE_SCHEMA = DATABASE()"),
        }
        text.push_str(" ORDER BY ORDINAL_POSITION");
        command.text = text;
        command
    }

    fn type_mapper(&self) -> &dyn ProviderTypeMapper {
        &MySqlTypeMapper
    }
}
