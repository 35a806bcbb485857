use super::{Dialect, has_order_by, push_clause};
use crate::command::{Command, DbParameter};
use crate::error::SqlGlueError;
use crate::provider::{ProviderKind, ProviderMetadata};
use crate::typemap::{ProviderTypeMapper, SqlServerTypeMapper};
use crate::types::RowValues;

/// Microsoft SQL Server.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SqlServer
    }

    fn default_quotes(&self) -> (&'static str, &'static str) {
        ("[", "]")
    }

    fn parameter_prefix(&self) -> &'static str {
        "@"
    }

    fn default_schema(&self, _database: Option<&str>) -> Option<String> {
        Some("dbo".to_string())
    }

    fn paginate(&self, sql: &mut String, skip: u64, take: u64) -> Result<(), SqlGlueError> {
        // OFFSET/FETCH is only valid after an ORDER BY
        if !has_order_by(sql) {
            push_clause(sql, "ORDER BY CURRENT_TIMESTAMP");
        }
        push_clause(sql, &format!("OFFSET {skip} ROWS"));
        if take != u64::MAX {
            push_clause(sql, &format!("FETCH NEXT {take} ROWS ONLY"));
        }
        Ok(())
    }

    fn last_inserted_clause(&self, _table: &str) -> Result<String, SqlGlueError> {
        Ok("SCOPE_IDENTITY()".to_string())
    }

    fn reselect_in_same_batch(&self) -> bool {
        true
    }

    fn identity_clause(&self) -> Option<&'static str> {
        Some("IDENTITY(1,1)")
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
            .unwrap_or_else(|| "dbo".to_string());
        let text = format!(
            "SELECT c.COLUMN_NAME AS column_name, c.ORDINAL_POSITION AS ordinal, \
             c.DATA_TYPE AS data_type, c.IS_NULLABLE AS is_nullable, \
             c.CHARACTER_MAXIMUM_LENGTH AS max_length, \
             c.NUMERIC_PRECISION AS numeric_precision, c.NUMERIC_SCALE AS numeric_scale, \
             COLUMNPROPERTY(OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME)), c.COLUMN_NAME, 'IsIdentity') AS is_identity, \
             COLUMNPROPERTY(OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME)), c.COLUMN_NAME, 'IsComputed') AS is_computed, \
             CASE WHEN pk.COLUMN_NAME IS NULL THEN 0 ELSE 1 END AS is_key \
             FROM INFORMATION_SCHEMA.COLUMNS c \
             LEFT JOIN (SELECT ku.TABLE_SCHEMA, ku.TABLE_NAME, ku.COLUMN_NAME \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE ku \
             ON tc.CONSTRAINT_NAME = ku.CONSTRAINT_NAME AND tc.TABLE_SCHEMA = ku.TABLE_SCHEMA \
             WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY') pk \
             ON pk.TABLE_SCHEMA = c.TABLE_SCHEMA AND pk.TABLE_NAME = c.TABLE_NAME AND pk.COLUMN_NAME = c.COLUMN_NAME \
             WHERE c.TABLE_NAME = {table_param} AND c.TABLE_SCHEMA = {schema_param} \
             ORDER BY c.ORDINAL_POSITION",
            table_param = provider.parameter_name("table"),
            schema_param = provider.parameter_name("schema"),
        );
        Command::new(text)
            .with_parameter(DbParameter::new("table", RowValues::Text(table.to_string())))
            .with_parameter(DbParameter::new("schema", RowValues::Text(schema)))
    }

    fn type_mapper(&self) -> &dyn ProviderTypeMapper {
        &SqlServerTypeMapper
    }
}
