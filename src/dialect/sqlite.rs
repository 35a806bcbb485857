use super::{Dialect, int_field, push_clause, text_field};
use crate::command::{Command, DbParameter};
use crate::error::SqlGlueError;
use crate::provider::{ProviderKind, ProviderMetadata};
use crate::results::ResultSet;
use crate::schema::DbColumn;
use crate::typemap::{ProviderTypeMapper, SqliteTypeMapper, parse_provider_type};
use crate::types::RowValues;

/// SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Sqlite
    }

    fn default_quotes(&self) -> (&'static str, &'static str) {
        ("[", "]")
    }

    fn parameter_prefix(&self) -> &'static str {
        "$"
    }

    fn default_schema(&self, _database: Option<&str>) -> Option<String> {
        Some("main".to_string())
    }

    fn paginate(&self, sql: &mut String, skip: u64, take: u64) -> Result<(), SqlGlueError> {
        // LIMIT -1 means no limit
        let limit = i64::try_from(take).unwrap_or(-1);
        push_clause(sql, &format!("LIMIT {limit} OFFSET {skip}"));
        Ok(())
    }

    // rowid of the connection's last insert; covers plain rowid and AUTOINCREMENT tables
    fn last_inserted_clause(&self, _table: &str) -> Result<String, SqlGlueError> {
        Ok("last_insert_rowid()".to_string())
    }

    fn identity_clause(&self) -> Option<&'static str> {
        Some("PRIMARY KEY AUTOINCREMENT")
    }

    fn identity_declares_key(&self) -> bool {
        true
    }

    fn columns_query(
        &self,
        provider: &ProviderMetadata,
        table: &str,
        schema: Option<&str>,
    ) -> Command {
        let table_param = provider.parameter_name("table");
        let mut command = Command::new(String::new())
            .with_parameter(DbParameter::new("table", RowValues::Text(table.to_string())));
        let source = match schema {
            Some(schema) => {
                command =
                    command.with_parameter(DbParameter::new("schema", RowValues::Text(schema.to_string())));
                format!("pragma_table_xinfo({table_param}, {})", provider.parameter_name("schema"))
            }
            None => format!("pragma_table_xinfo({table_param})"),
        };
        command.text = format!(
            "SELECT cid, name, type, \"notnull\", pk, hidden FROM {source} ORDER BY cid"
        );
        command
    }

    fn parse_columns(&self, rows: &ResultSet) -> Result<Vec<DbColumn>, SqlGlueError> {
        let key_count = rows
            .results
            .iter()
            .filter(|row| int_field(row, "pk").unwrap_or(0) > 0)
            .count();

        let mut columns = Vec::with_capacity(rows.results.len());
        for row in &rows.results {
            let hidden = int_field(row, "hidden").unwrap_or(0);
            // 1 marks hidden columns of virtual tables
            if hidden == 1 {
                continue;
            }
            let name = text_field(row, "name").ok_or_else(|| {
                SqlGlueError::invalid_cast("name", "pragma_table_xinfo row has no name")
            })?;
            let provider_type = text_field(row, "type").unwrap_or_default();
            let is_key = int_field(row, "pk").unwrap_or(0) > 0;
            let is_identity = is_key && key_count == 1 && provider_type.eq_ignore_ascii_case("INTEGER");
            let computed = matches!(hidden, 2 | 3);

            let mut column = DbColumn::new(name, SqliteTypeMapper.db_type_for(&provider_type))
                .with_ordinal(int_field(row, "cid").unwrap_or(0) + 1)
                .with_nullable(int_field(row, "notnull").unwrap_or(0) == 0 && !is_identity)
                .with_key(is_key)
                .with_identity(is_identity)
                .with_computed(computed)
                .with_readonly(computed);
            if let Some(parsed) = parse_provider_type(&provider_type) {
                let numbers: Vec<u32> = parsed.args.iter().filter_map(|a| a.parse().ok()).collect();
                let base = parsed.base.to_ascii_uppercase();
                match numbers.as_slice() {
                    [p, rest @ ..] if base == "DECIMAL" || base == "NUMERIC" => {
                        let scale = rest.first().and_then(|s| u8::try_from(*s).ok());
                        column = column.with_precision(u8::try_from(*p).unwrap_or(u8::MAX), scale);
                    }
                    [len] => column = column.with_max_length(*len),
                    _ => {}
                }
            }
            columns.push(column.with_provider_type(provider_type));
        }
        Ok(columns)
    }

    fn type_mapper(&self) -> &dyn ProviderTypeMapper {
        &SqliteTypeMapper
    }
}
