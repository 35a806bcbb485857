//! Binding values and records to command parameters.
//!
//! A value bound by name resolves its parameter in this order:
//! 1. an existing parameter with the same name is updated in place;
//! 2. an explicit `DbType` creates the parameter with that type;
//! 3. the connection's native factory ([`DbConnection::native_parameter`]) creates it;
//! 4. the static type map ([`DbTypeMapper`]) supplies the type;
//! 5. otherwise the value is sent as a string with `DbType::String`.

use std::any::TypeId;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::client::DbConnection;
use crate::command::{DbParameter, ParameterCollection};
use crate::error::SqlGlueError;
use crate::record::Record;
use crate::translation::is_parameter_referenced;
use crate::typemap::{DbType, DbTypeMapper, row_value_from_json};
use crate::types::{ParameterDirection, RowValues};

pub struct ParameterBinder<'a> {
    parameters: &'a mut ParameterCollection,
    native: Option<&'a dyn DbConnection>,
}

impl<'a> ParameterBinder<'a> {
    #[must_use]
    pub fn new(parameters: &'a mut ParameterCollection, native: Option<&'a dyn DbConnection>) -> Self {
        Self { parameters, native }
    }

    /// Bind a serializable value.
    ///
    /// # Errors
    /// - `ArgumentError` for an empty name.
    /// - `ParameterError` when the value cannot be serialized.
    /// - `InvalidCast` when the value does not fit the explicit or existing type.
    pub fn bind<T: Serialize + ?Sized + 'static>(
        &mut self,
        name: &str,
        value: &T,
        db_type: Option<DbType>,
        direction: ParameterDirection,
    ) -> Result<(), SqlGlueError> {
        let json = serde_json::to_value(value)
            .map_err(|e| SqlGlueError::ParameterError(format!("parameter '{name}': {e}")))?;
        let mapped = DbTypeMapper::try_get_db_type(TypeId::of::<T>());
        self.bind_json(name, json, db_type, mapped, direction)
    }

    /// Bind an already converted value. Its type comes from `db_type`, else from the value.
    ///
    /// # Errors
    /// `ArgumentError` for an empty name.
    pub fn bind_value(
        &mut self,
        name: &str,
        value: RowValues,
        db_type: Option<DbType>,
        direction: ParameterDirection,
    ) -> Result<(), SqlGlueError> {
        check_name(name)?;
        if let Some(existing) = self.parameters.find_mut(name) {
            existing.value = value;
            existing.direction = direction;
            if db_type.is_some() {
                existing.db_type = db_type;
            }
            return Ok(());
        }
        let db_type = db_type.unwrap_or_else(|| value.inferred_db_type());
        self.parameters.add(
            DbParameter::new(name, value)
                .with_db_type(db_type)
                .with_direction(direction),
        );
        Ok(())
    }

    /// Bind every basic field of `record`. When `command_text` is not blank, fields it does
    /// not reference are skipped. Returns the number of parameters bound.
    ///
    /// # Errors
    /// Same as [`ParameterBinder::bind`].
    pub fn bind_record<R: Record>(
        &mut self,
        record: &R,
        command_text: &str,
    ) -> Result<usize, SqlGlueError> {
        let filter = !command_text.trim().is_empty();
        let mut bound = 0;
        for field in R::shape().fields() {
            let Some(db_type) = field.db_type else {
                continue;
            };
            if filter && !is_parameter_referenced(command_text, field.name) {
                continue;
            }
            let json = (field.get)(record).map_err(|e| {
                SqlGlueError::ParameterError(format!("field '{}': {e}", field.name))
            })?;
            self.bind_json(
                field.name,
                json,
                None,
                Some(db_type),
                ParameterDirection::Input,
            )?;
            bound += 1;
        }
        Ok(bound)
    }

    fn bind_json(
        &mut self,
        name: &str,
        value: JsonValue,
        explicit: Option<DbType>,
        mapped: Option<DbType>,
        direction: ParameterDirection,
    ) -> Result<(), SqlGlueError> {
        check_name(name)?;

        if let Some(existing) = self.parameters.find_mut(name) {
            let db_type = explicit
                .or(existing.db_type)
                .or(mapped)
                .unwrap_or(DbType::String);
            existing.value = row_value_from_json(&value, db_type, name)?;
            existing.db_type = Some(db_type);
            existing.direction = direction;
            return Ok(());
        }

        let parameter = if let Some(db_type) = explicit {
            DbParameter::new(name, row_value_from_json(&value, db_type, name)?).with_db_type(db_type)
        } else if let Some(native) = self.native.and_then(|conn| conn.native_parameter(name, &value)) {
            native
        } else if let Some(db_type) = mapped {
            DbParameter::new(name, row_value_from_json(&value, db_type, name)?).with_db_type(db_type)
        } else {
            let text = match value {
                JsonValue::Null => RowValues::Null,
                JsonValue::String(s) => RowValues::Text(s),
                other => RowValues::Text(other.to_string()),
            };
            DbParameter::new(name, text).with_db_type(DbType::String)
        };
        self.parameters.add(parameter.with_direction(direction));
        Ok(())
    }
}

fn check_name(name: &str) -> Result<(), SqlGlueError> {
    if crate::provider::strip_parameter_prefix(name).trim().is_empty() {
        return Err(SqlGlueError::ArgumentError(
            "parameter name is empty".to_string(),
        ));
    }
    Ok(())
}
