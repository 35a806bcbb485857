//! Commands and their parameters, plus the fluent [`CommandSource`] that builds them.

use std::time::Duration;

use crate::error::SqlGlueError;
use crate::provider::strip_parameter_prefix;
use crate::typemap::DbType;
use crate::types::{ParameterDirection, RowValues};

mod source;

pub use source::{BoundCommand, CommandSource};

/// A named command parameter. Names are stored without their marker (`@`, `$`, `:`).
#[derive(Debug, Clone, PartialEq)]
pub struct DbParameter {
    pub name: String,
    pub value: RowValues,
    pub db_type: Option<DbType>,
    pub direction: ParameterDirection,
}

impl DbParameter {
    #[must_use]
    pub fn new(name: impl AsRef<str>, value: RowValues) -> Self {
        DbParameter {
            name: strip_parameter_prefix(name.as_ref()).to_string(),
            value,
            db_type: None,
            direction: ParameterDirection::Input,
        }
    }

    #[must_use]
    pub fn with_db_type(mut self, db_type: DbType) -> Self {
        self.db_type = Some(db_type);
        self
    }

    #[must_use]
    pub fn with_direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Whether this parameter answers to `name`, ignoring marker and case.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(strip_parameter_prefix(name))
    }
}

/// Ordered parameters of one command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterCollection {
    items: Vec<DbParameter>,
}

impl ParameterCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&DbParameter> {
        self.items.iter().find(|p| p.matches(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut DbParameter> {
        self.items.iter_mut().find(|p| p.matches(name))
    }

    pub fn add(&mut self, parameter: DbParameter) {
        self.items.push(parameter);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DbParameter> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Neither driver returns values through parameters, so only inputs can be sent.
    ///
    /// # Errors
    /// `SqlGlueError::NotSupported` naming the first parameter that is not an input.
    pub fn ensure_inputs(&self) -> Result<(), SqlGlueError> {
        match self.items.iter().find(|p| p.direction != ParameterDirection::Input) {
            Some(p) => Err(SqlGlueError::NotSupported(format!(
                "parameter '{}' has direction {:?}; only input parameters can be sent",
                p.name, p.direction
            ))),
            None => Ok(()),
        }
    }

    /// Values for `names`, in that order.
    ///
    /// # Errors
    /// `SqlGlueError::ParameterError` naming the first parameter that was never bound.
    pub fn values_for<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&RowValues>, SqlGlueError> {
        names
            .iter()
            .map(|name| {
                self.find(name.as_ref()).map(|p| &p.value).ok_or_else(|| {
                    SqlGlueError::ParameterError(format!(
                        "parameter '{}' is referenced but not bound",
                        name.as_ref()
                    ))
                })
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ParameterCollection {
    type Item = &'a DbParameter;
    type IntoIter = std::slice::Iter<'a, DbParameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Finalized command text with its parameters, ready for a [`crate::DbConnection`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    pub text: String,
    pub parameters: ParameterCollection,
    pub timeout: Option<Duration>,
    /// Fail at execution unless the connection has an open transaction.
    pub requires_transaction: bool,
}

impl Command {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Command {
            text: text.into(),
            ..Command::default()
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, parameter: DbParameter) -> Self {
        self.parameters.add(parameter);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
