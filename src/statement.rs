//! The named parameter binder.
//!
//! [`NamedStatement`] composes a compiled template with the driver's prepared
//! statement: callers bind values by placeholder name and the binder resolves
//! every position that name occupies. Raw positional binding stays behind the
//! [`Statement`](crate::connectivity::Statement) trait and is not part of this
//! surface.

use tracing::debug;

use crate::compile::{CompiledSql, Repetition};
use crate::connectivity::{Connection, Rows, Statement};
use crate::error::{DriverError, SqlTemplateError};
use crate::value::SqlValue;

/// A prepared statement addressed by placeholder names instead of positions.
pub struct NamedStatement<'c> {
    inner: Box<dyn Statement + 'c>,
    compiled: CompiledSql,
    template: String,
}

impl<'c> NamedStatement<'c> {
    /// Compile `template` and prepare it on `conn`.
    ///
    /// # Errors
    /// Returns [`SqlTemplateError::Compile`] for a malformed template and
    /// [`SqlTemplateError::QueryExecution`] when the driver rejects the
    /// compiled statement.
    pub fn prepare(conn: &'c dyn Connection, template: &str) -> Result<Self, SqlTemplateError> {
        Self::prepare_with(conn, template, &Repetition::new(), None)
    }

    /// Compile with repetition expansion and optionally ask the driver to
    /// report an auto-generated column (already translated for the database
    /// product, see [`DatabaseProduct`](crate::product::DatabaseProduct)).
    ///
    /// # Errors
    /// Same as [`NamedStatement::prepare`].
    pub fn prepare_with(
        conn: &'c dyn Connection,
        template: &str,
        repetition: &Repetition,
        returning_column: Option<&str>,
    ) -> Result<Self, SqlTemplateError> {
        let compiled = CompiledSql::compile(template, repetition)?;
        let inner = conn
            .prepare(compiled.sql(), returning_column)
            .map_err(|e| SqlTemplateError::query(template, e))?;
        Ok(NamedStatement {
            inner,
            compiled,
            template: template.to_owned(),
        })
    }

    /// Bind `value` to every position the name occupies.
    ///
    /// Binding a name absent from the statement is a no-op; that usually
    /// indicates a caller bug, so it is logged at debug level.
    ///
    /// # Errors
    /// Propagates the driver's binding error unchanged.
    pub fn set(&mut self, name: &str, value: impl Into<SqlValue>) -> Result<(), DriverError> {
        let value = value.into();
        let positions = self.compiled.positions(name);
        if positions.is_empty() {
            debug!(name, template = %self.template, "no placeholder with this name in the statement");
            return Ok(());
        }
        for &position in positions {
            self.inner.bind(position, &value)?;
        }
        Ok(())
    }

    /// Bind each value to the matching expanded position of a repeated name:
    /// the i-th value lands on the i-th position recorded for `name`. Meant
    /// for the single-occurrence, repetition-expanded (`IN` list) case.
    ///
    /// # Errors
    /// Propagates the driver's binding error unchanged.
    pub fn set_list<V>(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Result<(), DriverError>
    where
        V: Into<SqlValue>,
    {
        let positions = self.compiled.positions(name).to_vec();
        for (position, value) in positions.into_iter().zip(values) {
            self.inner.bind(position, &value.into())?;
        }
        Ok(())
    }

    /// # Errors
    /// Propagates the driver's execution error unchanged.
    pub fn execute_query(&mut self) -> Result<Box<dyn Rows + '_>, DriverError> {
        self.inner.execute_query()
    }

    /// # Errors
    /// Propagates the driver's execution error unchanged.
    pub fn execute_update(&mut self) -> Result<usize, DriverError> {
        self.inner.execute_update()
    }

    /// Snapshot the currently bound parameters as one batch row.
    ///
    /// # Errors
    /// Propagates the driver's error unchanged.
    pub fn add_batch(&mut self) -> Result<(), DriverError> {
        self.inner.add_batch()
    }

    /// Execute every batched row; returns per-row affected counts.
    ///
    /// # Errors
    /// Propagates the driver's execution error unchanged.
    pub fn execute_batch(&mut self) -> Result<Vec<usize>, DriverError> {
        self.inner.execute_batch()
    }

    /// # Errors
    /// Propagates the driver's error unchanged.
    pub fn generated_key(&mut self) -> Result<Option<i64>, DriverError> {
        self.inner.generated_key()
    }

    /// The positional SQL this statement was prepared from.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.compiled.sql()
    }
}
