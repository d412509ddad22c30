//! The template execution surface.
//!
//! [`SqlTemplate`] owns a datasource and runs each operation on a connection
//! acquired for that operation. Statements use `:name;` placeholders; rows
//! come back through a caller-supplied mapper. Multi-statement units of work
//! go through [`SqlTemplate::with_transaction`] instead, which pins one
//! connection for the whole scope.

use std::sync::OnceLock;

use crate::compile::Repetition;
use crate::connectivity::{Connection, ConnectionMetadata, DataSource, Rows};
use crate::error::{DriverError, SqlTemplateError};
use crate::exec;
use crate::statement::NamedStatement;
use crate::transaction::{self, Transaction, TransactionContext};

/// High-level execution surface over a [`DataSource`].
///
/// Operations that mutate data commit after executing when the connection is
/// in manual-commit mode, so they behave the same on autocommit and
/// manual-commit datasources. Connection metadata is fetched once and cached
/// for the lifetime of the value.
pub struct SqlTemplate<D> {
    datasource: D,
    driver_name: OnceLock<String>,
    product_name: OnceLock<String>,
}

impl<D: DataSource> SqlTemplate<D> {
    pub fn new(datasource: D) -> Self {
        SqlTemplate {
            datasource,
            driver_name: OnceLock::new(),
            product_name: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn datasource(&self) -> &D {
        &self.datasource
    }

    fn acquire(&self) -> Result<Box<dyn Connection>, SqlTemplateError> {
        Ok(self.datasource.connection()?)
    }

    /// Run a query and map every row. The filter binds the statement's named
    /// parameters; pass `|_| Ok(())` for a parameterless query.
    ///
    /// # Errors
    /// Compile, driver and mapper failures.
    pub fn query<T>(
        &self,
        template: &str,
        mapper: impl FnMut(&dyn Rows, usize) -> Result<T, DriverError>,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<Vec<T>, SqlTemplateError> {
        self.query_with(template, &Repetition::new(), mapper, filter)
    }

    /// Run a query whose placeholders expand per `repetition` (the `IN` list
    /// case; bind the expanded name with
    /// [`NamedStatement::set_list`]).
    ///
    /// # Errors
    /// Same as [`SqlTemplate::query`].
    pub fn query_with<T>(
        &self,
        template: &str,
        repetition: &Repetition,
        mapper: impl FnMut(&dyn Rows, usize) -> Result<T, DriverError>,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<Vec<T>, SqlTemplateError> {
        let conn = self.acquire()?;
        let records = exec::run_query(&*conn, template, repetition, mapper, filter)?;
        exec::commit_if_manual(&*conn, template)?;
        Ok(records)
    }

    /// Fetch at most one record; `Ok(None)` when the query yields no rows.
    ///
    /// # Errors
    /// [`SqlTemplateError::MultipleRecords`] when the query yields more than
    /// one row, plus the failures of [`SqlTemplate::query`].
    pub fn fetch_single_record<T>(
        &self,
        template: &str,
        mapper: impl FnMut(&dyn Rows, usize) -> Result<T, DriverError>,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<Option<T>, SqlTemplateError> {
        let conn = self.acquire()?;
        exec::run_fetch_single(&*conn, template, mapper, filter)
    }

    /// # Errors
    /// Compile and driver failures.
    pub fn execute_update(
        &self,
        template: &str,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<(), SqlTemplateError> {
        let conn = self.acquire()?;
        exec::run_update(&*conn, template, filter)?;
        exec::commit_if_manual(&*conn, template)
    }

    /// Run a parameterless update; returns the affected row count.
    ///
    /// # Errors
    /// Same as [`SqlTemplate::execute_update`].
    pub fn execute_simple_update(&self, template: &str) -> Result<usize, SqlTemplateError> {
        let conn = self.acquire()?;
        let affected = exec::run_update(&*conn, template, |_| Ok(()))?;
        exec::commit_if_manual(&*conn, template)?;
        Ok(affected)
    }

    /// Insert without reading back a generated key.
    ///
    /// # Errors
    /// Same as [`SqlTemplate::execute_update`].
    pub fn execute_insert(
        &self,
        template: &str,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<(), SqlTemplateError> {
        let conn = self.acquire()?;
        exec::run_insert(&*conn, template, filter)?;
        exec::commit_if_manual(&*conn, template)
    }

    /// Insert one row and return the value of the auto-generated
    /// `key_column`. The column name is translated for the database product
    /// before the statement is prepared.
    ///
    /// # Errors
    /// [`SqlTemplateError::GeneratedKeyMissing`] when the database reports no
    /// key, plus the failures of [`SqlTemplate::execute_update`].
    pub fn execute_insert_returning_id(
        &self,
        template: &str,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
        key_column: &str,
    ) -> Result<i64, SqlTemplateError> {
        let conn = self.acquire()?;
        let id = exec::run_insert_returning(&*conn, template, filter, key_column)?;
        exec::commit_if_manual(&*conn, template)?;
        Ok(id)
    }

    /// Insert several rows in one round; the filter binds and
    /// [`NamedStatement::add_batch`]es each row. Returns per-row affected
    /// counts.
    ///
    /// # Errors
    /// Same as [`SqlTemplate::execute_update`].
    pub fn execute_batch_insert(
        &self,
        template: &str,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<Vec<usize>, SqlTemplateError> {
        let conn = self.acquire()?;
        let counts = exec::run_batch(&*conn, template, filter)?;
        exec::commit_if_manual(&*conn, template)?;
        Ok(counts)
    }

    /// Delete in batches; same contract as
    /// [`SqlTemplate::execute_batch_insert`].
    ///
    /// # Errors
    /// Same as [`SqlTemplate::execute_update`].
    pub fn execute_batch_delete(
        &self,
        template: &str,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<Vec<usize>, SqlTemplateError> {
        let conn = self.acquire()?;
        let counts = exec::run_batch(&*conn, template, filter)?;
        exec::commit_if_manual(&*conn, template)?;
        Ok(counts)
    }

    /// Run `work` inside a transaction scope on `ctx`.
    ///
    /// The outermost call acquires a connection, switches it to manual
    /// commit and commits once `work` returns successfully; nested units of
    /// work open inner scopes through [`Transaction::with_transaction`]. On
    /// failure the outermost scope rolls back. The connection's autocommit
    /// mode is restored and the connection released either way.
    ///
    /// # Errors
    /// [`SqlTemplateError::Transaction`] tagged with the stage that failed;
    /// a failure of `work` itself is wrapped with the commit stage.
    pub fn with_transaction<T>(
        &self,
        ctx: &mut TransactionContext,
        work: impl FnOnce(&mut Transaction<'_>) -> Result<T, SqlTemplateError>,
    ) -> Result<T, SqlTemplateError> {
        ctx.enter(&self.datasource)?;
        transaction::run_scope(ctx, work)
    }

    /// Name of the connectivity driver, fetched once and cached.
    ///
    /// # Errors
    /// [`SqlTemplateError::Metadata`] when the metadata cannot be read.
    pub fn driver_name(&self) -> Result<&str, SqlTemplateError> {
        if let Some(name) = self.driver_name.get() {
            return Ok(name);
        }
        let meta = self.load_metadata()?;
        let _ = self.product_name.set(meta.product_name);
        Ok(self.driver_name.get_or_init(|| meta.driver_name))
    }

    /// Name of the database product, fetched once and cached.
    ///
    /// # Errors
    /// [`SqlTemplateError::Metadata`] when the metadata cannot be read.
    pub fn database_product_name(&self) -> Result<&str, SqlTemplateError> {
        if let Some(name) = self.product_name.get() {
            return Ok(name);
        }
        let meta = self.load_metadata()?;
        let _ = self.driver_name.set(meta.driver_name);
        Ok(self.product_name.get_or_init(|| meta.product_name))
    }

    fn load_metadata(&self) -> Result<ConnectionMetadata, SqlTemplateError> {
        let conn = self.acquire()?;
        conn.metadata()
            .map_err(|e| SqlTemplateError::Metadata { source: e })
    }
}
