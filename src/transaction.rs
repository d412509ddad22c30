//! Reentrant transaction scopes.
//!
//! A [`TransactionContext`] owns the connection and the nesting depth for one
//! logical unit of work. Scopes are opened through
//! [`SqlTemplate::with_transaction`](crate::template::SqlTemplate::with_transaction)
//! and nest through [`Transaction::with_transaction`]; only the outermost
//! scope acquires the connection, commits or rolls back, and restores the
//! connection's autocommit mode before releasing it. The context is an
//! explicit value the caller threads through the call chain, so a unit of
//! work is tied to the context, not to the thread it happens to run on.

use tracing::debug;

use crate::compile::Repetition;
use crate::connectivity::{Connection, DataSource, Rows};
use crate::error::{DriverError, SqlTemplateError, TransactionStage};
use crate::exec;
use crate::statement::NamedStatement;

/// Per-unit-of-work transaction state.
///
/// A fresh context is idle. While a scope is open it holds the connection,
/// the autocommit mode to restore on release, and the nesting depth. After
/// the outermost scope exits, successfully or not, the context is idle again
/// and can be reused.
#[derive(Default)]
pub struct TransactionContext {
    depth: usize,
    conn: Option<Box<dyn Connection>>,
    prior_auto_commit: bool,
}

impl TransactionContext {
    #[must_use]
    pub fn new() -> Self {
        TransactionContext::default()
    }

    /// Current nesting depth; zero when idle.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    pub(crate) fn active(&self) -> Result<&dyn Connection, SqlTemplateError> {
        self.conn
            .as_deref()
            .ok_or(SqlTemplateError::InactiveTransaction)
    }

    /// Open a scope. The outermost entry acquires the connection, captures
    /// the autocommit mode and switches to manual commit; nested entries only
    /// deepen the count.
    pub(crate) fn enter(&mut self, datasource: &dyn DataSource) -> Result<(), SqlTemplateError> {
        if self.depth == 0 {
            let conn = datasource
                .connection()
                .map_err(|e| SqlTemplateError::transaction(TransactionStage::Acquire, e))?;
            let prior = conn
                .auto_commit()
                .map_err(|e| SqlTemplateError::transaction(TransactionStage::Acquire, e))?;
            conn.set_auto_commit(false)
                .map_err(|e| SqlTemplateError::transaction(TransactionStage::Acquire, e))?;
            self.conn = Some(conn);
            self.prior_auto_commit = prior;
        }
        self.depth += 1;
        debug!(depth = self.depth, "transaction scope opened");
        Ok(())
    }

    pub(crate) fn enter_nested(&mut self) {
        self.depth += 1;
        debug!(depth = self.depth, "transaction scope opened");
    }

    /// Close a scope. The depth always decrements, even when the unit of
    /// work failed, so a failed inner scope cannot leave the context stuck
    /// open. Only the outermost exit touches the connection: commit on
    /// success, rollback on failure, then restore autocommit and close.
    /// The context is idle once this returns, whatever the outcome.
    fn exit<T>(&mut self, result: Result<T, SqlTemplateError>) -> Result<T, SqlTemplateError> {
        self.depth = self.depth.saturating_sub(1);
        debug!(depth = self.depth, "transaction scope closed");
        if self.depth > 0 {
            return result
                .map_err(|e| SqlTemplateError::transaction(TransactionStage::Commit, e));
        }

        let Some(conn) = self.conn.take() else {
            return result
                .map_err(|e| SqlTemplateError::transaction(TransactionStage::Commit, e));
        };
        let mut outcome = match result {
            Ok(value) => conn
                .commit()
                .map(|()| value)
                .map_err(|e| SqlTemplateError::transaction(TransactionStage::Commit, e)),
            Err(body) => match conn.rollback() {
                Ok(()) => Err(SqlTemplateError::transaction(TransactionStage::Commit, body)),
                Err(e) => Err(SqlTemplateError::transaction(TransactionStage::Rollback, e)),
            },
        };
        if let Err(e) = release(conn, self.prior_auto_commit) {
            outcome = Err(SqlTemplateError::transaction(TransactionStage::Close, e));
        }
        outcome
    }
}

fn release(conn: Box<dyn Connection>, prior_auto_commit: bool) -> Result<(), DriverError> {
    conn.set_auto_commit(prior_auto_commit)?;
    conn.close()
}

/// Run `work` in the scope already opened on `ctx`, then close the scope.
pub(crate) fn run_scope<T>(
    ctx: &mut TransactionContext,
    work: impl FnOnce(&mut Transaction<'_>) -> Result<T, SqlTemplateError>,
) -> Result<T, SqlTemplateError> {
    let result = work(&mut Transaction { ctx: &mut *ctx });
    ctx.exit(result)
}

/// Handle to an open transaction scope.
///
/// Exposes the execution operations against the scope's connection. None of
/// them commit; the outermost scope commits exactly once when its unit of
/// work returns successfully.
pub struct Transaction<'a> {
    ctx: &'a mut TransactionContext,
}

impl Transaction<'_> {
    /// Run `work` in a nested scope on the same connection. The nested scope
    /// deepens the count but defers commit and rollback to the outermost
    /// scope.
    ///
    /// # Errors
    /// A failure of `work` is wrapped as a transaction error and propagated;
    /// the scope is closed either way.
    pub fn with_transaction<T>(
        &mut self,
        work: impl FnOnce(&mut Transaction<'_>) -> Result<T, SqlTemplateError>,
    ) -> Result<T, SqlTemplateError> {
        self.ctx.enter_nested();
        run_scope(self.ctx, work)
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.ctx.depth()
    }

    /// Run a query and map every row.
    ///
    /// # Errors
    /// Compile, driver and mapper failures, plus
    /// [`SqlTemplateError::InactiveTransaction`] when the scope has lost its
    /// connection.
    pub fn query<T>(
        &self,
        template: &str,
        mapper: impl FnMut(&dyn Rows, usize) -> Result<T, DriverError>,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<Vec<T>, SqlTemplateError> {
        exec::run_query(self.ctx.active()?, template, &Repetition::new(), mapper, filter)
    }

    /// Run a query whose placeholders expand per `repetition`.
    ///
    /// # Errors
    /// Same as [`Transaction::query`].
    pub fn query_with<T>(
        &self,
        template: &str,
        repetition: &Repetition,
        mapper: impl FnMut(&dyn Rows, usize) -> Result<T, DriverError>,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<Vec<T>, SqlTemplateError> {
        exec::run_query(self.ctx.active()?, template, repetition, mapper, filter)
    }

    /// Fetch at most one record.
    ///
    /// # Errors
    /// [`SqlTemplateError::MultipleRecords`] when the query yields more than
    /// one row, plus the failures of [`Transaction::query`].
    pub fn fetch_single_record<T>(
        &self,
        template: &str,
        mapper: impl FnMut(&dyn Rows, usize) -> Result<T, DriverError>,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<Option<T>, SqlTemplateError> {
        exec::run_fetch_single(self.ctx.active()?, template, mapper, filter)
    }

    /// # Errors
    /// Compile and driver failures, plus
    /// [`SqlTemplateError::InactiveTransaction`].
    pub fn execute_update(
        &self,
        template: &str,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<(), SqlTemplateError> {
        exec::run_update(self.ctx.active()?, template, filter).map(|_| ())
    }

    /// Run a parameterless update; returns the affected row count.
    ///
    /// # Errors
    /// Same as [`Transaction::execute_update`].
    pub fn execute_simple_update(&self, template: &str) -> Result<usize, SqlTemplateError> {
        exec::run_update(self.ctx.active()?, template, |_| Ok(()))
    }

    /// # Errors
    /// Same as [`Transaction::execute_update`].
    pub fn execute_insert(
        &self,
        template: &str,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<(), SqlTemplateError> {
        exec::run_insert(self.ctx.active()?, template, filter)
    }

    /// Insert one row and return the value of the auto-generated
    /// `key_column`.
    ///
    /// # Errors
    /// [`SqlTemplateError::GeneratedKeyMissing`] when the database reports no
    /// key, plus the failures of [`Transaction::execute_update`].
    pub fn execute_insert_returning_id(
        &self,
        template: &str,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
        key_column: &str,
    ) -> Result<i64, SqlTemplateError> {
        exec::run_insert_returning(self.ctx.active()?, template, filter, key_column)
    }

    /// Insert several rows in one round; the filter binds and
    /// [`NamedStatement::add_batch`]es each row. Returns per-row affected
    /// counts.
    ///
    /// # Errors
    /// Same as [`Transaction::execute_update`].
    pub fn execute_batch_insert(
        &self,
        template: &str,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<Vec<usize>, SqlTemplateError> {
        exec::run_batch(self.ctx.active()?, template, filter)
    }

    /// Delete in batches; same contract as [`Transaction::execute_batch_insert`].
    ///
    /// # Errors
    /// Same as [`Transaction::execute_update`].
    pub fn execute_batch_delete(
        &self,
        template: &str,
        filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    ) -> Result<Vec<usize>, SqlTemplateError> {
        exec::run_batch(self.ctx.active()?, template, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CapturingConnection;

    struct StubDataSource;

    impl DataSource for StubDataSource {
        fn connection(&self) -> Result<Box<dyn Connection>, DriverError> {
            Ok(Box::new(CapturingConnection::new()))
        }
    }

    #[test]
    fn context_starts_and_ends_idle() {
        let mut ctx = TransactionContext::new();
        assert!(!ctx.in_transaction());
        ctx.enter(&StubDataSource).unwrap();
        assert_eq!(ctx.depth(), 1);
        let out: Result<(), SqlTemplateError> = run_scope(&mut ctx, |_tx| Ok(()));
        assert!(out.is_ok());
        assert!(!ctx.in_transaction());
        assert!(ctx.conn.is_none());
    }

    #[test]
    fn failed_scope_still_returns_context_to_idle() {
        let mut ctx = TransactionContext::new();
        ctx.enter(&StubDataSource).unwrap();
        let out: Result<(), SqlTemplateError> = run_scope(&mut ctx, |_tx| {
            Err(SqlTemplateError::GeneratedKeyMissing)
        });
        assert!(matches!(
            out,
            Err(SqlTemplateError::Transaction {
                stage: TransactionStage::Commit,
                ..
            })
        ));
        assert_eq!(ctx.depth(), 0);
        assert!(ctx.conn.is_none());
    }

    #[test]
    fn active_without_scope_is_an_error() {
        let ctx = TransactionContext::new();
        assert!(matches!(
            ctx.active().map(|_| ()),
            Err(SqlTemplateError::InactiveTransaction)
        ));
    }
}
