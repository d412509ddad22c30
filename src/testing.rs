//! Test doubles for the connectivity traits.
//!
//! [`SpyDataSource`] wraps a real datasource, records lifecycle operations in
//! an [`OpLog`] and can inject failures through a [`FaultPlan`], which is how
//! the transaction coordinator's error paths get exercised without a flaky
//! backend. [`CapturingConnection`] is a free-standing stub that records
//! parameter binds, for binder tests that need no database at all.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::connectivity::{Connection, ConnectionMetadata, DataSource, Rows, Statement};
use crate::error::DriverError;
use crate::value::SqlValue;

/// A connection lifecycle operation observed by [`SpyDataSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedOp {
    Connect,
    Prepare { sql: String, returning: bool },
    SetAutoCommit(bool),
    Commit,
    Rollback,
    Close,
}

/// Shared, append-only record of lifecycle operations.
#[derive(Clone, Default)]
pub struct OpLog(Arc<Mutex<Vec<RecordedOp>>>);

impl OpLog {
    fn record(&self, op: RecordedOp) {
        self.0.lock().expect("op log poisoned").push(op);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<RecordedOp> {
        self.0.lock().expect("op log poisoned").clone()
    }

    #[must_use]
    pub fn connects(&self) -> usize {
        self.count(|op| matches!(op, RecordedOp::Connect))
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.count(|op| matches!(op, RecordedOp::Commit))
    }

    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.count(|op| matches!(op, RecordedOp::Rollback))
    }

    fn count(&self, pred: impl Fn(&RecordedOp) -> bool) -> usize {
        self.0
            .lock()
            .expect("op log poisoned")
            .iter()
            .filter(|op| pred(op))
            .count()
    }
}

/// Switches that make the spied connection fail at chosen lifecycle points.
#[derive(Default)]
pub struct FaultPlan {
    connect: AtomicBool,
    set_auto_commit: AtomicBool,
    commit: AtomicBool,
    rollback: AtomicBool,
    close: AtomicBool,
}

impl FaultPlan {
    pub fn fail_connect(&self) {
        self.connect.store(true, Ordering::SeqCst);
    }

    pub fn fail_set_auto_commit(&self) {
        self.set_auto_commit.store(true, Ordering::SeqCst);
    }

    pub fn fail_commit(&self) {
        self.commit.store(true, Ordering::SeqCst);
    }

    pub fn fail_rollback(&self) {
        self.rollback.store(true, Ordering::SeqCst);
    }

    pub fn fail_close(&self) {
        self.close.store(true, Ordering::SeqCst);
    }

    fn check(&self, switch: &AtomicBool, what: &str) -> Result<(), DriverError> {
        if switch.load(Ordering::SeqCst) {
            Err(DriverError::message(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

/// A datasource decorator that records lifecycle operations and injects
/// failures on demand. Statement execution passes through untouched.
pub struct SpyDataSource<D> {
    inner: D,
    log: OpLog,
    faults: Arc<FaultPlan>,
}

impl<D: DataSource> SpyDataSource<D> {
    pub fn new(inner: D) -> Self {
        SpyDataSource {
            inner,
            log: OpLog::default(),
            faults: Arc::new(FaultPlan::default()),
        }
    }

    #[must_use]
    pub fn log(&self) -> OpLog {
        self.log.clone()
    }

    #[must_use]
    pub fn faults(&self) -> Arc<FaultPlan> {
        Arc::clone(&self.faults)
    }
}

impl<D: DataSource> DataSource for SpyDataSource<D> {
    fn connection(&self) -> Result<Box<dyn Connection>, DriverError> {
        self.faults.check(&self.faults.connect, "connect")?;
        let inner = self.inner.connection()?;
        self.log.record(RecordedOp::Connect);
        Ok(Box::new(SpyConnection {
            inner,
            log: self.log.clone(),
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct SpyConnection {
    inner: Box<dyn Connection>,
    log: OpLog,
    faults: Arc<FaultPlan>,
}

impl Connection for SpyConnection {
    fn prepare(
        &self,
        sql: &str,
        returning_column: Option<&str>,
    ) -> Result<Box<dyn Statement + '_>, DriverError> {
        self.log.record(RecordedOp::Prepare {
            sql: sql.to_owned(),
            returning: returning_column.is_some(),
        });
        self.inner.prepare(sql, returning_column)
    }

    fn auto_commit(&self) -> Result<bool, DriverError> {
        self.inner.auto_commit()
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DriverError> {
        self.faults
            .check(&self.faults.set_auto_commit, "set_auto_commit")?;
        self.inner.set_auto_commit(auto_commit)?;
        self.log.record(RecordedOp::SetAutoCommit(auto_commit));
        Ok(())
    }

    fn commit(&self) -> Result<(), DriverError> {
        self.faults.check(&self.faults.commit, "commit")?;
        self.inner.commit()?;
        self.log.record(RecordedOp::Commit);
        Ok(())
    }

    fn rollback(&self) -> Result<(), DriverError> {
        self.faults.check(&self.faults.rollback, "rollback")?;
        self.inner.rollback()?;
        self.log.record(RecordedOp::Rollback);
        Ok(())
    }

    fn metadata(&self) -> Result<ConnectionMetadata, DriverError> {
        self.inner.metadata()
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        let SpyConnection { inner, log, faults } = *self;
        faults.check(&faults.close, "close")?;
        inner.close()?;
        log.record(RecordedOp::Close);
        Ok(())
    }
}

/// Shared record of `(position, value)` binds made through a
/// [`CapturingConnection`] statement.
#[derive(Clone, Default)]
pub struct BindLog(Arc<Mutex<Vec<(usize, SqlValue)>>>);

impl BindLog {
    #[must_use]
    pub fn snapshot(&self) -> Vec<(usize, SqlValue)> {
        self.0.lock().expect("bind log poisoned").clone()
    }
}

/// A backend-free connection that accepts any statement and records binds.
#[derive(Default)]
pub struct CapturingConnection {
    binds: BindLog,
}

impl CapturingConnection {
    #[must_use]
    pub fn new() -> Self {
        CapturingConnection::default()
    }

    #[must_use]
    pub fn binds(&self) -> BindLog {
        self.binds.clone()
    }
}

impl Connection for CapturingConnection {
    fn prepare(
        &self,
        _sql: &str,
        _returning_column: Option<&str>,
    ) -> Result<Box<dyn Statement + '_>, DriverError> {
        Ok(Box::new(CapturingStatement {
            binds: self.binds.clone(),
        }))
    }

    fn auto_commit(&self) -> Result<bool, DriverError> {
        Ok(true)
    }

    fn set_auto_commit(&self, _auto_commit: bool) -> Result<(), DriverError> {
        Ok(())
    }

    fn commit(&self) -> Result<(), DriverError> {
        Ok(())
    }

    fn rollback(&self) -> Result<(), DriverError> {
        Ok(())
    }

    fn metadata(&self) -> Result<ConnectionMetadata, DriverError> {
        Ok(ConnectionMetadata {
            driver_name: "capturing".to_owned(),
            product_name: "Capturing".to_owned(),
        })
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        Ok(())
    }
}

struct CapturingStatement {
    binds: BindLog,
}

impl Statement for CapturingStatement {
    fn bind(&mut self, position: usize, value: &SqlValue) -> Result<(), DriverError> {
        self.binds
            .0
            .lock()
            .expect("bind log poisoned")
            .push((position, value.clone()));
        Ok(())
    }

    fn execute_query(&mut self) -> Result<Box<dyn Rows + '_>, DriverError> {
        Ok(Box::new(EmptyRows))
    }

    fn execute_update(&mut self) -> Result<usize, DriverError> {
        Ok(0)
    }

    fn add_batch(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<usize>, DriverError> {
        Ok(Vec::new())
    }

    fn generated_key(&mut self) -> Result<Option<i64>, DriverError> {
        Ok(None)
    }
}

/// A result set with no rows.
pub struct EmptyRows;

impl Rows for EmptyRows {
    fn advance(&mut self) -> Result<bool, DriverError> {
        Ok(false)
    }

    fn get(&self, _index: usize) -> Result<SqlValue, DriverError> {
        Err(DriverError::message("cursor holds no row"))
    }

    fn get_named(&self, _name: &str) -> Result<SqlValue, DriverError> {
        Err(DriverError::message("cursor holds no row"))
    }

    fn column_count(&self) -> usize {
        0
    }
}
