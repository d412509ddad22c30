//! Bundled `SQLite` driver, backed by rusqlite.
//!
//! [`SqliteDataSource`] opens a fresh connection per
//! [`DataSource::connection`] call. `SQLite` connections are always in
//! implicit-commit mode, so the manual-commit protocol the transaction
//! coordinator expects is emulated with explicit `BEGIN`/`COMMIT`/`ROLLBACK`
//! statements, tracked alongside rusqlite's own autocommit flag.

mod config;
mod params;
mod query;

use std::cell::Cell;

use rusqlite::types::Value;
use tracing::debug;

pub use config::SqliteOptions;

use crate::connectivity::{Connection, ConnectionMetadata, DataSource, Rows, Statement};
use crate::error::DriverError;
use crate::value::SqlValue;

const DRIVER_NAME: &str = "rusqlite";
const PRODUCT_NAME: &str = "SQLite";

/// Datasource over one `SQLite` database.
pub struct SqliteDataSource {
    options: SqliteOptions,
    // Holds a shared in-memory database open for the datasource's lifetime;
    // without it the database would vanish between per-operation connections.
    _keeper: Option<rusqlite::Connection>,
}

impl SqliteDataSource {
    /// Open the database described by `options`. File-backed databases are
    /// switched to WAL journaling.
    ///
    /// # Errors
    /// Returns the rusqlite error when the database cannot be opened.
    pub fn new(options: SqliteOptions) -> Result<Self, DriverError> {
        let keeper = if options.is_memory() {
            Some(rusqlite::Connection::open(options.path())?)
        } else {
            let conn = rusqlite::Connection::open(options.path())?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            None
        };
        debug!(path = options.path(), "sqlite datasource opened");
        Ok(SqliteDataSource {
            options,
            _keeper: keeper,
        })
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }
}

impl DataSource for SqliteDataSource {
    fn connection(&self) -> Result<Box<dyn Connection>, DriverError> {
        let conn = rusqlite::Connection::open(self.options.path())?;
        Ok(Box::new(SqliteConnection {
            conn,
            auto_commit: Cell::new(true),
        }))
    }
}

struct SqliteConnection {
    conn: rusqlite::Connection,
    // The logical autocommit mode. rusqlite's own flag flips on every
    // BEGIN/COMMIT; this one only changes through set_auto_commit.
    auto_commit: Cell<bool>,
}

impl Connection for SqliteConnection {
    fn prepare(
        &self,
        sql: &str,
        returning_column: Option<&str>,
    ) -> Result<Box<dyn Statement + '_>, DriverError> {
        let stmt = self.conn.prepare(sql)?;
        let parameter_count = stmt.parameter_count();
        Ok(Box::new(SqliteStatement {
            stmt,
            conn: &self.conn,
            bound: vec![Value::Null; parameter_count],
            pending: Vec::new(),
            want_key: returning_column.is_some(),
            last_key: None,
        }))
    }

    fn auto_commit(&self) -> Result<bool, DriverError> {
        Ok(self.auto_commit.get())
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DriverError> {
        if auto_commit == self.auto_commit.get() {
            return Ok(());
        }
        if auto_commit {
            if !self.conn.is_autocommit() {
                self.conn.execute_batch("COMMIT")?;
            }
        } else if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        self.auto_commit.set(auto_commit);
        Ok(())
    }

    fn commit(&self) -> Result<(), DriverError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        // Manual-commit mode keeps a transaction open at all times.
        if !self.auto_commit.get() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn rollback(&self) -> Result<(), DriverError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        if !self.auto_commit.get() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn metadata(&self) -> Result<ConnectionMetadata, DriverError> {
        Ok(ConnectionMetadata {
            driver_name: DRIVER_NAME.to_owned(),
            product_name: PRODUCT_NAME.to_owned(),
        })
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        let SqliteConnection { conn, .. } = *self;
        // rusqlite rolls back any open transaction on close.
        conn.close().map_err(|(_conn, e)| DriverError::from(e))
    }
}

struct SqliteStatement<'c> {
    stmt: rusqlite::Statement<'c>,
    conn: &'c rusqlite::Connection,
    bound: Vec<Value>,
    pending: Vec<Vec<Value>>,
    want_key: bool,
    last_key: Option<i64>,
}

impl SqliteStatement<'_> {
    fn flush_binds(&mut self, values: &[Value]) -> Result<(), DriverError> {
        for (idx, value) in values.iter().enumerate() {
            self.stmt.raw_bind_parameter(idx + 1, value)?;
        }
        Ok(())
    }
}

impl Statement for SqliteStatement<'_> {
    fn bind(&mut self, position: usize, value: &SqlValue) -> Result<(), DriverError> {
        if position == 0 || position > self.bound.len() {
            return Err(DriverError::message(format!(
                "bind position {position} out of range 1..={}",
                self.bound.len()
            )));
        }
        self.bound[position - 1] = params::to_sqlite_value(value);
        Ok(())
    }

    fn execute_query(&mut self) -> Result<Box<dyn Rows + '_>, DriverError> {
        let bound = std::mem::take(&mut self.bound);
        self.flush_binds(&bound)?;
        self.bound = bound;
        let columns: Vec<String> = self
            .stmt
            .column_names()
            .iter()
            .map(ToString::to_string)
            .collect();
        let rows = self.stmt.raw_query();
        Ok(Box::new(SqliteRows {
            rows,
            columns,
            current: None,
        }))
    }

    fn execute_update(&mut self) -> Result<usize, DriverError> {
        let bound = std::mem::take(&mut self.bound);
        self.flush_binds(&bound)?;
        self.bound = bound;
        let affected = self.stmt.raw_execute()?;
        if self.want_key {
            let rowid = self.conn.last_insert_rowid();
            self.last_key = (affected > 0 && rowid != 0).then_some(rowid);
        }
        Ok(affected)
    }

    fn add_batch(&mut self) -> Result<(), DriverError> {
        self.pending.push(self.bound.clone());
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<usize>, DriverError> {
        let pending = std::mem::take(&mut self.pending);
        let mut counts = Vec::with_capacity(pending.len());
        for row in &pending {
            self.flush_binds(row)?;
            counts.push(self.stmt.raw_execute()?);
        }
        Ok(counts)
    }

    fn generated_key(&mut self) -> Result<Option<i64>, DriverError> {
        Ok(self.last_key)
    }
}

struct SqliteRows<'s> {
    rows: rusqlite::Rows<'s>,
    columns: Vec<String>,
    current: Option<Vec<SqlValue>>,
}

impl Rows for SqliteRows<'_> {
    fn advance(&mut self) -> Result<bool, DriverError> {
        match self.rows.next()? {
            Some(row) => {
                self.current = Some(query::extract_row(row, self.columns.len())?);
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    fn get(&self, index: usize) -> Result<SqlValue, DriverError> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| DriverError::message("cursor holds no row"))?;
        row.get(index)
            .cloned()
            .ok_or_else(|| DriverError::message(format!("column index {index} out of range")))
    }

    fn get_named(&self, name: &str) -> Result<SqlValue, DriverError> {
        let index = self
            .columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
            .ok_or_else(|| DriverError::message(format!("no column named '{name}'")))?;
        self.get(index)
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }
}
