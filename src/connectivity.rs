//! The narrow interfaces this layer consumes from the connectivity
//! collaborator.
//!
//! Only the operations the template layer actually needs are present; raw
//! positional statement access, pooling policy and dialect behavior stay on
//! the driver side of these traits. The bundled rusqlite driver lives in
//! [`crate::sqlite`]; tests use the spies in [`crate::testing`].

use crate::error::DriverError;
use crate::value::SqlValue;

/// Connection metadata, fetched once per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMetadata {
    pub driver_name: String,
    pub product_name: String,
}

/// Hands out physical connections. Pooling, if any, lives behind this trait.
pub trait DataSource {
    /// Acquire a connection. Dropping the returned box releases it.
    ///
    /// # Errors
    /// Returns the driver's error when no connection can be obtained.
    fn connection(&self) -> Result<Box<dyn Connection>, DriverError>;
}

/// One physical database connection.
pub trait Connection {
    /// Prepare a positional-placeholder statement. When `returning_column` is
    /// set, the driver is asked to report that auto-generated column after a
    /// successful execution.
    ///
    /// # Errors
    /// Returns the driver's error when the statement cannot be prepared.
    fn prepare(
        &self,
        sql: &str,
        returning_column: Option<&str>,
    ) -> Result<Box<dyn Statement + '_>, DriverError>;

    /// Whether the connection commits implicitly after each statement.
    ///
    /// # Errors
    /// Returns the driver's error when the mode cannot be read.
    fn auto_commit(&self) -> Result<bool, DriverError>;

    /// Switch the autocommit mode.
    ///
    /// # Errors
    /// Returns the driver's error when the mode cannot be changed.
    fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver's error when the commit fails.
    fn commit(&self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver's error when the rollback fails.
    fn rollback(&self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver's error when metadata cannot be read.
    fn metadata(&self) -> Result<ConnectionMetadata, DriverError>;

    /// Close the connection eagerly. Dropping the box without calling this
    /// must release the connection as well.
    ///
    /// # Errors
    /// Returns the driver's error when the close fails.
    fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// A prepared positional statement.
pub trait Statement {
    /// Bind `value` at the 1-based `position`.
    ///
    /// # Errors
    /// Returns the driver's error when the position is invalid or the value
    /// cannot be bound.
    fn bind(&mut self, position: usize, value: &SqlValue) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver's error when execution fails.
    fn execute_query(&mut self) -> Result<Box<dyn Rows + '_>, DriverError>;

    /// Execute a mutating statement; returns the affected row count.
    ///
    /// # Errors
    /// Returns the driver's error when execution fails.
    fn execute_update(&mut self) -> Result<usize, DriverError>;

    /// Snapshot the currently bound parameters as one batch row.
    ///
    /// # Errors
    /// Returns the driver's error when the batch row cannot be recorded.
    fn add_batch(&mut self) -> Result<(), DriverError>;

    /// Execute every batched row; returns per-row affected counts.
    ///
    /// # Errors
    /// Returns the driver's error when any batched execution fails.
    fn execute_batch(&mut self) -> Result<Vec<usize>, DriverError>;

    /// The auto-generated key reported for the last execution, if any.
    ///
    /// # Errors
    /// Returns the driver's error when the key cannot be read.
    fn generated_key(&mut self) -> Result<Option<i64>, DriverError>;
}

/// Forward-only cursor over a result set.
///
/// [`Rows::advance`] moves to the next row; the getters read from the current
/// row. Row mappers receive the cursor immutably, so they can read columns
/// but cannot move it.
pub trait Rows {
    /// Move to the next row, returning `false` once the result set is
    /// exhausted.
    ///
    /// # Errors
    /// Returns the driver's error when the fetch fails.
    fn advance(&mut self) -> Result<bool, DriverError>;

    /// Column value of the current row by 0-based index.
    ///
    /// # Errors
    /// Returns the driver's error when the cursor holds no row or the index
    /// is out of range.
    fn get(&self, index: usize) -> Result<SqlValue, DriverError>;

    /// Column value of the current row by column name.
    ///
    /// # Errors
    /// Returns the driver's error when the cursor holds no row or no column
    /// carries that name.
    fn get_named(&self, name: &str) -> Result<SqlValue, DriverError>;

    fn column_count(&self) -> usize;
}
