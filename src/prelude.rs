//! Convenience re-exports for typical use.
//!
//! ```
//! use sql_template::prelude::*;
//! ```

pub use crate::compile::{CompiledSql, Repetition};
pub use crate::connectivity::{Connection, ConnectionMetadata, DataSource, Rows, Statement};
pub use crate::error::{DriverError, SqlTemplateError, TransactionStage};
pub use crate::product::DatabaseProduct;
pub use crate::statement::NamedStatement;
pub use crate::template::SqlTemplate;
pub use crate::transaction::{Transaction, TransactionContext};
pub use crate::value::SqlValue;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteDataSource, SqliteOptions};
