//! Named-parameter SQL templates with reentrant transaction scopes.
//!
//! Statements are written with `:name;` placeholders and compiled to the
//! driver's positional markers; values bind by name, landing on every
//! position the name occupies. [`SqlTemplate`] runs one-shot operations on a
//! connection per call, and [`SqlTemplate::with_transaction`] pins one
//! connection for a whole unit of work, with nested scopes committing only
//! at the outermost level. Drivers plug in through the narrow traits in
//! [`connectivity`]; a rusqlite-backed driver ships behind the `sqlite`
//! feature.
//!
//! ```
//! use sql_template::prelude::*;
//!
//! # fn main() -> Result<(), sql_template::SqlTemplateError> {
//! let ds = SqliteDataSource::new(SqliteOptions::in_memory("docs"))?;
//! let db = SqlTemplate::new(ds);
//! db.execute_simple_update(
//!     "CREATE TABLE person (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)",
//! )?;
//!
//! let id = db.execute_insert_returning_id(
//!     "INSERT INTO person (name) VALUES (:name;)",
//!     |stmt| stmt.set("name", "amara"),
//!     "id",
//! )?;
//!
//! let names = db.query(
//!     "SELECT name FROM person WHERE id = :id;",
//!     |row, _| row.get_named("name"),
//!     |stmt| stmt.set("id", id),
//! )?;
//! assert_eq!(names, vec![SqlValue::Text("amara".into())]);
//! # Ok(())
//! # }
//! ```

pub mod compile;
pub mod connectivity;
pub mod error;
mod exec;
pub mod prelude;
pub mod product;
pub mod statement;
pub mod template;
pub mod transaction;
pub mod value;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use compile::{CompiledSql, Repetition};
pub use connectivity::{Connection, ConnectionMetadata, DataSource, Rows, Statement};
pub use error::{DriverError, SqlTemplateError, TransactionStage};
pub use product::DatabaseProduct;
pub use statement::NamedStatement;
pub use template::SqlTemplate;
pub use transaction::{Transaction, TransactionContext};
pub use value::SqlValue;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDataSource, SqliteOptions};
