use thiserror::Error;

/// The stage of a transactional scope at which a failure occurred.
///
/// Each stage carries a stable numeric error code intended for programmatic
/// handling; messages may change, codes do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStage {
    /// Acquiring the connection for the outermost scope.
    Acquire,
    /// Rolling the transaction back after a failure.
    Rollback,
    /// Committing the transaction. Also used when the unit of work itself
    /// fails, since the transaction could not be committed.
    Commit,
    /// Restoring autocommit and closing the connection.
    Close,
}

impl TransactionStage {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            TransactionStage::Acquire => "10004",
            TransactionStage::Rollback => "10005",
            TransactionStage::Commit => "10006",
            TransactionStage::Close => "10007",
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            TransactionStage::Acquire => "could not get a connection from the datasource",
            TransactionStage::Rollback => "could not roll back the transaction",
            TransactionStage::Commit => "could not commit the transaction",
            TransactionStage::Close => "could not close the transaction",
        }
    }
}

/// Opaque error surfaced by a connectivity driver.
///
/// Drivers wrap their native error type with [`DriverError::new`] (or a
/// `From` impl); the template layer never inspects the payload, it only
/// attaches context and re-raises.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DriverError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl DriverError {
    /// Wrap an arbitrary driver-side error.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DriverError(Box::new(err))
    }

    /// Build a driver error from a plain message.
    pub fn message(msg: impl Into<String>) -> Self {
        DriverError(msg.into().into())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        DriverError(Box::new(err))
    }
}

/// Errors raised by the template layer.
#[derive(Debug, Error)]
pub enum SqlTemplateError {
    /// A named placeholder has no terminating `;` before the template ends.
    #[error("cannot find the end of the placeholder in statement: '{sql}'")]
    Compile { sql: String },

    /// A driver failure during prepare, bind, execute or fetch, carrying the
    /// original (named-placeholder) SQL text.
    #[error("error in performing database query: '{sql}'")]
    QueryExecution {
        sql: String,
        #[source]
        source: DriverError,
    },

    /// A single-record fetch found more than one row.
    #[error("there are more records than one found for query: '{sql}'")]
    MultipleRecords { sql: String },

    /// An insert requested a generated key but the database returned none.
    #[error("creating the record failed with auto-generated key, no key obtained")]
    GeneratedKeyMissing,

    /// Failure while reading the connection metadata.
    #[error("error while getting the database connection metadata")]
    Metadata {
        #[source]
        source: DriverError,
    },

    /// A transaction-bound operation ran without an open transaction scope.
    #[error("no active transaction for this execution context")]
    InactiveTransaction,

    /// Failure inside a transactional scope, tagged with the stage it
    /// occurred at.
    #[error("{} (error code {})", stage.message(), stage.code())]
    Transaction {
        stage: TransactionStage,
        #[source]
        source: Box<SqlTemplateError>,
    },

    /// A raw driver error outside any more specific context.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl SqlTemplateError {
    pub(crate) fn query(sql: &str, source: DriverError) -> Self {
        SqlTemplateError::QueryExecution {
            sql: sql.to_owned(),
            source,
        }
    }

    pub(crate) fn transaction(
        stage: TransactionStage,
        source: impl Into<SqlTemplateError>,
    ) -> Self {
        SqlTemplateError::Transaction {
            stage,
            source: Box::new(source.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_codes_are_stable() {
        assert_eq!(TransactionStage::Acquire.code(), "10004");
        assert_eq!(TransactionStage::Rollback.code(), "10005");
        assert_eq!(TransactionStage::Commit.code(), "10006");
        assert_eq!(TransactionStage::Close.code(), "10007");
    }

    #[test]
    fn transaction_error_includes_code_in_display() {
        let err = SqlTemplateError::transaction(
            TransactionStage::Commit,
            DriverError::message("boom"),
        );
        assert!(err.to_string().contains("10006"));
    }
}
