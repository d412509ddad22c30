//! Shared bodies of the execution operations.
//!
//! [`SqlTemplate`](crate::template::SqlTemplate) and
//! [`Transaction`](crate::transaction::Transaction) expose the same query and
//! update operations over different connection lifetimes; the common logic
//! lives here so the two surfaces cannot drift apart.

use tracing::debug;

use crate::compile::Repetition;
use crate::connectivity::{Connection, Rows};
use crate::error::{DriverError, SqlTemplateError};
use crate::statement::NamedStatement;

pub(crate) fn run_query<T>(
    conn: &dyn Connection,
    template: &str,
    repetition: &Repetition,
    mut mapper: impl FnMut(&dyn Rows, usize) -> Result<T, DriverError>,
    filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
) -> Result<Vec<T>, SqlTemplateError> {
    let mut stmt = NamedStatement::prepare_with(conn, template, repetition, None)?;
    filter(&mut stmt).map_err(|e| SqlTemplateError::query(template, e))?;
    let mut rows = stmt
        .execute_query()
        .map_err(|e| SqlTemplateError::query(template, e))?;

    let mut results = Vec::new();
    let mut ordinal = 0usize;
    while rows
        .advance()
        .map_err(|e| SqlTemplateError::query(template, e))?
    {
        results.push(
            mapper(&*rows, ordinal).map_err(|e| SqlTemplateError::query(template, e))?,
        );
        ordinal += 1;
    }
    debug!(rows = results.len(), sql = template, "query mapped");
    Ok(results)
}

pub(crate) fn run_fetch_single<T>(
    conn: &dyn Connection,
    template: &str,
    mut mapper: impl FnMut(&dyn Rows, usize) -> Result<T, DriverError>,
    filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
) -> Result<Option<T>, SqlTemplateError> {
    let mut stmt = NamedStatement::prepare(conn, template)?;
    filter(&mut stmt).map_err(|e| SqlTemplateError::query(template, e))?;
    let mut rows = stmt
        .execute_query()
        .map_err(|e| SqlTemplateError::query(template, e))?;

    if !rows
        .advance()
        .map_err(|e| SqlTemplateError::query(template, e))?
    {
        return Ok(None);
    }
    let record = mapper(&*rows, 0).map_err(|e| SqlTemplateError::query(template, e))?;
    if rows
        .advance()
        .map_err(|e| SqlTemplateError::query(template, e))?
    {
        return Err(SqlTemplateError::MultipleRecords {
            sql: template.to_owned(),
        });
    }
    Ok(Some(record))
}

pub(crate) fn run_update(
    conn: &dyn Connection,
    template: &str,
    filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
) -> Result<usize, SqlTemplateError> {
    let mut stmt = NamedStatement::prepare(conn, template)?;
    filter(&mut stmt).map_err(|e| SqlTemplateError::query(template, e))?;
    let affected = stmt
        .execute_update()
        .map_err(|e| SqlTemplateError::query(template, e))?;
    debug!(affected, sql = template, "update executed");
    Ok(affected)
}

pub(crate) fn run_insert(
    conn: &dyn Connection,
    template: &str,
    filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
) -> Result<(), SqlTemplateError> {
    run_update(conn, template, filter).map(|_| ())
}

pub(crate) fn run_insert_returning(
    conn: &dyn Connection,
    template: &str,
    filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
    key_column: &str,
) -> Result<i64, SqlTemplateError> {
    let metadata = conn
        .metadata()
        .map_err(|e| SqlTemplateError::Metadata { source: e })?;
    let product = crate::product::DatabaseProduct::from_product_name(&metadata.product_name);
    let column = product.generated_column_name(key_column);

    let mut stmt =
        NamedStatement::prepare_with(conn, template, &Repetition::new(), Some(&column))?;
    filter(&mut stmt).map_err(|e| SqlTemplateError::query(template, e))?;
    stmt.execute_update()
        .map_err(|e| SqlTemplateError::query(template, e))?;
    stmt.generated_key()
        .map_err(|e| SqlTemplateError::query(template, e))?
        .ok_or(SqlTemplateError::GeneratedKeyMissing)
}

pub(crate) fn run_batch(
    conn: &dyn Connection,
    template: &str,
    filter: impl FnOnce(&mut NamedStatement<'_>) -> Result<(), DriverError>,
) -> Result<Vec<usize>, SqlTemplateError> {
    let mut stmt = NamedStatement::prepare(conn, template)?;
    filter(&mut stmt).map_err(|e| SqlTemplateError::query(template, e))?;
    let counts = stmt
        .execute_batch()
        .map_err(|e| SqlTemplateError::query(template, e))?;
    debug!(batch_rows = counts.len(), sql = template, "batch executed");
    Ok(counts)
}

/// Commit when the connection is in manual-commit mode; a no-op otherwise.
pub(crate) fn commit_if_manual(
    conn: &dyn Connection,
    template: &str,
) -> Result<(), SqlTemplateError> {
    let auto = conn
        .auto_commit()
        .map_err(|e| SqlTemplateError::query(template, e))?;
    if !auto {
        conn.commit()
            .map_err(|e| SqlTemplateError::query(template, e))?;
    }
    Ok(())
}
