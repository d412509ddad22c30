use rusqlite::types::Value;

use crate::error::DriverError;
use crate::value::SqlValue;

/// Extract every column of the current rusqlite row into owned values.
pub(crate) fn extract_row(
    row: &rusqlite::Row,
    column_count: usize,
) -> Result<Vec<SqlValue>, DriverError> {
    let mut values = Vec::with_capacity(column_count);
    for idx in 0..column_count {
        let value: Value = row.get(idx)?;
        values.push(match value {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Int(i),
            Value::Real(f) => SqlValue::Float(f),
            Value::Text(s) => SqlValue::Text(s),
            Value::Blob(b) => SqlValue::Blob(b),
        });
    }
    Ok(values)
}
