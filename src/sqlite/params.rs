use rusqlite::types::Value;

use crate::value::SqlValue;

/// Convert a bound value into a rusqlite value.
///
/// `SQLite` has no dedicated boolean, timestamp or JSON storage classes:
/// booleans become 0/1 integers, timestamps become `YYYY-MM-DD HH:MM:SS[.f]`
/// text and JSON is serialized to text.
pub(crate) fn to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        SqlValue::Null => Value::Null,
        SqlValue::Json(j) => Value::Text(j.to_string()),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_maps_to_integer() {
        assert_eq!(to_sqlite_value(&SqlValue::Bool(true)), Value::Integer(1));
        assert_eq!(to_sqlite_value(&SqlValue::Bool(false)), Value::Integer(0));
    }

    #[test]
    fn json_maps_to_text() {
        let value = SqlValue::Json(serde_json::json!({"a": 1}));
        assert_eq!(
            to_sqlite_value(&value),
            Value::Text("{\"a\":1}".to_owned())
        );
    }
}
