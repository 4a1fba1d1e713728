//! Conversions between engine values and SQLite values.

use rusqlite::types::{Value, ValueRef};
use verso_migrate::SqlValue;

/// Text layout used for timestamps, matching `CURRENT_TIMESTAMP` with
/// microsecond precision appended.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Convert an engine value to a bindable SQLite value.
pub fn to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Timestamp(ts) => Value::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
    }
}

/// Convert a column value read from SQLite.
///
/// Blobs are decoded lossily as UTF-8 text.
pub fn from_sqlite_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_timestamp_round_trips_through_text() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 17, 8, 0, 1).unwrap();
        let stored = to_sqlite_value(&SqlValue::Timestamp(ts));
        assert_eq!(stored, Value::Text("2024-05-17 08:00:01.000000".into()));

        let read = from_sqlite_value(ValueRef::Text(b"2024-05-17 08:00:01.000000"));
        assert_eq!(read.as_timestamp(), Some(ts));
    }

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(to_sqlite_value(&SqlValue::Null), Value::Null);
        assert_eq!(to_sqlite_value(&SqlValue::Integer(7)), Value::Integer(7));
        assert_eq!(from_sqlite_value(ValueRef::Real(1.5)), SqlValue::Real(1.5));
        assert_eq!(
            from_sqlite_value(ValueRef::Blob(b"abc")),
            SqlValue::Text("abc".into())
        );
    }
}
