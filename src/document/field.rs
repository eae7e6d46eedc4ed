//! Field-level helpers used by the optimistic updater.

use super::core::{ID_FIELD, JsonMap};
use crate::errors::DbError;
use serde_json::Value;

/// Rejects the identifier, system (`_`-prefixed) and empty field names.
pub fn check_writable(field: &str) -> Result<(), DbError> {
    if field.is_empty() {
        return Err(DbError::InvalidArgument("field name must not be empty".into()));
    }
    if field == ID_FIELD || field.starts_with('_') {
        return Err(DbError::InvalidArgument(format!("field `{field}` is read-only")));
    }
    Ok(())
}

/// Current integer value of `field`; absent or `null` reads as 0.
pub fn read_integer(body: &JsonMap, field: &str) -> Result<i64, DbError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                #[allow(clippy::cast_possible_truncation)]
                Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(f as i64),
                _ => Err(DbError::InvalidArgument(format!("field `{field}` is not an integer"))),
            }
        }
        Some(_) => Err(DbError::InvalidArgument(format!("field `{field}` is not an integer"))),
    }
}
