//! Literal values bound into generated SQL.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::error::{PervasiveError, PervasiveResult};

/// Ordered column name → value map used for inserts and update criteria.
pub type ValueMap = IndexMap<String, Value>;

/// Read a flat JSON object into a [`ValueMap`], keeping key order.
pub fn value_map_from_json(json: &Json) -> PervasiveResult<ValueMap> {
    let obj = json
        .as_object()
        .ok_or_else(|| PervasiveError::invalid("values must be an object"))?;
    Ok(obj
        .iter()
        .map(|(col, v)| (col.clone(), Value::from_json(v)))
        .collect())
}

/// A literal value in a criteria object or attribute/value map.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL / absent
    Null,
    /// Boolean, rendered as `1` / `0`
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Text(String),
    /// Date/time, rendered as `YYYY-MM-DD HH:MM:SS` in UTC
    DateTime(DateTime<Utc>),
    /// Regular expression pattern (only meaningful to reject it in LIKE)
    Regex(String),
    /// Arrays and objects stored as JSON text
    Json(Json),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert a JSON value, recognising the extended-JSON `$date` and
    /// `$regex` wrappers.
    pub fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Text(s.clone()),
            Json::Object(map) if map.len() == 1 => {
                if let Some(date) = map.get("$date").and_then(Json::as_str) {
                    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
                        return Value::DateTime(dt.with_timezone(&Utc));
                    }
                }
                if let Some(pattern) = map.get("$regex").and_then(Json::as_str) {
                    return Value::Regex(pattern.to_string());
                }
                Value::Json(json.clone())
            }
            Json::Array(_) | Json::Object(_) => Value::Json(json.clone()),
        }
    }
}

impl From<&Json> for Value {
    fn from(v: &Json) -> Self {
        Value::from_json(v)
    }
}

impl From<Json> for Value {
    fn from(v: Json) -> Self {
        Value::from_json(&v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v.and_utc())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::DateTime(v.and_time(chrono::NaiveTime::default()).and_utc())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
