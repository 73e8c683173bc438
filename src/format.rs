//! Value and identifier formatting for the bracket-identifier dialect.
//!
//! Every literal that ends up in generated SQL goes through [`escape_value`];
//! identifiers go through [`escape_identifier`]. Nothing else quotes.

use chrono::{DateTime, Utc};

use crate::value::Value;

/// Wrap an identifier in brackets, doubling embedded single quotes.
///
/// The name itself is not validated: column and table names are trusted to
/// come from the schema layer.
///
/// ```
/// use pervasive_sql::format::escape_identifier;
///
/// assert_eq!(escape_identifier("id"), "[id]");
/// ```
pub fn escape_identifier(name: &str) -> String {
    format!("[{}]", name.replace('\'', "''"))
}

/// Render a literal value as SQL text.
///
/// - `NULL` for null
/// - `1` / `0` for booleans
/// - bare decimal text for numbers
/// - everything else is stringified and single-quoted, with `'` doubled and
///   `"` blanked to a space
pub fn escape_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        // NaN and infinities have no decimal form
        Value::Float(_) => "NULL".to_string(),
        Value::Text(s) => quote(s),
        Value::DateTime(dt) => quote(&to_sql_datetime(dt)),
        Value::Regex(pattern) => quote(&format!("/{}/", pattern)),
        Value::Json(json) => quote(&json.to_string()),
    }
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS` (UTC, no zone suffix).
pub fn to_sql_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Coerce a value for storage, then escape it.
///
/// Dates become datetime text before quoting; structured values are already
/// quoted as JSON text by [`escape_value`].
pub fn prepare_value(value: &Value) -> String {
    match value {
        Value::DateTime(dt) => escape_value(&Value::Text(to_sql_datetime(dt))),
        other => escape_value(other),
    }
}

fn quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('\'');
    for c in raw.chars() {
        match c {
            '\'' => out.push_str("''"),
            '"' => out.push(' '),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Strip exactly one pair of surrounding single quotes, if present.
pub(crate) fn unquote(escaped: &str) -> &str {
    escaped
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(escaped)
}
