//! Turns one raw line into a validated [`Update`].
//!
//! Recognised fields are `author` (string, default `"unknown"`) and
//! `sentiment` (number, default `0.5`). Everything else is ignored. The
//! parser never logs; rejections are returned for the caller to report.

use sentiment_tail_common::{GroupKey, ParseError, Update, DEFAULT_SENTIMENT};
use serde_json::Value;

pub fn parse(raw_line: &str) -> Result<Update, ParseError> {
    let trimmed = raw_line.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Blank);
    }

    let decoded: Value = serde_json::from_str(trimmed).map_err(|e| decode_error(trimmed, &e))?;

    let Value::Object(fields) = decoded else {
        return Err(ParseError::NotAnObject { found: describe(&decoded) });
    };

    let group = match fields.get("author") {
        Some(Value::String(author)) => GroupKey::new(author.as_str()),
        _ => GroupKey::unknown(),
    };

    let value = match fields.get("sentiment") {
        None => DEFAULT_SENTIMENT,
        Some(raw) => coerce_f64(raw)?,
    };

    Ok(Update { group, value })
}

/// A literal too large for `f64` is a well-formed value we cannot hold, not
/// malformed JSON.
fn decode_error(line: &str, e: &serde_json::Error) -> ParseError {
    let msg = e.to_string();
    if msg.starts_with("number out of range") {
        ParseError::InvalidValue { raw: line.to_string() }
    } else {
        ParseError::NotAnObject { found: format!("invalid JSON ({msg})") }
    }
}

/// Numbers pass through, numeric strings are parsed, booleans map to 1/0.
/// Out-of-range values are kept as-is.
fn coerce_f64(raw: &Value) -> Result<f64, ParseError> {
    let invalid = || ParseError::InvalidValue { raw: raw.to_string() };
    match raw {
        Value::Number(n) => n.as_f64().ok_or_else(invalid),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid()),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(invalid()),
    }
}

/// Short shape description used in rejection messages.
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => format!("array of {} element(s)", items.len()),
        Value::Object(_) => "object".to_string(),
    }
}
