//! Typed field access on provider-supplied JSON dictionaries.

use error_stack::{Report, bail};
use serde_json::{Map, Value};

use crate::error::ParseError;

pub type Dictionary = Map<String, Value>;

/// Get a mandatory string field.
pub fn get_string(data: &Dictionary, field: &str) -> Result<String, Report<ParseError>> {
    match get_optional_string(data, field)? {
        Some(value) => Ok(value),
        None => bail!(ParseError::MissingField {
            field: field.into(),
        }),
    }
}

/// Get an optional string field. Absent keys and `null` values yield `None`.
pub fn get_optional_string(
    data: &Dictionary,
    field: &str,
) -> Result<Option<String>, Report<ParseError>> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Report::new(ParseError::NotString {
            field: field.into(),
        })
        .attach(format!("found: {other}"))),
    }
}

/// Get an optional numeric field. Absent keys and `null` values yield `None`;
/// integers are widened to `f64`.
pub fn get_optional_float(
    data: &Dictionary,
    field: &str,
) -> Result<Option<f64>, Report<ParseError>> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| {
            Report::new(ParseError::NotNumber {
                field: field.into(),
            })
        }),
        Some(other) => Err(Report::new(ParseError::NotNumber {
            field: field.into(),
        })
        .attach(format!("found: {other}"))),
    }
}
