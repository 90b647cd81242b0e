//! Recovery of JSON from free-form model answers.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ParseError;

lazy_static! {
    static ref JSON_FENCE: Regex = Regex::new(r"(?is)```[ \t]*json[ \t]*\r?\n?(.*?)```").unwrap();
}

/// Result type for response parsing.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Parse the JSON value embedded in a model answer.
///
/// A fenced block labelled `json` wins. Without one, the span from the
/// first `{` or `[` to the last matching closing bracket is decoded, so
/// commentary around the payload is ignored. Malformed JSON is reported,
/// never repaired.
pub fn parse_response(raw: &str) -> Result<Value> {
    let candidate = match JSON_FENCE.captures(raw) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => bracketed_span(raw).ok_or(ParseError::NoJsonFound)?,
    };

    let candidate = candidate.trim();
    if candidate.is_empty() {
        return Err(ParseError::NoJsonFound);
    }

    serde_json::from_str(candidate).map_err(|e| ParseError::MalformedJson {
        reason: e.to_string(),
    })
}

/// Parse an answer that must be a JSON object.
pub fn parse_object(raw: &str) -> Result<Map<String, Value>> {
    match parse_response(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(ParseError::UnexpectedShape {
            expected: "object",
            found: kind_of(&other),
        }),
    }
}

/// Parse an answer that must be a JSON array.
pub fn parse_array(raw: &str) -> Result<Vec<Value>> {
    match parse_response(raw)? {
        Value::Array(items) => Ok(items),
        other => Err(ParseError::UnexpectedShape {
            expected: "array",
            found: kind_of(&other),
        }),
    }
}

/// Leftmost `{`/`[` that has a matching closer somewhere after it, up to
/// the last such closer.
fn bracketed_span(text: &str) -> Option<&str> {
    let last_brace = text.rfind('}');
    let last_bracket = text.rfind(']');

    text.char_indices().find_map(|(start, c)| {
        let end = match c {
            '{' => last_brace,
            '[' => last_bracket,
            _ => None,
        }?;
        (end > start).then(|| &text[start..=end])
    })
}

/// JSON kind name used in shape errors.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
