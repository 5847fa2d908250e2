//! Webhook response parsing.
//!
//! Webhook backends disagree about where the reply text lives, so
//! extraction walks a fixed cascade of known shapes and falls back to a
//! readable placeholder rather than erroring.

use serde_json::Value;

pub const PARSE_FALLBACK: &str = "Sorry, I couldn't parse a response.";

/// Parse a response body leniently. Non-JSON bodies become plain strings.
pub fn parse_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Find the reply text in a parsed response body.
///
/// The cascade, first match wins: the body itself as a string, then
/// `output`, `data.output`, `result.output` as strings, then `output` as an
/// array (string items joined by blank lines, other items stringified),
/// then `output` as an object, then `response` as a string, then the whole
/// body stringified if it is an object or array.
pub fn extract_reply(body: &Value) -> String {
    if let Value::String(s) = body {
        return s.clone();
    }
    if let Some(Value::String(s)) = body.get("output") {
        return s.clone();
    }
    if let Some(Value::String(s)) = body.get("data").and_then(|d| d.get("output")) {
        return s.clone();
    }
    if let Some(Value::String(s)) = body.get("result").and_then(|r| r.get("output")) {
        return s.clone();
    }
    if let Some(Value::Array(items)) = body.get("output") {
        return items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n\n");
    }
    if let Some(output @ Value::Object(_)) = body.get("output") {
        return output.to_string();
    }
    if let Some(Value::String(s)) = body.get("response") {
        return s.clone();
    }
    if body.is_object() || body.is_array() {
        return body.to_string();
    }
    PARSE_FALLBACK.to_string()
}
