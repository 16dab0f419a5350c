//! # HTTP response helpers
//!
//! Status hints and strict JSON parsing for control-plane responses.

use serde_json::Value;
use thiserror::Error;

/// Return a user-friendly hint for common HTTP status codes.
///
/// # Example
/// ```rust
/// use yba_util::http::status_error_message;
///
/// let unauthorized = status_error_message(401).unwrap();
/// assert!(unauthorized.contains("YBA_API_TOKEN"));
/// assert!(status_error_message(404).is_none());
/// ```
pub fn status_error_message(status_code: u16) -> Option<String> {
    match status_code {
        401 => Some("Unauthorized (401). Hint: log in again or set YBA_API_TOKEN=...".into()),
        403 => Some("Forbidden (403). Hint: check the user's role and the customer UUID".into()),
        _ => None,
    }
}

/// Parse a response body into JSON. An empty body parses as `Value::Null`.
///
/// # Errors
/// Returns a [`JsonParseError`] carrying the status and a truncated preview
/// of the body when the text is not valid JSON.
pub fn parse_response_json_strict(text: &str, status: Option<u16>) -> Result<Value, JsonParseError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str::<Value>(text).map_err(|error| {
        let status_note = status
            .map(|code| format!("status {code}"))
            .unwrap_or_else(|| "unknown status".to_string());
        JsonParseError::new(status_note, error, truncate_response_preview(text, 200))
    })
}

/// Pull the human-readable message out of an error body.
///
/// The control plane answers failures with `{"success": false, "error": ...}`
/// where `error` is either a string or an object of field errors.
pub fn extract_error_message(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Collapse whitespace and cap a response body for logs and error messages.
pub fn truncate_response_preview(text: &str, limit: usize) -> String {
    if text.trim().is_empty() {
        return "<empty>".to_string();
    }

    let mut preview = String::new();
    for ch in text.chars() {
        if preview.len() >= limit {
            preview.push_str("...");
            break;
        }
        match ch {
            '\n' | '\r' | '\t' => {
                if !preview.ends_with(' ') {
                    preview.push(' ');
                }
            }
            _ => preview.push(ch),
        }
    }

    preview.trim().to_string()
}

/// Error returned when strict JSON parsing of an HTTP response fails.
#[derive(Debug, Error)]
#[error("failed to parse JSON response ({status_note}): {source}. body preview: {body_preview}")]
pub struct JsonParseError {
    status_note: String,
    #[source]
    source: serde_json::Error,
    body_preview: String,
}

impl JsonParseError {
    pub fn new(status_note: String, source: serde_json::Error, body_preview: String) -> Self {
        Self {
            status_note,
            source,
            body_preview,
        }
    }

    pub fn body_preview(&self) -> &str {
        &self.body_preview
    }
}
