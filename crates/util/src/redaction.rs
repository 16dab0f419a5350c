//! Secret redaction for logs and error summaries.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const REPLACEMENT: &str = "[REDACTED]";

/// JSON keys whose values never leave the process unredacted.
const SENSITIVE_KEYS: &[&str] = &[
    "apitoken",
    "authtoken",
    "password",
    "ysqlpassword",
    "ycqlpassword",
    "aws_secret_access_key",
    "aws_access_key_id",
    "gcs_credentials_json",
    "kubeconfig_pull_secret_content",
];

static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(x-auth-yw-api-token:\s*)([^\s,]+)()",
        r"(?i)((?:^|\b)Bearer\s+)([A-Za-z0-9\-._~+/]+=*)()",
        r#"(?i)("(?:apiToken|authToken|password|ysqlPassword|ycqlPassword|AWS_SECRET_ACCESS_KEY|AWS_ACCESS_KEY_ID|GCS_CREDENTIALS_JSON)"\s*:\s*")((?:[^"\\]|\\.)*)(")"#,
        r"(?i)((?:^|\b)[A-Z0-9_]*(?:TOKEN|SECRET|PASSWORD)=)([^\s]+)()",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("redaction pattern compiles"))
    .collect()
});

/// Redacts values that look like secrets in free text.
///
/// Key names are kept so the output is still useful for debugging.
///
/// # Example
/// ```rust
/// use yba_util::redact_sensitive;
///
/// let redacted = redact_sensitive(r#"{"apiToken":"abc123","name":"demo"}"#);
/// assert_eq!(redacted, r#"{"apiToken":"[REDACTED]","name":"demo"}"#);
/// ```
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in REDACT_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                let suffix = captures.get(3).map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}{REPLACEMENT}{suffix}")
            })
            .to_string();
    }
    redacted
}

/// Returns a copy of `value` with every sensitive key's value replaced.
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, nested)| {
                    if SENSITIVE_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                        (key.clone(), Value::String(REPLACEMENT.to_string()))
                    } else {
                        (key.clone(), redact_json(nested))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        other => other.clone(),
    }
}
