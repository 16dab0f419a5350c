//! URL composition helpers.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters left untouched in a path segment (RFC 3986 unreserved set).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Join a base address and an API path without doubling or dropping slashes.
///
/// ```rust
/// use yba_util::join_url;
///
/// assert_eq!(join_url("https://yba.example.com/", "/api/v1/register"), "https://yba.example.com/api/v1/register");
/// ```
pub fn join_url(base_url: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    format!("{}/{}", base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'))
}

/// Percent-encode an identifier placed in a single path segment.
pub fn encode_path_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Validate that a base address is an absolute http(s) URL.
pub fn validate_base_url(base_url: &str) -> Result<url::Url, String> {
    let parsed = url::Url::parse(base_url).map_err(|error| format!("invalid base URL '{base_url}': {error}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("base URL must use http or https; got '{other}://'")),
    }
    if parsed.host_str().is_none() {
        return Err(format!("base URL '{base_url}' must include a host"));
    }
    Ok(parsed)
}
