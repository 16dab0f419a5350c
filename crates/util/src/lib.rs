//! Small helpers shared by the API client, the engine and the CLI.

pub mod http;
pub mod redaction;
pub mod urls;

pub use redaction::{redact_json, redact_sensitive};
pub use urls::{encode_path_segment, join_url};
