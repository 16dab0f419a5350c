use std::fmt;

use yba_util::encode_path_segment;

/// Authenticated endpoint identity shared read-only by every call in a workflow.
///
/// A session is built once (usually from a login response) and then borrowed
/// by the invoker and the workflows. It has no behavior beyond composing the
/// tenant-scoped API paths.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    base_url: String,
    api_token: String,
    customer_id: String,
    verify_tls: bool,
}

impl SessionContext {
    /// Create a session that verifies the server certificate.
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>, customer_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            customer_id: customer_id.into(),
            verify_tls: true,
        }
    }

    /// Toggle certificate verification for self-signed control planes.
    pub fn with_tls_verification(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    /// Tenant-scoped v1 path, e.g. `customer_path("universes")` →
    /// `/api/v1/customers/<id>/universes`. The customer id is encoded as a
    /// single path segment; `suffix` is used as given.
    pub fn customer_path(&self, suffix: &str) -> String {
        self.scoped_path("v1", suffix)
    }

    /// Tenant-scoped v2 path.
    pub fn customer_path_v2(&self, suffix: &str) -> String {
        self.scoped_path("v2", suffix)
    }

    fn scoped_path(&self, version: &str, suffix: &str) -> String {
        format!(
            "/api/{version}/customers/{}/{}",
            encode_path_segment(&self.customer_id),
            suffix.trim_start_matches('/')
        )
    }

    /// Path of the task-status sub-resource for `task_id`.
    pub fn task_path(&self, task_id: &str) -> String {
        self.customer_path(&format!("tasks/{task_id}"))
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("customer_id", &self.customer_id)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}
