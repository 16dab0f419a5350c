//! reqwest-backed [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use tracing::debug;
use yba_types::SessionContext;

use crate::error::ApiError;
use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Knobs for the underlying HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    /// Timeout for any single HTTP exchange, polling requests included.
    pub request_timeout: Duration,
    /// Whether the server certificate must validate.
    pub verify_tls: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            verify_tls: true,
        }
    }
}

impl HttpSettings {
    /// Settings matching the session's TLS verification policy.
    pub fn from_session(session: &SessionContext) -> Self {
        Self {
            verify_tls: session.verify_tls(),
            ..Self::default()
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Thin wrapper around a configured `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    user_agent: String,
}

impl HttpTransport {
    /// Build the client. Certificate verification is disabled only when the
    /// settings ask for it, for control planes with self-signed certificates.
    pub fn new(settings: &HttpSettings) -> Result<Self, ApiError> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()
            .map_err(|error| ApiError::ClientSetup {
                message: error.to_string(),
            })?;

        Ok(Self {
            http,
            user_agent: format!("yba-cli/{}; {}", env!("CARGO_PKG_VERSION"), std::env::consts::OS),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let mut builder = self
            .http
            .request(request.method, &request.url)
            .header(header::USER_AGENT, &self.user_agent);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| TransportError(format!("Network error: {error}. Hint: check the URL, proxy and TLS settings")))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| TransportError(format!("failed to read response body: {error}")))?;

        Ok(TransportResponse { status, body })
    }
}
