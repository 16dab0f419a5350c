//! One-shot credential bootstrap: login and first-user registration.
//!
//! Both calls are unauthenticated single attempts; their response carries the
//! API token and customer UUID every later call needs.

use std::fmt;

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use yba_types::SessionContext;
use yba_util::join_url;

use crate::error::ApiError;
use crate::invoker::{exchange, json_headers};
use crate::transport::{Transport, TransportRequest};

const LOGIN_ENDPOINT: &str = "/api/v1/api_login";
const REGISTER_ENDPOINT: &str = "/api/v1/register";

/// Token and tenant returned by login or registration.
#[derive(Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "apiToken", alias = "authToken")]
    pub api_token: String,
    #[serde(rename = "customerUUID")]
    pub customer_uuid: String,
    #[serde(rename = "userUUID", default)]
    pub user_uuid: Option<String>,
}

impl LoginResponse {
    /// Turn the bootstrap result into the session every later call borrows.
    pub fn into_session(self, base_url: impl Into<String>, verify_tls: bool) -> SessionContext {
        SessionContext::new(base_url, self.api_token, self.customer_uuid).with_tls_verification(verify_tls)
    }
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("api_token", &"<redacted>")
            .field("customer_uuid", &self.customer_uuid)
            .field("user_uuid", &self.user_uuid)
            .finish()
    }
}

/// Administrator details for registering a freshly provisioned instance.
#[derive(Clone)]
pub struct Registration {
    /// The instance's purpose, e.g. `dev` or `prod`.
    pub code: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("code", &self.code)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Log in with an administrator's email and password.
pub async fn login<T: Transport + ?Sized>(transport: &T, base_url: &str, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
    let request = TransportRequest {
        method: Method::POST,
        url: join_url(base_url, LOGIN_ENDPOINT),
        headers: json_headers(),
        query: Vec::new(),
        body: Some(json!({ "email": email, "password": password })),
    };
    let response = exchange(transport, request, LOGIN_ENDPOINT).await?;
    let login: LoginResponse =
        serde_json::from_value(response).map_err(|error| ApiError::malformed(LOGIN_ENDPOINT, format!("unexpected login response: {error}")))?;
    info!(customer = %login.customer_uuid, "logged in");
    Ok(login)
}

/// Register the first administrator of a new instance and generate an API token.
pub async fn register<T: Transport + ?Sized>(transport: &T, base_url: &str, registration: &Registration) -> Result<LoginResponse, ApiError> {
    let request = TransportRequest {
        method: Method::POST,
        url: join_url(base_url, REGISTER_ENDPOINT),
        headers: json_headers(),
        query: vec![("generateApiToken".to_string(), "true".to_string())],
        body: Some(json!({
            "code": registration.code,
            "name": registration.name,
            "email": registration.email,
            "password": registration.password,
        })),
    };
    let response = exchange(transport, request, REGISTER_ENDPOINT).await?;
    let registered: LoginResponse = serde_json::from_value(response)
        .map_err(|error| ApiError::malformed(REGISTER_ENDPOINT, format!("unexpected registration response: {error}")))?;
    info!(customer = %registered.customer_uuid, "registered instance");
    Ok(registered)
}
