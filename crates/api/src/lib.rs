//! YBA control-plane client.
//!
//! This crate issues authenticated requests against a YugabyteDB Anywhere
//! control plane and tracks the asynchronous tasks those requests start.
//! It focuses on:
//!
//! - A [`Transport`] seam so the HTTP stack can be swapped in tests
//! - A reqwest-backed [`HttpTransport`] honoring the TLS verification policy
//! - The [`RequestInvoker`], which performs exactly one request and, when asked,
//!   polls the task-status sub-resource until a terminal state or a timeout
//! - One-shot credential bootstrap ([`login`], [`register`])
//!
//! # Example
//!
//! ```ignore
//! use yba_api::{ApiRequest, HttpSettings, HttpTransport, RequestInvoker, WaitPolicy};
//! use yba_types::SessionContext;
//!
//! # async fn run() -> Result<(), yba_api::ApiError> {
//! let session = SessionContext::new("https://yba.example.com", "token", "customer-uuid");
//! let invoker = RequestInvoker::new(HttpTransport::new(&HttpSettings::from_session(&session))?);
//! let outcome = invoker
//!     .invoke(&session, ApiRequest::get(session.customer_path("universes")))
//!     .await?;
//! println!("{}", outcome.into_value());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod http;
pub mod invoker;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use auth::{LoginResponse, Registration, login, register};
pub use error::ApiError;
pub use http::{HttpSettings, HttpTransport};
pub use invoker::{ApiRequest, InvokeOutcome, RequestInvoker, WaitPolicy};
pub use transport::{Transport, TransportError, TransportRequest, TransportResponse};
