//! Authenticated request invoker with optional task polling.
//!
//! Every call performs exactly one request against the control plane. When
//! the response announces an asynchronous task (`taskUUID` in v1 responses,
//! `task_uuid` in v2) and the caller supplied a [`WaitPolicy`], the invoker
//! polls `/api/v1/customers/<id>/tasks/<task>` until the task reaches a
//! terminal state or the policy's timeout elapses. Nothing is retried.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use yba_types::{SessionContext, Task};
use yba_util::http::{extract_error_message, parse_response_json_strict, status_error_message, truncate_response_preview};
use yba_util::{encode_path_segment, join_url, redact_sensitive};

use crate::error::ApiError;
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Header carrying the API token on every authenticated call.
pub const API_TOKEN_HEADER: &str = "X-AUTH-YW-API-TOKEN";
/// Default overall budget for a task to finish.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);
/// Default cadence between task-status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long to wait for a task started by a request, and how often to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self { timeout, poll_interval }
    }
}

/// A single control-plane call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// `Some` makes the invoker block until a started task finishes.
    pub wait: Option<WaitPolicy>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
            wait: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, endpoint).with_body(body)
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, endpoint).with_body(body)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn wait(mut self, policy: WaitPolicy) -> Self {
        self.wait = Some(policy);
        self
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    /// The request did not start a task.
    Response(Value),
    /// A task was started and the caller did not ask to wait.
    TaskStarted { task_id: String, response: Value },
    /// A task was started and finished with `Success`.
    TaskCompleted(Task),
}

impl InvokeOutcome {
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Response(_) => None,
            Self::TaskStarted { task_id, .. } => Some(task_id),
            Self::TaskCompleted(task) => Some(&task.id),
        }
    }

    /// The JSON document the caller most likely wants: the response body, or
    /// the final task document after a wait.
    pub fn into_value(self) -> Value {
        match self {
            Self::Response(value) | Self::TaskStarted { response: value, .. } => value,
            Self::TaskCompleted(task) => task.document,
        }
    }
}

/// Issues authenticated calls through a [`Transport`].
#[derive(Debug, Clone)]
pub struct RequestInvoker<T> {
    transport: T,
}

impl<T: Transport> RequestInvoker<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Perform `request` and, when it started a task and carries a
    /// [`WaitPolicy`], block until the task is terminal or the policy's
    /// timeout, measured from the start of this call, elapses.
    pub async fn invoke(&self, session: &SessionContext, request: ApiRequest) -> Result<InvokeOutcome, ApiError> {
        let started = Instant::now();
        let ApiRequest {
            method,
            endpoint,
            query,
            body,
            wait,
        } = request;

        let response = self.send_json(session, method, &endpoint, query, body).await?;

        let Some(task_id) = extract_task_id(&response) else {
            return Ok(InvokeOutcome::Response(response));
        };
        let Some(policy) = wait else {
            info!(task_id = %task_id, endpoint = %endpoint, "request started task; not waiting");
            return Ok(InvokeOutcome::TaskStarted { task_id, response });
        };

        info!(task_id = %task_id, endpoint = %endpoint, timeout = ?policy.timeout, "waiting for task");
        let task = self.wait_since(session, &task_id, &policy, started).await?;
        Ok(InvokeOutcome::TaskCompleted(task))
    }

    /// Read the current state of a task once.
    pub async fn poll_task(&self, session: &SessionContext, task_id: &str) -> Result<Task, ApiError> {
        let document = self
            .send_json(session, Method::GET, &session.task_path(&encode_path_segment(task_id)), Vec::new(), None)
            .await?;
        Ok(Task::from_document(task_id, document))
    }

    /// Re-enter the polling loop for a task started earlier without waiting.
    pub async fn wait_for_task(&self, session: &SessionContext, task_id: &str, policy: &WaitPolicy) -> Result<Task, ApiError> {
        self.wait_since(session, task_id, policy, Instant::now()).await
    }

    async fn wait_since(&self, session: &SessionContext, task_id: &str, policy: &WaitPolicy, started: Instant) -> Result<Task, ApiError> {
        let mut polls = 0u32;
        loop {
            let task = self.poll_task(session, task_id).await?;
            polls += 1;
            debug!(task_id = %task_id, status = task.status.as_str(), percent = task.percent, polls, "task polled");

            if task.status.is_terminal_failure() {
                warn!(task_id = %task_id, status = task.status.as_str(), polls, "task failed");
                return Err(ApiError::task_failed(task));
            }
            if task.status.is_terminal() {
                info!(task_id = %task_id, polls, elapsed = ?started.elapsed(), "task succeeded");
                return Ok(task);
            }

            let elapsed = started.elapsed();
            if elapsed >= policy.timeout {
                warn!(task_id = %task_id, polls, percent = task.percent, "gave up waiting for task");
                return Err(ApiError::task_timeout(task, policy.timeout));
            }
            sleep(policy.poll_interval.min(policy.timeout - elapsed)).await;
        }
    }

    /// One authenticated exchange; non-2xx and transport failures become
    /// [`ApiError::RequestFailed`].
    pub(crate) async fn send_json(
        &self,
        session: &SessionContext,
        method: Method,
        endpoint: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let request = TransportRequest {
            method: method.clone(),
            url: join_url(session.base_url(), endpoint),
            headers: authenticated_headers(session),
            query,
            body,
        };
        exchange(&self.transport, request, endpoint).await
    }
}

fn authenticated_headers(session: &SessionContext) -> Vec<(String, String)> {
    let mut headers = json_headers();
    headers.push((API_TOKEN_HEADER.to_string(), session.api_token().to_string()));
    headers
}

pub(crate) fn json_headers() -> Vec<(String, String)> {
    vec![
        ("Accept".to_string(), "application/json".to_string()),
        ("Content-Type".to_string(), "application/json".to_string()),
    ]
}

/// Send one request and interpret the response as JSON.
pub(crate) async fn exchange<T: Transport + ?Sized>(
    transport: &T,
    request: TransportRequest,
    endpoint: &str,
) -> Result<Value, ApiError> {
    let method = request.method.clone();
    debug!(method = %method, endpoint = %endpoint, has_body = request.body.is_some(), "request started");
    let response = transport.send(request).await.map_err(|error| {
        warn!(method = %method, endpoint = %endpoint, error = %error, "transport failure");
        ApiError::request_failed(method.as_str(), endpoint, None, error.to_string(), None)
    })?;
    interpret_response(method.as_str(), endpoint, response)
}

fn interpret_response(method: &str, endpoint: &str, response: TransportResponse) -> Result<Value, ApiError> {
    if !response.is_success() {
        let body = parse_response_json_strict(&response.body, Some(response.status)).ok();
        let detail = body
            .as_ref()
            .and_then(extract_error_message)
            .unwrap_or_else(|| truncate_response_preview(&response.body, 200));
        let message = match status_error_message(response.status) {
            Some(hint) => format!("{hint}: {detail}"),
            None => format!("HTTP {}: {}", response.status, detail),
        };
        warn!(
            method = %method,
            endpoint = %endpoint,
            status = response.status,
            error = %redact_sensitive(&message),
            "request failed"
        );
        return Err(ApiError::request_failed(method, endpoint, Some(response.status), message, body));
    }

    debug!(method = %method, endpoint = %endpoint, status = response.status, "request succeeded");
    parse_response_json_strict(&response.body, Some(response.status)).map_err(|error| ApiError::malformed(endpoint, error.to_string()))
}

/// Task identifier announced by a response body, if any.
pub fn extract_task_id(response: &Value) -> Option<String> {
    ["taskUUID", "task_uuid"]
        .iter()
        .find_map(|key| response.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
