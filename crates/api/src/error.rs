//! Error types for control-plane requests and task tracking.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use yba_types::Task;

/// Main error type for invoker operations.
///
/// Every variant carries enough context (endpoint, status, task document) to
/// diagnose the failure without querying the control plane again.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure or non-2xx response. Never retried.
    #[error("{method} {endpoint} failed: {message}")]
    RequestFailed {
        method: String,
        endpoint: String,
        status: Option<u16>,
        message: String,
        body: Option<Value>,
    },

    /// A 2xx response whose body is not the JSON the caller needs.
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    /// The task reached `Failure` or `Aborted`.
    #[error("task {task_id} finished with status {status}: {summary}")]
    TaskFailed {
        task_id: String,
        status: String,
        summary: String,
        task: Box<Task>,
    },

    /// The local polling budget ran out; the task may still finish remotely.
    #[error("task {task_id} did not finish within {timeout:?}; last status {last_status} at {last_percent}%")]
    TaskTimeout {
        task_id: String,
        timeout: Duration,
        last_status: String,
        last_percent: f64,
        last: Box<Task>,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {message}")]
    ClientSetup { message: String },
}

impl ApiError {
    /// Create a request failure from a response status and body.
    pub fn request_failed(
        method: impl Into<String>,
        endpoint: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
        body: Option<Value>,
    ) -> Self {
        Self::RequestFailed {
            method: method.into(),
            endpoint: endpoint.into(),
            status,
            message: message.into(),
            body,
        }
    }

    /// Create a malformed response error.
    pub fn malformed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create a task failure from the last observed task document.
    pub fn task_failed(task: Task) -> Self {
        let failed_steps = task.failed_steps().map(|step| step.title.as_str()).collect::<Vec<_>>();
        let summary = if failed_steps.is_empty() {
            task.title.clone().unwrap_or_else(|| "no failure details reported".to_string())
        } else {
            format!("failed steps: {}", failed_steps.join(", "))
        };
        Self::TaskFailed {
            task_id: task.id.clone(),
            status: task.status.as_str().to_string(),
            summary,
            task: Box::new(task),
        }
    }

    /// Create a timeout error from the last observed task document.
    pub fn task_timeout(task: Task, timeout: Duration) -> Self {
        Self::TaskTimeout {
            task_id: task.id.clone(),
            timeout,
            last_status: task.status.as_str().to_string(),
            last_percent: task.percent,
            last: Box::new(task),
        }
    }

    /// HTTP status of a failed request, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// Identifier of the task this error is about, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskFailed { task_id, .. } | Self::TaskTimeout { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    /// Structured remote diagnostic attached to the error, if any.
    pub fn diagnostic(&self) -> Option<&Value> {
        match self {
            Self::RequestFailed { body, .. } => body.as_ref(),
            Self::TaskFailed { task, .. } => Some(&task.document),
            Self::TaskTimeout { last, .. } => Some(&last.document),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_failed_summarizes_failed_steps() {
        let task = Task::from_document(
            "t-1",
            json!({
                "status": "Failure",
                "percent": 60.0,
                "details": { "taskDetails": [
                    { "title": "Provisioning", "state": "Success" },
                    { "title": "Configuring", "state": "Failure" }
                ]}
            }),
        );
        let error = ApiError::task_failed(task);
        assert_eq!(error.to_string(), "task t-1 finished with status Failure: failed steps: Configuring");
        assert_eq!(error.task_id(), Some("t-1"));
        assert_eq!(error.diagnostic().and_then(|value| value.get("percent")), Some(&json!(60.0)));
    }

    #[test]
    fn request_failed_exposes_status() {
        let error = ApiError::request_failed("POST", "/api/v1/x", Some(400), "HTTP 400: bad", None);
        assert_eq!(error.status(), Some(400));
        assert_eq!(error.to_string(), "POST /api/v1/x failed: HTTP 400: bad");
    }
}
