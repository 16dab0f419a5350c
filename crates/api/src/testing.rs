//! In-memory [`Transport`] for tests.
//!
//! Responses are scripted per `(method, path)`. Each route answers with its
//! queued responses in order and keeps repeating the last one, so a task that
//! "never leaves Running" is a single scripted response. Every request is
//! recorded for later assertions.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};

use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};

/// A request observed by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }
}

struct Route {
    method: Method,
    path: String,
    responses: VecDeque<Result<TransportResponse, TransportError>>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response for `method path`.
    pub fn on(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.push(method, path, Ok(TransportResponse::new(status, body.to_string())))
    }

    /// Queue a raw text response for `method path`.
    pub fn on_text(&self, method: Method, path: &str, status: u16, body: &str) -> &Self {
        self.push(method, path, Ok(TransportResponse::new(status, body)))
    }

    /// Queue a connection-level failure for `method path`.
    pub fn on_error(&self, method: Method, path: &str, message: &str) -> &Self {
        self.push(method, path, Err(TransportError(message.to_string())))
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Requests received for `method path`.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        lock(&self.requests)
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    fn push(&self, method: Method, path: &str, response: Result<TransportResponse, TransportError>) -> &Self {
        let mut routes = lock(&self.routes);
        match routes.iter_mut().find(|route| route.method == method && route.path == path) {
            Some(route) => route.responses.push_back(response),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    fn next_response(&self, method: &Method, path: &str) -> Result<TransportResponse, TransportError> {
        let mut routes = lock(&self.routes);
        let Some(route) = routes.iter_mut().find(|route| &route.method == method && route.path == path) else {
            let body = json!({ "success": false, "error": format!("no scripted response for {method} {path}") });
            return Ok(TransportResponse::new(404, body.to_string()));
        };
        if route.responses.len() > 1 {
            route.responses.pop_front().unwrap_or_else(|| Err(TransportError("empty route".into())))
        } else {
            route
                .responses
                .front()
                .cloned()
                .unwrap_or_else(|| Err(TransportError("empty route".into())))
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn path_of(url: &str) -> String {
    url::Url::parse(url)
        .map(|parsed| parsed.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let path = path_of(&request.url);
        let response = self.next_response(&request.method, &path);
        lock(&self.requests).push(RecordedRequest {
            method: request.method,
            url: request.url,
            path,
            headers: request.headers,
            query: request.query,
            body: request.body,
        });
        response
    }
}
