//! Shared handle for workflows running against one tenant.

use yba_api::{ApiRequest, InvokeOutcome, RequestInvoker, Transport, WaitPolicy};
use yba_types::SessionContext;

use crate::error::EngineError;

/// How a universe name is matched against the tenant's universes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolvePolicy {
    /// Several universes with the name is an error.
    #[default]
    Unique,
    /// Take the first universe with the name, in list order.
    FirstMatch,
}

/// Borrowed invoker and session plus the policies every workflow step uses.
///
/// Provisioning, release and replication operations are implemented on this
/// type in their own modules.
#[derive(Debug)]
pub struct ControlPlane<'a, T> {
    pub(crate) invoker: &'a RequestInvoker<T>,
    pub(crate) session: &'a SessionContext,
    pub(crate) wait: WaitPolicy,
    pub(crate) resolve_policy: ResolvePolicy,
}

impl<'a, T: Transport> ControlPlane<'a, T> {
    pub fn new(invoker: &'a RequestInvoker<T>, session: &'a SessionContext) -> Self {
        Self {
            invoker,
            session,
            wait: WaitPolicy::default(),
            resolve_policy: ResolvePolicy::default(),
        }
    }

    /// Policy for operations that block until their task finishes.
    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_resolve_policy(mut self, resolve_policy: ResolvePolicy) -> Self {
        self.resolve_policy = resolve_policy;
        self
    }

    pub fn session(&self) -> &SessionContext {
        self.session
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait
    }

    pub(crate) async fn call(&self, request: ApiRequest) -> Result<InvokeOutcome, EngineError> {
        Ok(self.invoker.invoke(self.session, request).await?)
    }

    /// Perform `request` without waiting and return its response body.
    pub(crate) async fn fetch(&self, request: ApiRequest) -> Result<serde_json::Value, EngineError> {
        Ok(self.call(request).await?.into_value())
    }
}
