use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::context::AttemptContext;
use crate::convert::Converted;
use crate::transport::{RawResponse, TransportError};
use crate::BoxError;

/// Transforms the converted success body into the call's final value.
pub type OnSuccess = dyn Fn(Converted) -> Result<Converted, BoxError> + Send + Sync;

/// Decides whether a non-success response should be retried. The second
/// argument is true when the current attempt is the last one.
pub type OnError = dyn Fn(&RawResponse, bool) -> Result<bool, BoxError> + Send + Sync;

/// Decides whether a transport-level failure should be retried.
pub type OnNetworkError = dyn Fn(&TransportError) -> Result<bool, BoxError> + Send + Sync;

/// Per-call override of the server-hinted delay policy.
pub type OnRetryAfter = dyn Fn(&RawResponse, &AttemptContext) -> RetryAfterDecision + Send + Sync;

/// What a retry-after callback decided for a retryable response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryAfterDecision {
    /// Honor the `Retry-After` header for eligible status codes, falling
    /// back to backoff. This is the built-in behavior when no callback is
    /// registered.
    Auto,
    /// Wait exactly this long before the next attempt.
    Delay(Duration),
    /// Do not retry, regardless of status code.
    Stop,
}

/// Optional user policy hooks. Absent hooks fall back to built-ins:
/// success passes the value through, HTTP errors do not retry, network
/// errors retry within the attempt budget.
///
/// A hook returning `Err` terminates the call immediately as
/// [`Error::Callback`](crate::Error::Callback).
#[derive(Clone, Default)]
pub struct Callbacks {
    pub(crate) on_success: Option<Arc<OnSuccess>>,
    pub(crate) on_error: Option<Arc<OnError>>,
    pub(crate) on_network_error: Option<Arc<OnNetworkError>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(Converted) -> Result<Converted, BoxError> + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RawResponse, bool) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn on_network_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TransportError) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.on_network_error = Some(Arc::new(hook));
        self
    }

    /// Field-wise merge: hooks set here win over `fallback`'s.
    pub(crate) fn merged_with(&self, fallback: &Callbacks) -> Callbacks {
        Callbacks {
            on_success: self.on_success.clone().or_else(|| fallback.on_success.clone()),
            on_error: self.on_error.clone().or_else(|| fallback.on_error.clone()),
            on_network_error: self
                .on_network_error
                .clone()
                .or_else(|| fallback.on_network_error.clone()),
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_network_error", &self.on_network_error.is_some())
            .finish()
    }
}
