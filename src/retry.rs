use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::callbacks::{Callbacks, OnRetryAfter, RetryAfterDecision};
use crate::context::AttemptContext;
use crate::delay::{compute_delay, parse_retry_after};
use crate::error::Error;
use crate::options::RetryOptions;
use crate::transport::{RawResponse, TransportError};
use crate::Result;

/// What the controller decided about a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Retry(Duration),
    Fail,
}

/// Owns the retry/no-retry decision for one logical call. Retryable
/// conditions are resolved here; the caller only ever observes the
/// terminal outcome.
pub(crate) struct RetryController<'a> {
    pub options: &'a RetryOptions,
    pub retry_after_codes: &'a BTreeSet<u16>,
    pub retry_after: Option<&'a Arc<OnRetryAfter>>,
}

impl RetryController<'_> {
    /// Classifies a response with a non-success status.
    ///
    /// `on_error` is always consulted, even on the last attempt, so user
    /// policy can observe the final failure. Retrying requires both the
    /// callback's consent and remaining attempt budget.
    pub fn on_http_failure(
        &self,
        response: &RawResponse,
        context: &AttemptContext,
        callbacks: &Callbacks,
    ) -> Result<Verdict> {
        let is_last = context.is_last_attempt();
        let wants_retry = match &callbacks.on_error {
            Some(hook) => hook(response, is_last).map_err(Error::Callback)?,
            None => false,
        };
        if !wants_retry || is_last {
            return Ok(Verdict::Fail);
        }

        let decision = match self.retry_after {
            Some(hook) => hook(response, context),
            None => RetryAfterDecision::Auto,
        };
        match decision {
            RetryAfterDecision::Stop => Ok(Verdict::Fail),
            RetryAfterDecision::Delay(delay) => Ok(Verdict::Retry(delay)),
            RetryAfterDecision::Auto => {
                let hint = if self.retry_after_codes.contains(&response.status.as_u16()) {
                    parse_retry_after(&response.headers, SystemTime::now())
                } else {
                    None
                };
                Ok(Verdict::Retry(compute_delay(
                    context.attempt,
                    self.options,
                    hint,
                )))
            }
        }
    }

    /// Classifies a transport-level failure (connection, DNS, TLS). The
    /// built-in policy retries within the attempt budget; no server hint
    /// exists, so the delay always comes from backoff.
    pub fn on_transport_failure(
        &self,
        error: &TransportError,
        context: &AttemptContext,
        callbacks: &Callbacks,
    ) -> Result<Verdict> {
        let wants_retry = match &callbacks.on_network_error {
            Some(hook) => hook(error).map_err(Error::Callback)?,
            None => true,
        };
        if !wants_retry || context.is_last_attempt() {
            return Ok(Verdict::Fail);
        }
        Ok(Verdict::Retry(compute_delay(
            context.attempt,
            self.options,
            None,
        )))
    }
}
