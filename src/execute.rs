use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::callbacks::{Callbacks, OnRetryAfter};
use crate::context::{AttemptContext, RequestDraft};
use crate::convert::{self, ConvertType, Converted};
use crate::error::{AbortReason, Error};
use crate::middleware::{self, lock_unpoisoned, Pipeline};
use crate::options::RetryOptions;
use crate::retry::{RetryController, Verdict};
use crate::transport::Transport;
use crate::Result;

/// Immutable configuration of one logical call, merged from client
/// defaults and per-call settings by the facade. Every attempt rebuilds
/// its draft from this.
pub(crate) struct CallConfig {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub convert_type: ConvertType,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry: RetryOptions,
    pub retry_after_codes: BTreeSet<u16>,
    pub callbacks: Callbacks,
    pub retry_after: Option<Arc<OnRetryAfter>>,
    pub cancel: CancellationToken,
}

/// Runs one logical call to its terminal outcome.
///
/// Per attempt: fresh draft → middleware pipeline → transport send raced
/// against the per-attempt timeout and the cancellation token →
/// classification → cancellable backoff wait on retry. Aborts are final:
/// once the token fires or a timeout elapses, no further attempts run
/// regardless of remaining retry budget.
pub(crate) async fn execute(
    transport: &dyn Transport,
    pipeline: &Mutex<Pipeline>,
    config: CallConfig,
) -> Result<Converted> {
    let started = Instant::now();
    let controller = RetryController {
        options: &config.retry,
        retry_after_codes: &config.retry_after_codes,
        retry_after: config.retry_after.as_ref(),
    };

    let mut attempt: u32 = 0;
    loop {
        let context = AttemptContext {
            attempt,
            max_attempts: config.max_attempts,
            elapsed: started.elapsed(),
        };

        let mut draft = RequestDraft {
            method: config.method.clone(),
            url: config.url.clone(),
            headers: config.headers.clone(),
            body: config.body.clone(),
        };

        let steps = lock_unpoisoned(pipeline).snapshot();
        middleware::apply(&steps, &mut draft, &context).await?;

        // Abort wins ties: checked before the transport outcome is
        // classified, and observed first inside the race below.
        if config.cancel.is_cancelled() {
            return Err(Error::Aborted(AbortReason::Cancelled));
        }

        let outcome = tokio::select! {
            biased;
            _ = config.cancel.cancelled() => {
                return Err(Error::Aborted(AbortReason::Cancelled));
            }
            sent = tokio::time::timeout(config.timeout, transport.send(draft)) => match sent {
                Ok(result) => result,
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, timeout_ms = config.timeout.as_millis() as u64, "attempt timed out");
                    return Err(Error::Aborted(AbortReason::Timeout));
                }
            },
        };

        let delay = match outcome {
            Ok(response) if response.status.is_success() => {
                let converted = convert::convert(response, config.convert_type)?;
                return match &config.callbacks.on_success {
                    Some(hook) => hook(converted).map_err(Error::Callback),
                    None => Ok(converted),
                };
            }
            Ok(response) => {
                match controller.on_http_failure(&response, &context, &config.callbacks)? {
                    Verdict::Retry(delay) => delay,
                    Verdict::Fail => {
                        return Err(Error::Http {
                            status: response.status.as_u16(),
                            response,
                        });
                    }
                }
            }
            Err(error) => {
                match controller.on_transport_failure(&error, &context, &config.callbacks)? {
                    Verdict::Retry(delay) => delay,
                    Verdict::Fail => return Err(Error::Transport(error)),
                }
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying request after backoff");

        // The backoff wait is itself cancellable; an abort here terminates
        // the call without another attempt.
        tokio::select! {
            biased;
            _ = config.cancel.cancelled() => {
                return Err(Error::Aborted(AbortReason::Cancelled));
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}
