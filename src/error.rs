use crate::convert::ConvertType;
use crate::transport::{RawResponse, TransportError};
use crate::BoxError;

/// Why a call was aborted before reaching a terminal transport outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// The per-attempt timeout elapsed before the transport settled.
    Timeout,
    /// The caller's cancellation token fired.
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Error type returned by this crate.
///
/// Only the terminal outcome of a logical call surfaces here; attempt
/// failures that were retried are never observable by the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport itself failed (connection, DNS, TLS) and retries were
    /// exhausted or vetoed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Non-success HTTP status after retries were exhausted or vetoed.
    /// Carries the final response.
    #[error("http error {status}")]
    Http { status: u16, response: RawResponse },
    /// The call was cancelled or timed out. Always terminal, never retried.
    #[error("request aborted: {0}")]
    Aborted(AbortReason),
    /// A success-status body could not be converted to the requested type.
    /// Terminal: retrying would reproduce the same malformed body.
    #[error("conversion to {tag:?} failed: {message}")]
    Conversion { tag: ConvertType, message: String },
    /// A middleware step halted the pipeline or failed. The transport was
    /// never invoked for this attempt; `on_error`/`on_network_error` are
    /// bypassed entirely.
    #[error("middleware '{name}' aborted the request")]
    Middleware {
        name: String,
        #[source]
        source: Option<BoxError>,
    },
    /// A user-supplied callback returned an error. Terminal, bypasses
    /// further retries.
    #[error("callback failed: {0}")]
    Callback(#[source] BoxError),
    /// The endpoint could not be joined onto the base URL.
    #[error("invalid url: {url}")]
    InvalidUrl { url: String },
}

impl Error {
    /// Status code of the final response for [`Error::Http`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Final response for [`Error::Http`].
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            Self::Http { response, .. } => Some(response),
            _ => None,
        }
    }
}
