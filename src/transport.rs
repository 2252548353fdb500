use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::context::RequestDraft;
use crate::BoxError;

/// Raw outcome of one transport attempt: status, headers, fully read body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// Body decoded as lossy UTF-8, for diagnostics and error reporting.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failure of the transport itself: connection, DNS, TLS, or body read.
///
/// Distinct from a non-success HTTP status, which is a transport *success*
/// and classified separately by the retry controller.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    timeout: bool,
    connect: bool,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    /// Builds a synthetic transport error, mainly useful for injected
    /// transports in tests.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: false,
            connect: false,
            source: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.timeout
    }

    pub fn is_connect(&self) -> bool {
        self.connect
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            timeout: err.is_timeout(),
            connect: err.is_connect(),
            source: Some(Box::new(err)),
        }
    }
}

/// Anything capable of sending one request attempt and returning a raw
/// response.
///
/// Cancellation is cooperative: the execution engine races this future
/// against the call's timeout and cancellation token and drops it when
/// either fires, which releases the in-flight request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, draft: RequestDraft) -> Result<RawResponse, TransportError>;
}

/// Default transport backed by [`reqwest::Client`].
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Wraps an existing `reqwest` client, keeping its pool and TLS setup.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, draft: RequestDraft) -> Result<RawResponse, TransportError> {
        let mut request = self
            .http
            .request(draft.method, draft.url)
            .headers(draft.headers);
        if let Some(body) = draft.body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
