use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::callbacks::{Callbacks, OnRetryAfter, RetryAfterDecision};
use crate::context::{AttemptContext, RequestDraft};
use crate::convert::{ConvertType, Converted};
use crate::error::Error;
use crate::execute::{self, CallConfig};
use crate::middleware::{fn_middleware, lock_unpoisoned, Flow, Middleware, Pipeline};
use crate::options::{ClientOptions, RetryOptions};
use crate::transport::{RawResponse, ReqwestTransport, Transport};
use crate::{BoxError, Result};

/// Resilient HTTP client: merges per-call settings with client-wide
/// defaults and dispatches into the execution engine.
///
/// Cloning is cheap; clones share the transport and the middleware
/// pipeline.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    base_url: Url,
    base_headers: HeaderMap,
    options: ClientOptions,
    pipeline: Arc<Mutex<Pipeline>>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let authorization = self
            .base_headers
            .get(AUTHORIZATION)
            .map(|_| "<redacted>");
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("authorization", &authorization)
            .field("options", &self.options)
            .finish()
    }
}

impl HttpClient {
    /// Creates a client for the given base URL with default options and a
    /// reqwest-backed transport.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref()).map_err(|_| Error::InvalidUrl {
            url: base_url.as_ref().to_owned(),
        })?;
        Ok(Self {
            transport: Arc::new(ReqwestTransport::default()),
            base_url,
            base_headers: HeaderMap::new(),
            options: ClientOptions::default(),
            pipeline: Arc::new(Mutex::new(Pipeline::default())),
        })
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Swaps the transport. Mainly useful to inject a scripted transport
    /// in tests, or to reuse a tuned `reqwest` client.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Adds a header sent with every call. Per-call headers with the same
    /// name win.
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.base_headers.insert(name, value);
        self
    }

    /// Registers a middleware step under a unique name.
    ///
    /// Steps run in first-insertion order; re-registering a name replaces
    /// the step without moving it. Safe to call while calls are in flight:
    /// an attempt already applying the pipeline keeps the entry set it
    /// started with.
    pub fn use_middleware(&self, name: impl Into<String>, step: Arc<dyn Middleware>) {
        lock_unpoisoned(&self.pipeline).register(name, step);
    }

    /// Registers a synchronous closure as middleware.
    pub fn use_fn<F>(&self, name: impl Into<String>, step: F)
    where
        F: Fn(&mut RequestDraft, &AttemptContext) -> std::result::Result<Flow, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.use_middleware(name, fn_middleware(step));
    }

    /// Removes a middleware step by name. Returns whether it existed.
    pub fn unuse(&self, name: &str) -> bool {
        lock_unpoisoned(&self.pipeline).remove(name)
    }

    /// Starts a call with an explicit method.
    pub fn request(&self, method: Method, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            method,
            endpoint: endpoint.into(),
            headers: HeaderMap::new(),
            body: None,
            convert_type: ConvertType::Json,
            callbacks: Callbacks::new(),
            retry: None,
            num_retries: None,
            timeout: None,
            retry_after: None,
            cancel: None,
        }
    }

    pub fn get(&self, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::GET, endpoint)
    }

    pub fn post(&self, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::POST, endpoint)
    }

    pub fn put(&self, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PUT, endpoint)
    }

    pub fn patch(&self, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PATCH, endpoint)
    }

    pub fn delete(&self, endpoint: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::DELETE, endpoint)
    }

    fn join_endpoint(&self, endpoint: &str) -> Result<Url> {
        self.base_url.join(endpoint).map_err(|_| Error::InvalidUrl {
            url: endpoint.to_owned(),
        })
    }
}

fn merge_headers(base_headers: &HeaderMap, call_headers: &HeaderMap) -> HeaderMap {
    let mut merged = base_headers.clone();
    for (name, value) in call_headers {
        merged.insert(name.clone(), value.clone());
    }
    merged
}

/// One call in the making: endpoint, body, conversion, and per-call policy
/// overrides. Consumed by [`RequestBuilder::send`].
pub struct RequestBuilder<'a> {
    client: &'a HttpClient,
    method: Method,
    endpoint: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    convert_type: ConvertType,
    callbacks: Callbacks,
    retry: Option<RetryOptions>,
    num_retries: Option<u32>,
    timeout: Option<Duration>,
    retry_after: Option<Arc<OnRetryAfter>>,
    cancel: Option<CancellationToken>,
}

impl RequestBuilder<'_> {
    /// Sets a per-call header, overriding any base header of the same name.
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serializes a JSON body and sets `Content-Type: application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(|err| Error::Conversion {
            tag: ConvertType::Json,
            message: err.to_string(),
        })?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// Sets a plain-text body.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.body = Some(Bytes::from(body.into()));
        self
    }

    /// Sets an opaque byte body, leaving the content type to the caller.
    pub fn bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Selects how a success body is converted. Defaults to JSON.
    pub fn convert(mut self, tag: ConvertType) -> Self {
        self.convert_type = tag;
        self
    }

    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(Converted) -> std::result::Result<Converted, BoxError> + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.on_success(hook);
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RawResponse, bool) -> std::result::Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.on_error(hook);
        self
    }

    pub fn on_network_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&crate::TransportError) -> std::result::Result<bool, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.callbacks = self.callbacks.on_network_error(hook);
        self
    }

    /// Overrides the client's backoff configuration for this call.
    pub fn retry_options(mut self, options: RetryOptions) -> Self {
        self.retry = Some(options);
        self
    }

    /// Overrides the client's retry count for this call.
    pub fn num_retries(mut self, num_retries: u32) -> Self {
        self.num_retries = Some(num_retries);
        self
    }

    /// Overrides the client's per-attempt timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the server-hinted delay policy for retryable responses.
    pub fn retry_after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RawResponse, &AttemptContext) -> RetryAfterDecision + Send + Sync + 'static,
    {
        self.retry_after = Some(Arc::new(hook));
        self
    }

    /// Attaches a cancellation token; cancelling it aborts the call at the
    /// next suspension point, including mid-backoff.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Executes the call to its terminal outcome.
    pub async fn send(self) -> Result<Converted> {
        let client = self.client;
        let url = client.join_endpoint(&self.endpoint)?;
        let config = CallConfig {
            method: self.method,
            url,
            headers: merge_headers(&client.base_headers, &self.headers),
            body: self.body,
            convert_type: self.convert_type,
            timeout: self.timeout.unwrap_or(client.options.timeout),
            max_attempts: self.num_retries.unwrap_or(client.options.num_retries) + 1,
            retry: self.retry.unwrap_or_else(|| client.options.retry.clone()),
            retry_after_codes: client.options.retry_after_codes.clone(),
            callbacks: self.callbacks.merged_with(&client.options.callbacks),
            retry_after: self.retry_after,
            cancel: self.cancel.unwrap_or_default(),
        };
        execute::execute(client.transport.as_ref(), &client.pipeline, config).await
    }

    /// Executes the call with JSON conversion and deserializes the result.
    pub async fn send_json<T: DeserializeOwned>(self) -> Result<T> {
        match self.convert(ConvertType::Json).send().await? {
            Converted::Json(value) => {
                serde_json::from_value(value).map_err(|err| Error::Conversion {
                    tag: ConvertType::Json,
                    message: err.to_string(),
                })
            }
            _ => Err(Error::Conversion {
                tag: ConvertType::Json,
                message: "success callback replaced the json body".to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_authorization_header() {
        let client = HttpClient::new("https://api.example.com")
            .expect("static url is valid")
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = HttpClient::new("not a url").expect_err("garbage url must fail");
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn per_call_headers_win_over_base_headers() {
        let mut base = HeaderMap::new();
        base.insert("x-env", HeaderValue::from_static("prod"));
        base.insert(AUTHORIZATION, HeaderValue::from_static("Bearer base"));

        let mut call = HeaderMap::new();
        call.insert(AUTHORIZATION, HeaderValue::from_static("Bearer call"));

        let merged = merge_headers(&base, &call);
        assert_eq!(merged.get("x-env").map(|v| v.as_bytes()), Some(&b"prod"[..]));
        assert_eq!(
            merged.get(AUTHORIZATION).map(|v| v.as_bytes()),
            Some(&b"Bearer call"[..])
        );
    }

    #[test]
    fn endpoint_joins_onto_base_url() {
        let client = HttpClient::new("https://api.example.com/v1/").expect("static url is valid");
        let url = client.join_endpoint("items/7").expect("endpoint must join");
        assert_eq!(url.as_str(), "https://api.example.com/v1/items/7");
    }
}
