use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName};
use reqwest::Method;
use url::Url;

/// Mutable description of one outbound attempt, as seen by middleware.
///
/// A fresh draft is rebuilt from the immutable call configuration at the
/// start of every attempt, so middleware mutations never leak into later
/// attempts.
#[derive(Debug, Clone)]
pub struct RequestDraft {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RequestDraft {
    /// Sets a header, replacing any existing value under the same name.
    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        self.headers.insert(name, value);
    }
}

/// Immutable snapshot of the attempt loop's position, shared with
/// middleware and callbacks. Recreated fresh each attempt.
#[derive(Debug, Clone, Copy)]
pub struct AttemptContext {
    /// 0-based index of the current attempt.
    pub attempt: u32,
    /// Attempt budget for the whole logical call (`num_retries + 1`).
    pub max_attempts: u32,
    /// Wall-clock time elapsed since the logical call started.
    pub elapsed: Duration,
}

impl AttemptContext {
    pub fn is_last_attempt(&self) -> bool {
        self.attempt + 1 >= self.max_attempts
    }
}
