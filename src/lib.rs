//! `refetch` is a resilient async HTTP request client.
//!
//! It wraps a raw request/response transport (by default `reqwest`) with
//! automatic retries, pluggable named request middleware, and configurable
//! response conversion:
//!
//! ```no_run
//! use std::time::Duration;
//! use refetch::{Backoff, ClientOptions, HttpClient, RetryOptions};
//!
//! #[tokio::main]
//! async fn main() -> refetch::Result<()> {
//!     let client = HttpClient::new("https://api.example.com")?.with_options(ClientOptions {
//!         num_retries: 3,
//!         timeout: Duration::from_secs(5),
//!         retry: RetryOptions::new()
//!             .backoff(Backoff::Exponential)
//!             .min_delay(Duration::from_millis(200)),
//!         ..ClientOptions::default()
//!     });
//!
//!     let profile = client
//!         .get("/v1/profile")
//!         .on_error(|response, _is_last| Ok(response.status.is_server_error()))
//!         .send()
//!         .await?;
//!
//!     println!("{profile:?}");
//!     Ok(())
//! }
//! ```
//!
//! Retry-eligible failures are resolved internally; callers only ever see
//! the terminal outcome of a logical call.

mod callbacks;
mod client;
mod context;
mod convert;
mod delay;
mod error;
mod execute;
mod middleware;
mod options;
mod retry;
mod transport;

pub use callbacks::{Callbacks, RetryAfterDecision};
pub use client::{HttpClient, RequestBuilder};
pub use context::{AttemptContext, RequestDraft};
pub use convert::{ConvertType, Converted};
pub use error::{AbortReason, Error};
pub use middleware::{Flow, Middleware};
pub use options::{Backoff, ClientOptions, RetryOptions};
pub use transport::{RawResponse, ReqwestTransport, Transport, TransportError};

// Re-exported so callers can abort calls without depending on tokio-util.
pub use tokio_util::sync::CancellationToken;

/// Boxed error type accepted from middleware and callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;
