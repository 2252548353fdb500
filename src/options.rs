use std::collections::BTreeSet;
use std::time::Duration;

use crate::callbacks::Callbacks;

/// Delay-growth policy between attempts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backoff {
    /// `min_delay * (attempt + 1)`, capped at `max_delay`.
    Linear,
    /// `min_delay * 2^attempt`, capped at `max_delay`.
    #[default]
    Exponential,
}

/// Configures backoff between retry attempts.
///
/// Immutable once an attempt loop starts; `min_delay <= max_delay` is
/// maintained by the setters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryOptions {
    pub(crate) backoff: Backoff,
    pub(crate) min_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) jitter: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            backoff: Backoff::Exponential,
            min_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        if self.max_delay < min_delay {
            self.max_delay = min_delay;
        }
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay.max(self.min_delay);
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Client-wide defaults merged into every call.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Per-attempt timeout. Applies to each attempt independently, not to
    /// the whole retry sequence.
    pub timeout: Duration,
    /// Retries after the initial attempt. `0` means exactly one attempt.
    pub num_retries: u32,
    /// Status codes eligible for a server-supplied `Retry-After` delay.
    pub retry_after_codes: BTreeSet<u16>,
    /// Default backoff configuration.
    pub retry: RetryOptions,
    /// Default callbacks, overridden field-wise by per-call callbacks.
    pub callbacks: Callbacks,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            num_retries: 0,
            retry_after_codes: BTreeSet::from([413, 429, 503]),
            retry: RetryOptions::default(),
            callbacks: Callbacks::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_delay_raises_max_delay_when_violated() {
        let options = RetryOptions::new()
            .max_delay(Duration::from_millis(100))
            .min_delay(Duration::from_millis(500));
        assert_eq!(options.min_delay, Duration::from_millis(500));
        assert_eq!(options.max_delay, Duration::from_millis(500));
    }

    #[test]
    fn max_delay_never_drops_below_min_delay() {
        let options = RetryOptions::new()
            .min_delay(Duration::from_millis(200))
            .max_delay(Duration::from_millis(50));
        assert_eq!(options.max_delay, Duration::from_millis(200));
    }
}
