use std::time::{Duration, SystemTime};

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::options::{Backoff, RetryOptions};

// Caps the exponential shift so the multiplier cannot overflow u64.
const MAX_EXPONENT: u32 = 16;

/// Computes the wait before the next attempt.
///
/// A `server_hint` (parsed `Retry-After`) takes precedence and bypasses
/// backoff and jitter entirely. Without a hint, the delay grows per the
/// configured [`Backoff`] from `min_delay`, capped at `max_delay`, with
/// optional full negative jitter.
pub(crate) fn compute_delay(
    attempt: u32,
    options: &RetryOptions,
    server_hint: Option<Duration>,
) -> Duration {
    if let Some(hint) = server_hint {
        return hint;
    }

    let min_ms = options.min_delay.as_millis() as u64;
    let base_ms = match options.backoff {
        Backoff::Linear => min_ms.saturating_mul(u64::from(attempt) + 1),
        Backoff::Exponential => min_ms.saturating_mul(1u64 << attempt.min(MAX_EXPONENT)),
    };
    let capped = Duration::from_millis(base_ms).min(options.max_delay);

    if options.jitter {
        apply_jitter(capped)
    } else {
        capped
    }
}

/// Uniform factor in [0.5, 1.0] of the deterministic delay, so concurrent
/// retriers decorrelate without ever waiting longer than configured.
fn apply_jitter(delay: Duration) -> Duration {
    let delay_ms = delay.as_millis() as u64;
    if delay_ms == 0 {
        return Duration::ZERO;
    }
    let low = delay_ms / 2;
    let sampled_ms = rand::thread_rng().gen_range(low..=delay_ms);
    Duration::from_millis(sampled_ms)
}

/// Parses a `Retry-After` header value: delay-seconds or an HTTP-date.
/// Dates already in the past clamp to zero.
pub(crate) fn parse_retry_after(headers: &HeaderMap, now: SystemTime) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?;
    let raw_value = value.to_str().ok()?.trim();
    if let Ok(seconds) = raw_value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = httpdate::parse_http_date(raw_value).ok()?;
    match date.duration_since(now) {
        Ok(duration) => Some(duration),
        Err(_) => Some(Duration::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    fn options(backoff: Backoff, min_ms: u64, max_ms: u64) -> RetryOptions {
        RetryOptions::new()
            .backoff(backoff)
            .min_delay(Duration::from_millis(min_ms))
            .max_delay(Duration::from_millis(max_ms))
            .jitter(false)
    }

    #[test]
    fn linear_delay_grows_by_min_delay_each_attempt() {
        let opts = options(Backoff::Linear, 100, 10_000);
        for attempt in 0..5 {
            assert_eq!(
                compute_delay(attempt, &opts, None),
                Duration::from_millis(100 * (u64::from(attempt) + 1))
            );
        }
    }

    #[test]
    fn exponential_delay_doubles_each_attempt() {
        let opts = options(Backoff::Exponential, 100, 100_000);
        for attempt in 0..5 {
            assert_eq!(
                compute_delay(attempt, &opts, None),
                Duration::from_millis(100 * (1 << attempt))
            );
        }
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let opts = options(Backoff::Exponential, 100, 350);
        assert_eq!(compute_delay(10, &opts, None), Duration::from_millis(350));

        let opts = options(Backoff::Linear, 100, 250);
        assert_eq!(compute_delay(9, &opts, None), Duration::from_millis(250));
    }

    #[test]
    fn delay_is_monotonically_non_decreasing_without_jitter() {
        for backoff in [Backoff::Linear, Backoff::Exponential] {
            let opts = options(backoff, 50, 2_000);
            let mut previous = Duration::ZERO;
            for attempt in 0..20 {
                let delay = compute_delay(attempt, &opts, None);
                assert!(delay >= previous);
                previous = delay;
            }
        }
    }

    #[test]
    fn huge_attempt_index_does_not_overflow() {
        let opts = options(Backoff::Exponential, u64::MAX / 2, u64::MAX);
        let delay = compute_delay(u32::MAX, &opts, None);
        assert!(delay <= Duration::from_millis(u64::MAX));
    }

    #[test]
    fn jitter_stays_within_half_to_full_deterministic_value() {
        let opts = options(Backoff::Exponential, 400, 10_000).jitter(true);
        let deterministic = Duration::from_millis(800);
        for _ in 0..200 {
            let delay = compute_delay(1, &opts, None);
            assert!(delay >= deterministic / 2);
            assert!(delay <= deterministic);
        }
    }

    #[test]
    fn server_hint_bypasses_backoff_and_jitter() {
        let opts = options(Backoff::Exponential, 1, 5).jitter(true);
        let hint = Duration::from_secs(120);
        assert_eq!(compute_delay(3, &opts, Some(hint)), hint);
    }

    #[test]
    fn parse_retry_after_reads_delay_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(
            parse_retry_after(&headers, SystemTime::now()),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn parse_retry_after_reads_http_date() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(784_111_777);
        let mut headers = HeaderMap::new();
        // 30 seconds after `now`.
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_str(&httpdate::fmt_http_date(now + Duration::from_secs(30)))
                .expect("http date is a valid header value"),
        );
        assert_eq!(
            parse_retry_after(&headers, now),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn past_http_date_clamps_to_zero() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(784_111_777);
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_str(&httpdate::fmt_http_date(now - Duration::from_secs(3600)))
                .expect("http date is a valid header value"),
        );
        assert_eq!(parse_retry_after(&headers, now), Some(Duration::ZERO));
    }

    #[test]
    fn absent_or_garbage_header_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers, SystemTime::now()), None);

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soonish"));
        assert_eq!(parse_retry_after(&headers, SystemTime::now()), None);
    }
}
