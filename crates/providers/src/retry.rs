//! Retry classification and backoff.
//!
//! `classify` is a pure function from a provider failure to what the decoder
//! should do about it; the decoder owns the sleeping and the attempt loop.

use std::time::Duration;

use ferrule_core::error::ProviderError;

/// What kind of failure an attempt ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Provider asked us to slow down. Carries the declared reset instant
    /// (epoch milliseconds) when the provider sent one.
    RateLimited { reset_at_ms: Option<u64> },
    /// Network trouble: connect failures, resets, timeouts.
    Transient,
    /// Anything else. Not retried.
    Fatal,
}

/// Sort a provider failure into a retry class.
pub fn classify(error: &ProviderError) -> FailureClass {
    match error {
        ProviderError::RateLimited { reset_at_ms, .. } => FailureClass::RateLimited {
            reset_at_ms: *reset_at_ms,
        },
        ProviderError::Connection(_)
        | ProviderError::Timeout(_)
        | ProviderError::StreamInterrupted(_) => FailureClass::Transient,
        ProviderError::Api { .. }
        | ProviderError::AuthenticationFailed(_)
        | ProviderError::Cancelled
        | ProviderError::NotConfigured(_) => FailureClass::Fatal,
    }
}

/// Exponential backoff: `2^attempt` seconds, attempts counted from zero.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Wait before retrying a rate-limited attempt.
///
/// With a reset instant: time until reset, never less than one second.
/// Without: the exponential backoff.
pub fn rate_limit_delay(reset_at_ms: Option<u64>, attempt: u32, now_ms: u64) -> Duration {
    match reset_at_ms {
        Some(reset) => Duration::from_millis(reset.saturating_sub(now_ms).max(1_000)),
        None => backoff_delay(attempt),
    }
}

/// How many times the decoder may call the provider for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Retries plus the initial attempt.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// The wait before the next attempt, or `None` if this failure ends
    /// the call (fatal class or attempts exhausted).
    pub fn next_delay(&self, class: FailureClass, attempt: u32, now_ms: u64) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts() {
            return None;
        }
        match class {
            FailureClass::RateLimited { reset_at_ms } => {
                Some(rate_limit_delay(reset_at_ms, attempt, now_ms))
            }
            FailureClass::Transient => Some(backoff_delay(attempt)),
            FailureClass::Fatal => None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// The message of the terminal `Error` event for a failure.
pub fn terminal_message(error: &ProviderError) -> String {
    match classify(error) {
        FailureClass::RateLimited { .. } => format!("Rate limit exceeded: {error}"),
        FailureClass::Transient => format!("Connection error: {error}"),
        FailureClass::Fatal => match error {
            ProviderError::Cancelled => error.to_string(),
            _ => format!("API error: {error}"),
        },
    }
}
