//! Backoff policy for model-service retries.
//!
//! Quota errors wait for the server-suggested delay when one is given, and
//! otherwise for the current backoff, which then grows by 1.7x (floored,
//! capped). Every other error waits a fixed delay. There is no retry limit
//! and no jitter.

use std::fmt;
use std::time::Duration;

use super::ServiceError;

/// Default first backoff for quota errors, in seconds.
pub const DEFAULT_INITIAL_BACKOFF_SECS: u64 = 5;

/// Default backoff ceiling, in seconds.
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 120;

/// Default wait after a non-quota error.
pub const DEFAULT_FIXED_DELAY: Duration = Duration::from_secs(10);

/// Which retry path an error took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCause {
    /// Rate limit or quota exhaustion.
    QuotaExceeded,
    /// Anything else: network, HTTP, decoding.
    Unexpected,
}

impl fmt::Display for RetryCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryCause::QuotaExceeded => f.write_str("quota exceeded"),
            RetryCause::Unexpected => f.write_str("unexpected error"),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// First wait on the exponential path, in whole seconds.
    pub initial_backoff_secs: u64,
    /// Ceiling for the exponential path, in whole seconds.
    pub max_backoff_secs: u64,
    /// Wait after a non-quota error.
    pub fixed_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_secs: DEFAULT_INITIAL_BACKOFF_SECS,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            fixed_delay: DEFAULT_FIXED_DELAY,
        }
    }
}

impl RetryConfig {
    pub fn new(initial_backoff_secs: u64, max_backoff_secs: u64) -> Self {
        Self {
            initial_backoff_secs,
            max_backoff_secs,
            ..Default::default()
        }
    }

    /// Next exponential backoff: `min(floor(current * 1.7), max)`.
    pub fn next_backoff(&self, current: u64) -> u64 {
        (current.saturating_mul(17) / 10).min(self.max_backoff_secs)
    }

    /// Fresh backoff state for one call sequence.
    pub fn backoff(&self) -> Backoff<'_> {
        Backoff {
            config: self,
            current_secs: self.initial_backoff_secs,
        }
    }
}

/// How long to wait before the next attempt, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDelay {
    pub wait: Duration,
    pub cause: RetryCause,
}

/// Backoff state scoped to a single [`send`](super::transport::ResilientTransport::send).
#[derive(Debug)]
pub struct Backoff<'a> {
    config: &'a RetryConfig,
    current_secs: u64,
}

impl Backoff<'_> {
    /// Current exponential wait, in seconds.
    pub fn current_secs(&self) -> u64 {
        self.current_secs
    }

    /// Decide the wait for `error`, advancing the state only when the
    /// exponential path was used.
    pub fn delay_for(&mut self, error: &ServiceError) -> RetryDelay {
        match error {
            ServiceError::ResourceExhausted { retry_after, .. } => {
                let wait = match retry_after {
                    Some(server) if !server.is_zero() => *server,
                    _ => {
                        let wait = Duration::from_secs(self.current_secs);
                        self.current_secs = self.config.next_backoff(self.current_secs);
                        wait
                    }
                };
                RetryDelay {
                    wait,
                    cause: RetryCause::QuotaExceeded,
                }
            }
            ServiceError::Other(_) => RetryDelay {
                wait: self.config.fixed_delay,
                cause: RetryCause::Unexpected,
            },
        }
    }
}
