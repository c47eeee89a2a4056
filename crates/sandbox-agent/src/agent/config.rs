//! Configuration for the [`Agent`](super::harness::Agent) loop.
//!
//! ```ignore
//! let config = AgentConfig::default()
//!     .with_retry(RetryConfig::new(2, 60))
//!     .with_max_turns(25);
//! ```

use crate::api::retry::RetryConfig;

/// Loop configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentConfig {
    /// Backoff policy for model calls.
    pub retry: RetryConfig,
    /// Maximum number of model turns per task. `None` means no limit.
    pub max_turns: Option<u32>,
}

impl AgentConfig {
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }
}
