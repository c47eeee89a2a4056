//! Runtime settings: model selection, backoff bounds, turn limit, credential.
//!
//! [`Settings`] derives [`clap::Args`] so the binary can flatten it into its
//! CLI. Each option also reads an environment variable, and the binary loads
//! a `.env` file from the launch directory first, so any of them can live in
//! `.env`.

use clap::Args;

use crate::agent::config::AgentConfig;
use crate::api::gemini::DEFAULT_MODEL;
use crate::api::retry::{DEFAULT_INITIAL_BACKOFF_SECS, DEFAULT_MAX_BACKOFF_SECS, RetryConfig};

/// Fatal configuration problems found before any task runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "GEMINI_API_KEY not found in environment variables. \
         Please set it in a .env file or your system environment."
    )]
    MissingCredential,
    #[error(
        "invalid backoff bounds: initial must be at least 1s and no more than max \
         (initial={initial}s, max={max}s)"
    )]
    InvalidBackoff { initial: u64, max: u64 },
    #[error("invalid turn limit: max turns must be at least 1")]
    ZeroMaxTurns,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Gemini model identifier
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// First wait after a quota error, in seconds
    #[arg(long, env = "INITIAL_BACKOFF_SECONDS", default_value_t = DEFAULT_INITIAL_BACKOFF_SECS)]
    pub initial_backoff_seconds: u64,

    /// Longest wait after repeated quota errors, in seconds
    #[arg(long, env = "MAX_BACKOFF_SECONDS", default_value_t = DEFAULT_MAX_BACKOFF_SECS)]
    pub max_backoff_seconds: u64,

    /// Stop a task after this many model turns (unlimited when unset)
    #[arg(long, env = "AGENT_MAX_TURNS")]
    pub max_turns: Option<u32>,

    /// Override the Gemini API base URL
    #[arg(long, env = "GEMINI_API_BASE")]
    pub api_base: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            initial_backoff_seconds: DEFAULT_INITIAL_BACKOFF_SECS,
            max_backoff_seconds: DEFAULT_MAX_BACKOFF_SECS,
            max_turns: None,
            api_base: None,
            api_key: None,
        }
    }
}

impl Settings {
    /// Check the backoff bounds and the turn limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turns == Some(0) {
            return Err(ConfigError::ZeroMaxTurns);
        }
        if self.initial_backoff_seconds < 1
            || self.max_backoff_seconds < self.initial_backoff_seconds
        {
            return Err(ConfigError::InvalidBackoff {
                initial: self.initial_backoff_seconds,
                max: self.max_backoff_seconds,
            });
        }
        Ok(())
    }

    /// The API key, trimmed. Blank counts as missing.
    pub fn credential(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingCredential)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.initial_backoff_seconds, self.max_backoff_seconds)
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            retry: self.retry_config(),
            max_turns: self.max_turns,
        }
    }
}
