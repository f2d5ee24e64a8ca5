// config.rs - Negotiation configuration

//! Layered configuration: built-in defaults, an optional TOML file, then
//! `CNET_*` environment variables (e.g. `CNET_DEADLINE_MS=2500`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CNET";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Initiator-side negotiation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// How long to collect PROPOSE/REFUSE answers (milliseconds)
    pub deadline_ms: u64,

    /// How long the winner may take to report INFORM/FAILURE (the collection deadline when unset)
    pub outcome_timeout_ms: Option<u64>,

    /// Wait for the winner's INFORM/FAILURE without any time limit
    pub unbounded_outcome: bool,

    /// Action name put in the CFP task
    pub action: String,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 10_000,
            outcome_timeout_ms: None,
            unbounded_outcome: false,
            action: "do-repair".into(),
        }
    }
}

impl NegotiationConfig {
    /// Load defaults, then `path` if given and present, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_outcome_timeout(mut self, timeout: Duration) -> Self {
        self.outcome_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self.unbounded_outcome = false;
        self
    }

    /// Opt out of the outcome timer entirely
    pub fn with_unbounded_outcome(mut self) -> Self {
        self.unbounded_outcome = true;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deadline_ms == 0 {
            return Err(ConfigError::Invalid("deadline_ms must be positive".into()));
        }
        if self.outcome_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("outcome_timeout_ms must be positive".into()));
        }
        if self.action.trim().is_empty() {
            return Err(ConfigError::Invalid("action must not be empty".into()));
        }
        Ok(())
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Time allowed for the winner's outcome; `None` only when explicitly unbounded
    pub fn outcome_timeout(&self) -> Option<Duration> {
        if self.unbounded_outcome {
            return None;
        }
        Some(
            self.outcome_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| self.deadline()),
        )
    }
}
