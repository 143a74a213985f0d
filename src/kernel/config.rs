use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kernel::error::ConfigError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRIEVAL_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Hard cap on Responder calls per turn. The budget, not the Validator, decides escalation.
    pub max_attempts: u32,
    pub responder_timeout: Duration,
    pub validator_timeout: Duration,
    pub retrieval_timeout: Duration,
    pub retrieval_limit: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            responder_timeout: Duration::from_secs(30),
            validator_timeout: Duration::from_secs(30),
            retrieval_timeout: Duration::from_secs(10),
            retrieval_limit: DEFAULT_RETRIEVAL_LIMIT,
        }
    }
}

impl ControllerConfig {
    /// Defaults overridden by `CONCIERGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var::<u32, _>(&lookup, "CONCIERGE_MAX_ATTEMPTS")? {
            config.max_attempts = v;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "CONCIERGE_RESPONDER_TIMEOUT_MS")? {
            config.responder_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "CONCIERGE_VALIDATOR_TIMEOUT_MS")? {
            config.validator_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "CONCIERGE_RETRIEVAL_TIMEOUT_MS")? {
            config.retrieval_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "CONCIERGE_RETRIEVAL_LIMIT")? {
            config.retrieval_limit = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_timeouts(mut self, responder: Duration, validator: Duration, retrieval: Duration) -> Self {
        self.responder_timeout = responder;
        self.validator_timeout = validator;
        self.retrieval_timeout = retrieval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Zero("max_attempts"));
        }
        if self.responder_timeout.is_zero() {
            return Err(ConfigError::Zero("responder_timeout"));
        }
        if self.validator_timeout.is_zero() {
            return Err(ConfigError::Zero("validator_timeout"));
        }
        if self.retrieval_timeout.is_zero() {
            return Err(ConfigError::Zero("retrieval_timeout"));
        }
        if self.retrieval_limit == 0 {
            return Err(ConfigError::Zero("retrieval_limit"));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: raw }),
    }
}
