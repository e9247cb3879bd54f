//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::logging_config::LoggingConfig;
use super::timeouts;
use crate::credential::CooldownPolicy;
use crate::error::{QuillError, QuillResult};
use crate::session::TaskType;

/// Retry delay schedule for one credential.
///
/// The first failure waits `first`, every later one waits `subsequent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    #[serde(with = "humantime_serde")]
    pub first: Duration,
    #[serde(with = "humantime_serde")]
    pub subsequent: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            first: timeouts::provider::first_backoff(),
            subsequent: timeouts::provider::subsequent_backoff(),
        }
    }
}

impl BackoffConfig {
    /// Delay to wait after the `failed_attempt`-th failure (1-indexed)
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        if failed_attempt <= 1 {
            self.first
        } else {
            self.subsequent
        }
    }
}

/// Sampling temperature per task type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    pub task1: f32,
    pub task2: f32,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            task1: 0.3,
            task2: 0.5,
        }
    }
}

impl TemperatureConfig {
    pub fn for_task(&self, task_type: TaskType) -> f32 {
        match task_type {
            TaskType::Task1 => self.task1,
            TaskType::Task2 => self.task2,
        }
    }
}

/// Settings for the session registry, orchestrator and transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard deadline for one session
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,
    /// Backup candidates tried after the primary
    pub max_fallback_providers: usize,
    /// Consecutive credential failures before a cooldown starts
    pub failure_threshold: u32,
    /// Length of that cooldown
    #[serde(with = "humantime_serde")]
    pub failure_cooldown: Duration,
    pub backoff: BackoffConfig,
    /// Completion token limit sent to the provider
    pub max_tokens: u32,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    pub temperature: TemperatureConfig,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_timeout: timeouts::session::deadline(),
            max_fallback_providers: 2,
            failure_threshold: 3,
            failure_cooldown: timeouts::provider::failure_cooldown(),
            backoff: BackoffConfig::default(),
            max_tokens: 4096,
            connect_timeout: timeouts::provider::connect_timeout(),
            temperature: TemperatureConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Maximum number of candidates tried for one session
    pub fn candidate_cap(&self) -> usize {
        self.max_fallback_providers.saturating_add(1)
    }

    pub fn cooldown_policy(&self) -> CooldownPolicy {
        CooldownPolicy {
            threshold: self.failure_threshold,
            cooldown: self.failure_cooldown,
        }
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> QuillResult<()> {
        if self.session_timeout.is_zero() {
            return Err(QuillError::config("session_timeout must be greater than zero"));
        }
        if self.failure_threshold == 0 {
            return Err(QuillError::config("failure_threshold must be at least 1"));
        }
        if self.max_tokens == 0 {
            return Err(QuillError::config("max_tokens must be greater than zero"));
        }
        for (task, value) in [("task1", self.temperature.task1), ("task2", self.temperature.task2)] {
            if !(0.0..=2.0).contains(&value) {
                return Err(QuillError::config_with_context(
                    format!("temperature {} is outside [0, 2]", value),
                    format!("temperature.{}", task),
                ));
            }
        }
        Ok(())
    }
}
