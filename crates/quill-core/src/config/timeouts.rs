//! Centralized timeout defaults
//!
//! All values can be overridden through [`EngineConfig`](super::EngineConfig).

use std::time::Duration;

/// Default timeout values for evaluation sessions
pub mod session {
    use super::*;

    /// Hard wall-clock deadline for one session (120 seconds)
    pub const DEADLINE_SECS: u64 = 120;

    /// Get the session deadline as Duration
    pub fn deadline() -> Duration {
        Duration::from_secs(DEADLINE_SECS)
    }
}

/// Default timeout values for provider calls
pub mod provider {
    use super::*;

    /// Connection timeout for provider endpoints (30 seconds)
    pub const CONNECT_SECS: u64 = 30;

    /// Cooldown applied after repeated credential failures (60 seconds)
    pub const FAILURE_COOLDOWN_SECS: u64 = 60;

    /// Delay after the first failed attempt (500 ms)
    pub const FIRST_BACKOFF_MS: u64 = 500;

    /// Delay after every later failed attempt (1500 ms)
    pub const SUBSEQUENT_BACKOFF_MS: u64 = 1_500;

    pub fn connect_timeout() -> Duration {
        Duration::from_secs(CONNECT_SECS)
    }

    pub fn failure_cooldown() -> Duration {
        Duration::from_secs(FAILURE_COOLDOWN_SECS)
    }

    pub fn first_backoff() -> Duration {
        Duration::from_millis(FIRST_BACKOFF_MS)
    }

    pub fn subsequent_backoff() -> Duration {
        Duration::from_millis(SUBSEQUENT_BACKOFF_MS)
    }
}
