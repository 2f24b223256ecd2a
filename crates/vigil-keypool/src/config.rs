//! Pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for rotation, cooldown and failover.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Consecutive capacity failures before a credential is taken out.
    pub max_failures: u32,

    /// How long an unavailable credential rests before re-admission.
    pub cooldown: Duration,

    /// Attempts made by `run_with_failover`.
    pub max_attempts: u32,

    /// Linear backoff step: attempt `n` waits `n × backoff_step`.
    pub backoff_step: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            cooldown: Duration::from_secs(60),
            max_attempts: 3,
            backoff_step: Duration::from_secs(1),
        }
    }
}
