//! Retry policy configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay grows between retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// `2^attempt * base`
    #[default]
    Exponential,
    /// `attempt * base`
    Linear,
}

/// Policy for retrying a failed skill invocation.
///
/// `max_retries` counts retries, not attempts: a step runs at most
/// `max_retries + 1` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    #[serde(
        rename = "max",
        alias = "maxAttempts",
        alias = "max_attempts",
        alias = "max_retries",
        default
    )]
    pub max_retries: u32,

    /// Delay growth between attempts.
    #[serde(default)]
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// No retries.
    pub fn none() -> Self {
        Self::default()
    }

    /// Exponential backoff with `max_retries` retries.
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential,
        }
    }

    /// Linear backoff with `max_retries` retries.
    pub fn linear(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Linear,
        }
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait before `attempt` (0-indexed; attempt 0 never waits).
    pub fn delay_before(&self, attempt: u32, base: Duration) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base_ms = base.as_millis() as u64;
        let delay_ms = match self.backoff {
            Backoff::Exponential => 2u64.saturating_pow(attempt).saturating_mul(base_ms),
            Backoff::Linear => u64::from(attempt).saturating_mul(base_ms),
        };
        Duration::from_millis(delay_ms)
    }
}
