//! Token and cost metering for skill invocations

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteMeteringStore;

use crate::core::ModelTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// Usage of one successful skill invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeteringEntry {
    pub run_id: Uuid,
    pub pipeline_id: String,
    pub brand_id: Option<String>,
    pub skill_id: String,
    pub model: Option<String>,
    pub tier: ModelTier,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_units: f64,
    pub recorded_at: DateTime<Utc>,
}

impl MeteringEntry {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Outcome of a pre-flight usage check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl LimitCheck {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Trait for metering backends
#[async_trait::async_trait]
pub trait MeteringSink: Send + Sync {
    /// Record usage; fire-and-forget, never fails the caller
    fn record(&self, entry: MeteringEntry);

    /// Check whether new runs may start
    async fn check_limits(&self) -> LimitCheck;
}

/// Metering that discards everything and never limits
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetering;

#[async_trait::async_trait]
impl MeteringSink for NoopMetering {
    fn record(&self, _entry: MeteringEntry) {}

    async fn check_limits(&self) -> LimitCheck {
        LimitCheck::allow()
    }
}

/// In-memory metering (for testing or ephemeral use)
///
/// With a daily token cap, `check_limits` denies once today's recorded
/// tokens reach the cap.
#[derive(Debug, Default)]
pub struct InMemoryMetering {
    entries: Mutex<Vec<MeteringEntry>>,
    daily_token_cap: Option<u64>,
}

impl InMemoryMetering {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_daily_token_cap(cap: u64) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            daily_token_cap: Some(cap),
        }
    }

    /// Copy of all recorded entries
    pub fn entries(&self) -> Vec<MeteringEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Tokens recorded since midnight UTC
    pub fn tokens_today(&self) -> u64 {
        let today = Utc::now().date_naive();
        self.entries()
            .iter()
            .filter(|e| e.recorded_at.date_naive() == today)
            .map(MeteringEntry::total_tokens)
            .sum()
    }
}

#[async_trait::async_trait]
impl MeteringSink for InMemoryMetering {
    fn record(&self, entry: MeteringEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    async fn check_limits(&self) -> LimitCheck {
        match self.daily_token_cap {
            Some(cap) => {
                let used = self.tokens_today();
                if used >= cap {
                    LimitCheck::deny(format!("daily token cap reached ({}/{})", used, cap))
                } else {
                    LimitCheck::allow()
                }
            }
            None => LimitCheck::allow(),
        }
    }
}
