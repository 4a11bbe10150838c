//! Engine configuration.
//!
//! Callers construct this directly (or deserialize it from whatever file
//! format their front end uses); the engine itself never reads config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StatusConfig {
    /// Per-collector timeout in milliseconds. A collector that has not
    /// reported within this budget is recorded as absent.
    pub collector_timeout_ms: u64,
    /// Upper bound on concurrent collector workers, independent of how
    /// many collectors are registered.
    pub max_workers: usize,
    /// Whether stack tracking is enabled. When false the stack-position
    /// collector never runs.
    pub stack_tracking: bool,
    /// File name of the per-workspace plan file.
    pub plan_filename: String,
    /// How long a cached review record stays trustworthy, in seconds.
    pub review_cache_ttl_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            collector_timeout_ms: 10_000,
            max_workers: 4,
            stack_tracking: true,
            plan_filename: "PLAN.md".to_string(),
            review_cache_ttl_secs: 60,
        }
    }
}

impl StatusConfig {
    pub fn collector_timeout(&self) -> Duration {
        Duration::from_millis(self.collector_timeout_ms)
    }
}
