//! Bulk job engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the bulk job runner and verification pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Wait before checking a created ticket's delivery (seconds).
    /// Gives the helpdesk time to run workflows and send notifications.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    /// Maximum verifications running their lookups at once.
    #[serde(default = "default_max_verifications")]
    pub max_concurrent_verifications: usize,

    /// Capacity of the event broadcast channel.
    /// Slow subscribers skip events once they fall this far behind.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_settle_delay() -> u64 {
    10
}

fn default_max_verifications() -> usize {
    8
}

fn default_event_buffer() -> usize {
    1024
}

impl JobsConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: default_settle_delay(),
            max_concurrent_verifications: default_max_verifications(),
            event_buffer: default_event_buffer(),
        }
    }
}
