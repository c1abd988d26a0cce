//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Bulk jobs (items by result, jobs by outcome, active jobs)
//! - Verification (outcomes)
//! - Token cache (refreshes)

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, IntGauge, Opts};

// =============================================================================
// Bulk Job Metrics
// =============================================================================

/// Items processed by result.
pub static BULK_ITEMS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deskrelay_bulk_items_total", "Total bulk job items processed"),
        &["result"], // "success", "partial", "failed"
    )
    .unwrap()
});

/// Finished jobs by outcome.
pub static BULK_JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deskrelay_bulk_jobs_total", "Total bulk jobs finished"),
        &["outcome"], // "completed", "ended", "error"
    )
    .unwrap()
});

/// Jobs currently registered.
pub static ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("deskrelay_active_jobs", "Number of bulk jobs currently registered").unwrap()
});

// =============================================================================
// Verification Metrics
// =============================================================================

/// Verification outcomes.
pub static VERIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deskrelay_verifications_total", "Total ticket verifications"),
        &["outcome"], // "verified", "delivery_failed", "unverifiable", "lookup_failed", "cancelled"
    )
    .unwrap()
});

// =============================================================================
// Token Metrics
// =============================================================================

/// Access token refreshes by result.
pub static TOKEN_REFRESHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deskrelay_token_refreshes_total", "Total access token refreshes"),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

/// All core metrics, for registration with a registry.
pub fn core_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(BULK_ITEMS.clone()),
        Box::new(BULK_JOBS.clone()),
        Box::new(ACTIVE_JOBS.clone()),
        Box::new(VERIFICATIONS.clone()),
        Box::new(TOKEN_REFRESHES.clone()),
    ]
}
