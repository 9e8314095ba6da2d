//! Scheduled background workers.
//!
//! Both sweeps are idempotent, bounded per run, and isolate per-record
//! failures; the summary is the run's observable output.

pub mod auto_checkout;
pub mod ot_auto_close;

pub use auto_checkout::AutoCheckoutSweep;
pub use ot_auto_close::OtAutoCloseSweep;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub processed: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Drives a sweep on a fixed interval until the task is dropped.
pub async fn run_periodic<F, Fut>(name: &'static str, every: Duration, job: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = SweepSummary>,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let summary = job().await;
        tracing::info!(
            worker = name,
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "sweep finished"
        );
    }
}
