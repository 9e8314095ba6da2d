//! Attendance and overtime correctness core.
//!
//! Converts raw check-in/check-out events and overtime sessions into
//! verified attendance that feeds payroll. Everything compensation-relevant
//! is gated: forgotten checkouts and stale overtime sessions are repaired
//! into a pending-review state rather than paid, and a per-month payroll
//! lock refuses retroactive mutation once a period is finalized.
//!
//! User management, leave, holidays, company settings, photo storage and
//! notification delivery are external collaborators behind the traits in
//! [`services`]; the HTTP surface that invokes the engine lives outside
//! this crate.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;
pub mod types;
pub mod utils;
pub mod validation;
pub mod workers;

/// Initialize tracing for hosts and worker binaries embedding the engine.
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timecard_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
