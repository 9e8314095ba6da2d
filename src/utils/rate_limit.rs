//! Per-user action rate limiting.
//!
//! Check-in/check-out and OT start/end are ordinary request/response
//! operations; a small sliding window per user is enough to stop rapid
//! double-submission before the database uniqueness guards have to.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::EngineError;
use crate::types::UserId;

const STORE_CLEANUP_THRESHOLD: usize = 10_000;

pub struct ActionRateLimiter {
    max_requests: u32,
    window: Duration,
    store: Mutex<HashMap<UserId, VecDeque<DateTime<Utc>>>>,
}

impl ActionRateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window: Duration::seconds(window_seconds.max(1) as i64),
            store: Mutex::new(HashMap::new()),
        }
    }

    /// Records one attempt for `user`, rejecting when the window is full.
    pub fn check(&self, user: UserId, now: DateTime<Utc>) -> Result<(), EngineError> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());

        if store.len() > STORE_CLEANUP_THRESHOLD {
            let window = self.window;
            store.retain(|_, entry| {
                prune_expired(entry, now, window);
                !entry.is_empty()
            });
        }

        let entry = store.entry(user).or_default();
        prune_expired(entry, now, self.window);

        if entry.len() >= self.max_requests as usize {
            let retry_after_secs = entry
                .front()
                .map(|oldest| {
                    (self.window - (now - *oldest)).num_seconds().max(1) as u64
                })
                .unwrap_or(1);
            return Err(EngineError::RateLimited { retry_after_secs });
        }

        entry.push_back(now);
        Ok(())
    }
}

fn prune_expired(entry: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) {
    while let Some(oldest) = entry.front() {
        if now - *oldest >= window {
            entry.pop_front();
        } else {
            break;
        }
    }
}
