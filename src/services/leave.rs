//! Approved-leave collaborator. Leave is always authoritative over
//! attendance: both the OT engine and the background sweeps consult it
//! before touching a day.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::types::UserId;

#[async_trait]
pub trait LeaveService: Send + Sync {
    async fn has_approved_leave(&self, user_id: UserId, date: NaiveDate) -> anyhow::Result<bool>;
}

/// Fixed in-memory leave calendar for tests and wiring examples.
pub struct StaticLeave {
    days: Mutex<HashSet<(UserId, NaiveDate)>>,
}

impl StaticLeave {
    pub fn new() -> Self {
        Self {
            days: Mutex::new(HashSet::new()),
        }
    }

    pub fn grant(&self, user_id: UserId, date: NaiveDate) {
        self.days
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((user_id, date));
    }
}

impl Default for StaticLeave {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaveService for StaticLeave {
    async fn has_approved_leave(&self, user_id: UserId, date: NaiveDate) -> anyhow::Result<bool> {
        Ok(self
            .days
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(user_id, date)))
    }
}
