//! Cached resolver for department shift configuration.
//!
//! The cache is owned by the store, the clock is the caller-supplied `now`,
//! and invalidation is explicit: `update` writes through the repository and
//! drops the cached entry before returning, so the next read in this
//! process never sees stale timing. Other instances converge within the
//! TTL; that staleness window is an accepted trade-off.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::EngineError;
use crate::models::department_timing::DepartmentTiming;
use crate::repositories::DepartmentTimingRepository;

pub const TIMING_CACHE_TTL_SECS: i64 = 300;

struct CachedTiming {
    timing: DepartmentTiming,
    fetched_at: DateTime<Utc>,
}

pub struct DepartmentTimingStore {
    repo: Arc<dyn DepartmentTimingRepository>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedTiming>>,
}

impl DepartmentTimingStore {
    pub fn new(repo: Arc<dyn DepartmentTimingRepository>) -> Self {
        Self::with_ttl(repo, Duration::seconds(TIMING_CACHE_TTL_SECS))
    }

    pub fn with_ttl(repo: Arc<dyn DepartmentTimingRepository>, ttl: Duration) -> Self {
        Self {
            repo,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves timing for `department`, serving a cached value younger
    /// than the TTL. Unconfigured departments fall back to the hardcoded
    /// default; the engine never runs without a shift boundary.
    pub async fn get(
        &self,
        department: &str,
        now: DateTime<Utc>,
    ) -> Result<DepartmentTiming, EngineError> {
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = cache.get(department) {
                if now - entry.fetched_at < self.ttl {
                    return Ok(entry.timing.clone());
                }
            }
        }

        let timing = self
            .repo
            .find_by_department(department)
            .await?
            .unwrap_or_else(|| DepartmentTiming::default_for(department));

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(
            department.to_string(),
            CachedTiming {
                timing: timing.clone(),
                fetched_at: now,
            },
        );
        Ok(timing)
    }

    /// Writes timing through the repository and invalidates the cached
    /// entry before returning.
    pub async fn update(&self, timing: DepartmentTiming) -> Result<DepartmentTiming, EngineError> {
        let saved = self.repo.upsert(&timing).await?;
        self.invalidate(&saved.department);
        Ok(saved)
    }

    pub fn invalidate(&self, department: &str) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(department);
    }

    pub fn invalidate_all(&self) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
