//! Payroll period lock repository.
//!
//! Lock transitions are single statements guarded on the current status, so
//! two admins racing a lock cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::connection::DbPool;
use crate::error::EngineError;
use crate::models::payroll_period::PayrollPeriod;
use crate::types::UserId;

const SELECT_COLUMNS: &str =
    "year, month, status, locked_by, locked_at, unlock_reason, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PayrollPeriodRepository: Send + Sync {
    async fn find(&self, year: i32, month: u32) -> Result<Option<PayrollPeriod>, EngineError>;

    /// open→locked; returns `None` when the period was already locked.
    async fn lock(
        &self,
        year: i32,
        month: u32,
        locked_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<PayrollPeriod>, EngineError>;

    /// locked→open with the audit reason; returns `None` when not locked.
    async fn unlock(
        &self,
        year: i32,
        month: u32,
        unlock_reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PayrollPeriod>, EngineError>;
}

#[derive(Clone)]
pub struct PgPayrollPeriodRepository {
    pool: DbPool,
}

impl PgPayrollPeriodRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PayrollPeriodRepository for PgPayrollPeriodRepository {
    async fn find(&self, year: i32, month: u32) -> Result<Option<PayrollPeriod>, EngineError> {
        let query = format!(
            "SELECT {} FROM payroll_periods WHERE year = $1 AND month = $2",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PayrollPeriod>(&query)
            .bind(year)
            .bind(month as i32)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn lock(
        &self,
        year: i32,
        month: u32,
        locked_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<PayrollPeriod>, EngineError> {
        let query = format!(
            "INSERT INTO payroll_periods (year, month, status, locked_by, locked_at, updated_at) \
             VALUES ($1, $2, 'locked', $3, $4, $4) \
             ON CONFLICT (year, month) DO UPDATE SET \
                 status = 'locked', locked_by = EXCLUDED.locked_by, \
                 locked_at = EXCLUDED.locked_at, updated_at = EXCLUDED.updated_at \
             WHERE payroll_periods.status = 'open' \
             RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PayrollPeriod>(&query)
            .bind(year)
            .bind(month as i32)
            .bind(locked_by)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn unlock(
        &self,
        year: i32,
        month: u32,
        unlock_reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PayrollPeriod>, EngineError> {
        let query = format!(
            "UPDATE payroll_periods SET status = 'open', unlock_reason = $3, updated_at = $4 \
             WHERE year = $1 AND month = $2 AND status = 'locked' \
             RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PayrollPeriod>(&query)
            .bind(year)
            .bind(month as i32)
            .bind(unlock_reason)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
