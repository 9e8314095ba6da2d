use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::UserId;

/// Per-(year, month) payroll lock. While locked, no attendance or overtime
/// mutation in the period is accepted from anyone.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PayrollPeriod {
    pub year: i32,
    pub month: i32,
    pub status: PeriodStatus,
    pub locked_by: Option<UserId>,
    pub locked_at: Option<DateTime<Utc>>,
    /// Required audit note for the most recent locked→open transition.
    pub unlock_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    Open,
    Locked,
}

impl PayrollPeriod {
    pub fn is_locked(&self) -> bool {
        self.status == PeriodStatus::Locked
    }
}
