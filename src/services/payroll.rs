//! Payroll aggregation over finalized attendance.
//!
//! Nothing pending review is ever aggregated; generation refuses outright
//! when pending records exist unless a privileged actor forces it, and a
//! forced run reports what it excluded.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{codes, EngineError};
use crate::models::attendance::{AttendanceRecord, AttendanceStatus};
use crate::repositories::AttendanceRepository;
use crate::services::directory::UserDirectory;
use crate::services::holiday::HolidayService;
use crate::services::review::month_bounds;
use crate::services::settings::CompanySettingsService;
use crate::services::timing_store::DepartmentTimingStore;
use crate::types::{RecordId, UserId};
use crate::utils::time::round_hours;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollStatement {
    pub user_id: UserId,
    pub year: i32,
    pub month: u32,
    pub weighted_payable_days: f64,
    pub daily_rate: f64,
    pub earned_amount: f64,
    /// Days a forced run left out, with the reason, for audit.
    pub excluded_days: Vec<ExcludedDay>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedDay {
    pub record_id: RecordId,
    pub date: NaiveDate,
    pub reason: String,
}

pub struct PayrollService {
    records: Arc<dyn AttendanceRepository>,
    directory: Arc<dyn UserDirectory>,
    holidays: Arc<dyn HolidayService>,
    settings: Arc<dyn CompanySettingsService>,
    timings: Arc<DepartmentTimingStore>,
}

impl PayrollService {
    pub fn new(
        records: Arc<dyn AttendanceRepository>,
        directory: Arc<dyn UserDirectory>,
        holidays: Arc<dyn HolidayService>,
        settings: Arc<dyn CompanySettingsService>,
        timings: Arc<DepartmentTimingStore>,
    ) -> Self {
        Self {
            records,
            directory,
            holidays,
            settings,
            timings,
        }
    }

    /// Fills calendar gaps with virtual holiday/weekly-off records. Days
    /// with an existing record are left alone; a date never gets two
    /// records, and a plain absence stays an absence.
    pub async fn enrich_with_statutory_days(
        &self,
        user_id: UserId,
        department: &str,
        from: NaiveDate,
        to: NaiveDate,
        raw: Vec<AttendanceRecord>,
        now: DateTime<Utc>,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        if from > to {
            return Err(EngineError::validation("from must be on or before to"));
        }

        let timing = self.timings.get(department, now).await?;
        let mut by_date: BTreeMap<NaiveDate, AttendanceRecord> =
            raw.into_iter().map(|r| (r.date, r)).collect();

        let mut cursor = from;
        while cursor <= to {
            if !by_date.contains_key(&cursor) {
                let decision = self
                    .holidays
                    .check(cursor, Some(department))
                    .await
                    .map_err(EngineError::Internal)?;
                if decision.is_holiday {
                    by_date.insert(
                        cursor,
                        AttendanceRecord::statutory(user_id, cursor, AttendanceStatus::Holiday, now),
                    );
                } else if timing.is_weekly_off(cursor) {
                    by_date.insert(
                        cursor,
                        AttendanceRecord::statutory(
                            user_id,
                            cursor,
                            AttendanceStatus::WeeklyOff,
                            now,
                        ),
                    );
                }
            }
            cursor += Duration::days(1);
        }

        Ok(by_date.into_values().collect())
    }

    /// Weighted payable-day total. Pending records contribute nothing even
    /// if one slips in past the read-side filters.
    pub fn weighted_payable_days(records: &[AttendanceRecord]) -> f64 {
        records
            .iter()
            .filter(|r| !r.is_pending_review())
            .map(|r| r.status.payable_weight())
            .sum()
    }

    /// Daily rate from fixed monthly components and the configured divisor
    /// (e.g. 26), never the calendar month length.
    pub fn daily_rate(
        fixed_monthly_components: f64,
        standard_working_days: u32,
    ) -> Result<f64, EngineError> {
        if standard_working_days == 0 {
            return Err(EngineError::Configuration(
                "standard_working_days must be positive".into(),
            ));
        }
        Ok(fixed_monthly_components / standard_working_days as f64)
    }

    /// Computes one user's statement for a month.
    ///
    /// Refuses while any of the user's records in the period await review,
    /// unless forced by an actor allowed to do so; the forced run records
    /// which days were excluded and why.
    pub async fn compute_period(
        &self,
        user_id: UserId,
        year: i32,
        month: u32,
        fixed_monthly_components: f64,
        force_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<PayrollStatement, EngineError> {
        let (from, to) = month_bounds(year, month)?;

        let pending = self
            .records
            .list_pending_review(Some(user_id), from, to)
            .await?;

        let excluded_days = if pending.is_empty() {
            Vec::new()
        } else {
            match force_by {
                None => {
                    let ids: Vec<String> = pending.iter().map(|r| r.id.to_string()).collect();
                    return Err(EngineError::rule(
                        codes::PENDING_REVIEWS_BLOCK_PAYROLL,
                        format!(
                            "{} record(s) pending admin review in {}-{:02}: {}",
                            pending.len(),
                            year,
                            month,
                            ids.join(", ")
                        ),
                    ));
                }
                Some(actor_id) => {
                    let actor = self
                        .directory
                        .get_user(actor_id)
                        .await
                        .map_err(EngineError::Internal)?
                        .ok_or_else(|| EngineError::NotFound("forcing actor not found".into()))?;
                    if !actor.role.can_force_payroll() {
                        return Err(EngineError::rule(
                            codes::FORCE_NOT_PERMITTED,
                            "actor is not permitted to force payroll generation",
                        ));
                    }
                    let excluded: Vec<ExcludedDay> = pending
                        .iter()
                        .map(|r| ExcludedDay {
                            record_id: r.id,
                            date: r.date,
                            reason: "pending admin review".to_string(),
                        })
                        .collect();
                    tracing::warn!(
                        %user_id,
                        %actor_id,
                        year,
                        month,
                        excluded = excluded.len(),
                        "payroll forced past pending reviews"
                    );
                    excluded
                }
            }
        };

        let user = self
            .directory
            .get_user(user_id)
            .await
            .map_err(EngineError::Internal)?
            .ok_or_else(|| EngineError::NotFound("user not found".into()))?;
        let department = user.department.ok_or_else(|| {
            EngineError::rule(codes::NO_DEPARTMENT, "user has no assigned department")
        })?;

        // Pending records never reach this query.
        let finalized = self
            .records
            .list_finalized_by_user_and_range(user_id, from, to)
            .await?;
        let enriched = self
            .enrich_with_statutory_days(user_id, &department, from, to, finalized, now)
            .await?;

        let weighted = Self::weighted_payable_days(&enriched);
        let settings = self.settings.get().await.map_err(EngineError::Internal)?;
        let daily_rate = Self::daily_rate(fixed_monthly_components, settings.standard_working_days)?;
        let earned_amount = round_hours(daily_rate * weighted);

        Ok(PayrollStatement {
            user_id,
            year,
            month,
            weighted_payable_days: weighted,
            daily_rate,
            earned_amount,
            excluded_days,
        })
    }
}
