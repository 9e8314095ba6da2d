//! Admin review gate and payroll-period locks.
//!
//! `assert_period_open` is the single lock check every mutation path goes
//! through; there are no exceptions for privileged actors, who must unlock
//! first with a written reason.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::error::{codes, EngineError};
use crate::models::attendance::AttendanceRecord;
use crate::models::payroll_period::PayrollPeriod;
use crate::repositories::{AttendanceRepository, OtSessionRepository, PayrollPeriodRepository};
use crate::services::directory::UserDirectory;
use crate::services::notification::{notify_best_effort, NotificationKind, NotificationService};
use crate::services::timing_store::DepartmentTimingStore;
use crate::types::{RecordId, UserId};
use crate::utils::time::{hours_between, round_hours};
use crate::validation::rules::validate_unlock_reason;

/// Fails with the distinct locked-period error when the payroll period
/// containing `date` is locked.
pub async fn assert_period_open(
    periods: &dyn PayrollPeriodRepository,
    date: NaiveDate,
) -> Result<(), EngineError> {
    if let Some(period) = periods.find(date.year(), date.month()).await? {
        if period.is_locked() {
            return Err(EngineError::PeriodLocked {
                year: period.year,
                month: period.month as u32,
            });
        }
    }
    Ok(())
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), EngineError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| EngineError::validation(format!("invalid year/month: {}/{}", year, month)))?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| EngineError::validation(format!("invalid year/month: {}/{}", year, month)))?;
    Ok((first, last))
}

#[derive(Debug, Clone)]
pub enum AttendanceReviewAction {
    /// Record stands; status becomes present.
    Accept,
    /// Reviewer-supplied times replace the recorded ones.
    Adjust {
        check_in: DateTime<Utc>,
        check_out: DateTime<Utc>,
    },
    /// Record is voided; the day counts as absent.
    Reject,
}

pub struct ReviewService {
    records: Arc<dyn AttendanceRepository>,
    sessions: Arc<dyn OtSessionRepository>,
    periods: Arc<dyn PayrollPeriodRepository>,
    directory: Arc<dyn UserDirectory>,
    timings: Arc<DepartmentTimingStore>,
    notifier: Arc<dyn NotificationService>,
}

impl ReviewService {
    pub fn new(
        records: Arc<dyn AttendanceRepository>,
        sessions: Arc<dyn OtSessionRepository>,
        periods: Arc<dyn PayrollPeriodRepository>,
        directory: Arc<dyn UserDirectory>,
        timings: Arc<DepartmentTimingStore>,
        notifier: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            records,
            sessions,
            periods,
            directory,
            timings,
            notifier,
        }
    }

    pub async fn lock_period(
        &self,
        year: i32,
        month: u32,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<PayrollPeriod, EngineError> {
        let (from, to) = month_bounds(year, month)?;
        let period = self
            .periods
            .lock(year, month, actor, now)
            .await?
            .ok_or_else(|| {
                EngineError::rule(
                    codes::PERIOD_ALREADY_LOCKED,
                    format!("payroll period {}-{:02} is already locked", year, month),
                )
            })?;

        let frozen = self.sessions.lock_sessions_in_period(from, to).await?;
        tracing::info!(year, month, %actor, frozen_sessions = frozen, "payroll period locked");
        Ok(period)
    }

    pub async fn unlock_period(
        &self,
        year: i32,
        month: u32,
        actor: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<PayrollPeriod, EngineError> {
        validate_unlock_reason(reason)
            .map_err(|e| EngineError::validation(format!("unlock reason: {}", e.code)))?;

        let (from, to) = month_bounds(year, month)?;
        let period = self
            .periods
            .unlock(year, month, reason, now)
            .await?
            .ok_or_else(|| {
                EngineError::rule(
                    codes::PERIOD_NOT_LOCKED,
                    format!("payroll period {}-{:02} is not locked", year, month),
                )
            })?;

        let thawed = self.sessions.unlock_sessions_in_period(from, to).await?;
        tracing::info!(
            year,
            month,
            %actor,
            reason,
            thawed_sessions = thawed,
            "payroll period unlocked"
        );
        Ok(period)
    }

    /// The admin work queue: everything flagged by the background sweeps.
    pub async fn pending_reviews(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        if from > to {
            return Err(EngineError::validation("from must be on or before to"));
        }
        self.records.list_pending_review(None, from, to).await
    }

    pub async fn review_attendance(
        &self,
        record_id: RecordId,
        reviewer: UserId,
        action: AttendanceReviewAction,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, EngineError> {
        let mut record = self
            .records
            .find_by_id(record_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("attendance record not found".into()))?;
        if !record.is_pending_review() {
            return Err(EngineError::rule(
                codes::NOT_PENDING_REVIEW,
                "record is not pending review",
            ));
        }

        assert_period_open(self.periods.as_ref(), record.date).await?;

        let outcome = match &action {
            AttendanceReviewAction::Accept => {
                record.review_accept(reviewer, notes, now);
                "accepted"
            }
            AttendanceReviewAction::Adjust {
                check_in,
                check_out,
            } => {
                if check_out <= check_in {
                    return Err(EngineError::validation(
                        "adjusted check-out must be after check-in",
                    ));
                }
                let working_hours = hours_between(*check_in, *check_out);
                let standard = self.standard_hours_for(record.user_id, now).await?;
                let overtime_hours = round_hours((working_hours - standard).max(0.0));
                record.review_adjust(
                    reviewer,
                    *check_in,
                    *check_out,
                    working_hours,
                    overtime_hours,
                    notes,
                    now,
                );
                "adjusted"
            }
            AttendanceReviewAction::Reject => {
                record.review_reject(reviewer, notes, now);
                "rejected"
            }
        };

        let updated = self.records.apply_review(&record).await.map_err(|err| {
            match err {
                EngineError::Conflict(_) => EngineError::rule(
                    codes::NOT_PENDING_REVIEW,
                    "record is not pending review",
                ),
                other => other,
            }
        })?;

        notify_best_effort(
            self.notifier.as_ref(),
            updated.user_id,
            NotificationKind::AttendanceReviewed,
            json!({
                "date": updated.date,
                "outcome": outcome,
                "working_hours": updated.working_hours,
                "status": updated.status,
            }),
        )
        .await;

        tracing::info!(
            user_id = %updated.user_id,
            %reviewer,
            date = %updated.date,
            outcome,
            "attendance review applied"
        );
        Ok(updated)
    }

    async fn standard_hours_for(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<f64, EngineError> {
        let user = self
            .directory
            .get_user(user_id)
            .await
            .map_err(EngineError::Internal)?
            .ok_or_else(|| EngineError::NotFound("user not found".into()))?;
        let department = user.department.ok_or_else(|| {
            EngineError::rule(codes::NO_DEPARTMENT, "user has no assigned department")
        })?;
        let timing = self.timings.get(&department, now).await?;
        Ok(timing.standard_hours())
    }
}
