//! Multi-session overtime engine.
//!
//! A user can run several sessions in a day, but only one at a time, and no
//! session's hours reach payroll while any human confirmation is
//! outstanding. Leave is always authoritative: no overtime starts on an
//! approved leave day.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{codes, EngineError};
use crate::models::attendance::AttendanceRecord;
use crate::models::ot_session::{OtSession, OtType, ReviewAction};
use crate::repositories::{AttendanceRepository, OtSessionRepository, PayrollPeriodRepository};
use crate::services::directory::UserDirectory;
use crate::services::holiday::HolidayService;
use crate::services::leave::LeaveService;
use crate::services::notification::{notify_best_effort, NotificationKind, NotificationService};
use crate::services::review::assert_period_open;
use crate::services::settings::CompanySettingsService;
use crate::services::timing_store::DepartmentTimingStore;
use crate::types::{SessionId, UserId};
use crate::utils::rate_limit::ActionRateLimiter;
use crate::utils::time::{hours_between, shift_instant_same_day, utc_date_key};
use crate::validation::rules::validate_adjusted_hours;

pub struct OvertimeService {
    sessions: Arc<dyn OtSessionRepository>,
    records: Arc<dyn AttendanceRepository>,
    timings: Arc<DepartmentTimingStore>,
    directory: Arc<dyn UserDirectory>,
    holidays: Arc<dyn HolidayService>,
    leave: Arc<dyn LeaveService>,
    settings: Arc<dyn CompanySettingsService>,
    periods: Arc<dyn PayrollPeriodRepository>,
    notifier: Arc<dyn NotificationService>,
    limiter: Arc<ActionRateLimiter>,
    config: Config,
}

impl OvertimeService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn OtSessionRepository>,
        records: Arc<dyn AttendanceRepository>,
        timings: Arc<DepartmentTimingStore>,
        directory: Arc<dyn UserDirectory>,
        holidays: Arc<dyn HolidayService>,
        leave: Arc<dyn LeaveService>,
        settings: Arc<dyn CompanySettingsService>,
        periods: Arc<dyn PayrollPeriodRepository>,
        notifier: Arc<dyn NotificationService>,
        limiter: Arc<ActionRateLimiter>,
        config: Config,
    ) -> Self {
        Self {
            sessions,
            records,
            timings,
            directory,
            holidays,
            leave,
            settings,
            periods,
            notifier,
            limiter,
            config,
        }
    }

    pub async fn start(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<OtSession, EngineError> {
        self.limiter.check(user_id, now)?;

        let user = self
            .directory
            .get_user(user_id)
            .await
            .map_err(EngineError::Internal)?
            .ok_or_else(|| EngineError::NotFound("user not found".into()))?;
        if !user.active {
            return Err(EngineError::rule(
                codes::USER_INACTIVE,
                "user account is inactive",
            ));
        }
        let department = user.department.ok_or_else(|| {
            EngineError::rule(codes::NO_DEPARTMENT, "user has no assigned department")
        })?;

        let date = utc_date_key(now);

        if self
            .leave
            .has_approved_leave(user_id, date)
            .await
            .map_err(EngineError::Internal)?
        {
            return Err(EngineError::rule(
                codes::ON_LEAVE,
                "overtime cannot start on an approved leave day",
            ));
        }

        assert_period_open(self.periods.as_ref(), date).await?;

        let decision = self
            .holidays
            .check(date, Some(&department))
            .await
            .map_err(EngineError::Internal)?;
        if decision.is_holiday && !decision.allow_ot {
            let name = decision.name.unwrap_or_else(|| "company holiday".to_string());
            return Err(EngineError::rule(
                codes::OT_NOT_ALLOWED_ON_HOLIDAY,
                format!("overtime is not permitted on {}", name),
            ));
        }

        if self
            .sessions
            .find_in_progress_by_user(user_id)
            .await?
            .is_some()
        {
            return Err(EngineError::rule(
                codes::OT_SESSION_ALREADY_OPEN,
                "an overtime session is already in progress",
            ));
        }

        let timing = self.timings.get(&department, now).await?;
        let shift_start = timing.shift_start()?;
        let before_shift_start =
            now < shift_instant_same_day(shift_start, now, &self.config.time_zone);
        let ot_type = OtType::classify(
            decision.is_holiday,
            timing.is_weekly_off(date),
            before_shift_start,
        );

        // Weekend or holiday-only work: make sure the day has an attendance
        // record to hang the sessions off.
        if self
            .records
            .find_by_user_and_date(user_id, date)
            .await?
            .is_none()
        {
            let record = AttendanceRecord::new_for_overtime(user_id, date, now);
            match self.records.insert(&record).await {
                Ok(_) => {}
                Err(EngineError::Conflict(_)) => {}
                Err(other) => return Err(other),
            }
        }

        let session_number = self.sessions.next_session_number(user_id, date).await?;
        let session = OtSession::new(user_id, date, session_number, ot_type, now, now);

        let created = self.sessions.insert(&session).await.map_err(|err| match err {
            EngineError::Conflict(_) => EngineError::rule(
                codes::OT_SESSION_ALREADY_OPEN,
                "an overtime session is already in progress",
            ),
            other => other,
        })?;

        tracing::info!(
            %user_id,
            %date,
            session_number,
            ot_type = ?created.ot_type,
            "overtime session started"
        );
        Ok(created)
    }

    pub async fn end(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<OtSession, EngineError> {
        let mut session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("overtime session not found".into()))?;
        if !session.is_open() {
            return Err(EngineError::NotFound(
                "overtime session is not in progress".into(),
            ));
        }

        self.limiter.check(session.user_id, now)?;
        assert_period_open(self.periods.as_ref(), session.date).await?;

        if now <= session.start_time {
            return Err(EngineError::validation("end must be after start"));
        }

        let ot_hours = hours_between(session.start_time, now);
        let prior_hours = self
            .sessions
            .sum_payable_hours_for_day(session.user_id, session.date)
            .await?;
        let cap = self
            .settings
            .get()
            .await
            .map_err(EngineError::Internal)?
            .daily_ot_cap_hours;

        if prior_hours + ot_hours > cap {
            // Soft warning for the employee, hard gate on unverified pay.
            session.complete_pending_review(now, now);
            let updated = self.map_finish(&session).await?;
            notify_best_effort(
                self.notifier.as_ref(),
                updated.user_id,
                NotificationKind::OtDailyCapExceeded,
                json!({
                    "date": updated.date,
                    "session_number": updated.session_number,
                    "daily_cap_hours": cap,
                    "submitted_hours": ot_hours,
                }),
            )
            .await;
            tracing::info!(
                user_id = %updated.user_id,
                date = %updated.date,
                submitted_hours = ot_hours,
                cap,
                "overtime session held for review: daily cap exceeded"
            );
            return Ok(updated);
        }

        session.complete(now, ot_hours, now);
        let updated = self.map_finish(&session).await?;
        tracing::info!(
            user_id = %updated.user_id,
            date = %updated.date,
            ot_hours = updated.ot_hours,
            "overtime session completed"
        );
        Ok(updated)
    }

    pub async fn review(
        &self,
        session_id: SessionId,
        reviewer: UserId,
        action: ReviewAction,
        adjusted_hours: Option<f64>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<OtSession, EngineError> {
        let mut session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("overtime session not found".into()))?;
        if !session.is_reviewable() {
            return Err(EngineError::rule(
                codes::SESSION_NOT_REVIEWABLE,
                "only completed or pending-review sessions can be reviewed",
            ));
        }

        assert_period_open(self.periods.as_ref(), session.date).await?;

        match action {
            ReviewAction::Approved => {
                session.approve(reviewer, notes, now);
            }
            ReviewAction::Adjusted => {
                let hours = adjusted_hours.ok_or_else(|| {
                    EngineError::validation("adjusted_hours is required for an adjustment")
                })?;
                validate_adjusted_hours(hours)
                    .map_err(|e| EngineError::validation(format!("adjusted_hours: {}", e.code)))?;
                session.adjust(reviewer, hours, notes, now);
            }
            ReviewAction::Rejected => {
                session.reject(reviewer, notes, now);
            }
        }

        let updated = self.sessions.apply_review(&session).await.map_err(|err| {
            match err {
                EngineError::Conflict(_) => EngineError::rule(
                    codes::SESSION_NOT_REVIEWABLE,
                    "only completed or pending-review sessions can be reviewed",
                ),
                other => other,
            }
        })?;

        notify_best_effort(
            self.notifier.as_ref(),
            updated.user_id,
            NotificationKind::OtSessionReviewed,
            json!({
                "date": updated.date,
                "session_number": updated.session_number,
                "action": action,
                "ot_hours": updated.ot_hours,
            }),
        )
        .await;

        tracing::info!(
            user_id = %updated.user_id,
            %reviewer,
            date = %updated.date,
            action = ?action,
            ot_hours = updated.ot_hours,
            "overtime session reviewed"
        );
        Ok(updated)
    }

    /// The user's open session, if any.
    pub async fn current_session(&self, user_id: UserId) -> Result<Option<OtSession>, EngineError> {
        self.sessions.find_in_progress_by_user(user_id).await
    }

    pub async fn sessions_for_day(
        &self,
        user_id: UserId,
        date: chrono::NaiveDate,
    ) -> Result<Vec<OtSession>, EngineError> {
        self.sessions.list_by_user_and_date(user_id, date).await
    }

    async fn map_finish(&self, session: &OtSession) -> Result<OtSession, EngineError> {
        self.sessions.finish(session).await.map_err(|err| match err {
            EngineError::Conflict(_) => {
                EngineError::NotFound("overtime session is not in progress".into())
            }
            other => other,
        })
    }
}
