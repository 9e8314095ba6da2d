//! Stale overtime session sweep.
//!
//! Runs daily, scanning a 3-calendar-day lookback window so late-night
//! sessions that were not yet 16 hours old at the first pass are still
//! caught. Only sessions older than the staleness threshold are touched;
//! legitimate overnight shifts stay open. A force-closed session carries
//! zero hours until review.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::error::EngineError;
use crate::models::ot_session::OtSession;
use crate::repositories::{OtSessionRepository, PayrollPeriodRepository};
use crate::services::leave::LeaveService;
use crate::services::notification::{notify_best_effort, NotificationKind, NotificationService};
use crate::services::review::assert_period_open;
use crate::utils::time::{end_of_day, utc_date_key};
use crate::workers::SweepSummary;

pub struct OtAutoCloseSweep {
    sessions: Arc<dyn OtSessionRepository>,
    leave: Arc<dyn LeaveService>,
    periods: Arc<dyn PayrollPeriodRepository>,
    notifier: Arc<dyn NotificationService>,
    config: Config,
}

impl OtAutoCloseSweep {
    pub fn new(
        sessions: Arc<dyn OtSessionRepository>,
        leave: Arc<dyn LeaveService>,
        periods: Arc<dyn PayrollPeriodRepository>,
        notifier: Arc<dyn NotificationService>,
        config: Config,
    ) -> Self {
        Self {
            sessions,
            leave,
            periods,
            notifier,
            config,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let today = utc_date_key(now);
        let from = today - Duration::days(self.config.sweep_lookback_days);
        let started_before = now - Duration::hours(self.config.ot_stale_session_hours);

        let stale = match self
            .sessions
            .list_stale_in_progress(started_before, from, today, self.config.sweep_batch_limit)
            .await
        {
            Ok(sessions) => sessions,
            Err(err) => {
                tracing::error!(error = %err, "ot auto-close sweep could not list sessions");
                summary.failed += 1;
                return summary;
            }
        };

        for session in stale {
            match self.process(session, now).await {
                Ok(true) => summary.processed += 1,
                Ok(false) => summary.skipped += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(error = %err, "ot auto-close failed for session");
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "ot auto-close sweep finished"
        );
        summary
    }

    async fn process(
        &self,
        mut session: OtSession,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        if !session.is_open() {
            return Ok(false);
        }

        if self
            .leave
            .has_approved_leave(session.user_id, session.date)
            .await
            .map_err(EngineError::Internal)?
        {
            return Ok(false);
        }

        match assert_period_open(self.periods.as_ref(), session.date).await {
            Ok(()) => {}
            Err(EngineError::PeriodLocked { .. }) => return Ok(false),
            Err(other) => return Err(other),
        }

        // Fixed end-of-day close keeps the bookkeeping inside the session's
        // calendar day; the real duration stays derivable for the reviewer.
        let close_at = end_of_day(session.date);
        session.auto_close(
            close_at,
            format!(
                "auto-closed: session still open after {} hours",
                self.config.ot_stale_session_hours
            ),
            now,
        );

        let updated = match self.sessions.finish(&session).await {
            Ok(updated) => updated,
            Err(EngineError::Conflict(_)) => return Ok(false),
            Err(other) => return Err(other),
        };

        notify_best_effort(
            self.notifier.as_ref(),
            updated.user_id,
            NotificationKind::OtSessionAutoClosed,
            json!({
                "date": updated.date,
                "session_number": updated.session_number,
                "needs_review": true,
            }),
        )
        .await;

        tracing::info!(
            user_id = %updated.user_id,
            date = %updated.date,
            session_number = updated.session_number,
            "overtime session auto-closed, pending review"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ot_session::{OtSessionStatus, OtType};
    use crate::repositories::ot_session::MockOtSessionRepository;
    use crate::repositories::payroll_period::MockPayrollPeriodRepository;
    use crate::services::leave::StaticLeave;
    use crate::services::notification::RecordingNotifier;
    use crate::types::UserId;
    use chrono::{NaiveDate, TimeZone};

    fn ts(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    fn open_session(user_id: UserId, d: u32, h: u32) -> OtSession {
        OtSession::new(
            user_id,
            NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            1,
            OtType::LateDeparture,
            ts(d, h, 0),
            ts(d, h, 0),
        )
    }

    fn sweep(
        sessions: MockOtSessionRepository,
        periods: MockPayrollPeriodRepository,
        leave: StaticLeave,
        notifier: Arc<RecordingNotifier>,
    ) -> OtAutoCloseSweep {
        OtAutoCloseSweep::new(
            Arc::new(sessions),
            Arc::new(leave),
            Arc::new(periods),
            notifier,
            Config::default(),
        )
    }

    #[tokio::test]
    async fn closes_stale_sessions_at_end_of_start_day_with_zero_hours() {
        let mut sessions = MockOtSessionRepository::new();
        let mut periods = MockPayrollPeriodRepository::new();
        periods.expect_find().returning(|_, _| Ok(None));
        let user = UserId::new();
        let stale = open_session(user, 14, 18);
        sessions
            .expect_list_stale_in_progress()
            .returning(move |_, _, _, _| Ok(vec![stale.clone()]));
        sessions
            .expect_finish()
            .withf(|session| {
                session.status == OtSessionStatus::PendingReview
                    && session.ot_hours == 0.0
                    && session.end_time
                        == Some(end_of_day(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()))
                    && session.auto_closed_at.is_some()
            })
            .returning(|session| Ok(session.clone()));
        let notifier = Arc::new(RecordingNotifier::new());

        let sweep = sweep(sessions, periods, StaticLeave::new(), notifier.clone());
        // Session started 18:00 on the 14th; it is now 20 hours later.
        let summary = sweep.run(ts(15, 14, 0)).await;
        assert_eq!(summary.processed, 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, NotificationKind::OtSessionAutoClosed);
    }

    #[tokio::test]
    async fn skips_sessions_on_approved_leave_days() {
        let mut sessions = MockOtSessionRepository::new();
        let periods = MockPayrollPeriodRepository::new();
        let leave = StaticLeave::new();
        let user = UserId::new();
        leave.grant(user, NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
        let stale = open_session(user, 14, 18);
        sessions
            .expect_list_stale_in_progress()
            .returning(move |_, _, _, _| Ok(vec![stale.clone()]));

        let sweep = sweep(sessions, periods, leave, Arc::new(RecordingNotifier::new()));
        let summary = sweep.run(ts(15, 14, 0)).await;
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn lost_close_races_are_counted_as_skipped() {
        let mut sessions = MockOtSessionRepository::new();
        let mut periods = MockPayrollPeriodRepository::new();
        periods.expect_find().returning(|_, _| Ok(None));
        let user = UserId::new();
        let stale = open_session(user, 14, 18);
        sessions
            .expect_list_stale_in_progress()
            .returning(move |_, _, _, _| Ok(vec![stale.clone()]));
        sessions
            .expect_finish()
            .returning(|_| Err(EngineError::Conflict("already closed".into())));

        let sweep = sweep(
            sessions,
            periods,
            StaticLeave::new(),
            Arc::new(RecordingNotifier::new()),
        );
        let summary = sweep.run(ts(15, 14, 0)).await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
    }
}
