//! Forgotten-checkout repair sweep.
//!
//! Runs periodically (e.g. every 2 hours), scanning a short lookback window
//! for records still open past their shift end plus grace. Corrections are
//! bookkeeping, not pay: the record gets the department close time, zero
//! overtime, and goes to admin review before it can affect compensation.
//! Half-day auto-tagging never happens here; classification is the
//! reviewer's call.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::error::EngineError;
use crate::models::attendance::AttendanceRecord;
use crate::repositories::{AttendanceRepository, PayrollPeriodRepository};
use crate::services::directory::UserDirectory;
use crate::services::leave::LeaveService;
use crate::services::notification::{notify_best_effort, NotificationKind, NotificationService};
use crate::services::review::assert_period_open;
use crate::services::timing_store::DepartmentTimingStore;
use crate::utils::time::{hours_between, is_overdue, resolve_shift_instant, utc_date_key};
use crate::workers::SweepSummary;

pub struct AutoCheckoutSweep {
    records: Arc<dyn AttendanceRepository>,
    timings: Arc<DepartmentTimingStore>,
    directory: Arc<dyn UserDirectory>,
    leave: Arc<dyn LeaveService>,
    periods: Arc<dyn PayrollPeriodRepository>,
    notifier: Arc<dyn NotificationService>,
    config: Config,
}

impl AutoCheckoutSweep {
    pub fn new(
        records: Arc<dyn AttendanceRepository>,
        timings: Arc<DepartmentTimingStore>,
        directory: Arc<dyn UserDirectory>,
        leave: Arc<dyn LeaveService>,
        periods: Arc<dyn PayrollPeriodRepository>,
        notifier: Arc<dyn NotificationService>,
        config: Config,
    ) -> Self {
        Self {
            records,
            timings,
            directory,
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

        let open = match self
            .records
            .list_open_in_range(from, today, self.config.sweep_batch_limit)
            .await
        {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(error = %err, "auto-checkout sweep could not list open records");
                summary.failed += 1;
                return summary;
            }
        };

        for record in open {
            match self.process(record, now).await {
                Ok(true) => summary.processed += 1,
                Ok(false) => summary.skipped += 1,
                Err(err) => {
                    // One bad record must not abort the sweep.
                    summary.failed += 1;
                    tracing::warn!(error = %err, "auto-checkout failed for record");
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "auto-checkout sweep finished"
        );
        summary
    }

    async fn process(
        &self,
        mut record: AttendanceRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        // Re-running on an already-corrected record is a no-op.
        if record.is_checked_out() {
            return Ok(false);
        }
        let Some(check_in) = record.check_in_time else {
            return Ok(false);
        };

        if self
            .leave
            .has_approved_leave(record.user_id, record.date)
            .await
            .map_err(EngineError::Internal)?
        {
            return Ok(false);
        }

        match assert_period_open(self.periods.as_ref(), record.date).await {
            Ok(()) => {}
            Err(EngineError::PeriodLocked { .. }) => return Ok(false),
            Err(other) => return Err(other),
        }

        let user = self
            .directory
            .get_user(record.user_id)
            .await
            .map_err(EngineError::Internal)?
            .ok_or_else(|| EngineError::NotFound("user not found".into()))?;
        let department = user.department.ok_or_else(|| {
            EngineError::Configuration("user has no assigned department".into())
        })?;

        let timing = self.timings.get(&department, now).await?;
        let shift_end = timing.shift_end()?;
        let tz = &self.config.time_zone;

        if !is_overdue(
            check_in,
            shift_end,
            timing.auto_checkout_grace_minutes,
            now,
            tz,
        ) {
            return Ok(false);
        }

        let close_at = resolve_shift_instant(shift_end, check_in, tz);
        let working_hours = hours_between(check_in, close_at);
        record.apply_auto_checkout(
            close_at,
            working_hours,
            format!(
                "auto-checkout: no checkout within {} minutes of shift end",
                timing.auto_checkout_grace_minutes
            ),
            now,
        );

        let updated = match self.records.apply_auto_correction(&record).await {
            Ok(updated) => updated,
            // Another instance corrected it first.
            Err(EngineError::Conflict(_)) => return Ok(false),
            Err(other) => return Err(other),
        };

        notify_best_effort(
            self.notifier.as_ref(),
            updated.user_id,
            NotificationKind::CheckoutAutoCorrected,
            json!({
                "date": updated.date,
                "check_out_time": updated.check_out_time,
                "needs_review": true,
            }),
        )
        .await;

        tracing::info!(
            user_id = %updated.user_id,
            date = %updated.date,
            close_at = %close_at,
            "attendance auto-corrected, pending review"
        );
        Ok(true)
    }
}
