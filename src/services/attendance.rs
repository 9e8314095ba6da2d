//! Check-in/check-out state machine.
//!
//! A record moves `none → open → {present|late|half_day}` through the two
//! operations here; `pending` is reachable only from the auto-checkout
//! sweep and leaves only through admin review.

use chrono::{DateTime, Timelike, Utc};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{codes, EngineError};
use crate::models::attendance::{AttendanceRecord, AttendanceStatus};
use crate::repositories::{AttendanceRepository, PayrollPeriodRepository};
use crate::services::directory::{DirectoryUser, UserDirectory};
use crate::services::holiday::HolidayService;
use crate::services::review::assert_period_open;
use crate::services::timing_store::DepartmentTimingStore;
use crate::types::UserId;
use crate::utils::rate_limit::ActionRateLimiter;
use crate::utils::time::{
    hours_between, round_hours, shift_instant_same_day, utc_date_key,
};
use crate::validation::rules::validate_reason;

pub struct AttendanceService {
    records: Arc<dyn AttendanceRepository>,
    timings: Arc<DepartmentTimingStore>,
    directory: Arc<dyn UserDirectory>,
    holidays: Arc<dyn HolidayService>,
    periods: Arc<dyn PayrollPeriodRepository>,
    limiter: Arc<ActionRateLimiter>,
    config: Config,
}

impl AttendanceService {
    pub fn new(
        records: Arc<dyn AttendanceRepository>,
        timings: Arc<DepartmentTimingStore>,
        directory: Arc<dyn UserDirectory>,
        holidays: Arc<dyn HolidayService>,
        periods: Arc<dyn PayrollPeriodRepository>,
        limiter: Arc<ActionRateLimiter>,
        config: Config,
    ) -> Self {
        Self {
            records,
            timings,
            directory,
            holidays,
            periods,
            limiter,
            config,
        }
    }

    pub async fn check_in(
        &self,
        user_id: UserId,
        location: Option<String>,
        photo: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, EngineError> {
        self.limiter.check(user_id, now)?;

        let (_, department) = self.active_user_with_department(user_id).await?;
        let timing = self.timings.get(&department, now).await?;
        let date = utc_date_key(now);

        assert_period_open(self.periods.as_ref(), date).await?;

        let decision = self
            .holidays
            .check(date, Some(&department))
            .await
            .map_err(EngineError::Internal)?;
        if decision.is_holiday {
            let name = decision.name.unwrap_or_else(|| "company holiday".to_string());
            return Err(EngineError::rule(
                codes::HOLIDAY_CHECK_IN_BLOCKED,
                format!("today is {}; attendance check-in is closed", name),
            ));
        }

        if self
            .records
            .find_by_user_and_date(user_id, date)
            .await?
            .is_some()
        {
            return Err(EngineError::rule(
                codes::DUPLICATE_CHECK_IN,
                "already checked in today",
            ));
        }

        let shift_start = timing.shift_start()?;
        let expected = shift_instant_same_day(shift_start, now, &self.config.time_zone);
        let minutes_past_start = (now - expected).num_minutes();
        let is_late = minutes_past_start > timing.late_threshold_minutes;
        let late_minutes = if is_late { minutes_past_start } else { 0 };
        let status = if is_late {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        };

        let record = AttendanceRecord::new_checked_in(
            user_id, date, now, status, is_late, late_minutes, location, photo, now,
        );

        // The unique (user_id, date) index settles any race past the
        // duplicate check above.
        let created = self.records.insert(&record).await.map_err(|err| match err {
            EngineError::Conflict(_) => {
                EngineError::rule(codes::DUPLICATE_CHECK_IN, "already checked in today")
            }
            other => other,
        })?;

        tracing::info!(
            %user_id,
            %date,
            late = is_late,
            late_minutes,
            "check-in recorded"
        );
        Ok(created)
    }

    pub async fn check_out(
        &self,
        user_id: UserId,
        location: Option<String>,
        photo: Option<String>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, EngineError> {
        self.limiter.check(user_id, now)?;

        let (_, department) = self.active_user_with_department(user_id).await?;
        let timing = self.timings.get(&department, now).await?;

        let today = utc_date_key(now);
        let mut record = self.records.find_by_user_and_date(user_id, today).await?;

        // Overnight shifts: a checkout in the early morning may belong to
        // yesterday's record.
        if record.is_none() {
            let local_hour = now.with_timezone(&self.config.time_zone).hour();
            if local_hour < self.config.overnight_checkout_cutoff_hour {
                if let Some(yesterday) = today.pred_opt() {
                    record = self
                        .records
                        .find_by_user_and_date(user_id, yesterday)
                        .await?
                        .filter(|r| r.is_checked_in());
                }
            }
        }

        let mut record = match record {
            None => {
                return Err(EngineError::NotFound(
                    "no open attendance record found for today".into(),
                ))
            }
            Some(r) if r.is_checked_out() => {
                return Err(EngineError::rule(
                    codes::ALREADY_CHECKED_OUT,
                    "already checked out today",
                ))
            }
            Some(r) if r.check_in_time.is_none() => {
                return Err(EngineError::NotFound(
                    "no open attendance record found for today".into(),
                ))
            }
            Some(r) => r,
        };

        assert_period_open(self.periods.as_ref(), record.date).await?;

        let Some(check_in) = record.check_in_time else {
            return Err(EngineError::NotFound(
                "no open attendance record found for today".into(),
            ));
        };
        if now <= check_in {
            return Err(EngineError::validation(
                "check-out must be after check-in",
            ));
        }

        let working_hours = hours_between(check_in, now);
        let standard = timing.standard_hours();
        let overtime_hours = round_hours((working_hours - standard).max(0.0));

        if overtime_hours * 60.0 >= timing.overtime_threshold_minutes as f64 {
            let mut missing = Vec::new();
            if reason.as_deref().map(str::trim).unwrap_or("").is_empty() {
                missing.push("reason");
            }
            if photo.as_deref().map(str::trim).unwrap_or("").is_empty() {
                missing.push("photo");
            }
            if !missing.is_empty() {
                return Err(EngineError::rule(
                    codes::OVERTIME_PROOF_REQUIRED,
                    format!("overtime checkout requires: {}", missing.join(", ")),
                ));
            }
        }

        let mut status = record.status;
        if working_hours < standard * 0.5 {
            status = AttendanceStatus::HalfDay;
        } else if overtime_hours == 0.0 && working_hours < standard {
            // Early checkout: reason required, departure itself allowed.
            let reason_text = reason.as_deref().unwrap_or("");
            if validate_reason(reason_text).is_err() {
                return Err(EngineError::rule(
                    codes::EARLY_CHECKOUT_REASON_REQUIRED,
                    "leaving before standard hours requires a reason",
                ));
            }
            tracing::info!(%user_id, date = %record.date, working_hours, "early checkout");
        }

        record.apply_check_out(
            now,
            working_hours,
            overtime_hours,
            status,
            location,
            photo,
            reason,
            now,
        );

        let updated = self
            .records
            .complete_check_out(&record)
            .await
            .map_err(|err| match err {
                EngineError::Conflict(_) => EngineError::rule(
                    codes::ALREADY_CHECKED_OUT,
                    "already checked out today",
                ),
                other => other,
            })?;

        tracing::info!(
            %user_id,
            date = %updated.date,
            working_hours = updated.working_hours,
            overtime_hours = updated.overtime_hours,
            status = ?updated.status,
            "check-out recorded"
        );
        Ok(updated)
    }

    /// Attendance rows for reports; records awaiting review are excluded at
    /// the query, as at every other read site.
    pub async fn attendance_range(
        &self,
        user_id: UserId,
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        if from > to {
            return Err(EngineError::validation("from must be on or before to"));
        }
        self.records
            .list_finalized_by_user_and_range(user_id, from, to)
            .await
    }

    async fn active_user_with_department(
        &self,
        user_id: UserId,
    ) -> Result<(DirectoryUser, String), EngineError> {
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
        let department = user.department.clone().ok_or_else(|| {
            EngineError::rule(codes::NO_DEPARTMENT, "user has no assigned department")
        })?;
        Ok((user, department))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::department_timing::DepartmentTiming;
    use crate::repositories::attendance::MockAttendanceRepository;
    use crate::repositories::department_timing::MockDepartmentTimingRepository;
    use crate::repositories::payroll_period::MockPayrollPeriodRepository;
    use crate::services::directory::{StaffRole, StaticDirectory};
    use crate::services::holiday::{StaticHoliday, StaticHolidays};
    use chrono::{NaiveDate, TimeZone};

    fn ts(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    struct Fixture {
        records: MockAttendanceRepository,
        periods: MockPayrollPeriodRepository,
        directory: StaticDirectory,
        holidays: StaticHolidays,
        user_id: UserId,
    }

    impl Fixture {
        fn new() -> Self {
            let user_id = UserId::new();
            let directory = StaticDirectory::new();
            directory.insert(DirectoryUser {
                id: user_id,
                active: true,
                department: Some("ops".into()),
                role: StaffRole::Employee,
            });
            Self {
                records: MockAttendanceRepository::new(),
                periods: MockPayrollPeriodRepository::new(),
                directory,
                holidays: StaticHolidays::new(),
                user_id,
            }
        }

        fn open_period(&mut self) {
            self.periods.expect_find().returning(|_, _| Ok(None));
        }

        fn service(self) -> AttendanceService {
            let mut timing_repo = MockDepartmentTimingRepository::new();
            timing_repo
                .expect_find_by_department()
                .returning(|dept| Ok(Some(DepartmentTiming::default_for(dept))));
            AttendanceService::new(
                Arc::new(self.records),
                Arc::new(DepartmentTimingStore::new(Arc::new(timing_repo))),
                Arc::new(self.directory),
                Arc::new(self.holidays),
                Arc::new(self.periods),
                Arc::new(ActionRateLimiter::new(100, 60)),
                Config::default(),
            )
        }
    }

    #[tokio::test]
    async fn check_in_on_holiday_is_blocked_with_holiday_message() {
        let mut fx = Fixture::new();
        fx.open_period();
        fx.holidays.add(
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            StaticHoliday {
                name: "Founders Day".into(),
                allow_ot: true,
                departments: None,
            },
        );
        let user = fx.user_id;
        let service = fx.service();

        let err = service
            .check_in(user, None, None, ts(15, 9, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::HOLIDAY_CHECK_IN_BLOCKED);
        assert!(err.to_string().contains("Founders Day"));
    }

    #[tokio::test]
    async fn duplicate_check_in_is_rejected() {
        let mut fx = Fixture::new();
        fx.open_period();
        let user = fx.user_id;
        fx.records
            .expect_find_by_user_and_date()
            .returning(move |user_id, date| {
                Ok(Some(AttendanceRecord::new_checked_in(
                    user_id,
                    date,
                    ts(15, 9, 0),
                    AttendanceStatus::Present,
                    false,
                    0,
                    None,
                    None,
                    ts(15, 9, 0),
                )))
            });
        let service = fx.service();

        let err = service
            .check_in(user, None, None, ts(15, 10, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::DUPLICATE_CHECK_IN);
    }

    #[tokio::test]
    async fn late_check_in_records_minutes_past_shift_start() {
        let mut fx = Fixture::new();
        fx.open_period();
        let user = fx.user_id;
        fx.records
            .expect_find_by_user_and_date()
            .returning(|_, _| Ok(None));
        fx.records
            .expect_insert()
            .returning(|record| Ok(record.clone()));
        let service = fx.service();

        // Default shift starts 9:00 AM with a 15-minute threshold.
        let record = service
            .check_in(user, None, None, ts(15, 9, 40))
            .await
            .unwrap();
        assert!(record.is_late);
        assert_eq!(record.late_minutes, 40);
        assert_eq!(record.status, AttendanceStatus::Late);

        let on_time = service
            .check_in(user, None, None, ts(16, 9, 10))
            .await
            .unwrap();
        assert!(!on_time.is_late);
        assert_eq!(on_time.late_minutes, 0);
        assert_eq!(on_time.status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn check_out_computes_hours_and_tags_half_day() {
        let mut fx = Fixture::new();
        fx.open_period();
        let user = fx.user_id;
        fx.records
            .expect_find_by_user_and_date()
            .returning(move |user_id, date| {
                Ok(Some(AttendanceRecord::new_checked_in(
                    user_id,
                    date,
                    ts(15, 9, 0),
                    AttendanceStatus::Present,
                    false,
                    0,
                    None,
                    None,
                    ts(15, 9, 0),
                )))
            });
        fx.records
            .expect_complete_check_out()
            .returning(|record| Ok(record.clone()));
        let service = fx.service();

        // 9:00 → 12:00 is 3h against an 8h standard, under the 4h half-day
        // threshold.
        let record = service
            .check_out(
                user,
                None,
                None,
                Some("doctor appointment".into()),
                ts(15, 12, 0),
            )
            .await
            .unwrap();
        assert_eq!(record.working_hours, 3.0);
        assert_eq!(record.status, AttendanceStatus::HalfDay);
    }

    #[tokio::test]
    async fn overtime_checkout_requires_reason_and_photo() {
        let mut fx = Fixture::new();
        fx.open_period();
        let user = fx.user_id;
        fx.records
            .expect_find_by_user_and_date()
            .returning(move |user_id, date| {
                Ok(Some(AttendanceRecord::new_checked_in(
                    user_id,
                    date,
                    ts(15, 9, 0),
                    AttendanceStatus::Present,
                    false,
                    0,
                    None,
                    None,
                    ts(15, 9, 0),
                )))
            });
        let service = fx.service();

        // 9:00 → 19:00 is 10h against an 8h standard: 2h OT, past the
        // 30-minute threshold.
        let err = service
            .check_out(user, None, None, None, ts(15, 19, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::OVERTIME_PROOF_REQUIRED);
        assert!(err.to_string().contains("reason"));
        assert!(err.to_string().contains("photo"));
    }

    #[tokio::test]
    async fn check_out_without_open_record_is_not_found() {
        let mut fx = Fixture::new();
        let user = fx.user_id;
        fx.records
            .expect_find_by_user_and_date()
            .returning(|_, _| Ok(None));
        let service = fx.service();

        let err = service
            .check_out(user, None, None, None, ts(15, 18, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn early_morning_checkout_reaches_yesterdays_open_record() {
        let mut fx = Fixture::new();
        fx.open_period();
        let user = fx.user_id;
        let today = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        fx.records
            .expect_find_by_user_and_date()
            .returning(move |user_id, date| {
                if date == yesterday {
                    Ok(Some(AttendanceRecord::new_checked_in(
                        user_id,
                        date,
                        ts(15, 22, 0),
                        AttendanceStatus::Present,
                        false,
                        0,
                        None,
                        None,
                        ts(15, 22, 0),
                    )))
                } else {
                    Ok(None)
                }
            });
        fx.records
            .expect_complete_check_out()
            .returning(|record| Ok(record.clone()));
        let service = fx.service();

        // 2:00 AM on the 16th closes the record opened 10:00 PM on the 15th.
        let record = service
            .check_out(
                user,
                None,
                None,
                Some("overnight deployment".into()),
                ts(16, 2, 0),
            )
            .await
            .unwrap();
        assert_eq!(record.date, yesterday);
        assert_eq!(record.working_hours, 4.0);
        assert_ne!(record.date, today);
    }

    #[tokio::test]
    async fn locked_period_blocks_check_in() {
        let mut fx = Fixture::new();
        let user = fx.user_id;
        fx.periods.expect_find().returning(|year, month| {
            Ok(Some(crate::models::payroll_period::PayrollPeriod {
                year,
                month: month as i32,
                status: crate::models::payroll_period::PeriodStatus::Locked,
                locked_by: None,
                locked_at: None,
                unlock_reason: None,
                updated_at: ts(1, 0, 0),
            }))
        });
        let service = fx.service();

        let err = service
            .check_in(user, None, None, ts(15, 9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PeriodLocked { .. }));
    }
}
