//! Shared harness for the scenario tests: in-memory repositories that
//! mirror the database guards (unique day key, single open session, state
//! guards on updates) plus a fully wired engine over static collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use timecard_engine::config::Config;
use timecard_engine::error::EngineError;
use timecard_engine::models::attendance::{AdminReviewStatus, AttendanceRecord};
use timecard_engine::models::department_timing::DepartmentTiming;
use timecard_engine::models::ot_session::{OtSession, OtSessionStatus};
use timecard_engine::models::payroll_period::{PayrollPeriod, PeriodStatus};
use timecard_engine::repositories::{
    AttendanceRepository, DepartmentTimingRepository, OtSessionRepository, PayrollPeriodRepository,
};
use timecard_engine::services::directory::{DirectoryUser, StaffRole, StaticDirectory};
use timecard_engine::services::holiday::StaticHolidays;
use timecard_engine::services::leave::StaticLeave;
use timecard_engine::services::notification::RecordingNotifier;
use timecard_engine::services::settings::StaticSettings;
use timecard_engine::services::{
    AttendanceService, DepartmentTimingStore, OvertimeService, PayrollService, ReviewService,
};
use timecard_engine::types::{RecordId, SessionId, UserId};
use timecard_engine::utils::rate_limit::ActionRateLimiter;
use timecard_engine::workers::{AutoCheckoutSweep, OtAutoCloseSweep};

pub fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn day(y: i32, mo: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, mo, d).unwrap()
}

#[derive(Default)]
pub struct MemoryAttendanceRepo {
    rows: Mutex<HashMap<RecordId, AttendanceRecord>>,
}

impl MemoryAttendanceRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: RecordId) -> Option<AttendanceRecord> {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }
}

#[async_trait]
impl AttendanceRepository for MemoryAttendanceRepo {
    async fn insert(&self, record: &AttendanceRecord) -> Result<AttendanceRecord, EngineError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        if rows
            .values()
            .any(|r| r.user_id == record.user_id && r.date == record.date)
        {
            return Err(EngineError::Conflict(
                "attendance record already exists for this date".into(),
            ));
        }
        rows.insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<AttendanceRecord>, EngineError> {
        Ok(self.get(id))
    }

    async fn find_by_user_and_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, EngineError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .values()
            .find(|r| r.user_id == user_id && r.date == date)
            .cloned())
    }

    async fn complete_check_out(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, EngineError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        match rows.get(&record.id) {
            Some(existing) if existing.check_out_time.is_none() => {
                rows.insert(record.id, record.clone());
                Ok(record.clone())
            }
            _ => Err(EngineError::Conflict("record was already checked out".into())),
        }
    }

    async fn apply_auto_correction(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, EngineError> {
        self.complete_check_out(record).await
    }

    async fn apply_review(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, EngineError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        match rows.get(&record.id) {
            Some(existing) if existing.admin_review_status == AdminReviewStatus::Pending => {
                rows.insert(record.id, record.clone());
                Ok(record.clone())
            }
            _ => Err(EngineError::Conflict(
                "record is no longer pending review".into(),
            )),
        }
    }

    async fn list_open_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut open: Vec<AttendanceRecord> = rows
            .values()
            .filter(|r| {
                r.date >= from
                    && r.date <= to
                    && r.check_in_time.is_some()
                    && r.check_out_time.is_none()
            })
            .cloned()
            .collect();
        open.sort_by_key(|r| r.date);
        open.truncate(limit as usize);
        Ok(open)
    }

    async fn list_pending_review(
        &self,
        user_id: Option<UserId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut pending: Vec<AttendanceRecord> = rows
            .values()
            .filter(|r| {
                r.admin_review_status == AdminReviewStatus::Pending
                    && r.date >= from
                    && r.date <= to
                    && user_id.map(|u| r.user_id == u).unwrap_or(true)
            })
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.date);
        Ok(pending)
    }

    async fn list_finalized_by_user_and_range(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut finalized: Vec<AttendanceRecord> = rows
            .values()
            .filter(|r| {
                r.user_id == user_id
                    && r.date >= from
                    && r.date <= to
                    && r.admin_review_status != AdminReviewStatus::Pending
            })
            .cloned()
            .collect();
        finalized.sort_by_key(|r| r.date);
        Ok(finalized)
    }
}

#[derive(Default)]
pub struct MemoryOtSessionRepo {
    rows: Mutex<HashMap<SessionId, OtSession>>,
}

impl MemoryOtSessionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: SessionId) -> Option<OtSession> {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }
}

#[async_trait]
impl OtSessionRepository for MemoryOtSessionRepo {
    async fn insert(&self, session: &OtSession) -> Result<OtSession, EngineError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        if session.status == OtSessionStatus::InProgress
            && rows
                .values()
                .any(|s| s.user_id == session.user_id && s.status == OtSessionStatus::InProgress)
        {
            return Err(EngineError::Conflict(
                "an overtime session is already open".into(),
            ));
        }
        rows.insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<OtSession>, EngineError> {
        Ok(self.get(id))
    }

    async fn find_in_progress_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<OtSession>, EngineError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .values()
            .find(|s| s.user_id == user_id && s.status == OtSessionStatus::InProgress)
            .cloned())
    }

    async fn next_session_number(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<i32, EngineError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let max = rows
            .values()
            .filter(|s| s.user_id == user_id && s.date == date)
            .map(|s| s.session_number)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    async fn finish(&self, session: &OtSession) -> Result<OtSession, EngineError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        match rows.get(&session.id) {
            Some(existing) if existing.status == OtSessionStatus::InProgress => {
                rows.insert(session.id, session.clone());
                Ok(session.clone())
            }
            _ => Err(EngineError::Conflict(
                "overtime session is no longer open".into(),
            )),
        }
    }

    async fn apply_review(&self, session: &OtSession) -> Result<OtSession, EngineError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        match rows.get(&session.id) {
            Some(existing)
                if matches!(
                    existing.status,
                    OtSessionStatus::PendingReview | OtSessionStatus::Completed
                ) =>
            {
                rows.insert(session.id, session.clone());
                Ok(session.clone())
            }
            _ => Err(EngineError::Conflict(
                "overtime session is not reviewable".into(),
            )),
        }
    }

    async fn sum_payable_hours_for_day(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<f64, EngineError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .values()
            .filter(|s| {
                s.user_id == user_id
                    && s.date == date
                    && matches!(
                        s.status,
                        OtSessionStatus::Completed
                            | OtSessionStatus::Approved
                            | OtSessionStatus::Locked
                    )
            })
            .map(|s| s.ot_hours)
            .sum())
    }

    async fn list_by_user_and_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Vec<OtSession>, EngineError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut sessions: Vec<OtSession> = rows
            .values()
            .filter(|s| s.user_id == user_id && s.date == date)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.session_number);
        Ok(sessions)
    }

    async fn list_stale_in_progress(
        &self,
        started_before: DateTime<Utc>,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> Result<Vec<OtSession>, EngineError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut stale: Vec<OtSession> = rows
            .values()
            .filter(|s| {
                s.status == OtSessionStatus::InProgress
                    && s.start_time < started_before
                    && s.date >= from
                    && s.date <= to
            })
            .cloned()
            .collect();
        stale.sort_by_key(|s| s.start_time);
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn lock_sessions_in_period(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, EngineError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut count = 0;
        for session in rows.values_mut() {
            if session.date >= from
                && session.date <= to
                && matches!(
                    session.status,
                    OtSessionStatus::Completed | OtSessionStatus::Approved
                )
            {
                session.status = OtSessionStatus::Locked;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn unlock_sessions_in_period(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, EngineError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let mut count = 0;
        for session in rows.values_mut() {
            if session.date >= from && session.date <= to && session.status == OtSessionStatus::Locked
            {
                session.status = OtSessionStatus::Approved;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[derive(Default)]
pub struct MemoryTimingRepo {
    rows: Mutex<HashMap<String, DepartmentTiming>>,
}

impl MemoryTimingRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DepartmentTimingRepository for MemoryTimingRepo {
    async fn find_by_department(
        &self,
        department: &str,
    ) -> Result<Option<DepartmentTiming>, EngineError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(department).cloned())
    }

    async fn upsert(&self, timing: &DepartmentTiming) -> Result<DepartmentTiming, EngineError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.insert(timing.department.clone(), timing.clone());
        Ok(timing.clone())
    }
}

#[derive(Default)]
pub struct MemoryPeriodRepo {
    rows: Mutex<HashMap<(i32, i32), PayrollPeriod>>,
}

impl MemoryPeriodRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayrollPeriodRepository for MemoryPeriodRepo {
    async fn find(&self, year: i32, month: u32) -> Result<Option<PayrollPeriod>, EngineError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(&(year, month as i32)).cloned())
    }

    async fn lock(
        &self,
        year: i32,
        month: u32,
        locked_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<PayrollPeriod>, EngineError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let key = (year, month as i32);
        if rows.get(&key).map(|p| p.is_locked()).unwrap_or(false) {
            return Ok(None);
        }
        let period = PayrollPeriod {
            year,
            month: month as i32,
            status: PeriodStatus::Locked,
            locked_by: Some(locked_by),
            locked_at: Some(now),
            unlock_reason: rows.get(&key).and_then(|p| p.unlock_reason.clone()),
            updated_at: now,
        };
        rows.insert(key, period.clone());
        Ok(Some(period))
    }

    async fn unlock(
        &self,
        year: i32,
        month: u32,
        unlock_reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PayrollPeriod>, EngineError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let key = (year, month as i32);
        match rows.get(&key) {
            Some(period) if period.is_locked() => {
                let mut period = period.clone();
                period.status = PeriodStatus::Open;
                period.unlock_reason = Some(unlock_reason.to_string());
                period.updated_at = now;
                rows.insert(key, period.clone());
                Ok(Some(period))
            }
            _ => Ok(None),
        }
    }
}

/// A fully wired engine over in-memory storage and static collaborators.
pub struct Engine {
    pub attendance: AttendanceService,
    pub overtime: OvertimeService,
    pub review: ReviewService,
    pub payroll: PayrollService,
    pub auto_checkout: AutoCheckoutSweep,
    pub ot_auto_close: OtAutoCloseSweep,
    pub records: Arc<MemoryAttendanceRepo>,
    pub sessions: Arc<MemoryOtSessionRepo>,
    pub timing_repo: Arc<MemoryTimingRepo>,
    pub periods: Arc<MemoryPeriodRepo>,
    pub directory: Arc<StaticDirectory>,
    pub holidays: Arc<StaticHolidays>,
    pub leave: Arc<StaticLeave>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Engine {
    pub fn new() -> Self {
        let records = Arc::new(MemoryAttendanceRepo::new());
        let sessions = Arc::new(MemoryOtSessionRepo::new());
        let timing_repo = Arc::new(MemoryTimingRepo::new());
        let periods = Arc::new(MemoryPeriodRepo::new());
        let directory = Arc::new(StaticDirectory::new());
        let holidays = Arc::new(StaticHolidays::new());
        let leave = Arc::new(StaticLeave::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let settings = Arc::new(StaticSettings::default());
        let timings = Arc::new(DepartmentTimingStore::new(timing_repo.clone()));
        // Generous limit: scenarios fire many operations back to back.
        let limiter = Arc::new(ActionRateLimiter::new(1_000, 60));
        let config = Config::default();

        let attendance = AttendanceService::new(
            records.clone(),
            timings.clone(),
            directory.clone(),
            holidays.clone(),
            periods.clone(),
            limiter.clone(),
            config.clone(),
        );
        let overtime = OvertimeService::new(
            sessions.clone(),
            records.clone(),
            timings.clone(),
            directory.clone(),
            holidays.clone(),
            leave.clone(),
            settings.clone(),
            periods.clone(),
            notifier.clone(),
            limiter.clone(),
            config.clone(),
        );
        let review = ReviewService::new(
            records.clone(),
            sessions.clone(),
            periods.clone(),
            directory.clone(),
            timings.clone(),
            notifier.clone(),
        );
        let payroll = PayrollService::new(
            records.clone(),
            directory.clone(),
            holidays.clone(),
            settings.clone(),
            timings.clone(),
        );
        let auto_checkout = AutoCheckoutSweep::new(
            records.clone(),
            timings.clone(),
            directory.clone(),
            leave.clone(),
            periods.clone(),
            notifier.clone(),
            config.clone(),
        );
        let ot_auto_close = OtAutoCloseSweep::new(
            sessions.clone(),
            leave.clone(),
            periods.clone(),
            notifier.clone(),
            config,
        );

        Self {
            attendance,
            overtime,
            review,
            payroll,
            auto_checkout,
            ot_auto_close,
            records,
            sessions,
            timing_repo,
            periods,
            directory,
            holidays,
            leave,
            notifier,
        }
    }

    pub fn add_user(&self, department: &str) -> UserId {
        let id = UserId::new();
        self.directory.insert(DirectoryUser {
            id,
            active: true,
            department: Some(department.to_string()),
            role: StaffRole::Employee,
        });
        id
    }

    pub fn add_admin(&self) -> UserId {
        let id = UserId::new();
        self.directory.insert(DirectoryUser {
            id,
            active: true,
            department: Some("hr".to_string()),
            role: StaffRole::Admin,
        });
        id
    }
}
