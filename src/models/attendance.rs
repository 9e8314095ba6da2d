use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{RecordId, UserId};

/// Classification applied to every record at creation. The legacy per-type
/// selection is retired; new records are always created the same way.
pub const ATTENDANCE_TYPE_ON_SITE: &str = "on_site";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub user_id: UserId,
    /// UTC date key; immutable once created, unique per user.
    pub date: NaiveDate,
    pub attendance_type: String,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub working_hours: f64,
    pub overtime_hours: f64,
    pub status: AttendanceStatus,
    pub is_late: bool,
    pub late_minutes: i64,
    pub check_in_location: Option<String>,
    pub check_out_location: Option<String>,
    pub check_in_photo: Option<String>,
    pub check_out_photo: Option<String>,
    pub check_out_reason: Option<String>,
    pub auto_corrected: bool,
    pub auto_correction_reason: Option<String>,
    /// Pre-adjustment checkout, preserved when an admin adjusts an
    /// auto-corrected record.
    pub original_check_out_time: Option<DateTime<Utc>>,
    pub admin_review_status: AdminReviewStatus,
    pub admin_reviewed_by: Option<UserId>,
    pub admin_reviewed_at: Option<DateTime<Utc>>,
    pub admin_review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    HalfDay,
    Absent,
    Holiday,
    WeeklyOff,
}

impl Default for AttendanceStatus {
    fn default() -> Self {
        AttendanceStatus::Present
    }
}

impl AttendanceStatus {
    /// Fractional contribution of one day to the payable-day total.
    pub fn payable_weight(&self) -> f64 {
        match self {
            AttendanceStatus::HalfDay => 0.5,
            AttendanceStatus::Present
            | AttendanceStatus::Late
            | AttendanceStatus::Holiday
            | AttendanceStatus::WeeklyOff => 1.0,
            AttendanceStatus::Absent => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdminReviewStatus {
    None,
    Pending,
    Accepted,
    Adjusted,
    Rejected,
}

impl Default for AdminReviewStatus {
    fn default() -> Self {
        AdminReviewStatus::None
    }
}

impl AttendanceRecord {
    /// A record created by a successful check-in.
    #[allow(clippy::too_many_arguments)]
    pub fn new_checked_in(
        user_id: UserId,
        date: NaiveDate,
        check_in_time: DateTime<Utc>,
        status: AttendanceStatus,
        is_late: bool,
        late_minutes: i64,
        location: Option<String>,
        photo: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status,
            is_late,
            late_minutes,
            check_in_time: Some(check_in_time),
            check_in_location: location,
            check_in_photo: photo,
            ..Self::blank(user_id, date, now)
        }
    }

    /// A record created as a side effect of starting overtime on a day with
    /// no attendance yet (weekend or holiday-only work).
    pub fn new_for_overtime(user_id: UserId, date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self::blank(user_id, date, now)
    }

    /// A virtual record injected by payroll enrichment; never persisted.
    pub fn statutory(
        user_id: UserId,
        date: NaiveDate,
        status: AttendanceStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status,
            ..Self::blank(user_id, date, now)
        }
    }

    fn blank(user_id: UserId, date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            user_id,
            date,
            attendance_type: ATTENDANCE_TYPE_ON_SITE.to_string(),
            check_in_time: None,
            check_out_time: None,
            working_hours: 0.0,
            overtime_hours: 0.0,
            status: AttendanceStatus::Present,
            is_late: false,
            late_minutes: 0,
            check_in_location: None,
            check_out_location: None,
            check_in_photo: None,
            check_out_photo: None,
            check_out_reason: None,
            auto_corrected: false,
            auto_correction_reason: None,
            original_check_out_time: None,
            admin_review_status: AdminReviewStatus::None,
            admin_reviewed_by: None,
            admin_reviewed_at: None,
            admin_review_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_checked_in(&self) -> bool {
        self.check_in_time.is_some() && self.check_out_time.is_none()
    }

    pub fn is_checked_out(&self) -> bool {
        self.check_out_time.is_some()
    }

    pub fn is_pending_review(&self) -> bool {
        self.admin_review_status == AdminReviewStatus::Pending
    }

    /// A user-driven checkout.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_check_out(
        &mut self,
        check_out_time: DateTime<Utc>,
        working_hours: f64,
        overtime_hours: f64,
        status: AttendanceStatus,
        location: Option<String>,
        photo: Option<String>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.check_out_time = Some(check_out_time);
        self.working_hours = working_hours;
        self.overtime_hours = overtime_hours;
        self.status = status;
        self.check_out_location = location;
        self.check_out_photo = photo;
        self.check_out_reason = reason;
        self.updated_at = now;
    }

    /// A sweep-driven forced checkout. The status classification is left to
    /// human review; no overtime is granted.
    pub fn apply_auto_checkout(
        &mut self,
        check_out_time: DateTime<Utc>,
        working_hours: f64,
        reason: String,
        now: DateTime<Utc>,
    ) {
        self.check_out_time = Some(check_out_time);
        self.working_hours = working_hours;
        self.overtime_hours = 0.0;
        self.auto_corrected = true;
        self.auto_correction_reason = Some(reason);
        self.admin_review_status = AdminReviewStatus::Pending;
        self.updated_at = now;
    }

    pub fn review_accept(&mut self, reviewer: UserId, notes: Option<String>, now: DateTime<Utc>) {
        self.status = AttendanceStatus::Present;
        self.finish_review(AdminReviewStatus::Accepted, reviewer, notes, now);
    }

    /// Replaces the recorded times with reviewer-supplied ones, preserving
    /// the pre-adjustment checkout for the audit trail.
    #[allow(clippy::too_many_arguments)]
    pub fn review_adjust(
        &mut self,
        reviewer: UserId,
        check_in_time: DateTime<Utc>,
        check_out_time: DateTime<Utc>,
        working_hours: f64,
        overtime_hours: f64,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.original_check_out_time = self.check_out_time;
        self.check_in_time = Some(check_in_time);
        self.check_out_time = Some(check_out_time);
        self.working_hours = working_hours;
        self.overtime_hours = overtime_hours;
        self.finish_review(AdminReviewStatus::Adjusted, reviewer, notes, now);
    }

    pub fn review_reject(&mut self, reviewer: UserId, notes: Option<String>, now: DateTime<Utc>) {
        self.status = AttendanceStatus::Absent;
        self.check_out_time = None;
        self.working_hours = 0.0;
        self.overtime_hours = 0.0;
        self.finish_review(AdminReviewStatus::Rejected, reviewer, notes, now);
    }

    fn finish_review(
        &mut self,
        outcome: AdminReviewStatus,
        reviewer: UserId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.admin_review_status = outcome;
        self.admin_reviewed_by = Some(reviewer);
        self.admin_reviewed_at = Some(now);
        self.admin_review_notes = notes;
        self.updated_at = now;
    }
}
