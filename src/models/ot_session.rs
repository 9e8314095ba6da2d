use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{SessionId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OtSession {
    pub id: SessionId,
    pub user_id: UserId,
    /// UTC date key of the day the session belongs to.
    pub date: NaiveDate,
    /// 1-based, sequential within the day.
    pub session_number: i32,
    pub ot_type: OtType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub ot_hours: f64,
    pub status: OtSessionStatus,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_action: Option<ReviewAction>,
    pub review_notes: Option<String>,
    pub original_ot_hours: Option<f64>,
    pub adjusted_ot_hours: Option<f64>,
    pub auto_closed_at: Option<DateTime<Utc>>,
    pub auto_closed_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OtType {
    EarlyArrival,
    LateDeparture,
    Weekend,
    Holiday,
}

impl OtType {
    /// Classification at session start, by priority:
    /// holiday > weekend > early arrival > late departure.
    pub fn classify(on_holiday: bool, on_weekend: bool, before_shift_start: bool) -> Self {
        if on_holiday {
            OtType::Holiday
        } else if on_weekend {
            OtType::Weekend
        } else if before_shift_start {
            OtType::EarlyArrival
        } else {
            OtType::LateDeparture
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OtSessionStatus {
    InProgress,
    Completed,
    PendingReview,
    Approved,
    Rejected,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approved,
    Adjusted,
    Rejected,
}

impl OtSession {
    pub fn new(
        user_id: UserId,
        date: NaiveDate,
        session_number: i32,
        ot_type: OtType,
        start_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            date,
            session_number,
            ot_type,
            start_time,
            end_time: None,
            ot_hours: 0.0,
            status: OtSessionStatus::InProgress,
            reviewed_by: None,
            reviewed_at: None,
            review_action: None,
            review_notes: None,
            original_ot_hours: None,
            adjusted_ot_hours: None,
            auto_closed_at: None,
            auto_closed_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OtSessionStatus::InProgress
    }

    pub fn is_reviewable(&self) -> bool {
        matches!(
            self.status,
            OtSessionStatus::PendingReview | OtSessionStatus::Completed
        )
    }

    /// Hours this session contributes to pay. Unreviewed and rejected
    /// sessions contribute nothing.
    pub fn payable_hours(&self) -> f64 {
        match self.status {
            OtSessionStatus::Completed | OtSessionStatus::Approved | OtSessionStatus::Locked => {
                self.ot_hours
            }
            _ => 0.0,
        }
    }

    /// Normal completion, within the daily cap.
    pub fn complete(&mut self, end_time: DateTime<Utc>, ot_hours: f64, now: DateTime<Utc>) {
        self.end_time = Some(end_time);
        self.ot_hours = ot_hours;
        self.status = OtSessionStatus::Completed;
        self.updated_at = now;
    }

    /// Completion that tripped the daily cap: the hours are recorded as zero
    /// until a human confirms, so unverified time is never paid. The raw
    /// duration stays recoverable from the timestamps.
    pub fn complete_pending_review(&mut self, end_time: DateTime<Utc>, now: DateTime<Utc>) {
        self.end_time = Some(end_time);
        self.ot_hours = 0.0;
        self.status = OtSessionStatus::PendingReview;
        self.updated_at = now;
    }

    /// Force-close by the stale-session sweep.
    pub fn auto_close(&mut self, end_time: DateTime<Utc>, note: String, now: DateTime<Utc>) {
        self.end_time = Some(end_time);
        self.ot_hours = 0.0;
        self.status = OtSessionStatus::PendingReview;
        self.auto_closed_at = Some(now);
        self.auto_closed_note = Some(note);
        self.updated_at = now;
    }

    /// The stored hours stand as submitted. For an auto-closed session that
    /// value is zero; granting pay requires an explicit adjustment.
    pub fn approve(&mut self, reviewer: UserId, notes: Option<String>, now: DateTime<Utc>) {
        self.finish_review(ReviewAction::Approved, reviewer, notes, now);
    }

    pub fn adjust(
        &mut self,
        reviewer: UserId,
        adjusted_hours: f64,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.original_ot_hours = Some(self.ot_hours);
        self.adjusted_ot_hours = Some(adjusted_hours);
        self.ot_hours = adjusted_hours;
        self.finish_review(ReviewAction::Adjusted, reviewer, notes, now);
    }

    pub fn reject(&mut self, reviewer: UserId, notes: Option<String>, now: DateTime<Utc>) {
        self.ot_hours = 0.0;
        self.finish_review(ReviewAction::Rejected, reviewer, notes, now);
    }

    fn finish_review(
        &mut self,
        action: ReviewAction,
        reviewer: UserId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status = match action {
            ReviewAction::Rejected => OtSessionStatus::Rejected,
            _ => OtSessionStatus::Approved,
        };
        self.review_action = Some(action);
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        self.review_notes = notes;
        self.updated_at = now;
    }
}
