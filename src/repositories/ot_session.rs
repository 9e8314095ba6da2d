//! Overtime session repository.
//!
//! The single-open-session invariant is enforced by a partial unique index
//! on `(user_id) WHERE status = 'in_progress'`; state transitions carry
//! their expected-status guard in the `WHERE` clause.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::db::connection::DbPool;
use crate::error::{map_unique_violation, EngineError};
use crate::models::ot_session::OtSession;
use crate::types::{SessionId, UserId};

const SELECT_COLUMNS: &str = "id, user_id, date, session_number, ot_type, start_time, end_time, \
     ot_hours, status, reviewed_by, reviewed_at, review_action, review_notes, \
     original_ot_hours, adjusted_ot_hours, auto_closed_at, auto_closed_note, \
     created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OtSessionRepository: Send + Sync {
    /// Inserts an in-progress session; a second open session for the same
    /// user surfaces as a conflict.
    async fn insert(&self, session: &OtSession) -> Result<OtSession, EngineError>;

    async fn find_by_id(&self, id: SessionId) -> Result<Option<OtSession>, EngineError>;

    async fn find_in_progress_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<OtSession>, EngineError>;

    /// Next 1-based session number for the day.
    async fn next_session_number(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<i32, EngineError>;

    /// Persists the end of a session; only in-progress sessions accept it.
    async fn finish(&self, session: &OtSession) -> Result<OtSession, EngineError>;

    /// Persists a review outcome; only reviewable sessions accept it.
    async fn apply_review(&self, session: &OtSession) -> Result<OtSession, EngineError>;

    /// Sum of the day's payable session hours (completed, approved, locked).
    async fn sum_payable_hours_for_day(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<f64, EngineError>;

    async fn list_by_user_and_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Vec<OtSession>, EngineError>;

    /// In-progress sessions started before `started_before` within a date
    /// window, for the auto-close sweep. Bounded by `limit`.
    async fn list_stale_in_progress(
        &self,
        started_before: DateTime<Utc>,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> Result<Vec<OtSession>, EngineError>;

    /// Freezes a locked payroll period's finalized sessions.
    async fn lock_sessions_in_period(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, EngineError>;

    /// Thaws a period's sessions on explicit unlock.
    async fn unlock_sessions_in_period(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, EngineError>;
}

#[derive(Clone)]
pub struct PgOtSessionRepository {
    pool: DbPool,
}

impl PgOtSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtSessionRepository for PgOtSessionRepository {
    async fn insert(&self, session: &OtSession) -> Result<OtSession, EngineError> {
        let query = format!(
            "INSERT INTO ot_sessions ({columns}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                     $17, $18, $19) \
             RETURNING {columns}",
            columns = SELECT_COLUMNS
        );
        sqlx::query_as::<_, OtSession>(&query)
            .bind(session.id)
            .bind(session.user_id)
            .bind(session.date)
            .bind(session.session_number)
            .bind(session.ot_type)
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(session.ot_hours)
            .bind(session.status)
            .bind(session.reviewed_by)
            .bind(session.reviewed_at)
            .bind(session.review_action)
            .bind(&session.review_notes)
            .bind(session.original_ot_hours)
            .bind(session.adjusted_ot_hours)
            .bind(session.auto_closed_at)
            .bind(&session.auto_closed_note)
            .bind(session.created_at)
            .bind(session.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| map_unique_violation(err, "an overtime session is already open"))
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<OtSession>, EngineError> {
        let query = format!("SELECT {} FROM ot_sessions WHERE id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, OtSession>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_in_progress_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<OtSession>, EngineError> {
        let query = format!(
            "SELECT {} FROM ot_sessions WHERE user_id = $1 AND status = 'in_progress'",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, OtSession>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn next_session_number(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<i32, EngineError> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(session_number) FROM ot_sessions WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(max.unwrap_or(0) + 1)
    }

    async fn finish(&self, session: &OtSession) -> Result<OtSession, EngineError> {
        let query = format!(
            "UPDATE ot_sessions SET \
                 end_time = $2, ot_hours = $3, status = $4, \
                 auto_closed_at = $5, auto_closed_note = $6, updated_at = $7 \
             WHERE id = $1 AND status = 'in_progress' \
             RETURNING {}",
            SELECT_COLUMNS
        );
        sqlx::query_as::<_, OtSession>(&query)
            .bind(session.id)
            .bind(session.end_time)
            .bind(session.ot_hours)
            .bind(session.status)
            .bind(session.auto_closed_at)
            .bind(&session.auto_closed_note)
            .bind(session.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::Conflict("overtime session is no longer open".into()))
    }

    async fn apply_review(&self, session: &OtSession) -> Result<OtSession, EngineError> {
        let query = format!(
            "UPDATE ot_sessions SET \
                 ot_hours = $2, status = $3, reviewed_by = $4, reviewed_at = $5, \
                 review_action = $6, review_notes = $7, original_ot_hours = $8, \
                 adjusted_ot_hours = $9, updated_at = $10 \
             WHERE id = $1 AND status IN ('pending_review', 'completed') \
             RETURNING {}",
            SELECT_COLUMNS
        );
        sqlx::query_as::<_, OtSession>(&query)
            .bind(session.id)
            .bind(session.ot_hours)
            .bind(session.status)
            .bind(session.reviewed_by)
            .bind(session.reviewed_at)
            .bind(session.review_action)
            .bind(&session.review_notes)
            .bind(session.original_ot_hours)
            .bind(session.adjusted_ot_hours)
            .bind(session.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::Conflict("overtime session is not reviewable".into()))
    }

    async fn sum_payable_hours_for_day(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<f64, EngineError> {
        let total: Option<f64> = sqlx::query_scalar(
            "SELECT SUM(ot_hours) FROM ot_sessions \
             WHERE user_id = $1 AND date = $2 \
               AND status IN ('completed', 'approved', 'locked')",
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(total.unwrap_or(0.0))
    }

    async fn list_by_user_and_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Vec<OtSession>, EngineError> {
        let query = format!(
            "SELECT {} FROM ot_sessions WHERE user_id = $1 AND date = $2 ORDER BY session_number",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, OtSession>(&query)
            .bind(user_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_stale_in_progress(
        &self,
        started_before: DateTime<Utc>,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> Result<Vec<OtSession>, EngineError> {
        let query = format!(
            "SELECT {} FROM ot_sessions \
             WHERE status = 'in_progress' AND start_time < $1 AND date BETWEEN $2 AND $3 \
             ORDER BY start_time LIMIT $4",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, OtSession>(&query)
            .bind(started_before)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn lock_sessions_in_period(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, EngineError> {
        let result = sqlx::query(
            "UPDATE ot_sessions SET status = 'locked' \
             WHERE date BETWEEN $1 AND $2 AND status IN ('completed', 'approved')",
        )
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn unlock_sessions_in_period(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, EngineError> {
        let result = sqlx::query(
            "UPDATE ot_sessions SET status = 'approved' \
             WHERE date BETWEEN $1 AND $2 AND status = 'locked'",
        )
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
