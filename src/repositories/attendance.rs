//! Attendance record repository.
//!
//! Uniqueness of `(user_id, date)` and the "still open" / "still pending"
//! state guards live in the SQL, so every mutation is a single atomic
//! read-check-write regardless of how many engine instances run.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::connection::DbPool;
use crate::error::{map_unique_violation, EngineError};
use crate::models::attendance::AttendanceRecord;
use crate::types::{RecordId, UserId};

const SELECT_COLUMNS: &str = "id, user_id, date, attendance_type, check_in_time, check_out_time, \
     working_hours, overtime_hours, status, is_late, late_minutes, \
     check_in_location, check_out_location, check_in_photo, check_out_photo, check_out_reason, \
     auto_corrected, auto_correction_reason, original_check_out_time, \
     admin_review_status, admin_reviewed_by, admin_reviewed_at, admin_review_notes, \
     created_at, updated_at";

/// Repository trait for attendance records.
///
/// Mockable with `MockAttendanceRepository` in unit tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// Inserts a new record; a concurrent duplicate for the same
    /// `(user_id, date)` surfaces as a conflict.
    async fn insert(&self, record: &AttendanceRecord) -> Result<AttendanceRecord, EngineError>;

    async fn find_by_id(&self, id: RecordId) -> Result<Option<AttendanceRecord>, EngineError>;

    async fn find_by_user_and_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, EngineError>;

    /// Persists a user-driven checkout; fails with a conflict when the
    /// record was closed concurrently.
    async fn complete_check_out(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, EngineError>;

    /// Persists a sweep-driven forced checkout under the same
    /// still-open guard, plus the correction metadata.
    async fn apply_auto_correction(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, EngineError>;

    /// Persists a review outcome; only records still pending review accept it.
    async fn apply_review(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, EngineError>;

    /// Open (checked-in, not checked-out) records in a date window, for the
    /// auto-checkout sweep. Bounded by `limit`.
    async fn list_open_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> Result<Vec<AttendanceRecord>, EngineError>;

    /// Records awaiting admin review, optionally for one user.
    async fn list_pending_review(
        &self,
        user_id: Option<UserId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, EngineError>;

    /// Records safe for reports and payroll: everything except
    /// `admin_review_status = 'pending'`.
    async fn list_finalized_by_user_and_range(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, EngineError>;
}

#[derive(Clone)]
pub struct PgAttendanceRepository {
    pool: DbPool,
}

impl PgAttendanceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceRepository for PgAttendanceRepository {
    async fn insert(&self, record: &AttendanceRecord) -> Result<AttendanceRecord, EngineError> {
        let query = format!(
            "INSERT INTO attendance_records ({columns}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                     $17, $18, $19, $20, $21, $22, $23, $24, $25) \
             RETURNING {columns}",
            columns = SELECT_COLUMNS
        );
        sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(record.id)
            .bind(record.user_id)
            .bind(record.date)
            .bind(&record.attendance_type)
            .bind(record.check_in_time)
            .bind(record.check_out_time)
            .bind(record.working_hours)
            .bind(record.overtime_hours)
            .bind(record.status)
            .bind(record.is_late)
            .bind(record.late_minutes)
            .bind(&record.check_in_location)
            .bind(&record.check_out_location)
            .bind(&record.check_in_photo)
            .bind(&record.check_out_photo)
            .bind(&record.check_out_reason)
            .bind(record.auto_corrected)
            .bind(&record.auto_correction_reason)
            .bind(record.original_check_out_time)
            .bind(record.admin_review_status)
            .bind(record.admin_reviewed_by)
            .bind(record.admin_reviewed_at)
            .bind(&record.admin_review_notes)
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| {
                map_unique_violation(err, "attendance record already exists for this date")
            })
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<AttendanceRecord>, EngineError> {
        let query = format!(
            "SELECT {} FROM attendance_records WHERE id = $1",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_user_and_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, EngineError> {
        let query = format!(
            "SELECT {} FROM attendance_records WHERE user_id = $1 AND date = $2",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn complete_check_out(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, EngineError> {
        let query = format!(
            "UPDATE attendance_records SET \
                 check_out_time = $2, working_hours = $3, overtime_hours = $4, status = $5, \
                 check_out_location = $6, check_out_photo = $7, check_out_reason = $8, \
                 updated_at = $9 \
             WHERE id = $1 AND check_out_time IS NULL \
             RETURNING {}",
            SELECT_COLUMNS
        );
        sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(record.id)
            .bind(record.check_out_time)
            .bind(record.working_hours)
            .bind(record.overtime_hours)
            .bind(record.status)
            .bind(&record.check_out_location)
            .bind(&record.check_out_photo)
            .bind(&record.check_out_reason)
            .bind(record.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::Conflict("record was already checked out".into()))
    }

    async fn apply_auto_correction(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, EngineError> {
        let query = format!(
            "UPDATE attendance_records SET \
                 check_out_time = $2, working_hours = $3, overtime_hours = $4, \
                 auto_corrected = $5, auto_correction_reason = $6, \
                 admin_review_status = $7, updated_at = $8 \
             WHERE id = $1 AND check_out_time IS NULL \
             RETURNING {}",
            SELECT_COLUMNS
        );
        sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(record.id)
            .bind(record.check_out_time)
            .bind(record.working_hours)
            .bind(record.overtime_hours)
            .bind(record.auto_corrected)
            .bind(&record.auto_correction_reason)
            .bind(record.admin_review_status)
            .bind(record.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::Conflict("record was already checked out".into()))
    }

    async fn apply_review(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, EngineError> {
        let query = format!(
            "UPDATE attendance_records SET \
                 check_in_time = $2, check_out_time = $3, working_hours = $4, \
                 overtime_hours = $5, status = $6, original_check_out_time = $7, \
                 admin_review_status = $8, admin_reviewed_by = $9, admin_reviewed_at = $10, \
                 admin_review_notes = $11, updated_at = $12 \
             WHERE id = $1 AND admin_review_status = 'pending' \
             RETURNING {}",
            SELECT_COLUMNS
        );
        sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(record.id)
            .bind(record.check_in_time)
            .bind(record.check_out_time)
            .bind(record.working_hours)
            .bind(record.overtime_hours)
            .bind(record.status)
            .bind(record.original_check_out_time)
            .bind(record.admin_review_status)
            .bind(record.admin_reviewed_by)
            .bind(record.admin_reviewed_at)
            .bind(&record.admin_review_notes)
            .bind(record.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::Conflict("record is no longer pending review".into()))
    }

    async fn list_open_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        let query = format!(
            "SELECT {} FROM attendance_records \
             WHERE date BETWEEN $1 AND $2 \
               AND check_in_time IS NOT NULL AND check_out_time IS NULL \
             ORDER BY date, user_id LIMIT $3",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_pending_review(
        &self,
        user_id: Option<UserId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        use sqlx::{Postgres, QueryBuilder};
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM attendance_records WHERE admin_review_status = 'pending' \
             AND date BETWEEN ",
            SELECT_COLUMNS
        ));
        builder.push_bind(from);
        builder.push(" AND ").push_bind(to);
        if let Some(user_id) = user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        builder.push(" ORDER BY date, user_id");

        let rows = builder
            .build_query_as::<AttendanceRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_finalized_by_user_and_range(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        let query = format!(
            "SELECT {} FROM attendance_records \
             WHERE user_id = $1 AND date BETWEEN $2 AND $3 \
               AND admin_review_status <> 'pending' \
             ORDER BY date",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
