//! Department timing repository.

use async_trait::async_trait;

use crate::db::connection::DbPool;
use crate::error::EngineError;
use crate::models::department_timing::DepartmentTiming;

const SELECT_COLUMNS: &str = "department, check_in_time, check_out_time, working_hours, \
     overtime_threshold_minutes, late_threshold_minutes, auto_checkout_grace_minutes, \
     weekly_off_days, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DepartmentTimingRepository: Send + Sync {
    async fn find_by_department(
        &self,
        department: &str,
    ) -> Result<Option<DepartmentTiming>, EngineError>;

    async fn upsert(&self, timing: &DepartmentTiming) -> Result<DepartmentTiming, EngineError>;
}

#[derive(Clone)]
pub struct PgDepartmentTimingRepository {
    pool: DbPool,
}

impl PgDepartmentTimingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DepartmentTimingRepository for PgDepartmentTimingRepository {
    async fn find_by_department(
        &self,
        department: &str,
    ) -> Result<Option<DepartmentTiming>, EngineError> {
        let query = format!(
            "SELECT {} FROM department_timings WHERE department = $1",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, DepartmentTiming>(&query)
            .bind(department)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn upsert(&self, timing: &DepartmentTiming) -> Result<DepartmentTiming, EngineError> {
        let query = format!(
            "INSERT INTO department_timings ({columns}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (department) DO UPDATE SET \
                 check_in_time = EXCLUDED.check_in_time, \
                 check_out_time = EXCLUDED.check_out_time, \
                 working_hours = EXCLUDED.working_hours, \
                 overtime_threshold_minutes = EXCLUDED.overtime_threshold_minutes, \
                 late_threshold_minutes = EXCLUDED.late_threshold_minutes, \
                 auto_checkout_grace_minutes = EXCLUDED.auto_checkout_grace_minutes, \
                 weekly_off_days = EXCLUDED.weekly_off_days, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {columns}",
            columns = SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, DepartmentTiming>(&query)
            .bind(&timing.department)
            .bind(&timing.check_in_time)
            .bind(&timing.check_out_time)
            .bind(timing.working_hours)
            .bind(timing.overtime_threshold_minutes)
            .bind(timing.late_threshold_minutes)
            .bind(timing.auto_checkout_grace_minutes)
            .bind(&timing.weekly_off_days)
            .bind(timing.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }
}
