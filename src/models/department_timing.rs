use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::EngineError;
use crate::utils::time::{parse_shift_time, ShiftTime};

/// Per-department shift configuration. Shift boundaries are canonical
/// 12-hour strings ("9:00 AM"); they are parsed on use and a malformed
/// value fails the operation instead of defaulting.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DepartmentTiming {
    pub department: String,
    pub check_in_time: String,
    pub check_out_time: String,
    /// Standard payable hours in a full working day.
    pub working_hours: i32,
    pub overtime_threshold_minutes: i64,
    pub late_threshold_minutes: i64,
    pub auto_checkout_grace_minutes: i64,
    /// Weekday indices, 0 = Sunday.
    pub weekly_off_days: Vec<i16>,
    pub updated_at: DateTime<Utc>,
}

impl DepartmentTiming {
    /// The hardcoded fallback for unconfigured departments. The engine must
    /// never operate with an undefined shift boundary.
    pub fn default_for(department: &str) -> Self {
        Self {
            department: department.to_string(),
            check_in_time: "9:00 AM".to_string(),
            check_out_time: "6:00 PM".to_string(),
            working_hours: 8,
            overtime_threshold_minutes: 30,
            late_threshold_minutes: 15,
            auto_checkout_grace_minutes: 120,
            weekly_off_days: vec![0],
            updated_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    pub fn shift_start(&self) -> Result<ShiftTime, EngineError> {
        parse_shift_time(&self.check_in_time)
    }

    pub fn shift_end(&self) -> Result<ShiftTime, EngineError> {
        parse_shift_time(&self.check_out_time)
    }

    pub fn is_weekly_off(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday().num_days_from_sunday() as i16;
        self.weekly_off_days.contains(&weekday)
    }

    pub fn standard_hours(&self) -> f64 {
        self.working_hours as f64
    }
}
