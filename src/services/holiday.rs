//! Company holiday collaborator.
//!
//! Holidays may be department-scoped and may individually allow or forbid
//! overtime work; the decision struct carries both facts so call sites
//! never re-derive them.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolidayDecision {
    pub is_holiday: bool,
    pub name: Option<String>,
    /// Whether overtime work is permitted on this holiday.
    pub allow_ot: bool,
}

impl HolidayDecision {
    pub fn working_day() -> Self {
        Self {
            is_holiday: false,
            name: None,
            allow_ot: true,
        }
    }
}

#[async_trait]
pub trait HolidayService: Send + Sync {
    /// Decision for `date`, filtered to `department` when the holiday is
    /// department-scoped.
    async fn check(
        &self,
        date: NaiveDate,
        department: Option<&str>,
    ) -> anyhow::Result<HolidayDecision>;
}

#[derive(Debug, Clone)]
pub struct StaticHoliday {
    pub name: String,
    pub allow_ot: bool,
    /// `None` applies company-wide.
    pub departments: Option<Vec<String>>,
}

/// Fixed in-memory holiday calendar for tests and wiring examples.
pub struct StaticHolidays {
    holidays: Mutex<HashMap<NaiveDate, StaticHoliday>>,
}

impl StaticHolidays {
    pub fn new() -> Self {
        Self {
            holidays: Mutex::new(HashMap::new()),
        }
    }

    pub fn add(&self, date: NaiveDate, holiday: StaticHoliday) {
        self.holidays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(date, holiday);
    }
}

impl Default for StaticHolidays {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HolidayService for StaticHolidays {
    async fn check(
        &self,
        date: NaiveDate,
        department: Option<&str>,
    ) -> anyhow::Result<HolidayDecision> {
        let holidays = self.holidays.lock().unwrap_or_else(|e| e.into_inner());
        let Some(holiday) = holidays.get(&date) else {
            return Ok(HolidayDecision::working_day());
        };
        let applies = match (&holiday.departments, department) {
            (None, _) => true,
            (Some(scoped), Some(dept)) => scoped.iter().any(|d| d == dept),
            (Some(_), None) => false,
        };
        if applies {
            Ok(HolidayDecision {
                is_holiday: true,
                name: Some(holiday.name.clone()),
                allow_ot: holiday.allow_ot,
            })
        } else {
            Ok(HolidayDecision::working_day())
        }
    }
}
