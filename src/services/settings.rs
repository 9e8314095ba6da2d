//! Company settings collaborator: the business-wide knobs the engine
//! consumes but does not own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanySettings {
    /// Company-default weekend weekday indices, 0 = Sunday. Department
    /// timing overrides these per department.
    pub weekend_days: Vec<i16>,
    /// Hard gate: daily OT beyond this total is withheld pending review.
    pub daily_ot_cap_hours: f64,
    pub default_ot_rate: f64,
    /// Payable-day divisor for the daily rate; never the calendar month
    /// length.
    pub standard_working_days: u32,
}

impl Default for CompanySettings {
    fn default() -> Self {
        Self {
            weekend_days: vec![0],
            daily_ot_cap_hours: 4.0,
            default_ot_rate: 1.5,
            standard_working_days: 26,
        }
    }
}

#[async_trait]
pub trait CompanySettingsService: Send + Sync {
    async fn get(&self) -> anyhow::Result<CompanySettings>;
}

/// Fixed settings for tests and wiring examples.
pub struct StaticSettings {
    settings: CompanySettings,
}

impl StaticSettings {
    pub fn new(settings: CompanySettings) -> Self {
        Self { settings }
    }
}

impl Default for StaticSettings {
    fn default() -> Self {
        Self::new(CompanySettings::default())
    }
}

#[async_trait]
impl CompanySettingsService for StaticSettings {
    async fn get(&self) -> anyhow::Result<CompanySettings> {
        Ok(self.settings.clone())
    }
}
