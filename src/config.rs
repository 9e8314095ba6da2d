use anyhow::anyhow;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    /// Company time zone; shift boundaries are interpreted in this zone.
    pub time_zone: Tz,
    /// Checkouts before this local hour also consider yesterday's open
    /// record (overnight shifts).
    pub overnight_checkout_cutoff_hour: u32,
    /// An in-progress OT session older than this is force-closed by the sweep.
    pub ot_stale_session_hours: i64,
    /// Calendar-day lookback window for both background sweeps.
    pub sweep_lookback_days: i64,
    /// Per-run iteration cap for background sweeps.
    pub sweep_batch_limit: i64,
    pub rate_limit_user_max_requests: u32,
    pub rate_limit_user_window_seconds: u64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/timecard".to_string());

        let time_zone_name = env::var("APP_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let time_zone: Tz = time_zone_name
            .parse()
            .map_err(|_| anyhow!("Invalid APP_TIMEZONE value: {}", time_zone_name))?;

        Ok(Config {
            database_url,
            time_zone,
            overnight_checkout_cutoff_hour: parse_or(
                env::var("OVERNIGHT_CHECKOUT_CUTOFF_HOUR").ok(),
                6,
            ),
            ot_stale_session_hours: parse_or(env::var("OT_STALE_SESSION_HOURS").ok(), 16),
            sweep_lookback_days: parse_or(env::var("SWEEP_LOOKBACK_DAYS").ok(), 3),
            sweep_batch_limit: parse_or(env::var("SWEEP_BATCH_LIMIT").ok(), 500),
            rate_limit_user_max_requests: parse_or(env::var("RATE_LIMIT_USER_MAX_REQUESTS").ok(), 6),
            rate_limit_user_window_seconds: parse_or(
                env::var("RATE_LIMIT_USER_WINDOW_SECONDS").ok(),
                60,
            ),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "postgres://localhost/timecard".to_string(),
            time_zone: chrono_tz::UTC,
            overnight_checkout_cutoff_hour: 6,
            ot_stale_session_hours: 16,
            sweep_lookback_days: 3,
            sweep_batch_limit: 500,
            rate_limit_user_max_requests: 6,
            rate_limit_user_window_seconds: 60,
        }
    }
}

fn parse_or<T: FromStr + Copy>(raw: Option<String>, default: T) -> T {
    raw.and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
