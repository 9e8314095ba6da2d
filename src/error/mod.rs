//! Engine error taxonomy.
//!
//! Every failure the engine surfaces carries a stable machine-readable code
//! so callers can tell "needs more input" apart from "not permitted" without
//! parsing messages. Configuration failures must fail the operation; the
//! engine never substitutes a guessed value for an unparseable shift boundary.

use thiserror::Error;

/// Stable business-rule codes surfaced alongside human-readable messages.
pub mod codes {
    pub const HOLIDAY_CHECK_IN_BLOCKED: &str = "HOLIDAY_CHECK_IN_BLOCKED";
    pub const DUPLICATE_CHECK_IN: &str = "DUPLICATE_CHECK_IN";
    pub const ALREADY_CHECKED_OUT: &str = "ALREADY_CHECKED_OUT";
    pub const USER_INACTIVE: &str = "USER_INACTIVE";
    pub const NO_DEPARTMENT: &str = "NO_DEPARTMENT";
    pub const OVERTIME_PROOF_REQUIRED: &str = "OVERTIME_PROOF_REQUIRED";
    pub const EARLY_CHECKOUT_REASON_REQUIRED: &str = "EARLY_CHECKOUT_REASON_REQUIRED";
    pub const ON_LEAVE: &str = "ON_LEAVE";
    pub const OT_NOT_ALLOWED_ON_HOLIDAY: &str = "OT_NOT_ALLOWED_ON_HOLIDAY";
    pub const OT_SESSION_ALREADY_OPEN: &str = "OT_SESSION_ALREADY_OPEN";
    pub const SESSION_NOT_REVIEWABLE: &str = "SESSION_NOT_REVIEWABLE";
    pub const NOT_PENDING_REVIEW: &str = "NOT_PENDING_REVIEW";
    pub const PERIOD_ALREADY_LOCKED: &str = "PERIOD_ALREADY_LOCKED";
    pub const PERIOD_NOT_LOCKED: &str = "PERIOD_NOT_LOCKED";
    pub const PENDING_REVIEWS_BLOCK_PAYROLL: &str = "PENDING_REVIEWS_BLOCK_PAYROLL";
    pub const FORCE_NOT_PERMITTED: &str = "FORCE_NOT_PERMITTED";
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or malformed caller input; user-correctable.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A business rule blocked the operation.
    #[error("{message}")]
    Rule {
        code: &'static str,
        message: String,
    },

    #[error("{0}")]
    NotFound(String),

    /// Payroll for the period has been finalized; mutations are refused
    /// until an explicit unlock.
    #[error("payroll period {year}-{month:02} is locked")]
    PeriodLocked { year: i32, month: u32 },

    /// Shift configuration could not be resolved. Callers must treat this
    /// as "cannot determine, do not act automatically".
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Lost a write race against a uniqueness or state guard.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn rule(code: &'static str, message: impl Into<String>) -> Self {
        EngineError::Rule {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(vec![message.into()])
    }

    /// Machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::Rule { code, .. } => code,
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::PeriodLocked { .. } => "PERIOD_LOCKED",
            EngineError::Configuration(_) => "CONFIGURATION_ERROR",
            EngineError::RateLimited { .. } => "RATE_LIMITED",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::Database(_) => "DATABASE_ERROR",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying with corrected input can succeed (4xx-class).
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::Rule { .. }
                | EngineError::NotFound(_)
                | EngineError::RateLimited { .. }
        )
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter()
                    .map(move |e| format!("{}: {}", field, e.code.as_ref()))
            })
            .collect();
        EngineError::Validation(messages)
    }
}

/// Maps a Postgres unique-constraint violation onto a stable conflict error;
/// all other database errors pass through unchanged.
pub fn map_unique_violation(err: sqlx::Error, conflict: &str) -> EngineError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return EngineError::Conflict(conflict.to_string());
        }
    }
    EngineError::Database(err)
}
