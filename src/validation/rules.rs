//! Common validation rules shared across engine operations.

use validator::ValidationError;

/// Minimum length for user-supplied reasons (overtime proof, early checkout).
pub const MIN_REASON_LEN: usize = 5;

/// Minimum length for a payroll-period unlock reason; short reasons make
/// the audit trail useless.
pub const MIN_UNLOCK_REASON_LEN: usize = 10;

/// Validates a user-supplied reason.
pub fn validate_reason(reason: &str) -> Result<(), ValidationError> {
    if reason.trim().len() < MIN_REASON_LEN {
        return Err(ValidationError::new("reason_too_short"));
    }
    Ok(())
}

/// Validates a payroll-period unlock reason.
pub fn validate_unlock_reason(reason: &str) -> Result<(), ValidationError> {
    if reason.trim().len() < MIN_UNLOCK_REASON_LEN {
        return Err(ValidationError::new("unlock_reason_too_short"));
    }
    Ok(())
}

/// Validates admin-adjusted overtime hours.
///
/// Requirements:
/// - Greater than 0, at most 24.0 hours
pub fn validate_adjusted_hours(hours: f64) -> Result<(), ValidationError> {
    if !(hours > 0.0 && hours <= 24.0) {
        return Err(ValidationError::new("adjusted_hours_out_of_range"));
    }
    Ok(())
}
