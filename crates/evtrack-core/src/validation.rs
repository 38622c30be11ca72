//! # Validation
//!
//! Input validation for values supplied by the host application.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Where Validation Happens                           │
//! │                                                                         │
//! │  track("")            ──► validate_event_type ──► rejected, logged     │
//! │  identify("", ..)     ──► validate_user_id    ──► Err to caller        │
//! │  config.name = "a::b" ──► validate_tracker_name ─► Err at build time   │
//! │                                                                         │
//! │  An invalid event type never enters the durable queue.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::KEY_SEPARATOR;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of an explicit user id.
pub const MAX_USER_ID_LEN: usize = 255;

/// Maximum length of a tracker name.
pub const MAX_TRACKER_NAME_LEN: usize = 64;

/// Validates an event type. Only the empty string is rejected; any other
/// string, however long or blank, is a valid type.
///
/// ```rust
/// use evtrack_core::validation::validate_event_type;
///
/// assert!(validate_event_type("submission").is_ok());
/// assert!(validate_event_type("  ").is_ok());
/// assert!(validate_event_type("").is_err());
/// ```
pub fn validate_event_type(event_type: &str) -> ValidationResult<()> {
    if event_type.is_empty() {
        return Err(ValidationError::Required {
            field: "event_type".to_string(),
        });
    }
    Ok(())
}

/// Validates the id passed to `identify`.
pub fn validate_user_id(user_id: &str) -> ValidationResult<()> {
    validate_required_text("user_id", user_id, MAX_USER_ID_LEN)
}

/// Validates a tracker name.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Must not contain the `::` key separator
/// - Letters, digits, `-`, `_` and `.` only
pub fn validate_tracker_name(name: &str) -> ValidationResult<()> {
    validate_required_text("name", name, MAX_TRACKER_NAME_LEN)?;

    if name.contains(KEY_SEPARATOR) {
        return Err(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: format!("must not contain '{KEY_SEPARATOR}'"),
        });
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: "must contain only letters, numbers, '-', '_' and '.'".to_string(),
        });
    }

    Ok(())
}

fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        assert!(validate_event_type("submission").is_ok());
        assert_eq!(
            validate_event_type(""),
            Err(ValidationError::Required {
                field: "event_type".into()
            })
        );
        assert!(validate_event_type(" ").is_ok());
        assert!(validate_event_type(&"x".repeat(1000)).is_ok());
    }

    #[test]
    fn test_user_id() {
        assert!(validate_user_id("foo@example.com").is_ok());
        assert!(validate_user_id(" ").is_err());
    }

    #[test]
    fn test_tracker_name() {
        assert!(validate_tracker_name("EventTracker").is_ok());
        assert!(validate_tracker_name("app.web-1_beta").is_ok());
        assert!(validate_tracker_name("").is_err());
        assert!(matches!(
            validate_tracker_name("a::b"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(validate_tracker_name("has space").is_err());
    }
}
