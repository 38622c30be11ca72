//! # Error Types
//!
//! Domain-specific error types for evtrack-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  evtrack-core errors (this file)                                       │
//! │  ├── CoreError        - Malformed domain values                        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  evtrack-db errors (separate crate)                                    │
//! │  └── DbError          - Storage operation failures                     │
//! │                                                                         │
//! │  evtrack-sync errors (separate crate)                                  │
//! │  └── TrackerError     - Config, transport and delivery failures        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → TrackerError            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised while building domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A property bag was built from a JSON value that is not an object.
    ///
    /// ## When This Occurs
    /// - `Properties::from_value(json!([1, 2]))`
    /// - A stored trait map was overwritten with a scalar
    #[error("Properties must be a JSON object, got {0}")]
    InvalidProperties(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g. a separator inside a tracker name).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
