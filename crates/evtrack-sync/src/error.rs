//! # Tracker Error Types
//!
//! Error types for configuration, delivery and storage failures.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tracker Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Storage             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Storage                │ │
//! │  │  MissingUrl     │  │  RequestRejected│  │                         │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │    Identity     │                                                   │
//! │  │                 │                                                   │
//! │  │  NotInitialized │                                                   │
//! │  │  InvalidInput   │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use evtrack_core::ValidationError;
use evtrack_db::DbError;
use thiserror::Error;

/// Result type alias for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Tracker error type covering all tracker failures.
#[derive(Debug, Error)]
pub enum TrackerError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid tracker configuration.
    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    /// No collection endpoint configured.
    #[error("Collection URL not configured. Set [tracker] url or EVTRACK_URL.")]
    MissingUrl,

    /// Endpoint URL is unparsable or not http(s).
    #[error("Invalid collection URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The collector could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The collector answered with a non-success status.
    #[error("Batch rejected with status {status}: {message}")]
    RequestRejected { status: u16, message: String },

    /// The send did not complete in time.
    #[error("Batch send timed out after {0} ms")]
    Timeout(u64),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Persistent or session storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    // =========================================================================
    // Identity Errors
    // =========================================================================
    /// `register` was called before `initialize`.
    ///
    /// ## When This Occurs
    /// - No generated identity has ever been created under this tracker name
    #[error("Tracker '{0}' has no generated identity; call initialize first")]
    NotInitialized(String),

    /// Caller input failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for TrackerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NoGeneratedIdentity { name } => TrackerError::NotInitialized(name),
            DbError::Validation(e) => TrackerError::InvalidInput(e),
            other => TrackerError::Storage(other.to_string()),
        }
    }
}

impl From<url::ParseError> for TrackerError {
    fn from(err: url::ParseError) -> Self {
        TrackerError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for TrackerError {
    fn from(err: toml::de::Error) -> Self {
        TrackerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for TrackerError {
    fn from(err: toml::ser::Error) -> Self {
        TrackerError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl TrackerError {
    /// Returns true if the failed batch is expected to succeed on a later flush.
    ///
    /// ## Retryable Errors
    /// - Connection failures
    /// - Timeouts
    /// - 5xx and 429 responses
    ///
    /// ## Non-Retryable Errors
    /// - Other 4xx responses
    /// - Configuration and input errors
    pub fn is_retryable(&self) -> bool {
        match self {
            TrackerError::ConnectionFailed(_) | TrackerError::Timeout(_) => true,
            TrackerError::RequestRejected { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TrackerError::InvalidConfig(_)
                | TrackerError::MissingUrl
                | TrackerError::InvalidUrl(_)
                | TrackerError::ConfigLoadFailed(_)
                | TrackerError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(TrackerError::ConnectionFailed("refused".into()).is_retryable());
        assert!(TrackerError::Timeout(30_000).is_retryable());
        assert!(TrackerError::RequestRejected {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(TrackerError::RequestRejected {
            status: 429,
            message: "slow down".into()
        }
        .is_retryable());

        assert!(!TrackerError::RequestRejected {
            status: 400,
            message: "bad".into()
        }
        .is_retryable());
        assert!(!TrackerError::MissingUrl.is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(TrackerError::MissingUrl.is_config_error());
        assert!(TrackerError::InvalidUrl("ftp://x".into()).is_config_error());
        assert!(!TrackerError::Timeout(1).is_config_error());
    }

    #[test]
    fn test_db_error_mapping() {
        let err: TrackerError = DbError::NoGeneratedIdentity {
            name: "EventTracker".into(),
        }
        .into();
        assert!(matches!(err, TrackerError::NotInitialized(ref n) if n == "EventTracker"));

        let err: TrackerError = DbError::QueryFailed("locked".into()).into();
        assert!(matches!(err, TrackerError::Storage(_)));
    }
}
