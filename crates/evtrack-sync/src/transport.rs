//! # Batch Transport
//!
//! Delivers one batch to the collector and reports exactly one outcome.
//!
//! ## Outcome Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    POST {url}/events/batch_track                        │
//! │                    body: {"events": [...]}                              │
//! │                                                                         │
//! │  2xx ───────────────────► Ok(())           entries removed             │
//! │  5xx / 429 ─────────────► RequestRejected  retryable, entries kept     │
//! │  other 4xx ─────────────► RequestRejected  not retryable, entries kept │
//! │  refused / DNS / reset ─► ConnectionFailed retryable, entries kept     │
//! │  client timeout ────────► Timeout          retryable, entries kept     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use evtrack_core::BatchPayload;
use tracing::debug;

use crate::error::{TrackerError, TrackerResult};

/// Sends a batch to an endpoint.
///
/// Implementations must resolve each call to exactly one outcome. The tracker
/// bounds every call with its own send timeout as well.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, endpoint: &str, payload: &BatchPayload) -> TrackerResult<()>;
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// JSON-over-HTTP transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport whose requests give up after `timeout`.
    ///
    /// ## Errors
    /// [`TrackerError::InvalidConfig`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> TrackerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(HttpTransport { client, timeout })
    }

    fn map_send_error(&self, err: reqwest::Error) -> TrackerError {
        if err.is_timeout() {
            TrackerError::Timeout(self.timeout.as_millis() as u64)
        } else {
            TrackerError::ConnectionFailed(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: &str, payload: &BatchPayload) -> TrackerResult<()> {
        debug!(endpoint = %endpoint, count = payload.len(), "Posting batch");

        let response = self
            .client
            .post(endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        let message = serde_json::from_slice::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| String::from_utf8_lossy(&body).to_string());

        Err(TrackerError::RequestRejected {
            status: status.as_u16(),
            message,
        })
    }
}
