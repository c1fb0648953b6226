//! Typed error hierarchy for lineboard.
//!
//! Three enums cover the three moving parts:
//! - `FetchError`: dashboard loads (network, HTTP status, decoding, timeout)
//! - `NotifierDeliveryError`: a subscriber handler failed during publish
//! - `ServerError`: floor API and storage failures

use std::time::Duration;

use lineboard_common::Topic;
use thiserror::Error;

/// Errors from fetching a snapshot for a dashboard widget.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Record source unavailable: {0}")]
    Unavailable(String),
}

/// A single subscriber failure. Other subscribers still receive the event.
#[derive(Debug, Clone, Error)]
pub enum NotifierDeliveryError {
    #[error("Subscriber {subscriber} failed on {topic}: {message}")]
    HandlerFailed {
        topic: Topic,
        subscriber: u64,
        message: String,
    },

    #[error("Subscriber {subscriber} panicked on {topic}")]
    HandlerPanicked { topic: Topic, subscriber: u64 },
}

/// Errors from the floor API and its storage.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Employee {id} not found")]
    EmployeeNotFound { id: i64 },

    #[error("Production plan {id} not found")]
    PlanNotFound { id: i64 },

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
