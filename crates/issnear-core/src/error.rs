//! Core error types for issnear-core.
//!
//! Nothing in the monitoring loop is fatal: every error below is either
//! logged and absorbed by the session, or returned to a caller outside the
//! loop (configuration loading, one-shot CLI commands).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::permissions::Capability;

/// Core error type for issnear-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Device or target position errors
    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    /// Permission query errors
    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    /// Notification dispatch errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Could not locate or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Failure to obtain a coordinate, either for the device or the tracked object.
#[derive(Error, Debug)]
pub enum PositionError {
    /// No fix could be produced (no provider, no configured location, ...)
    #[error("Position unavailable: {0}")]
    Unavailable(String),

    /// Transport failure talking to a remote feed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The feed answered but reported something other than success
    #[error("Feed reported status '{status}'")]
    Status { status: String },

    /// The feed payload could not be understood
    #[error("Malformed position payload: {0}")]
    Parse(String),

    /// The payload parsed but the coordinate is out of range
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(#[from] ValidationError),
}

/// Failure of a single permission query.
#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("Permission query for {capability} failed: {message}")]
    QueryFailed {
        capability: Capability,
        message: String,
    },
}

/// Failure to hand a notification to the platform.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The receiving endpoint refused the notification
    #[error("Notification rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The sink has nowhere to deliver to
    #[error("Notification sink not configured: {0}")]
    NotConfigured(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Value outside its allowed range
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// The four classes of non-fatal failure the monitor can run into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    PermissionDenied,
    AcquisitionFailure,
    PollFailure,
    NotificationDispatchFailure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::PermissionDenied => "permission_denied",
            FailureKind::AcquisitionFailure => "acquisition_failure",
            FailureKind::PollFailure => "poll_failure",
            FailureKind::NotificationDispatchFailure => "notification_dispatch_failure",
        };
        f.write_str(s)
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
