//! Core error types for daybreak-core.
//!
//! One enum per concern, with a top-level umbrella for callers that do not
//! care which layer failed.

use thiserror::Error;

use crate::surface::SurfaceState;

/// Core error type for daybreak-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Scheduling errors
    #[error("Scheduling error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Alarm surface errors
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Platform facility errors
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors surfaced by the scheduling façade.
///
/// `InvalidArgument` and `PermissionDenied` are synchronous caller errors and
/// are never retried. `Backend` wraps a rejection from the timer facility
/// itself.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// The caller omitted a required field or passed one out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The exact-scheduling grant is missing. Requires user action; the
    /// scheduler refuses rather than degrading to inexact timing.
    #[error("exact alarm scheduling is not permitted; the grant must be given in system settings")]
    PermissionDenied,

    /// The timer facility rejected the registration.
    #[error("scheduling backend rejected the request: {0}")]
    Backend(#[from] BackendError),
}

/// Failure reported by a platform facility (timer, wake, vibration,
/// notification, surface launch).
#[derive(Error, Debug)]
pub enum BackendError {
    /// The facility is not present or cannot be reached right now.
    #[error("{facility} unavailable: {message}")]
    Unavailable {
        facility: &'static str,
        message: String,
    },

    /// The facility was reached but refused or failed the request.
    #[error("{0}")]
    Failed(String),
}

/// Alarm surface lifecycle errors.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// A lifecycle transition the state machine does not permit.
    #[error("invalid surface transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: SurfaceState,
        to: SurfaceState,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed {
        path: std::path::PathBuf,
        message: String,
    },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed {
        path: std::path::PathBuf,
        message: String,
    },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// The configuration directory cannot be determined or created
    #[error("Failed to resolve configuration directory: {0}")]
    DirUnavailable(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
