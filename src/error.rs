//! Unified error hierarchy for zonetime
//!
//! Distinguishes fatal fetch-cycle errors (authorization, store availability)
//! from errors contained at session or sample scope, and integrates with the
//! tracing system.

use thiserror::Error;

/// Top-level error type for all zonetime operations
#[derive(Debug, Error)]
pub enum ZoneTimeError {
    /// Health data source errors
    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    /// Time-weighted aggregation errors
    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    /// Invalid heart rate measurements
    #[error("Measurement error: {0}")]
    Measurement(#[from] MeasurementError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors reported by a `HealthDataSource`.
///
/// `AuthorizationDenied` and `Unavailable` are fatal for a whole fetch
/// cycle; `QueryFailed` is scoped to a single session's sample query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The user has not granted read access to health data
    #[error("Health data access not authorized")]
    AuthorizationDenied,

    /// The store cannot be reached at all
    #[error("Health data source unavailable: {reason}")]
    Unavailable { reason: String },

    /// A single query failed
    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },
}

impl SourceError {
    /// Fatal errors abort the whole fetch cycle; the rest degrade a single
    /// session to an empty aggregate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SourceError::AuthorizationDenied | SourceError::Unavailable { .. }
        )
    }
}

/// Contract violations detected while accumulating zone durations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AggregationError {
    /// Samples were not in ascending timestamp order
    #[error("Samples out of order at index {index}")]
    UnorderedSamples { index: usize },

    /// An adjacent sample pair went backwards in time
    #[error("Non-monotonic time between samples at index {index}")]
    NonMonotonicTime { index: usize },
}

/// Invalid measurement values
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MeasurementError {
    /// Heart rate below zero or not a number
    #[error("Invalid heart rate measurement: {bpm}")]
    InvalidMeasurement { bpm: f64 },
}

/// Result type alias for zonetime operations
pub type Result<T> = std::result::Result<T, ZoneTimeError>;

impl ZoneTimeError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ZoneTimeError::Source(SourceError::Unavailable { .. })
                | ZoneTimeError::Source(SourceError::QueryFailed { .. })
                | ZoneTimeError::Io(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ZoneTimeError::Source(SourceError::QueryFailed { .. }) => ErrorSeverity::Warning,
            ZoneTimeError::Measurement(_) => ErrorSeverity::Warning,
            ZoneTimeError::Source(_) => ErrorSeverity::Error,
            ZoneTimeError::Configuration(_) => ErrorSeverity::Error,
            ZoneTimeError::Aggregation(_) => ErrorSeverity::Critical,
            ZoneTimeError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ZoneTimeError::Source(SourceError::AuthorizationDenied) => {
                "Health data access has not been granted. Please authorize access and try again."
                    .to_string()
            }
            ZoneTimeError::Source(SourceError::Unavailable { .. }) => {
                "The health data store is currently unavailable. Please try again later."
                    .to_string()
            }
            ZoneTimeError::Source(SourceError::QueryFailed { reason }) => {
                format!("Could not read heart rate data: {}", reason)
            }
            ZoneTimeError::Configuration(reason) => {
                format!("Configuration problem: {}", reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Contract violation or internal defect
    Critical,
    /// Error that prevents the operation but the system can continue
    Error,
    /// Degraded result, operation still completed
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
