// Library interface for zonetime modules
// This allows integration tests to access the core functionality

pub mod aggregate;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod source;
pub mod zones;

// Re-export commonly used types for convenience
pub use models::*;
pub use aggregate::TimeWeightedAggregator;
pub use controller::{ControllerConfig, RangeController};
pub use coordinator::{FetchCycle, FetchSummary, SampleFetchCoordinator};
pub use error::{Result, SourceError, ZoneTimeError};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use source::{FileHealthSource, HealthDataSource};
pub use zones::ZoneClassifier;
