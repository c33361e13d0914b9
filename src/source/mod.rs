//! External health data source boundary.
//!
//! The store holding workouts and heart rate series is an external
//! collaborator; everything above it talks to this trait only.

use chrono::{DateTime, Utc};
use std::future::Future;

use crate::error::SourceError;
use crate::models::{DateRange, HeartRateSample, Session};

pub mod file;

pub use file::FileHealthSource;

/// Read access to the external health data store.
///
/// Implementations own the actual store or network IO. Queries may suspend;
/// all returned futures are `Send` so the coordinator can fan them out
/// across tasks.
pub trait HealthDataSource: Send + Sync + 'static {
    /// Ask the store for read access to sessions and heart rate data.
    fn request_authorization(&self)
        -> impl Future<Output = Result<bool, SourceError>> + Send;

    /// Sessions whose start falls inside the date range, ascending by start.
    ///
    /// Fails with `AuthorizationDenied` or `Unavailable`; both are fatal
    /// for the fetch cycle that issued the query.
    fn list_sessions(
        &self,
        range: &DateRange,
    ) -> impl Future<Output = Result<Vec<Session>, SourceError>> + Send;

    /// Heart rate samples recorded in `[start, end)`.
    ///
    /// Ordering is NOT guaranteed by the source contract; callers re-sort.
    fn list_heart_rate_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<HeartRateSample>, SourceError>> + Send;
}
