//! Concurrent per-session sample retrieval.
//!
//! One query task per session, each owning its own result slot; the ordered
//! handle list is the join barrier. Session boundaries are never crossed:
//! every session's samples are aggregated on their own, and only the
//! resulting durations are ever merged. Concatenating samples across
//! sessions would attribute the idle gap between two workouts to whichever
//! zone the next workout happened to start in.

use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::aggregate::{sort_samples, TimeWeightedAggregator};
use crate::error::SourceError;
use crate::models::{DateRange, HeartRateSample, SessionAggregate, ZoneDurations};
use crate::source::HealthDataSource;

/// Result of one complete fetch cycle
#[derive(Debug, Clone)]
pub struct FetchCycle {
    /// Per-session aggregates, ordered by session start ascending
    pub aggregates: Vec<SessionAggregate>,
    /// Counts and timing for the cycle
    pub summary: FetchSummary,
}

/// Summary of a fetch cycle
#[derive(Debug, Clone)]
pub struct FetchSummary {
    /// Sessions returned for the range
    pub total_sessions: usize,
    /// Sessions whose sample query failed and were degraded to zero
    pub failed_sessions: usize,
    /// Samples retrieved across all sessions
    pub total_samples: usize,
    /// Wall-clock duration of the whole cycle
    pub duration_ms: u128,
}

impl FetchSummary {
    /// Check if every session's samples were retrieved
    pub fn is_fully_successful(&self) -> bool {
        self.failed_sessions == 0
    }

    /// Get human-readable summary
    pub fn to_string_pretty(&self) -> String {
        format!(
            "Fetch Cycle Summary\n  \
             Sessions: {}\n  \
             Degraded: {}\n  \
             Samples: {}\n  \
             Total Time: {:.2}s",
            self.total_sessions,
            self.failed_sessions,
            self.total_samples,
            self.duration_ms as f64 / 1000.0,
        )
    }
}

/// Coordinates session discovery and the per-session sample fan-out
pub struct SampleFetchCoordinator<D> {
    source: Arc<D>,
}

impl<D> Clone for SampleFetchCoordinator<D> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<D: HealthDataSource> SampleFetchCoordinator<D> {
    pub fn new(source: Arc<D>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<D> {
        &self.source
    }

    /// Run one fetch cycle over a date range.
    ///
    /// Authorization and session discovery failures are fatal and produce
    /// no partial result. A failed per-session sample query degrades that
    /// session to an empty, zero-duration aggregate; the cycle still
    /// completes so one bad session cannot hide the others.
    pub async fn fetch(&self, range: &DateRange) -> Result<FetchCycle, SourceError> {
        let started = Instant::now();

        if !self.source.request_authorization().await? {
            return Err(SourceError::AuthorizationDenied);
        }

        let sessions = self.source.list_sessions(range).await?;
        debug!(range = %range, sessions = sessions.len(), "listed sessions");

        // Exactly one concurrent query per session. Each task writes only
        // its own slot; the index pairing below is the join barrier.
        let handles: Vec<JoinHandle<Result<Vec<HeartRateSample>, SourceError>>> = sessions
            .iter()
            .map(|session| {
                let source = Arc::clone(&self.source);
                let (start, end) = (session.start, session.end);
                tokio::spawn(async move { source.list_heart_rate_samples(start, end).await })
            })
            .collect();

        let total_sessions = sessions.len();
        let mut aggregates = Vec::with_capacity(total_sessions);
        let mut failed_sessions = 0usize;
        let mut total_samples = 0usize;

        for (session, handle) in sessions.into_iter().zip(handles) {
            let samples = match handle.await {
                Ok(Ok(mut samples)) => {
                    // The source's ordering guarantee is not trusted
                    sort_samples(&mut samples);
                    samples
                }
                Ok(Err(err)) => {
                    warn!(
                        session_id = %session.id,
                        activity = %session.activity_kind,
                        %err,
                        "sample query failed; session degraded to zero durations"
                    );
                    failed_sessions += 1;
                    Vec::new()
                }
                Err(join_err) => {
                    warn!(
                        session_id = %session.id,
                        %join_err,
                        "sample query task aborted; session degraded to zero durations"
                    );
                    failed_sessions += 1;
                    Vec::new()
                }
            };

            let zone_durations = match TimeWeightedAggregator::aggregate(&samples) {
                Ok(durations) => durations,
                // Unreachable after the re-sort above; contained to the
                // session if it ever fires.
                Err(err) => {
                    error!(session_id = %session.id, %err, "aggregation contract violation");
                    failed_sessions += 1;
                    ZoneDurations::zero()
                }
            };

            total_samples += samples.len();
            aggregates.push(SessionAggregate {
                session,
                samples,
                zone_durations,
            });
        }

        // Output order is by session start, never by completion order
        aggregates.sort_by(|a, b| a.session.start.cmp(&b.session.start));

        let summary = FetchSummary {
            total_sessions,
            failed_sessions,
            total_samples,
            duration_ms: started.elapsed().as_millis(),
        };
        info!("{}", summary.to_string_pretty());

        Ok(FetchCycle { aggregates, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityKind, CardioZone, Session};
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Scripted in-memory source; sample queries are keyed by session start
    struct ScriptedSource {
        sessions: Vec<Session>,
        samples: HashMap<DateTime<Utc>, Vec<HeartRateSample>>,
        failing_starts: HashSet<DateTime<Utc>>,
        /// Per-session artificial latency, keyed by start
        delays: HashMap<DateTime<Utc>, u64>,
        sample_calls: AtomicUsize,
        authorized: bool,
    }

    impl ScriptedSource {
        fn new(sessions: Vec<Session>) -> Self {
            Self {
                sessions,
                samples: HashMap::new(),
                failing_starts: HashSet::new(),
                delays: HashMap::new(),
                sample_calls: AtomicUsize::new(0),
                authorized: true,
            }
        }
    }

    impl HealthDataSource for ScriptedSource {
        async fn request_authorization(&self) -> Result<bool, SourceError> {
            Ok(self.authorized)
        }

        async fn list_sessions(&self, range: &DateRange) -> Result<Vec<Session>, SourceError> {
            Ok(self
                .sessions
                .iter()
                .filter(|s| range.contains(s.start))
                .cloned()
                .collect())
        }

        async fn list_heart_rate_samples(
            &self,
            start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<HeartRateSample>, SourceError> {
            self.sample_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(&delay_ms) = self.delays.get(&start) {
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            }
            if self.failing_starts.contains(&start) {
                return Err(SourceError::QueryFailed {
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(self.samples.get(&start).cloned().unwrap_or_default())
        }
    }

    fn session_at(hour: u32, minutes: i64) -> Session {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap();
        Session {
            id: Uuid::new_v4(),
            activity_kind: ActivityKind::Running,
            start,
            end: start + Duration::minutes(minutes),
        }
    }

    fn steady_samples(session: &Session, bpm: f64, step_secs: i64) -> Vec<HeartRateSample> {
        let mut samples = Vec::new();
        let mut t = session.start;
        while t <= session.end {
            samples.push(HeartRateSample::new(t, bpm));
            t += Duration::seconds(step_secs);
        }
        samples
    }

    fn march_range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_fatal_when_source_unavailable() {
        struct DownSource;
        impl HealthDataSource for DownSource {
            async fn request_authorization(&self) -> Result<bool, SourceError> {
                Ok(true)
            }
            async fn list_sessions(&self, _: &DateRange) -> Result<Vec<Session>, SourceError> {
                Err(SourceError::Unavailable {
                    reason: "store offline".to_string(),
                })
            }
            async fn list_heart_rate_samples(
                &self,
                _: DateTime<Utc>,
                _: DateTime<Utc>,
            ) -> Result<Vec<HeartRateSample>, SourceError> {
                unreachable!("no sessions to query")
            }
        }

        let coordinator = SampleFetchCoordinator::new(Arc::new(DownSource));
        let err = coordinator.fetch(&march_range()).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_denied_authorization_is_fatal() {
        let mut source = ScriptedSource::new(vec![session_at(8, 30)]);
        source.authorized = false;

        let coordinator = SampleFetchCoordinator::new(Arc::new(source));
        let err = coordinator.fetch(&march_range()).await.unwrap_err();
        assert_eq!(err, SourceError::AuthorizationDenied);
    }

    #[tokio::test]
    async fn test_partial_failure_degrades_single_session() {
        let sessions = vec![session_at(7, 30), session_at(9, 30), session_at(11, 30)];
        let mut source = ScriptedSource::new(sessions.clone());
        for s in &sessions {
            source.samples.insert(s.start, steady_samples(s, 150.0, 60));
        }
        source.failing_starts.insert(sessions[1].start);

        let coordinator = SampleFetchCoordinator::new(Arc::new(source));
        let cycle = coordinator.fetch(&march_range()).await.unwrap();

        assert_eq!(cycle.summary.total_sessions, 3);
        assert_eq!(cycle.summary.failed_sessions, 1);
        assert!(!cycle.summary.is_fully_successful());

        let degraded = &cycle.aggregates[1];
        assert!(degraded.samples.is_empty());
        assert_eq!(degraded.zone_durations.total_seconds(), 0.0);

        // The healthy sessions are unaffected: 30 min of Anaerobic each
        for aggregate in [&cycle.aggregates[0], &cycle.aggregates[2]] {
            assert_eq!(aggregate.zone_durations.get(CardioZone::Anaerobic), 1800.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_ordered_by_start_not_completion() {
        let sessions = vec![session_at(6, 30), session_at(10, 30), session_at(14, 30)];
        let mut source = ScriptedSource::new(sessions.clone());
        // Earliest session finishes last
        source.delays.insert(sessions[0].start, 300);
        source.delays.insert(sessions[1].start, 200);
        source.delays.insert(sessions[2].start, 100);
        for s in &sessions {
            source.samples.insert(s.start, steady_samples(s, 110.0, 60));
        }

        let coordinator = SampleFetchCoordinator::new(Arc::new(source));
        let cycle = coordinator.fetch(&march_range()).await.unwrap();

        let starts: Vec<_> = cycle.aggregates.iter().map(|a| a.session.start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert_eq!(starts.len(), 3);
    }

    #[tokio::test]
    async fn test_source_ordering_not_trusted() {
        let session = session_at(8, 10);
        let mut source = ScriptedSource::new(vec![session.clone()]);
        let mut shuffled = steady_samples(&session, 125.0, 60);
        shuffled.reverse();
        source.samples.insert(session.start, shuffled);

        let coordinator = SampleFetchCoordinator::new(Arc::new(source));
        let cycle = coordinator.fetch(&march_range()).await.unwrap();

        let aggregate = &cycle.aggregates[0];
        assert_eq!(aggregate.zone_durations.get(CardioZone::Aerobic), 600.0);
        assert!(aggregate
            .samples
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_one_query_per_session() {
        let sessions = vec![session_at(7, 20), session_at(9, 20), session_at(11, 20), session_at(13, 20)];
        let source = Arc::new(ScriptedSource::new(sessions));
        let coordinator = SampleFetchCoordinator::new(Arc::clone(&source));
        coordinator.fetch(&march_range()).await.unwrap();
        assert_eq!(source.sample_calls.load(Ordering::SeqCst), 4);
    }
}
