//! Reactive range control.
//!
//! A single task owns the published `AggregationState`. Range edits are
//! collapsed by a trailing-edge quiet window; each issued fetch carries a
//! generation tag and a completed fetch is applied only while its tag still
//! matches the controller's counter, so the last requested range wins no
//! matter how fetches interleave. Superseded fetches are not aborted; they
//! run out and their results are dropped.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::aggregate::TimeWeightedAggregator;
use crate::coordinator::{FetchCycle, SampleFetchCoordinator};
use crate::error::{SourceError, ZoneTimeError};
use crate::models::{
    AggregationState, CardioZone, CyclePhase, DateRange, Session, SessionFilter, ZoneDurations,
};
use crate::source::HealthDataSource;

/// Controller tuning knobs
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Quiet window for collapsing rapid range edits
    pub debounce: std::time::Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce: std::time::Duration::from_millis(300),
        }
    }
}

enum Command {
    SetRange(DateRange),
    SetFilter(SessionFilter),
}

struct FetchOutcome {
    generation: u64,
    range: DateRange,
    result: Result<FetchCycle, SourceError>,
}

/// Handle to the controller task.
///
/// Setters are non-blocking; consumers read the published state through
/// `subscribe` or the accessors. Dropping the handle stops the task.
pub struct RangeController {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<AggregationState>,
    task: JoinHandle<()>,
}

impl RangeController {
    /// Spawn the controller and schedule an initial load of `initial_range`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<D: HealthDataSource>(
        coordinator: SampleFetchCoordinator<D>,
        initial_range: DateRange,
        config: ControllerConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(AggregationState::initial(initial_range));

        // The initial load goes through the normal debounce path
        let _ = command_tx.send(Command::SetRange(initial_range));

        let task = tokio::spawn(run(coordinator, config, state_tx, command_rx));
        Self {
            commands: command_tx,
            state: state_rx,
            task,
        }
    }

    /// Request aggregation over a new date range.
    ///
    /// An inverted range (`start > end`) is accepted as a pending edit: no
    /// fetch is issued for it and previously published state stays put.
    pub fn set_range(&self, range: DateRange) {
        let _ = self.commands.send(Command::SetRange(range));
    }

    /// Restrict the merged totals to a subset of the fetched sessions.
    ///
    /// Recomputes from cached aggregates only; the data source is never
    /// touched.
    pub fn set_selected_sessions(&self, filter: SessionFilter) {
        let _ = self.commands.send(Command::SetFilter(filter));
    }

    /// Watch the published state
    pub fn subscribe(&self) -> watch::Receiver<AggregationState> {
        self.state.clone()
    }

    /// Snapshot of the published state
    pub fn current_state(&self) -> AggregationState {
        self.state.borrow().clone()
    }

    /// Merged zone totals for the current range and filter
    pub fn current_zone_durations(&self) -> ZoneDurations {
        self.state.borrow().merged
    }

    /// Sessions from the last applied fetch, in start order
    pub fn current_sessions(&self) -> Vec<Session> {
        self.state.borrow().sessions()
    }

    /// Human-readable time spent in a zone
    pub fn time_in_zone(&self, zone: CardioZone) -> String {
        self.state.borrow().merged.formatted(zone)
    }

    /// Stop the controller task and wait for it to finish
    pub async fn shutdown(self) {
        drop(self.commands);
        let _ = self.task.await;
    }
}

async fn run<D: HealthDataSource>(
    coordinator: SampleFetchCoordinator<D>,
    config: ControllerConfig,
    state: watch::Sender<AggregationState>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let (outcome_tx, mut outcomes) = mpsc::unbounded_channel::<FetchOutcome>();
    let mut pending_range: Option<DateRange> = None;
    let mut deadline: Option<Instant> = None;
    let mut generation: u64 = 0;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::SetRange(range)) => {
                    debug!(%range, "range edit received");
                    pending_range = Some(range);
                    deadline = Some(Instant::now() + config.debounce);
                    state.send_modify(|s| s.phase = CyclePhase::Debouncing);
                }
                Some(Command::SetFilter(filter)) => {
                    state.send_modify(|s| {
                        s.filter = filter;
                        s.merged = TimeWeightedAggregator::merge_selected(&s.aggregates, &s.filter);
                    });
                }
                None => break,
            },
            Some(outcome) = outcomes.recv() => {
                apply_outcome(&state, generation, outcome);
            },
            _ = quiet_window(deadline), if deadline.is_some() => {
                deadline = None;
                let Some(range) = pending_range.take() else { continue };
                if !range.is_ordered() {
                    // A transient edit, not an error; nothing is fetched and
                    // the published state stays put
                    debug!(%range, "range still inverted after quiet window; no fetch");
                    state.send_modify(|s| s.phase = CyclePhase::Idle);
                    continue;
                }

                generation += 1;
                let tagged_generation = generation;
                debug!(%range, generation = tagged_generation, "issuing fetch");
                state.send_modify(|s| s.phase = CyclePhase::Fetching);

                let coordinator = coordinator.clone();
                let outcome_tx = outcome_tx.clone();
                tokio::spawn(async move {
                    let result = coordinator.fetch(&range).await;
                    let _ = outcome_tx.send(FetchOutcome {
                        generation: tagged_generation,
                        range,
                        result,
                    });
                });
            }
        }
    }
}

async fn quiet_window(deadline: Option<Instant>) {
    match deadline {
        Some(instant) => sleep_until(instant).await,
        None => std::future::pending().await,
    }
}

fn apply_outcome(
    state: &watch::Sender<AggregationState>,
    current_generation: u64,
    outcome: FetchOutcome,
) {
    if outcome.generation != current_generation {
        debug!(
            generation = outcome.generation,
            current = current_generation,
            "discarding result of superseded fetch"
        );
        state.send_modify(|s| s.stale_discards += 1);
        return;
    }

    match outcome.result {
        Ok(cycle) => {
            state.send_modify(|s| {
                s.range = outcome.range;
                s.aggregates = cycle.aggregates;
                s.generation = outcome.generation;
                s.merged = TimeWeightedAggregator::merge_selected(&s.aggregates, &s.filter);
                s.phase = CyclePhase::Applied;
                s.last_error = None;
            });
        }
        Err(err) => {
            // Fatal for the cycle: keep last-known-good data published and
            // surface the failure
            warn!(%err, "fetch cycle failed; keeping previous state");
            let message = ZoneTimeError::from(err).user_message();
            state.send_modify(|s| {
                s.phase = CyclePhase::FailedFatal;
                s.last_error = Some(message);
            });
        }
    }
}
