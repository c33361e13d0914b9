use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Cardio intensity zones, ordered by increasing effort
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CardioZone {
    WarmUp,
    FatBurn,
    Aerobic,
    Anaerobic,
    Peak,
}

impl CardioZone {
    /// All zones in ascending intensity order
    pub const ALL: [CardioZone; 5] = [
        CardioZone::WarmUp,
        CardioZone::FatBurn,
        CardioZone::Aerobic,
        CardioZone::Anaerobic,
        CardioZone::Peak,
    ];

    /// Zone position in the 5-zone model (0-based)
    pub fn index(&self) -> usize {
        match self {
            CardioZone::WarmUp => 0,
            CardioZone::FatBurn => 1,
            CardioZone::Aerobic => 2,
            CardioZone::Anaerobic => 3,
            CardioZone::Peak => 4,
        }
    }

    /// Human-readable zone name
    pub fn label(&self) -> &'static str {
        match self {
            CardioZone::WarmUp => "Warm Up",
            CardioZone::FatBurn => "Fat Burn",
            CardioZone::Aerobic => "Aerobic",
            CardioZone::Anaerobic => "Anaerobic",
            CardioZone::Peak => "Peak",
        }
    }
}

impl fmt::Display for CardioZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single heart rate measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    /// When the measurement was taken
    pub timestamp: DateTime<Utc>,

    /// Heart rate in beats per minute
    pub bpm: f64,
}

impl HeartRateSample {
    pub fn new(timestamp: DateTime<Utc>, bpm: f64) -> Self {
        Self { timestamp, bpm }
    }
}

/// Activity types recorded by the health data source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    Running,
    Cycling,
    Swimming,
    Walking,
    Hiking,
    Rowing,
    StrengthTraining,
    Yoga,
    Hiit,
    Elliptical,
    Other(String),
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityKind::Running => "Running",
            ActivityKind::Cycling => "Cycling",
            ActivityKind::Swimming => "Swimming",
            ActivityKind::Walking => "Walking",
            ActivityKind::Hiking => "Hiking",
            ActivityKind::Rowing => "Rowing",
            ActivityKind::StrengthTraining => "Strength Training",
            ActivityKind::Yoga => "Yoga",
            ActivityKind::Hiit => "HIIT",
            ActivityKind::Elliptical => "Elliptical",
            ActivityKind::Other(name) => name.as_str(),
        };
        write!(f, "{}", name)
    }
}

/// A discrete exercise session with fixed boundaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier assigned by the data source
    pub id: Uuid,

    /// Activity type for the session
    pub activity_kind: ActivityKind,

    /// Session start instant
    pub start: DateTime<Utc>,

    /// Session end instant (>= start)
    pub end: DateTime<Utc>,
}

impl Session {
    /// Elapsed span of the session
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Date range selecting which sessions to aggregate.
///
/// `start > end` is tolerated as a transient editing state; callers check
/// `is_ordered` before acting on the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Range covering the trailing `days` days up to today
    pub fn trailing_days(days: i64) -> Self {
        let today = Utc::now().date_naive();
        Self {
            start: today - Duration::days(days),
            end: today,
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }

    /// Inclusive lower instant bound (midnight at range start, UTC)
    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Exclusive upper instant bound (midnight after range end, UTC)
    pub fn end_instant(&self) -> DateTime<Utc> {
        (self.end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc()
    }

    /// Whether an instant falls within the range's day bounds
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start_instant() && instant < self.end_instant()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

/// Accumulated time per cardio zone, in seconds.
///
/// All five zones are always present; absent activity means zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ZoneDurations {
    pub warm_up: f64,
    pub fat_burn: f64,
    pub aerobic: f64,
    pub anaerobic: f64,
    pub peak: f64,
}

impl ZoneDurations {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Seconds accumulated in a zone
    pub fn get(&self, zone: CardioZone) -> f64 {
        match zone {
            CardioZone::WarmUp => self.warm_up,
            CardioZone::FatBurn => self.fat_burn,
            CardioZone::Aerobic => self.aerobic,
            CardioZone::Anaerobic => self.anaerobic,
            CardioZone::Peak => self.peak,
        }
    }

    /// Add `seconds` to a zone's running total
    pub fn add(&mut self, zone: CardioZone, seconds: f64) {
        let slot = match zone {
            CardioZone::WarmUp => &mut self.warm_up,
            CardioZone::FatBurn => &mut self.fat_burn,
            CardioZone::Aerobic => &mut self.aerobic,
            CardioZone::Anaerobic => &mut self.anaerobic,
            CardioZone::Peak => &mut self.peak,
        };
        *slot += seconds;
    }

    /// Per-zone sum with another duration map
    pub fn merge(&mut self, other: &ZoneDurations) {
        self.warm_up += other.warm_up;
        self.fat_burn += other.fat_burn;
        self.aerobic += other.aerobic;
        self.anaerobic += other.anaerobic;
        self.peak += other.peak;
    }

    /// Total time across all zones
    pub fn total_seconds(&self) -> f64 {
        self.warm_up + self.fat_burn + self.aerobic + self.anaerobic + self.peak
    }

    /// Iterate zones in ascending intensity order
    pub fn iter(&self) -> impl Iterator<Item = (CardioZone, f64)> + '_ {
        CardioZone::ALL.iter().map(move |&zone| (zone, self.get(zone)))
    }

    /// Whole minutes spent in a zone
    pub fn minutes_in(&self, zone: CardioZone) -> i64 {
        (self.get(zone) / 60.0) as i64
    }

    /// Human-readable time in a zone
    pub fn formatted(&self, zone: CardioZone) -> String {
        format_seconds(self.get(zone))
    }
}

/// Format a second count as a short human-readable duration
pub fn format_seconds(seconds: f64) -> String {
    let total_minutes = (seconds / 60.0) as i64;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{} h {:02} min", hours, minutes)
    } else {
        format!("{} min", minutes)
    }
}

/// One session's samples and zone accounting.
///
/// Built once per fetch cycle and never mutated; samples are in ascending
/// timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAggregate {
    pub session: Session,
    pub samples: Vec<HeartRateSample>,
    pub zone_durations: ZoneDurations,
}

/// Which sessions participate in the merged zone totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionFilter {
    /// Every fetched session counts
    #[default]
    All,
    /// Only the listed session ids count
    Selected(HashSet<Uuid>),
}

impl SessionFilter {
    pub fn includes(&self, id: &Uuid) -> bool {
        match self {
            SessionFilter::All => true,
            SessionFilter::Selected(ids) => ids.contains(id),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, SessionFilter::All)
    }
}

/// Where the controller is within the current fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CyclePhase {
    /// Resting; no edit pending
    #[default]
    Idle,
    /// Range edited, quiet window running
    Debouncing,
    /// A fetch is in flight
    Fetching,
    /// Latest fetch result has been applied
    Applied,
    /// Latest fetch failed fatally; prior data still published
    FailedFatal,
}

/// The controller's published state.
///
/// Replaced wholesale on every update; consumers never observe a partial
/// write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationState {
    /// Range of the most recently applied fetch (or the initial range)
    pub range: DateRange,

    /// Per-session aggregates, ordered by session start
    pub aggregates: Vec<SessionAggregate>,

    /// Active session subset filter
    pub filter: SessionFilter,

    /// Zone totals merged across the filtered sessions
    pub merged: ZoneDurations,

    /// Identifies the fetch request this state came from
    pub generation: u64,

    /// Current position in the fetch cycle
    pub phase: CyclePhase,

    /// Results dropped because a newer fetch superseded them
    pub stale_discards: u64,

    /// Message from the last fatal fetch failure, if any
    pub last_error: Option<String>,
}

impl AggregationState {
    pub fn initial(range: DateRange) -> Self {
        Self {
            range,
            aggregates: Vec::new(),
            filter: SessionFilter::All,
            merged: ZoneDurations::zero(),
            generation: 0,
            phase: CyclePhase::Idle,
            stale_discards: 0,
            last_error: None,
        }
    }

    /// Sessions from the last applied fetch, in start order
    pub fn sessions(&self) -> Vec<Session> {
        self.aggregates.iter().map(|a| a.session.clone()).collect()
    }
}
