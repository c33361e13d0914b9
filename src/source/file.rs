//! File-backed health data source.
//!
//! Reads an exported health archive into memory and answers queries from
//! it. Two formats are supported, selected by extension: a JSON archive of
//! sessions with embedded sample series, and a flat CSV export with one
//! sample per row.

use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, SourceError, ZoneTimeError};
use crate::models::{ActivityKind, DateRange, HeartRateSample, Session};
use crate::source::HealthDataSource;

/// In-memory source over an exported health archive file
pub struct FileHealthSource {
    sessions: Vec<Session>,
    /// All samples across sessions, ascending by timestamp
    samples: Vec<HeartRateSample>,
}

/// JSON archive root
#[derive(Debug, Deserialize)]
struct Archive {
    sessions: Vec<ArchiveSession>,
}

/// One recorded session and its heart rate series
#[derive(Debug, Deserialize)]
struct ArchiveSession {
    id: Uuid,
    activity_kind: ActivityKind,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default)]
    samples: Vec<HeartRateSample>,
}

/// Flat CSV export row: one heart rate sample with its session context
#[derive(Debug, Deserialize)]
struct CsvRow {
    session_id: Uuid,
    activity: String,
    session_start: DateTime<Utc>,
    session_end: DateTime<Utc>,
    timestamp: DateTime<Utc>,
    bpm: f64,
}

impl FileHealthSource {
    /// Load an archive file, auto-detecting the format by extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let source = match extension.as_str() {
            "json" => Self::load_json(path)?,
            "csv" => Self::load_csv(path)?,
            other => {
                return Err(ZoneTimeError::Configuration(format!(
                    "unsupported archive format: {:?} ({})",
                    other,
                    path.display()
                )))
            }
        };

        info!(
            sessions = source.sessions.len(),
            samples = source.samples.len(),
            path = %path.display(),
            "loaded health archive"
        );
        Ok(source)
    }

    fn load_json(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let archive: Archive = serde_json::from_str(&contents).map_err(|e| {
            SourceError::QueryFailed {
                reason: format!("malformed JSON archive: {}", e),
            }
        })?;

        let mut sessions = Vec::with_capacity(archive.sessions.len());
        let mut samples = Vec::new();
        for entry in archive.sessions {
            let session = Session {
                id: entry.id,
                activity_kind: entry.activity_kind,
                start: entry.start,
                end: entry.end,
            };
            validate_session(&session)?;
            samples.extend(entry.samples);
            sessions.push(session);
        }

        Ok(Self::from_parts(sessions, samples))
    }

    fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| SourceError::QueryFailed {
                reason: format!("cannot open CSV archive: {}", e),
            })?;

        let mut sessions_by_id: HashMap<Uuid, Session> = HashMap::new();
        let mut samples = Vec::new();
        for record in reader.deserialize() {
            let row: CsvRow = record.map_err(|e| SourceError::QueryFailed {
                reason: format!("malformed CSV row: {}", e),
            })?;

            let session = sessions_by_id.entry(row.session_id).or_insert_with(|| Session {
                id: row.session_id,
                activity_kind: parse_activity(&row.activity),
                start: row.session_start,
                end: row.session_end,
            });
            validate_session(session)?;
            samples.push(HeartRateSample::new(row.timestamp, row.bpm));
        }

        let sessions = sessions_by_id.into_values().collect();
        Ok(Self::from_parts(sessions, samples))
    }

    fn from_parts(mut sessions: Vec<Session>, mut samples: Vec<HeartRateSample>) -> Self {
        sessions.sort_by(|a, b| a.start.cmp(&b.start));
        samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Self { sessions, samples }
    }
}

impl HealthDataSource for FileHealthSource {
    async fn request_authorization(&self) -> std::result::Result<bool, SourceError> {
        // A local archive needs no grant
        Ok(true)
    }

    async fn list_sessions(
        &self,
        range: &DateRange,
    ) -> std::result::Result<Vec<Session>, SourceError> {
        let matched: Vec<Session> = self
            .sessions
            .iter()
            .filter(|s| range.contains(s.start))
            .cloned()
            .collect();
        debug!(range = %range, matched = matched.len(), "listed sessions from archive");
        Ok(matched)
    }

    async fn list_heart_rate_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<Vec<HeartRateSample>, SourceError> {
        Ok(self
            .samples
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp < end)
            .cloned()
            .collect())
    }
}

fn validate_session(session: &Session) -> std::result::Result<(), SourceError> {
    if session.start > session.end {
        return Err(SourceError::QueryFailed {
            reason: format!(
                "session {} has start after end ({} > {})",
                session.id, session.start, session.end
            ),
        });
    }
    Ok(())
}

fn parse_activity(name: &str) -> ActivityKind {
    match name.to_lowercase().as_str() {
        "running" | "run" => ActivityKind::Running,
        "cycling" | "ride" | "bike" => ActivityKind::Cycling,
        "swimming" | "swim" => ActivityKind::Swimming,
        "walking" | "walk" => ActivityKind::Walking,
        "hiking" | "hike" => ActivityKind::Hiking,
        "rowing" | "row" => ActivityKind::Rowing,
        "strength training" | "strength" => ActivityKind::StrengthTraining,
        "yoga" => ActivityKind::Yoga,
        "hiit" => ActivityKind::Hiit,
        "elliptical" => ActivityKind::Elliptical,
        _ => ActivityKind::Other(name.to_string()),
    }
}
