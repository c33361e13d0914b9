use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DateRange, Session, SessionAggregate, SessionFilter, ZoneDurations};

pub mod csv;
pub mod json;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Result<Self, ExportError> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A zone summary ready for export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneReport {
    /// Range the report covers
    pub range: DateRange,

    /// When the report was produced
    pub generated_at: DateTime<Utc>,

    /// Zone totals merged across the included sessions
    pub merged: ZoneDurations,

    /// Per-session breakdown, in session start order
    pub sessions: Vec<SessionBreakdown>,
}

/// One session's contribution to the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBreakdown {
    pub session: Session,
    pub zone_durations: ZoneDurations,
    pub sample_count: usize,
}

impl ZoneReport {
    /// Build a report over the aggregates passing the filter
    pub fn new(
        range: DateRange,
        aggregates: &[SessionAggregate],
        filter: &SessionFilter,
    ) -> Self {
        let mut merged = ZoneDurations::zero();
        let mut sessions = Vec::new();
        for aggregate in aggregates {
            if !filter.includes(&aggregate.session.id) {
                continue;
            }
            merged.merge(&aggregate.zone_durations);
            sessions.push(SessionBreakdown {
                session: aggregate.session.clone(),
                zone_durations: aggregate.zone_durations,
                sample_count: aggregate.samples.len(),
            });
        }

        Self {
            range,
            generated_at: Utc::now(),
            merged,
            sessions,
        }
    }
}
