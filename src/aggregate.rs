//! Time-weighted zone accumulation for a single session's samples.
//!
//! Each interval between adjacent samples is attributed to the zone of the
//! *later* sample of the pair. Switching this to the earlier sample or an
//! interpolated midpoint changes zone totals by one interval per zone
//! transition, so the convention is fixed here and must not drift.

use tracing::warn;

use crate::error::AggregationError;
use crate::models::{HeartRateSample, SessionAggregate, SessionFilter, ZoneDurations};
use crate::zones::ZoneClassifier;

/// Time-weighted zone duration accumulation
pub struct TimeWeightedAggregator;

impl TimeWeightedAggregator {
    /// Accumulate per-zone durations over an ordered sample sequence.
    ///
    /// Samples must already be sorted ascending by timestamp; that is the
    /// caller's contract. Fewer than two samples yield the zero map (a
    /// single measurement spans no interval). Samples with invalid heart
    /// rates void their interval but never abort the session.
    pub fn aggregate(samples: &[HeartRateSample]) -> Result<ZoneDurations, AggregationError> {
        if let Some(index) = first_order_violation(samples) {
            return Err(AggregationError::UnorderedSamples { index });
        }

        let mut durations = ZoneDurations::zero();
        if samples.len() < 2 {
            return Ok(durations);
        }

        let mut anomalies = 0usize;
        for i in 1..samples.len() {
            let dt = samples[i].timestamp - samples[i - 1].timestamp;
            if dt < chrono::Duration::zero() {
                return Err(AggregationError::NonMonotonicTime { index: i });
            }
            let seconds = dt.num_milliseconds() as f64 / 1000.0;

            // Interval belongs to the zone observed at its end
            match ZoneClassifier::classify(samples[i].bpm) {
                Ok(zone) => durations.add(zone, seconds),
                Err(_) => anomalies += 1,
            }
        }

        if anomalies > 0 {
            warn!(anomalies, "skipped intervals with invalid heart rate readings");
        }

        Ok(durations)
    }

    /// Per-zone sum across the aggregates passing the session filter.
    ///
    /// Pure recomputation over already-fetched data; never touches the data
    /// source.
    pub fn merge_selected(
        aggregates: &[SessionAggregate],
        filter: &SessionFilter,
    ) -> ZoneDurations {
        let mut merged = ZoneDurations::zero();
        for aggregate in aggregates {
            if filter.includes(&aggregate.session.id) {
                merged.merge(&aggregate.zone_durations);
            }
        }
        merged
    }
}

/// Sort samples ascending by timestamp.
///
/// The data source's ordering guarantee is not trusted; the coordinator
/// re-sorts every session's samples before aggregation.
pub fn sort_samples(samples: &mut [HeartRateSample]) {
    samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}

fn first_order_violation(samples: &[HeartRateSample]) -> Option<usize> {
    (1..samples.len()).find(|&i| samples[i].timestamp < samples[i - 1].timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardioZone;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn samples_from(offsets_and_bpm: &[(i64, f64)]) -> Vec<HeartRateSample> {
        offsets_and_bpm
            .iter()
            .map(|&(secs, bpm)| HeartRateSample::new(base_time() + Duration::seconds(secs), bpm))
            .collect()
    }

    #[test]
    fn test_empty_and_single_sample_yield_zero_map() {
        let empty = TimeWeightedAggregator::aggregate(&[]).unwrap();
        assert_eq!(empty.total_seconds(), 0.0);

        let single = samples_from(&[(0, 150.0)]);
        let durations = TimeWeightedAggregator::aggregate(&single).unwrap();
        assert_eq!(durations.total_seconds(), 0.0);
        // All five zones are present even when empty
        assert_eq!(durations.iter().count(), 5);
    }

    #[test]
    fn test_interval_attributed_to_later_sample() {
        // 60s interval ending on a Peak reading: the whole interval is Peak,
        // regardless of the earlier WarmUp reading.
        let samples = samples_from(&[(0, 90.0), (60, 165.0)]);
        let durations = TimeWeightedAggregator::aggregate(&samples).unwrap();
        assert_eq!(durations.get(CardioZone::Peak), 60.0);
        assert_eq!(durations.get(CardioZone::WarmUp), 0.0);
    }

    #[test]
    fn test_accumulation_across_zone_transitions() {
        let samples = samples_from(&[
            (0, 95.0),    // no interval
            (30, 95.0),   // 30s WarmUp
            (90, 110.0),  // 60s FatBurn
            (150, 130.0), // 60s Aerobic
            (180, 130.0), // 30s Aerobic
            (240, 165.0), // 60s Peak
        ]);
        let durations = TimeWeightedAggregator::aggregate(&samples).unwrap();
        assert_eq!(durations.get(CardioZone::WarmUp), 30.0);
        assert_eq!(durations.get(CardioZone::FatBurn), 60.0);
        assert_eq!(durations.get(CardioZone::Aerobic), 90.0);
        assert_eq!(durations.get(CardioZone::Anaerobic), 0.0);
        assert_eq!(durations.get(CardioZone::Peak), 60.0);
        assert_eq!(durations.total_seconds(), 240.0);
    }

    #[test]
    fn test_duplicate_timestamps_contribute_nothing() {
        let samples = samples_from(&[(0, 100.0), (0, 150.0), (60, 150.0)]);
        let durations = TimeWeightedAggregator::aggregate(&samples).unwrap();
        assert_eq!(durations.get(CardioZone::Anaerobic), 60.0);
        assert_eq!(durations.total_seconds(), 60.0);
    }

    #[test]
    fn test_unordered_samples_rejected() {
        let samples = samples_from(&[(60, 100.0), (0, 120.0)]);
        let err = TimeWeightedAggregator::aggregate(&samples).unwrap_err();
        assert_eq!(err, AggregationError::UnorderedSamples { index: 1 });
    }

    #[test]
    fn test_invalid_reading_voids_interval_only() {
        let samples = samples_from(&[(0, 100.0), (30, -5.0), (90, 130.0)]);
        let durations = TimeWeightedAggregator::aggregate(&samples).unwrap();
        // The 30s interval ending on the bad reading is dropped; the 60s
        // Aerobic interval survives.
        assert_eq!(durations.get(CardioZone::Aerobic), 60.0);
        assert_eq!(durations.total_seconds(), 60.0);
    }

    #[test]
    fn test_sort_samples_restores_order() {
        let mut samples = samples_from(&[(120, 100.0), (0, 110.0), (60, 120.0)]);
        sort_samples(&mut samples);
        assert!(TimeWeightedAggregator::aggregate(&samples).is_ok());
        assert_eq!(samples[0].timestamp, base_time());
    }

    #[test]
    fn test_merge_selected_respects_filter() {
        use crate::models::{ActivityKind, Session, SessionFilter};
        use uuid::Uuid;

        let make_aggregate = |zone: CardioZone, seconds: f64| {
            let mut zone_durations = ZoneDurations::zero();
            zone_durations.add(zone, seconds);
            SessionAggregate {
                session: Session {
                    id: Uuid::new_v4(),
                    activity_kind: ActivityKind::Running,
                    start: base_time(),
                    end: base_time() + Duration::seconds(600),
                },
                samples: Vec::new(),
                zone_durations,
            }
        };

        let a = make_aggregate(CardioZone::WarmUp, 300.0);
        let b = make_aggregate(CardioZone::Peak, 120.0);
        let aggregates = vec![a.clone(), b.clone()];

        let all = TimeWeightedAggregator::merge_selected(&aggregates, &SessionFilter::All);
        assert_eq!(all.get(CardioZone::WarmUp), 300.0);
        assert_eq!(all.get(CardioZone::Peak), 120.0);

        let only_b =
            SessionFilter::Selected([b.session.id].into_iter().collect());
        let merged = TimeWeightedAggregator::merge_selected(&aggregates, &only_b);
        assert_eq!(merged, b.zone_durations);
    }

    proptest! {
        /// For strictly increasing timestamps and valid readings, total time
        /// in zones equals the span from first to last sample.
        #[test]
        fn prop_zone_totals_cover_span(
            gaps in prop::collection::vec(1i64..600, 1..50),
            bpms in prop::collection::vec(40.0f64..210.0, 51),
        ) {
            let mut offset = 0i64;
            let mut samples = vec![HeartRateSample::new(base_time(), bpms[0])];
            for (i, gap) in gaps.iter().enumerate() {
                offset += gap;
                samples.push(HeartRateSample::new(
                    base_time() + Duration::seconds(offset),
                    bpms[i + 1],
                ));
            }

            let durations = TimeWeightedAggregator::aggregate(&samples).unwrap();
            let span = (samples.last().unwrap().timestamp - samples[0].timestamp)
                .num_milliseconds() as f64 / 1000.0;
            prop_assert!((durations.total_seconds() - span).abs() < 1e-6);
        }
    }
}
