use crate::error::MeasurementError;
use crate::models::CardioZone;

/// Lower bounds of each zone in bpm; intervals are half-open, lower bound
/// inclusive. WarmUp starts at 0, Peak is unbounded above.
pub const ZONE_LOWER_BOUNDS: [f64; 5] = [0.0, 100.0, 120.0, 140.0, 160.0];

/// Heart rate zone classification
pub struct ZoneClassifier;

impl ZoneClassifier {
    /// Classify a heart rate into its cardio zone.
    ///
    /// Total over `bpm >= 0`; negative or NaN readings are rejected as
    /// invalid measurements. Stateless and safe to call from any thread.
    pub fn classify(bpm: f64) -> Result<CardioZone, MeasurementError> {
        if bpm.is_nan() || bpm < 0.0 {
            return Err(MeasurementError::InvalidMeasurement { bpm });
        }

        let zone = match bpm {
            b if b < 100.0 => CardioZone::WarmUp,
            b if b < 120.0 => CardioZone::FatBurn,
            b if b < 140.0 => CardioZone::Aerobic,
            b if b < 160.0 => CardioZone::Anaerobic,
            _ => CardioZone::Peak,
        };
        Ok(zone)
    }

    /// Lower bpm bound of a zone (inclusive)
    pub fn lower_bound(zone: CardioZone) -> f64 {
        ZONE_LOWER_BOUNDS[zone.index()]
    }

    /// Upper bpm bound of a zone (exclusive), if bounded
    pub fn upper_bound(zone: CardioZone) -> Option<f64> {
        ZONE_LOWER_BOUNDS.get(zone.index() + 1).copied()
    }

    /// Printable bpm interval for a zone, e.g. `120-139 bpm` or `160+ bpm`
    pub fn bounds_label(zone: CardioZone) -> String {
        let lower = Self::lower_bound(zone);
        match Self::upper_bound(zone) {
            Some(upper) => format!("{:.0}-{:.0} bpm", lower, upper - 1.0),
            None => format!("{:.0}+ bpm", lower),
        }
    }
}
