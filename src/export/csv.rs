use std::io::Write;
use std::path::Path;

use super::{ExportError, ZoneReport};
use crate::models::CardioZone;

/// Export the merged zone totals to CSV format
pub fn export_zone_summary<P: AsRef<Path>>(
    report: &ZoneReport,
    output_path: P,
) -> Result<(), ExportError> {
    let mut file = std::fs::File::create(output_path)?;

    writeln!(file, "Zone,Seconds,Time")?;
    for (zone, seconds) in report.merged.iter() {
        writeln!(
            file,
            "{},{:.0},{}",
            zone.label(),
            seconds,
            report.merged.formatted(zone)
        )?;
    }

    Ok(())
}

/// Export the per-session zone breakdown to CSV format
pub fn export_session_breakdown<P: AsRef<Path>>(
    report: &ZoneReport,
    output_path: P,
) -> Result<(), ExportError> {
    let mut file = std::fs::File::create(output_path)?;

    writeln!(
        file,
        "Session_ID,Activity,Start,End,Samples,WarmUp_S,FatBurn_S,Aerobic_S,Anaerobic_S,Peak_S,Total_S"
    )?;

    for breakdown in &report.sessions {
        let durations = &breakdown.zone_durations;
        writeln!(
            file,
            "{},{},{},{},{},{:.0},{:.0},{:.0},{:.0},{:.0},{:.0}",
            breakdown.session.id,
            breakdown.session.activity_kind,
            breakdown.session.start.format("%Y-%m-%dT%H:%M:%SZ"),
            breakdown.session.end.format("%Y-%m-%dT%H:%M:%SZ"),
            breakdown.sample_count,
            durations.get(CardioZone::WarmUp),
            durations.get(CardioZone::FatBurn),
            durations.get(CardioZone::Aerobic),
            durations.get(CardioZone::Anaerobic),
            durations.get(CardioZone::Peak),
            durations.total_seconds(),
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::sample_report;
    use tempfile::TempDir;

    #[test]
    fn test_zone_summary_csv() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("summary.csv");

        export_zone_summary(&sample_report(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Zone,Seconds,Time"));
        assert!(contents.contains("Aerobic,900,15 min"));
        // All five zones present, even the empty ones
        assert_eq!(contents.lines().count(), 6);
    }

    #[test]
    fn test_session_breakdown_csv() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sessions.csv");

        export_session_breakdown(&sample_report(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Running"));
        assert!(contents.contains("1020"));
        assert_eq!(contents.lines().count(), 2);
    }
}
