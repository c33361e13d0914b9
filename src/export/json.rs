use std::path::Path;

use super::{ExportError, ZoneReport};

/// Export a full zone report as pretty-printed JSON
pub fn export_zone_report<P: AsRef<Path>>(
    report: &ZoneReport,
    output_path: P,
) -> Result<(), ExportError> {
    let file = std::fs::File::create(output_path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
