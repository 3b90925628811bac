//! JSON and CSV export of stored readings

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::GlucologError;
use crate::reading::Reading;

/// Write readings as a pretty-printed JSON array
pub fn write_json<W: Write>(readings: &[Reading], writer: W) -> Result<(), GlucologError> {
    serde_json::to_writer_pretty(writer, readings)?;
    Ok(())
}

/// Write readings as CSV with a header row
pub fn write_csv<W: Write>(readings: &[Reading], mut writer: W) -> Result<(), GlucologError> {
    writeln!(writer, "id,value,unit,timestamp,source,notes")?;
    for reading in readings {
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            csv_field(&reading.id),
            reading.value,
            csv_field(reading.unit.label()),
            reading.timestamp.to_rfc3339(),
            csv_field(reading.source.as_str()),
            csv_field(reading.notes.as_deref().unwrap_or("")),
        )?;
    }
    Ok(())
}

/// Export readings to a JSON file
pub fn export_json_file<P: AsRef<Path>>(
    readings: &[Reading],
    path: P,
) -> Result<(), GlucologError> {
    let file = File::create(path)?;
    write_json(readings, BufWriter::new(file))
}

/// Export readings to a CSV file
pub fn export_csv_file<P: AsRef<Path>>(
    readings: &[Reading],
    path: P,
) -> Result<(), GlucologError> {
    let file = File::create(path)?;
    write_csv(readings, BufWriter::new(file))
}

/// Quote a field when it contains a separator, quote, or newline
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
