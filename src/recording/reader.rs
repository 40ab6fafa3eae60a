use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, warn};

use super::writer::CSV_HEADER;
use crate::error::RecordingError;
use crate::types::{GazeSample, GazeSeries};

/// Load a recording CSV (`Timestamp,Pitch,Yaw`) into a series.
pub fn read_series(path: &Path) -> Result<GazeSeries, RecordingError> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RecordingError::NotFound(path.to_path_buf()),
        _ => RecordingError::io(path, e),
    })?;
    parse_series(&content).map_err(|e| match e {
        RecordingError::MissingHeader(_) => RecordingError::MissingHeader(path.to_path_buf()),
        other => other,
    })
}

/// Parse CSV text. Blank lines are skipped; line numbers in errors are 1-based.
pub fn parse_series(content: &str) -> Result<GazeSeries, RecordingError> {
    let mut lines = content.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());

    let header_ok = lines
        .next()
        .map(|(_, header)| header.trim().trim_start_matches('\u{feff}') == CSV_HEADER)
        .unwrap_or(false);
    if !header_ok {
        return Err(RecordingError::MissingHeader(Default::default()));
    }

    let mut series = GazeSeries::new();
    let mut out_of_order = 0usize;
    for (index, line) in lines {
        let sample = parse_row(line).map_err(|message| RecordingError::Parse {
            line: index + 1,
            message,
        })?;
        if !series.push(sample) {
            out_of_order += 1;
        }
    }

    if out_of_order > 0 {
        warn!("Skipped {} rows with decreasing timestamps", out_of_order);
    }
    debug!("Parsed {} samples", series.len());
    Ok(series)
}

fn parse_row(line: &str) -> Result<GazeSample, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(format!("expected 3 fields, found {}", fields.len()));
    }

    let parse = |name: &str, value: &str| {
        let parsed = value
            .parse::<f64>()
            .map_err(|e| format!("invalid {} '{}': {}", name, value, e))?;
        // f64 解析会接受 NaN/inf，这里一并拒绝
        if !parsed.is_finite() {
            return Err(format!("non-finite {} '{}'", name, value));
        }
        Ok(parsed)
    };

    Ok(GazeSample::new(
        parse("timestamp", fields[0])?,
        parse("pitch", fields[1])?,
        parse("yaw", fields[2])?,
    ))
}
