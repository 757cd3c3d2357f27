//! Session export: time-series CSV, events CSV and a JSON snapshot.
//!
//! The three formatters are pure functions of a frozen [`SessionLog`].

use crate::{Error, LogEntry, Result, SessionLog, TimeSeriesRow};
use std::path::{Path, PathBuf};

/// Column order of the time-series export
pub const TIME_SERIES_HEADER: [&str; 15] = [
    "timestamp",
    "session_elapsed_ms",
    "hr_bpm",
    "sensor_contact",
    "rr_intervals",
    "smoothed_hr",
    "current_mode",
    "consecutive_out_of_zone_ms",
    "current_target_bpm",
    "target_zone_min",
    "target_zone_max",
    "current_track_id",
    "current_track_title",
    "current_track_bpm",
    "current_track_artist",
];

/// Column order of the events export
pub const EVENTS_HEADER: [&str; 4] = ["timestamp", "session_elapsed_ms", "type", "data"];

/// A row in the time-series CSV. Numbers are pre-formatted so whole values
/// print without a trailing ".0".
#[derive(Debug, serde::Serialize)]
struct TimeSeriesCsvRow {
    timestamp: i64,
    session_elapsed_ms: i64,
    hr_bpm: String,
    sensor_contact: bool,
    rr_intervals: String,
    smoothed_hr: String,
    current_mode: &'static str,
    consecutive_out_of_zone_ms: i64,
    current_target_bpm: String,
    target_zone_min: String,
    target_zone_max: String,
    current_track_id: String,
    current_track_title: String,
    current_track_bpm: String,
    current_track_artist: String,
}

impl From<&TimeSeriesRow> for TimeSeriesCsvRow {
    fn from(row: &TimeSeriesRow) -> Self {
        TimeSeriesCsvRow {
            timestamp: row.timestamp,
            session_elapsed_ms: row.session_elapsed_ms,
            hr_bpm: row.hr_bpm.to_string(),
            sensor_contact: row.sensor_contact,
            rr_intervals: join_rr(&row.rr_intervals),
            smoothed_hr: one_decimal(row.smoothed_hr),
            current_mode: row.current_mode.as_str(),
            consecutive_out_of_zone_ms: row.consecutive_out_of_zone_ms,
            current_target_bpm: row.current_target_bpm.to_string(),
            target_zone_min: row.target_zone_min.to_string(),
            target_zone_max: row.target_zone_max.to_string(),
            current_track_id: row.current_track_id.clone().unwrap_or_default(),
            current_track_title: row.current_track_title.clone().unwrap_or_default(),
            current_track_bpm: row
                .current_track_bpm
                .map(|bpm| bpm.to_string())
                .unwrap_or_default(),
            current_track_artist: row.current_track_artist.clone().unwrap_or_default(),
        }
    }
}

/// A row in the events CSV
#[derive(Debug, serde::Serialize)]
struct EventCsvRow {
    timestamp: i64,
    session_elapsed_ms: i64,
    #[serde(rename = "type")]
    kind: &'static str,
    data: String,
}

impl TryFrom<&LogEntry> for EventCsvRow {
    type Error = Error;

    fn try_from(entry: &LogEntry) -> Result<Self> {
        Ok(EventCsvRow {
            timestamp: entry.timestamp,
            session_elapsed_ms: entry.session_elapsed_ms,
            kind: entry.kind.as_str(),
            data: serde_json::to_string(&entry.data)?,
        })
    }
}

fn join_rr(rr_intervals: &[u32]) -> String {
    rr_intervals
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

/// One decimal place, ties rounded away from zero
fn one_decimal(value: f64) -> String {
    format!("{:.1}", (value * 10.0).round() / 10.0)
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new())
}

fn finish(mut writer: csv::Writer<Vec<u8>>) -> Result<String> {
    writer.flush()?;
    let mut bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    // Lines are joined, not terminated
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|e| Error::Other(format!("CSV output is not UTF-8: {}", e)))
}

/// One line per time-series row under the fixed 15-column header
pub fn export_time_series_csv(log: &SessionLog) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record(TIME_SERIES_HEADER)?;
    for row in &log.time_series {
        writer.serialize(TimeSeriesCsvRow::from(row))?;
    }
    finish(writer)
}

/// One line per log entry, with the entry data as a JSON blob
pub fn export_events_csv(log: &SessionLog) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record(EVENTS_HEADER)?;
    for entry in &log.entries {
        writer.serialize(EventCsvRow::try_from(entry)?)?;
    }
    finish(writer)
}

/// Pretty-printed JSON of the whole session
pub fn export_json(log: &SessionLog) -> Result<String> {
    Ok(serde_json::to_string_pretty(log)?)
}

/// Files written by [`write_exports`]
#[derive(Clone, Debug)]
pub struct ExportPaths {
    pub time_series: PathBuf,
    pub events: PathBuf,
    pub json: PathBuf,
}

/// Write all three exports into `dir`, named after the session id
pub fn write_exports(log: &SessionLog, dir: &Path) -> Result<ExportPaths> {
    std::fs::create_dir_all(dir)?;

    let paths = ExportPaths {
        time_series: dir.join(format!("{}_timeseries.csv", log.session_id)),
        events: dir.join(format!("{}_events.csv", log.session_id)),
        json: dir.join(format!("{}.json", log.session_id)),
    };
    std::fs::write(&paths.time_series, export_time_series_csv(log)?)?;
    std::fs::write(&paths.events, export_events_csv(log)?)?;
    std::fs::write(&paths.json, export_json(log)?)?;

    tracing::info!("Exported session {} to {:?}", log.session_id, dir);
    Ok(paths)
}
