//! Loading recorded heart-rate readings for offline replay.
//!
//! The file is a CSV with the columns
//! `timestamp,bpm,sensor_contact,rr_intervals,energy_expended`. RR intervals
//! are semicolon-joined milliseconds; `sensor_contact`, `rr_intervals` and
//! `energy_expended` may be left empty.

use crate::{Error, HeartRateReading, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::Path;

/// CSV row format for recorded readings
#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: i64,
    bpm: f64,
    sensor_contact: Option<bool>,
    rr_intervals: Option<String>,
    energy_expended: Option<u32>,
}

impl TryFrom<CsvRow> for HeartRateReading {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let rr_intervals = match row.rr_intervals.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(joined) => joined
                .split(';')
                .map(|value| {
                    value.trim().parse::<u32>().map_err(|e| {
                        Error::Other(format!("Invalid RR interval '{}': {}", value, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(HeartRateReading {
            bpm: row.bpm,
            timestamp: row.timestamp,
            sensor_contact: row.sensor_contact.unwrap_or(true),
            rr_intervals,
            energy_expended: row.energy_expended,
        })
    }
}

/// Read every reading from `path`, in file order
pub fn load_readings(path: &Path) -> Result<Vec<HeartRateReading>> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;

    let mut readings = Vec::new();
    for result in reader.deserialize() {
        let row: CsvRow = result?;
        readings.push(HeartRateReading::try_from(row)?);
    }

    if readings
        .windows(2)
        .any(|pair| pair[1].timestamp < pair[0].timestamp)
    {
        tracing::warn!("Readings in {:?} are not in timestamp order", path);
    }

    tracing::info!("Loaded {} readings from {:?}", readings.len(), path);
    Ok(readings)
}
