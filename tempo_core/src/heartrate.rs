//! Heart Rate Measurement payload decoding.
//!
//! Layout of the characteristic value:
//!
//! | byte(s)  | content                                                   |
//! |----------|-----------------------------------------------------------|
//! | 0        | flags                                                     |
//! | 1 or 1-2 | heart rate, u8 or u16 LE depending on flag bit 0          |
//! | +2       | energy expended (kJ, u16 LE) if flag bit 3                |
//! | +2*n     | RR intervals (1/1024 s, u16 LE) if flag bit 4             |
//!
//! Flag bit 2 says whether sensor contact is supported; bit 1 is the contact
//! status and is only meaningful when bit 2 is set.

use crate::bus::EventBus;
use crate::events::topic;
use crate::{Error, HeartRateReading, Result, SensorFault};

const FLAG_HR_U16: u8 = 0x01;
const FLAG_CONTACT_DETECTED: u8 = 0x02;
const FLAG_CONTACT_SUPPORTED: u8 = 0x04;
const FLAG_ENERGY_PRESENT: u8 = 0x08;
const FLAG_RR_PRESENT: u8 = 0x10;

/// Decoded fields of one measurement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedHeartRate {
    pub bpm: u16,
    pub sensor_contact: bool,
    /// Milliseconds, in arrival order
    pub rr_intervals: Vec<u32>,
    pub energy_expended: Option<u32>,
}

/// Decode a raw measurement payload
pub fn parse_measurement(bytes: &[u8]) -> Result<ParsedHeartRate> {
    if bytes.len() < 2 {
        return Err(Error::Decode(format!(
            "measurement requires at least 2 bytes, got {}",
            bytes.len()
        )));
    }

    let flags = bytes[0];
    let sensor_contact =
        flags & FLAG_CONTACT_SUPPORTED != 0 && flags & FLAG_CONTACT_DETECTED != 0;
    let mut offset = 1;

    let bpm = if flags & FLAG_HR_U16 != 0 {
        let value = read_u16(bytes, offset).ok_or_else(|| {
            Error::Decode(format!(
                "16-bit heart rate requires at least 3 bytes, got {}",
                bytes.len()
            ))
        })?;
        offset += 2;
        value
    } else {
        let value = u16::from(bytes[offset]);
        offset += 1;
        value
    };

    let energy_expended = if flags & FLAG_ENERGY_PRESENT != 0 {
        let value = read_u16(bytes, offset).ok_or_else(|| {
            Error::Decode(format!(
                "energy expended declared but only {} bytes remain",
                bytes.len() - offset
            ))
        })?;
        offset += 2;
        Some(u32::from(value))
    } else {
        None
    };

    let rr_intervals = if flags & FLAG_RR_PRESENT != 0 {
        bytes[offset..]
            .chunks_exact(2)
            .map(|pair| rr_to_ms(u16::from_le_bytes([pair[0], pair[1]])))
            .collect()
    } else {
        Vec::new()
    };

    Ok(ParsedHeartRate {
        bpm,
        sensor_contact,
        rr_intervals,
        energy_expended,
    })
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let pair = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([pair[0], pair[1]]))
}

/// 1/1024 s units to whole milliseconds
fn rr_to_ms(raw: u16) -> u32 {
    (f64::from(raw) / 1024.0 * 1000.0).round() as u32
}

impl HeartRateReading {
    /// Attach a receive timestamp to a decoded measurement
    pub fn from_measurement(parsed: ParsedHeartRate, timestamp: i64) -> Self {
        Self {
            bpm: f64::from(parsed.bpm),
            timestamp,
            sensor_contact: parsed.sensor_contact,
            rr_intervals: parsed.rr_intervals,
            energy_expended: parsed.energy_expended,
        }
    }
}

/// Decode `bytes` and publish the reading.
///
/// A malformed payload is published as `hr:error` and the decode error is
/// returned to the caller.
pub fn publish_measurement(bus: &EventBus, bytes: &[u8], timestamp: i64) -> Result<HeartRateReading> {
    match parse_measurement(bytes) {
        Ok(parsed) => {
            let reading = HeartRateReading::from_measurement(parsed, timestamp);
            bus.emit::<topic::HrReading>(reading.clone());
            Ok(reading)
        }
        Err(err) => {
            tracing::warn!("Dropping malformed measurement: {}", err);
            bus.emit::<topic::HrError>(SensorFault {
                message: err.to_string(),
                code: Some("decode".into()),
            });
            Err(err)
        }
    }
}
