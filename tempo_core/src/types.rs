//! Core domain types for the hrtempo system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Heart-rate readings and transport boundary types
//! - Target zones and the algorithm's state machine values
//! - Music tracks and playback state
//! - Session logs, merged time-series rows and summary metadata

use crate::config::AlgorithmConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ============================================================================
// Heart-Rate Types
// ============================================================================

/// A single heart-rate sample as delivered by the sensor transport
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HeartRateReading {
    /// Heart rate in beats per minute
    pub bpm: f64,
    /// Unix timestamp in milliseconds when the sample was received
    pub timestamp: i64,
    /// Whether the sensor reported skin contact
    pub sensor_contact: bool,
    /// Inter-beat intervals in milliseconds, oldest first
    pub rr_intervals: Vec<u32>,
    /// Energy expended in kilojoules, if the sensor reports it
    pub energy_expended: Option<u32>,
}

impl HeartRateReading {
    /// Convenience constructor for a reading with contact and no extras
    pub fn new(bpm: f64, timestamp: i64) -> Self {
        Self {
            bpm,
            timestamp,
            sensor_contact: true,
            rr_intervals: Vec::new(),
            energy_expended: None,
        }
    }
}

/// Lifecycle of the sensor connection
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Scanning,
    Connecting,
    Connected,
    Disconnecting,
    Error,
}

/// A discovered or connected heart-rate monitor
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BleDeviceInfo {
    pub id: String,
    pub name: Option<String>,
    pub rssi: i16,
}

/// Why a connected device went away
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Disconnection {
    pub device_id: String,
    pub reason: String,
}

/// A transport-level failure surfaced as an event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SensorFault {
    pub message: String,
    pub code: Option<String>,
}

// ============================================================================
// Zone and Algorithm Types
// ============================================================================

/// A closed heart-rate interval the listener should be driven towards
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HrZone {
    pub name: String,
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub color: String,
}

impl HrZone {
    pub fn new(name: impl Into<String>, min_bpm: f64, max_bpm: f64, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_bpm,
            max_bpm,
            color: color.into(),
        }
    }

    /// Classify a heart rate against this zone. Both bounds are inside.
    pub fn classify(&self, bpm: f64) -> ZonePosition {
        if bpm < self.min_bpm {
            ZonePosition::Below
        } else if bpm > self.max_bpm {
            ZonePosition::Above
        } else {
            ZonePosition::InZone
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min_bpm + self.max_bpm) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.max_bpm - self.min_bpm
    }
}

/// Where a heart rate sits relative to the target zone
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZonePosition {
    Below,
    InZone,
    Above,
}

impl ZonePosition {
    fn describe(self) -> &'static str {
        match self {
            ZonePosition::Below => "below",
            ZonePosition::InZone => "in",
            ZonePosition::Above => "above",
        }
    }
}

impl fmt::Display for ZonePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Mode of the target-control state machine
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlgorithmMode {
    #[default]
    Maintain,
    Raise,
    Lower,
}

impl AlgorithmMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AlgorithmMode::Maintain => "MAINTAIN",
            AlgorithmMode::Raise => "RAISE",
            AlgorithmMode::Lower => "LOWER",
        }
    }
}

impl fmt::Display for AlgorithmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full snapshot of the state machine between two readings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AlgorithmState {
    pub current_mode: AlgorithmMode,
    /// Timestamp (Unix ms) of the last mode transition
    pub mode_entered_at: i64,
    /// Unweighted mean of `hr_history`
    pub smoothed_hr: f64,
    /// Most recent readings, oldest first, at most `smoothing_window` long
    pub hr_history: VecDeque<HeartRateReading>,
    /// Time the smoothed HR has spent continuously outside the zone
    pub consecutive_out_of_zone_ms: i64,
    /// Current target music BPM; rounded only when a target is emitted
    pub current_target_bpm: f64,
    /// Time since the last emitted target, `None` if none was ever emitted
    pub ms_since_last_target_change: Option<i64>,
}

/// An emitted tempo request
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BpmTarget {
    pub target_bpm: i64,
    pub triggering_hr: f64,
    pub timestamp: i64,
    pub reason: String,
    /// Normalized distance of the smoothed HR from the zone midpoint, in [0, 1]
    pub urgency: f64,
    pub mode: AlgorithmMode,
}

/// Payload of a mode transition event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModeChange {
    pub from: AlgorithmMode,
    pub to: AlgorithmMode,
    pub timestamp: i64,
}

// ============================================================================
// Music Types
// ============================================================================

/// Metadata for a single track, indexed by tempo
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackMetadata {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    pub duration_seconds: f64,
    pub bpm: f64,
    pub url: String,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
}

/// Playback state reported by the player
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlaybackState {
    pub current_track: Option<TrackMetadata>,
    pub is_playing: bool,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub target_bpm: Option<i64>,
}

/// A player failure surfaced as an event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlaybackFault {
    pub message: String,
}

// ============================================================================
// Session Log Types
// ============================================================================

/// Kind of a discrete session log entry
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryType {
    HrReading,
    AlgorithmTarget,
    AlgorithmState,
    AlgorithmModeChange,
    MusicChange,
    MusicPlayback,
    SessionStart,
    SessionEnd,
    DeviceConnected,
    DeviceDisconnected,
    Error,
}

impl LogEntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            LogEntryType::HrReading => "hr_reading",
            LogEntryType::AlgorithmTarget => "algorithm_target",
            LogEntryType::AlgorithmState => "algorithm_state",
            LogEntryType::AlgorithmModeChange => "algorithm_mode_change",
            LogEntryType::MusicChange => "music_change",
            LogEntryType::MusicPlayback => "music_playback",
            LogEntryType::SessionStart => "session_start",
            LogEntryType::SessionEnd => "session_end",
            LogEntryType::DeviceConnected => "device_connected",
            LogEntryType::DeviceDisconnected => "device_disconnected",
            LogEntryType::Error => "error",
        }
    }
}

/// A single discrete log entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: LogEntryType,
    pub session_elapsed_ms: i64,
    pub data: serde_json::Value,
}

/// One row per heart-rate reading, merged with the latest known state of
/// the algorithm and the player
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimeSeriesRow {
    pub timestamp: i64,
    pub session_elapsed_ms: i64,

    pub hr_bpm: f64,
    pub sensor_contact: bool,
    pub rr_intervals: Vec<u32>,

    pub smoothed_hr: f64,
    pub current_mode: AlgorithmMode,
    pub consecutive_out_of_zone_ms: i64,
    pub current_target_bpm: f64,
    pub target_zone_min: f64,
    pub target_zone_max: f64,

    // Last known track, carried forward until the next change
    pub current_track_id: Option<String>,
    pub current_track_title: Option<String>,
    pub current_track_bpm: Option<f64>,
    pub current_track_artist: Option<String>,
}

/// Aggregate statistics for a finished session
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionMetadata {
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub min_heart_rate: Option<f64>,
    pub total_tracks_played: u32,
    pub total_bpm_target_changes: u32,
    pub time_in_zone_ms: i64,
    pub time_above_zone_ms: i64,
    pub time_below_zone_ms: i64,
}

/// Why a session ended
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    User,
    Error,
    Timeout,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::User => "user",
            StopReason::Error => "error",
            StopReason::Timeout => "timeout",
        }
    }
}

/// A complete, frozen session record
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionLog {
    pub session_id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_ms: i64,
    pub config: AlgorithmConfig,
    pub device_name: Option<String>,
    pub entries: Vec<LogEntry>,
    pub time_series: Vec<TimeSeriesRow>,
    pub metadata: SessionMetadata,
}

/// Session lifecycle event payload
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionStart {
    pub session_id: String,
}

/// Session lifecycle event payload
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionEnd {
    pub session_id: String,
    pub reason: StopReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> HrZone {
        HrZone::new("Test", 140.0, 160.0, "#000000")
    }

    #[test]
    fn test_zone_bounds_are_inclusive() {
        let z = zone();
        assert_eq!(z.classify(140.0), ZonePosition::InZone);
        assert_eq!(z.classify(160.0), ZonePosition::InZone);
        assert_eq!(z.classify(139.9), ZonePosition::Below);
        assert_eq!(z.classify(160.1), ZonePosition::Above);
    }

    #[test]
    fn test_zone_geometry() {
        let z = zone();
        assert_eq!(z.midpoint(), 150.0);
        assert_eq!(z.width(), 20.0);
    }

    #[test]
    fn test_mode_serializes_upper_case() {
        let json = serde_json::to_string(&AlgorithmMode::Raise).unwrap();
        assert_eq!(json, "\"RAISE\"");
        assert_eq!(AlgorithmMode::default(), AlgorithmMode::Maintain);
    }

    #[test]
    fn test_log_entry_type_matches_serde_name() {
        for kind in [
            LogEntryType::HrReading,
            LogEntryType::AlgorithmModeChange,
            LogEntryType::DeviceDisconnected,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
