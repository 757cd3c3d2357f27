//! Session logger.
//!
//! Records every relevant event as a [`LogEntry`] and merges each heart-rate
//! reading with the latest published algorithm state and track into one
//! [`TimeSeriesRow`]. The logger never queries other components: a row
//! carries whatever was published before the reading reached it.
//!
//! Subscriptions are registered in this order:
//! `algo:stateChanged`, `algo:target`, `algo:modeChanged`, `music:changed`,
//! `hr:reading`, `hr:connected`, `hr:disconnected`, then the playback and
//! error events. For rows to reflect the state computed from their own
//! reading, the engine must have subscribed to `hr:reading` before the
//! logger was started.

use crate::bus::{EventBus, SubscriptionId};
use crate::clock::Clock;
use crate::events::{topic, Topic};
use crate::{
    AlgorithmConfig, AlgorithmMode, AlgorithmState, BleDeviceInfo, BpmTarget, Disconnection,
    Error, HeartRateReading, LogEntry, LogEntryType, ModeChange, PlaybackFault, PlaybackState,
    Result, SensorFault, SessionEnd, SessionLog, SessionMetadata, SessionStart, StopReason,
    TimeSeriesRow, TrackMetadata, ZonePosition,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

/// Latest algorithm values carried into time-series rows
#[derive(Clone, Debug)]
struct CachedState {
    smoothed_hr: f64,
    current_mode: AlgorithmMode,
    consecutive_out_of_zone_ms: i64,
    current_target_bpm: f64,
}

/// Running aggregates, folded into [`SessionMetadata`] at stop
#[derive(Debug, Default)]
struct Counters {
    hr_sum: f64,
    hr_count: u32,
    hr_min: Option<f64>,
    hr_max: Option<f64>,
    tracks_played: u32,
    target_changes: u32,
    time_in_zone_ms: i64,
    time_above_zone_ms: i64,
    time_below_zone_ms: i64,
    last_reading_at: Option<i64>,
}

impl Counters {
    fn record_reading(&mut self, reading: &HeartRateReading, config: &AlgorithmConfig) {
        let bpm = reading.bpm;
        self.hr_sum += bpm;
        self.hr_count += 1;
        self.hr_min = Some(self.hr_min.map_or(bpm, |min| min.min(bpm)));
        self.hr_max = Some(self.hr_max.map_or(bpm, |max| max.max(bpm)));

        // Raw bpm, not smoothed; the first reading adds no time
        if let Some(last) = self.last_reading_at {
            let delta = (reading.timestamp - last).max(0);
            match config.target_zone.classify(bpm) {
                ZonePosition::Below => self.time_below_zone_ms += delta,
                ZonePosition::Above => self.time_above_zone_ms += delta,
                ZonePosition::InZone => self.time_in_zone_ms += delta,
            }
        }
        self.last_reading_at = Some(reading.timestamp);
    }

    fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            avg_heart_rate: (self.hr_count > 0)
                .then(|| (self.hr_sum / f64::from(self.hr_count)).round()),
            max_heart_rate: self.hr_max,
            min_heart_rate: self.hr_min,
            total_tracks_played: self.tracks_played,
            total_bpm_target_changes: self.target_changes,
            time_in_zone_ms: self.time_in_zone_ms,
            time_above_zone_ms: self.time_above_zone_ms,
            time_below_zone_ms: self.time_below_zone_ms,
        }
    }
}

struct Recorder {
    clock: Rc<dyn Clock>,
    active: bool,
    session_id: String,
    start_time: i64,
    config: AlgorithmConfig,
    device_name: Option<String>,
    entries: Vec<LogEntry>,
    time_series: Vec<TimeSeriesRow>,
    cached_state: Option<CachedState>,
    cached_track: Option<TrackMetadata>,
    counters: Counters,
}

impl Recorder {
    fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            active: false,
            session_id: String::new(),
            start_time: 0,
            config: AlgorithmConfig::default(),
            device_name: None,
            entries: Vec::new(),
            time_series: Vec::new(),
            cached_state: None,
            cached_track: None,
            counters: Counters::default(),
        }
    }

    fn begin(&mut self, session_id: String, config: AlgorithmConfig, config_value: Value) {
        let clock = Rc::clone(&self.clock);
        *self = Self::new(clock);
        self.session_id = session_id;
        self.start_time = self.clock.now_ms();
        self.config = config;
        self.active = true;
        self.add_entry(LogEntryType::SessionStart, json!({ "config": config_value }));
    }

    fn finish(&mut self, reason: StopReason) -> SessionLog {
        self.add_entry(LogEntryType::SessionEnd, json!({ "reason": reason.as_str() }));
        self.active = false;

        let end_time = self.clock.now_ms();
        SessionLog {
            session_id: self.session_id.clone(),
            start_time: self.start_time,
            end_time,
            duration_ms: end_time - self.start_time,
            config: self.config.clone(),
            device_name: self.device_name.clone(),
            entries: std::mem::take(&mut self.entries),
            time_series: std::mem::take(&mut self.time_series),
            metadata: self.counters.metadata(),
        }
    }

    fn add_entry(&mut self, kind: LogEntryType, data: Value) {
        let now = self.clock.now_ms();
        self.entries.push(LogEntry {
            timestamp: now,
            kind,
            session_elapsed_ms: now - self.start_time,
            data,
        });
    }

    fn on_state(&mut self, state: &AlgorithmState) {
        self.cached_state = Some(CachedState {
            smoothed_hr: state.smoothed_hr,
            current_mode: state.current_mode,
            consecutive_out_of_zone_ms: state.consecutive_out_of_zone_ms,
            current_target_bpm: state.current_target_bpm,
        });
        self.add_entry(
            LogEntryType::AlgorithmState,
            json!({
                "smoothed_hr": state.smoothed_hr,
                "current_mode": state.current_mode,
                "current_target_bpm": state.current_target_bpm,
                "consecutive_out_of_zone_ms": state.consecutive_out_of_zone_ms,
            }),
        );
    }

    fn on_target(&mut self, target: &BpmTarget) {
        self.counters.target_changes += 1;
        self.add_entry(
            LogEntryType::AlgorithmTarget,
            json!({
                "target_bpm": target.target_bpm,
                "triggering_hr": target.triggering_hr,
                "reason": target.reason,
                "urgency": target.urgency,
                "mode": target.mode,
            }),
        );
    }

    fn on_mode_change(&mut self, change: &ModeChange) {
        self.add_entry(
            LogEntryType::AlgorithmModeChange,
            json!({ "from": change.from, "to": change.to }),
        );
    }

    fn on_track(&mut self, track: &TrackMetadata) {
        self.counters.tracks_played += 1;
        self.cached_track = Some(track.clone());
        self.add_entry(
            LogEntryType::MusicChange,
            json!({
                "track_id": track.id,
                "track_title": track.title,
                "track_bpm": track.bpm,
                "track_artist": track.artist,
            }),
        );
    }

    fn on_reading(&mut self, reading: &HeartRateReading) {
        self.counters.record_reading(reading, &self.config);
        self.add_entry(
            LogEntryType::HrReading,
            json!({
                "bpm": reading.bpm,
                "sensor_contact": reading.sensor_contact,
                "rr_intervals": reading.rr_intervals,
            }),
        );

        let state = self.cached_state.as_ref();
        let track = self.cached_track.as_ref();
        self.time_series.push(TimeSeriesRow {
            timestamp: reading.timestamp,
            session_elapsed_ms: reading.timestamp - self.start_time,
            hr_bpm: reading.bpm,
            sensor_contact: reading.sensor_contact,
            rr_intervals: reading.rr_intervals.clone(),
            smoothed_hr: state.map_or(reading.bpm, |s| s.smoothed_hr),
            current_mode: state.map_or(AlgorithmMode::Maintain, |s| s.current_mode),
            consecutive_out_of_zone_ms: state.map_or(0, |s| s.consecutive_out_of_zone_ms),
            current_target_bpm: state.map_or(0.0, |s| s.current_target_bpm),
            target_zone_min: self.config.target_zone.min_bpm,
            target_zone_max: self.config.target_zone.max_bpm,
            current_track_id: track.map(|t| t.id.clone()),
            current_track_title: track.map(|t| t.title.clone()),
            current_track_bpm: track.map(|t| t.bpm),
            current_track_artist: track.map(|t| t.artist.clone()),
        });
    }

    fn on_connected(&mut self, device: &BleDeviceInfo) {
        self.device_name = device.name.clone();
        self.add_entry(
            LogEntryType::DeviceConnected,
            json!({ "device_id": device.id, "device_name": device.name }),
        );
    }

    fn on_disconnected(&mut self, event: &Disconnection) {
        self.add_entry(
            LogEntryType::DeviceDisconnected,
            json!({ "device_id": event.device_id, "reason": event.reason }),
        );
    }

    fn on_playback(&mut self, state: &PlaybackState) {
        self.add_entry(
            LogEntryType::MusicPlayback,
            json!({
                "is_playing": state.is_playing,
                "position_seconds": state.position_seconds,
                "track_id": state.current_track.as_ref().map(|t| &t.id),
                "target_bpm": state.target_bpm,
            }),
        );
    }

    fn on_sensor_fault(&mut self, fault: &SensorFault) {
        self.add_entry(
            LogEntryType::Error,
            json!({ "source": "sensor", "message": fault.message, "code": fault.code }),
        );
    }

    fn on_playback_fault(&mut self, fault: &PlaybackFault) {
        self.add_entry(
            LogEntryType::Error,
            json!({ "source": "playback", "message": fault.message }),
        );
    }
}

/// Records one session at a time from the events on a bus
pub struct SessionLogger {
    bus: EventBus,
    recorder: Rc<RefCell<Recorder>>,
    subscriptions: Vec<SubscriptionId>,
}

impl SessionLogger {
    pub fn new(bus: EventBus, clock: Rc<dyn Clock>) -> Self {
        Self {
            bus,
            recorder: Rc::new(RefCell::new(Recorder::new(clock))),
            subscriptions: Vec::new(),
        }
    }

    /// Begin a session and return its id
    pub fn start(&mut self, config: AlgorithmConfig) -> Result<String> {
        if self.is_active() {
            return Err(Error::Session(format!(
                "session {} is already active",
                self.session_id()
            )));
        }

        let config_value = serde_json::to_value(&config)?;
        let session_id = Uuid::new_v4().to_string();
        self.recorder
            .borrow_mut()
            .begin(session_id.clone(), config, config_value);

        self.listen::<topic::AlgoStateChanged>(Recorder::on_state);
        self.listen::<topic::AlgoTarget>(Recorder::on_target);
        self.listen::<topic::AlgoModeChanged>(Recorder::on_mode_change);
        self.listen::<topic::MusicChanged>(Recorder::on_track);
        self.listen::<topic::HrReading>(Recorder::on_reading);
        self.listen::<topic::HrConnected>(Recorder::on_connected);
        self.listen::<topic::HrDisconnected>(Recorder::on_disconnected);
        self.listen::<topic::MusicPlaybackStateChanged>(Recorder::on_playback);
        self.listen::<topic::HrError>(Recorder::on_sensor_fault);
        self.listen::<topic::MusicError>(Recorder::on_playback_fault);

        tracing::info!("Session {} started", session_id);
        self.bus.emit::<topic::SessionStarted>(SessionStart {
            session_id: session_id.clone(),
        });
        Ok(session_id)
    }

    /// End the session, detach from the bus and return the frozen log
    pub fn stop(&mut self, reason: StopReason) -> Result<SessionLog> {
        if !self.is_active() {
            return Err(Error::Session("no active session".into()));
        }

        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
        let log = self.recorder.borrow_mut().finish(reason);

        tracing::info!(
            "Session {} stopped ({}): {} entries, {} rows",
            log.session_id,
            reason.as_str(),
            log.entries.len(),
            log.time_series.len()
        );
        self.bus.emit::<topic::SessionEnded>(SessionEnd {
            session_id: log.session_id.clone(),
            reason,
        });
        Ok(log)
    }

    pub fn is_active(&self) -> bool {
        self.recorder.borrow().active
    }

    pub fn entry_count(&self) -> usize {
        self.recorder.borrow().entries.len()
    }

    pub fn time_series_count(&self) -> usize {
        self.recorder.borrow().time_series.len()
    }

    /// Id of the current or most recent session, empty before the first
    pub fn session_id(&self) -> String {
        self.recorder.borrow().session_id.clone()
    }

    /// Time since the session started, 0 when idle
    pub fn elapsed_ms(&self) -> i64 {
        let recorder = self.recorder.borrow();
        if recorder.active {
            recorder.clock.now_ms() - recorder.start_time
        } else {
            0
        }
    }

    fn listen<T: Topic>(&mut self, handler: fn(&mut Recorder, &T::Payload)) {
        let recorder = Rc::clone(&self.recorder);
        let id = self
            .bus
            .on::<T, _>(move |payload| handler(&mut recorder.borrow_mut(), payload));
        self.subscriptions.push(id);
    }
}

impl Drop for SessionLogger {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::EventKind;
    use crate::HrZone;
    use std::collections::VecDeque;

    const T0: i64 = 1_700_000_000_000;

    fn config() -> AlgorithmConfig {
        AlgorithmConfig::for_zone(HrZone::new("Test", 140.0, 160.0, "#000000"))
    }

    fn setup() -> (EventBus, Rc<ManualClock>, SessionLogger) {
        let bus = EventBus::new();
        let clock = Rc::new(ManualClock::new(T0));
        let logger = SessionLogger::new(bus.clone(), clock.clone());
        (bus, clock, logger)
    }

    fn algo_state(smoothed_hr: f64, mode: AlgorithmMode, target: f64) -> AlgorithmState {
        AlgorithmState {
            current_mode: mode,
            mode_entered_at: T0,
            smoothed_hr,
            hr_history: VecDeque::new(),
            consecutive_out_of_zone_ms: 2_000,
            current_target_bpm: target,
            ms_since_last_target_change: None,
        }
    }

    fn track(id: &str) -> TrackMetadata {
        TrackMetadata {
            id: id.into(),
            title: format!("Title {}", id),
            artist: "Artist".into(),
            album: None,
            duration_seconds: 180.0,
            bpm: 150.0,
            url: String::new(),
            artwork_url: None,
            genre: None,
        }
    }

    #[test]
    fn test_start_records_session_start() {
        let (_bus, _clock, mut logger) = setup();
        let id = logger.start(config()).unwrap();

        assert!(logger.is_active());
        assert_eq!(logger.session_id(), id);
        assert_eq!(logger.entry_count(), 1);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_start_twice_fails() {
        let (_bus, _clock, mut logger) = setup();
        logger.start(config()).unwrap();
        assert!(matches!(logger.start(config()), Err(Error::Session(_))));
    }

    #[test]
    fn test_stop_when_idle_fails() {
        let (_bus, _clock, mut logger) = setup();
        assert!(matches!(logger.stop(StopReason::User), Err(Error::Session(_))));
    }

    #[test]
    fn test_row_uses_defaults_before_any_state() {
        let (bus, _clock, mut logger) = setup();
        logger.start(config()).unwrap();

        bus.emit::<topic::HrReading>(HeartRateReading::new(135.0, T0 + 1_000));
        let log = logger.stop(StopReason::User).unwrap();

        let row = &log.time_series[0];
        assert_eq!(row.session_elapsed_ms, 1_000);
        assert_eq!(row.smoothed_hr, 135.0);
        assert_eq!(row.current_mode, AlgorithmMode::Maintain);
        assert_eq!(row.consecutive_out_of_zone_ms, 0);
        assert_eq!(row.current_target_bpm, 0.0);
        assert_eq!(row.target_zone_min, 140.0);
        assert_eq!(row.target_zone_max, 160.0);
        assert!(row.current_track_id.is_none());
        assert!(row.current_track_bpm.is_none());
    }

    #[test]
    fn test_row_carries_latest_state_and_track_forward() {
        let (bus, _clock, mut logger) = setup();
        logger.start(config()).unwrap();

        bus.emit::<topic::AlgoStateChanged>(algo_state(130.0, AlgorithmMode::Maintain, 150.0));
        bus.emit::<topic::AlgoStateChanged>(algo_state(128.0, AlgorithmMode::Raise, 152.0));
        bus.emit::<topic::MusicChanged>(track("a"));
        bus.emit::<topic::HrReading>(HeartRateReading::new(127.0, T0 + 1_000));
        bus.emit::<topic::HrReading>(HeartRateReading::new(126.0, T0 + 2_000));
        let log = logger.stop(StopReason::User).unwrap();

        assert_eq!(log.time_series.len(), 2);
        for row in &log.time_series {
            assert_eq!(row.smoothed_hr, 128.0);
            assert_eq!(row.current_mode, AlgorithmMode::Raise);
            assert_eq!(row.current_target_bpm, 152.0);
            assert_eq!(row.consecutive_out_of_zone_ms, 2_000);
            assert_eq!(row.current_track_id.as_deref(), Some("a"));
            assert_eq!(row.current_track_title.as_deref(), Some("Title a"));
        }
    }

    #[test]
    fn test_only_readings_produce_rows() {
        let (bus, _clock, mut logger) = setup();
        logger.start(config()).unwrap();

        bus.emit::<topic::AlgoModeChanged>(ModeChange {
            from: AlgorithmMode::Maintain,
            to: AlgorithmMode::Lower,
            timestamp: T0,
        });
        bus.emit::<topic::MusicChanged>(track("a"));

        assert_eq!(logger.time_series_count(), 0);
        assert_eq!(logger.entry_count(), 3);
    }

    #[test]
    fn test_zone_time_uses_raw_bpm_and_skips_first_reading() {
        let (bus, _clock, mut logger) = setup();
        logger.start(config()).unwrap();

        // Smoothed value says in-zone, raw readings decide
        bus.emit::<topic::AlgoStateChanged>(algo_state(150.0, AlgorithmMode::Maintain, 150.0));
        bus.emit::<topic::HrReading>(HeartRateReading::new(130.0, T0));
        bus.emit::<topic::HrReading>(HeartRateReading::new(130.0, T0 + 1_000));
        bus.emit::<topic::HrReading>(HeartRateReading::new(150.0, T0 + 3_000));
        bus.emit::<topic::HrReading>(HeartRateReading::new(170.0, T0 + 6_000));
        let log = logger.stop(StopReason::User).unwrap();

        assert_eq!(log.metadata.time_below_zone_ms, 1_000);
        assert_eq!(log.metadata.time_in_zone_ms, 2_000);
        assert_eq!(log.metadata.time_above_zone_ms, 3_000);
    }

    #[test]
    fn test_metadata_aggregates() {
        let (bus, _clock, mut logger) = setup();
        logger.start(config()).unwrap();

        for (i, bpm) in [140.0, 151.0, 160.0].into_iter().enumerate() {
            bus.emit::<topic::HrReading>(HeartRateReading::new(bpm, T0 + i as i64 * 1_000));
        }
        bus.emit::<topic::MusicChanged>(track("a"));
        bus.emit::<topic::MusicChanged>(track("b"));
        bus.emit::<topic::AlgoTarget>(BpmTarget {
            target_bpm: 152,
            triggering_hr: 160.0,
            timestamp: T0,
            reason: "test".into(),
            urgency: 0.5,
            mode: AlgorithmMode::Lower,
        });
        let log = logger.stop(StopReason::User).unwrap();

        let meta = log.metadata;
        assert_eq!(meta.avg_heart_rate, Some(150.0));
        assert_eq!(meta.min_heart_rate, Some(140.0));
        assert_eq!(meta.max_heart_rate, Some(160.0));
        assert_eq!(meta.total_tracks_played, 2);
        assert_eq!(meta.total_bpm_target_changes, 1);
    }

    #[test]
    fn test_empty_session_metadata_is_null() {
        let (_bus, _clock, mut logger) = setup();
        logger.start(config()).unwrap();
        let log = logger.stop(StopReason::Timeout).unwrap();

        assert_eq!(log.metadata, SessionMetadata::default());
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.entries[1].kind, LogEntryType::SessionEnd);
        assert_eq!(log.entries[1].data["reason"], "timeout");
    }

    #[test]
    fn test_stop_detaches_and_freezes() {
        let (bus, clock, mut logger) = setup();
        logger.start(config()).unwrap();
        clock.advance(5_000);
        assert_eq!(logger.elapsed_ms(), 5_000);

        let log = logger.stop(StopReason::User).unwrap();
        assert_eq!(log.duration_ms, 5_000);
        assert_eq!(log.end_time, T0 + 5_000);
        assert!(!logger.is_active());
        assert_eq!(logger.elapsed_ms(), 0);

        bus.emit::<topic::HrReading>(HeartRateReading::new(150.0, T0 + 6_000));
        assert_eq!(bus.subscriber_count(EventKind::HrReading), 0);
        assert_eq!(log.time_series.len(), 0);
    }

    #[test]
    fn test_stop_from_earlier_reading_handler() {
        let (bus, _clock, logger) = setup();
        let logger = Rc::new(RefCell::new(logger));
        let frozen: Rc<RefCell<Option<SessionLog>>> = Rc::new(RefCell::new(None));

        // Registered before the logger, so it runs first on every reading
        let stopper = Rc::clone(&logger);
        let sink = Rc::clone(&frozen);
        bus.on::<topic::HrReading, _>(move |reading| {
            if reading.bpm >= 170.0 {
                *sink.borrow_mut() = stopper.borrow_mut().stop(StopReason::Timeout).ok();
            }
        });
        logger.borrow_mut().start(config()).unwrap();

        bus.emit::<topic::HrReading>(HeartRateReading::new(150.0, T0 + 1_000));
        bus.emit::<topic::HrReading>(HeartRateReading::new(175.0, T0 + 2_000));

        let log = frozen.borrow_mut().take().unwrap();
        assert!(!logger.borrow().is_active());
        assert_eq!(log.time_series.len(), 1);
        assert_eq!(log.time_series[0].hr_bpm, 150.0);
        let kinds: Vec<LogEntryType> = log.entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LogEntryType::SessionStart,
                LogEntryType::HrReading,
                LogEntryType::SessionEnd,
            ]
        );
    }

    #[test]
    fn test_entries_use_clock_time() {
        let (bus, clock, mut logger) = setup();
        logger.start(config()).unwrap();
        clock.advance(2_500);

        bus.emit::<topic::HrReading>(HeartRateReading::new(150.0, T0 + 1_000));
        let log = logger.stop(StopReason::User).unwrap();

        let entry = &log.entries[1];
        assert_eq!(entry.kind, LogEntryType::HrReading);
        assert_eq!(entry.timestamp, T0 + 2_500);
        assert_eq!(entry.session_elapsed_ms, 2_500);
        assert_eq!(log.time_series[0].session_elapsed_ms, 1_000);
    }

    #[test]
    fn test_device_events() {
        let (bus, _clock, mut logger) = setup();
        logger.start(config()).unwrap();

        bus.emit::<topic::HrConnected>(BleDeviceInfo {
            id: "dev-1".into(),
            name: Some("Polar H10".into()),
            rssi: -55,
        });
        bus.emit::<topic::HrDisconnected>(Disconnection {
            device_id: "dev-1".into(),
            reason: "link lost".into(),
        });
        let log = logger.stop(StopReason::Error).unwrap();

        assert_eq!(log.device_name.as_deref(), Some("Polar H10"));
        assert_eq!(log.entries[1].kind, LogEntryType::DeviceConnected);
        assert_eq!(log.entries[1].data["device_name"], "Polar H10");
        assert_eq!(log.entries[2].data["reason"], "link lost");
    }

    #[test]
    fn test_entry_payloads() {
        let (bus, _clock, mut logger) = setup();
        logger.start(config()).unwrap();

        bus.emit::<topic::AlgoStateChanged>(algo_state(128.0, AlgorithmMode::Raise, 152.0));
        bus.emit::<topic::MusicChanged>(track("a"));
        let log = logger.stop(StopReason::User).unwrap();

        assert_eq!(log.entries[0].data["config"]["target_zone"]["min_bpm"], 140.0);
        assert_eq!(log.entries[1].data["current_mode"], "RAISE");
        assert_eq!(log.entries[1].data["current_target_bpm"], 152.0);
        assert_eq!(log.entries[2].data["track_id"], "a");
        assert_eq!(log.entries[2].data["track_bpm"], 150.0);
    }

    #[test]
    fn test_lifecycle_events_published() {
        let (bus, _clock, mut logger) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for kind in [EventKind::SessionStarted, EventKind::SessionEnded] {
            let seen = Rc::clone(&seen);
            bus.subscribe(kind, move |event| seen.borrow_mut().push(event.clone()));
        }

        let id = logger.start(config()).unwrap();
        logger.stop(StopReason::Timeout).unwrap();

        let seen = seen.borrow();
        assert_eq!(
            *seen,
            vec![
                crate::events::Event::SessionStarted(SessionStart {
                    session_id: id.clone()
                }),
                crate::events::Event::SessionEnded(SessionEnd {
                    session_id: id,
                    reason: StopReason::Timeout
                }),
            ]
        );
    }

    #[test]
    fn test_restart_clears_previous_session() {
        let (bus, _clock, mut logger) = setup();
        let first = logger.start(config()).unwrap();
        bus.emit::<topic::MusicChanged>(track("a"));
        bus.emit::<topic::HrReading>(HeartRateReading::new(150.0, T0));
        logger.stop(StopReason::User).unwrap();

        let second = logger.start(config()).unwrap();
        bus.emit::<topic::HrReading>(HeartRateReading::new(150.0, T0 + 1_000));
        let log = logger.stop(StopReason::User).unwrap();

        assert_ne!(first, second);
        assert_eq!(log.time_series.len(), 1);
        assert!(log.time_series[0].current_track_id.is_none());
        assert_eq!(log.metadata.total_tracks_played, 0);
    }
}
