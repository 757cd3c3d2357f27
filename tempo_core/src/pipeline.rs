//! Composition of the engine, playback controller and session logger.
//!
//! Components subscribe in stage order: engine, playback, logger. Because
//! delivery is synchronous and depth-first, every `algo:*` and `music:*`
//! event caused by a reading has been recorded by the time the logger's own
//! `hr:reading` handler builds the row for it.

use crate::bus::EventBus;
use crate::clock::Clock;
use crate::engine::TargetEngine;
use crate::events::topic;
use crate::heartrate;
use crate::library::MusicLibrary;
use crate::logger::SessionLogger;
use crate::playback::{PlaybackController, PlaybackSink};
use crate::{AlgorithmConfig, HeartRateReading, Result, SessionLog, StopReason};
use std::cell::RefCell;
use std::rc::Rc;

/// A fully wired target-control session
pub struct Pipeline {
    bus: EventBus,
    engine: TargetEngine,
    playback: PlaybackController,
    logger: SessionLogger,
    library: Rc<RefCell<MusicLibrary>>,
}

impl Pipeline {
    pub fn new(
        bus: EventBus,
        config: AlgorithmConfig,
        library: MusicLibrary,
        sink: Box<dyn PlaybackSink>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let library = Rc::new(RefCell::new(library));

        let mut engine = TargetEngine::new(bus.clone(), config, Rc::clone(&clock));
        engine.start();

        let mut playback = PlaybackController::new(bus.clone(), Rc::clone(&library), sink);
        playback.start();

        // Subscribes on start_session, after the stages above
        let logger = SessionLogger::new(bus.clone(), clock);

        Self {
            bus,
            engine,
            playback,
            logger,
            library,
        }
    }

    /// Start recording with the engine's current configuration
    pub fn start_session(&mut self) -> Result<String> {
        self.logger.start(self.engine.config())
    }

    pub fn stop_session(&mut self, reason: StopReason) -> Result<SessionLog> {
        self.logger.stop(reason)
    }

    /// Publish one reading as if it came from the sensor
    pub fn feed(&self, reading: HeartRateReading) {
        self.bus.emit::<topic::HrReading>(reading);
    }

    /// Decode and publish a raw measurement payload
    pub fn feed_measurement(&self, bytes: &[u8], timestamp: i64) -> Result<HeartRateReading> {
        heartrate::publish_measurement(&self.bus, bytes, timestamp)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn engine(&self) -> &TargetEngine {
        &self.engine
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn logger(&self) -> &SessionLogger {
        &self.logger
    }

    pub fn library(&self) -> Rc<RefCell<MusicLibrary>> {
        Rc::clone(&self.library)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::EventKind;
    use crate::playback::SilentSink;
    use crate::{AlgorithmMode, HrZone, LogEntryType, TrackMetadata};

    const T0: i64 = 1_700_000_000_000;

    fn track(id: &str, bpm: f64) -> TrackMetadata {
        TrackMetadata {
            id: id.into(),
            title: format!("Song {}", id),
            artist: "Band".into(),
            album: None,
            duration_seconds: 240.0,
            bpm,
            url: format!("file:///{}.mp3", id),
            artwork_url: None,
            genre: None,
        }
    }

    fn pipeline() -> Pipeline {
        let mut config = AlgorithmConfig::for_zone(HrZone::new("Test", 140.0, 160.0, "#000000"));
        config.responsiveness = 1.0;
        config.cooldown_seconds = 0.0;
        config.smoothing_window = 1;
        config.dwell_time_ms = 0;

        let mut library = MusicLibrary::new();
        library.load_tracks(vec![track("steady", 150.0), track("push", 153.0)]);

        Pipeline::new(
            EventBus::new(),
            config,
            library,
            Box::new(SilentSink::default()),
            Rc::new(ManualClock::new(T0)),
        )
    }

    #[test]
    fn test_stages_subscribe_in_order() {
        let pipeline = pipeline();
        assert_eq!(pipeline.bus().subscriber_count(EventKind::HrReading), 1);
        assert_eq!(pipeline.bus().subscriber_count(EventKind::AlgoTarget), 1);
        assert!(pipeline.engine().is_running());
        assert!(!pipeline.logger().is_active());
    }

    #[test]
    fn test_reading_flows_through_every_stage() {
        crate::logging::init_test();
        let mut pipeline = pipeline();
        pipeline.start_session().unwrap();

        pipeline.feed(HeartRateReading::new(120.0, T0 + 1_000));
        let log = pipeline.stop_session(StopReason::User).unwrap();

        let row = &log.time_series[0];
        assert_eq!(row.current_mode, AlgorithmMode::Raise);
        assert_eq!(row.current_target_bpm, 152.0);
        assert_eq!(row.current_track_id.as_deref(), Some("push"));
        assert_eq!(log.metadata.total_bpm_target_changes, 1);
        assert_eq!(log.metadata.total_tracks_played, 1);

        let kinds: Vec<LogEntryType> = log.entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LogEntryType::SessionStart,
                LogEntryType::AlgorithmModeChange,
                LogEntryType::AlgorithmState,
                LogEntryType::MusicChange,
                LogEntryType::MusicPlayback,
                LogEntryType::AlgorithmTarget,
                LogEntryType::HrReading,
                LogEntryType::SessionEnd,
            ]
        );
    }

    #[test]
    fn test_malformed_measurement_is_logged_as_error() {
        let mut pipeline = pipeline();
        pipeline.start_session().unwrap();

        assert!(pipeline.feed_measurement(&[0x01], T0).is_err());
        pipeline.feed_measurement(&[0x00, 150], T0 + 1_000).unwrap();
        let log = pipeline.stop_session(StopReason::User).unwrap();

        assert_eq!(log.time_series.len(), 1);
        assert!(log.entries.iter().any(|e| e.kind == LogEntryType::Error));
    }

    #[test]
    fn test_library_changes_apply_to_next_selection() {
        let pipeline = pipeline();
        pipeline.library().borrow_mut().load_tracks(Vec::new());

        pipeline.feed(HeartRateReading::new(120.0, T0));

        assert!(pipeline.playback().current_track().is_none());
        assert_eq!(pipeline.playback().target_bpm(), Some(152));
    }
}
