//! Playback controller: turns `algo:target` into track changes.
//!
//! The audio transport itself sits behind [`PlaybackSink`].

use crate::bus::{EventBus, SubscriptionId, WeakEventBus};
use crate::events::topic;
use crate::library::{select_track, MusicLibrary};
use crate::{PlaybackFault, PlaybackState, Result, TrackMetadata};
use std::cell::RefCell;
use std::rc::Rc;

/// The audio player
pub trait PlaybackSink {
    /// Replace whatever is playing with `track` and start it
    fn load(&mut self, track: &TrackMetadata) -> Result<()>;

    fn is_playing(&self) -> bool;

    fn position_seconds(&self) -> f64 {
        0.0
    }
}

/// A sink that plays nothing and remembers what it was asked to load
#[derive(Clone, Debug, Default)]
pub struct SilentSink {
    pub loaded: Vec<String>,
}

impl PlaybackSink for SilentSink {
    fn load(&mut self, track: &TrackMetadata) -> Result<()> {
        self.loaded.push(track.id.clone());
        Ok(())
    }

    fn is_playing(&self) -> bool {
        !self.loaded.is_empty()
    }
}

struct PlayerCore {
    library: Rc<RefCell<MusicLibrary>>,
    sink: Box<dyn PlaybackSink>,
    current: Option<TrackMetadata>,
    target_bpm: Option<i64>,
}

enum Outcome {
    Unchanged,
    Changed(TrackMetadata, PlaybackState),
    Failed(PlaybackFault),
}

impl PlayerCore {
    fn select_and_load(&mut self, target_bpm: i64) -> Outcome {
        let selection = {
            let library = self.library.borrow();
            let current_id = self.current.as_ref().map(|t| t.id.as_str());
            select_track(target_bpm as f64, &library, current_id)
        };

        let Some(selection) = selection else {
            tracing::debug!("No track available for {} BPM", target_bpm);
            return Outcome::Unchanged;
        };
        if self.current.as_ref().map(|t| &t.id) == Some(&selection.track.id) {
            return Outcome::Unchanged;
        }

        let track = selection.track;
        if let Err(err) = self.sink.load(&track) {
            tracing::warn!("Failed to load track {}: {}", track.id, err);
            return Outcome::Failed(PlaybackFault {
                message: format!("failed to load track {}: {}", track.id, err),
            });
        }

        tracing::info!(
            "Playing '{}' by {} ({} BPM for target {})",
            track.title,
            track.artist,
            track.bpm,
            target_bpm
        );
        self.current = Some(track.clone());
        let state = self.playback_state();
        Outcome::Changed(track, state)
    }

    fn playback_state(&self) -> PlaybackState {
        PlaybackState {
            current_track: self.current.clone(),
            is_playing: self.sink.is_playing(),
            position_seconds: self.sink.position_seconds(),
            duration_seconds: self.current.as_ref().map_or(0.0, |t| t.duration_seconds),
            target_bpm: self.target_bpm,
        }
    }
}

/// Subscribes to `algo:target` and keeps the sink on the closest track
pub struct PlaybackController {
    bus: EventBus,
    core: Rc<RefCell<PlayerCore>>,
    subscription: Option<SubscriptionId>,
}

impl PlaybackController {
    pub fn new(
        bus: EventBus,
        library: Rc<RefCell<MusicLibrary>>,
        sink: Box<dyn PlaybackSink>,
    ) -> Self {
        Self {
            bus,
            core: Rc::new(RefCell::new(PlayerCore {
                library,
                sink,
                current: None,
                target_bpm: None,
            })),
            subscription: None,
        }
    }

    pub fn start(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let core = Rc::clone(&self.core);
        let bus = self.bus.downgrade();
        let id = self.bus.on::<topic::AlgoTarget, _>(move |target| {
            core.borrow_mut().target_bpm = Some(target.target_bpm);
            reselect(&core, &bus, target.target_bpm);
        });
        self.subscription = Some(id);
        tracing::info!("Playback controller started");
    }

    pub fn stop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.bus.unsubscribe(id);
            tracing::info!("Playback controller stopped");
        }
    }

    /// Select again for the last requested BPM
    pub fn skip(&self) {
        let target = self.core.borrow().target_bpm;
        if let Some(target_bpm) = target {
            reselect(&self.core, &self.bus.downgrade(), target_bpm);
        }
    }

    pub fn current_track(&self) -> Option<TrackMetadata> {
        self.core.borrow().current.clone()
    }

    pub fn target_bpm(&self) -> Option<i64> {
        self.core.borrow().target_bpm
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.core.borrow().playback_state()
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn reselect(core: &RefCell<PlayerCore>, bus: &WeakEventBus, target_bpm: i64) {
    let Some(bus) = bus.upgrade() else {
        return;
    };

    let outcome = core.borrow_mut().select_and_load(target_bpm);
    match outcome {
        Outcome::Unchanged => {}
        Outcome::Changed(track, state) => {
            bus.emit::<topic::MusicChanged>(track);
            bus.emit::<topic::MusicPlaybackStateChanged>(state);
        }
        Outcome::Failed(fault) => bus.emit::<topic::MusicError>(fault),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventKind};
    use crate::{AlgorithmMode, BpmTarget, Error};

    fn track(id: &str, bpm: f64) -> TrackMetadata {
        TrackMetadata {
            id: id.into(),
            title: id.to_uppercase(),
            artist: "Artist".into(),
            album: None,
            duration_seconds: 200.0,
            bpm,
            url: format!("file:///{}.mp3", id),
            artwork_url: None,
            genre: None,
        }
    }

    fn target(bpm: i64) -> BpmTarget {
        BpmTarget {
            target_bpm: bpm,
            triggering_hr: 120.0,
            timestamp: 0,
            reason: "test".into(),
            urgency: 0.5,
            mode: AlgorithmMode::Raise,
        }
    }

    struct FailingSink;

    impl PlaybackSink for FailingSink {
        fn load(&mut self, _track: &TrackMetadata) -> Result<()> {
            Err(Error::Other("device busy".into()))
        }

        fn is_playing(&self) -> bool {
            false
        }
    }

    fn setup(sink: Box<dyn PlaybackSink>) -> (EventBus, PlaybackController, Rc<RefCell<Vec<Event>>>) {
        let bus = EventBus::new();
        let mut library = MusicLibrary::new();
        library.load_tracks(vec![track("slow", 120.0), track("mid", 140.0), track("fast", 170.0)]);
        let mut controller = PlaybackController::new(bus.clone(), Rc::new(RefCell::new(library)), sink);
        controller.start();

        let seen = Rc::new(RefCell::new(Vec::new()));
        for kind in [
            EventKind::MusicChanged,
            EventKind::MusicPlaybackStateChanged,
            EventKind::MusicError,
        ] {
            let seen = Rc::clone(&seen);
            bus.subscribe(kind, move |event| seen.borrow_mut().push(event.clone()));
        }
        (bus, controller, seen)
    }

    #[test]
    fn test_target_loads_closest_track() {
        let (bus, controller, seen) = setup(Box::new(SilentSink::default()));

        bus.emit::<topic::AlgoTarget>(target(138));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], Event::MusicChanged(track("mid", 140.0)));
        match &seen[1] {
            Event::MusicPlaybackStateChanged(state) => {
                assert!(state.is_playing);
                assert_eq!(state.target_bpm, Some(138));
                assert_eq!(state.duration_seconds, 200.0);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(controller.current_track().map(|t| t.id), Some("mid".into()));
    }

    #[test]
    fn test_same_track_is_not_reloaded() {
        let (bus, controller, seen) = setup(Box::new(SilentSink::default()));

        bus.emit::<topic::AlgoTarget>(target(138));
        bus.emit::<topic::AlgoTarget>(target(142));

        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(controller.target_bpm(), Some(142));
    }

    #[test]
    fn test_sink_failure_publishes_error() {
        let (bus, controller, seen) = setup(Box::new(FailingSink));

        bus.emit::<topic::AlgoTarget>(target(170));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind(), EventKind::MusicError);
        assert!(controller.current_track().is_none());
    }

    #[test]
    fn test_skip_without_target_does_nothing() {
        let (_bus, controller, seen) = setup(Box::new(SilentSink::default()));
        controller.skip();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_skip_moves_to_equally_close_alternative() {
        let bus = EventBus::new();
        let mut library = MusicLibrary::new();
        library.load_tracks(vec![track("a", 130.0), track("b", 130.0)]);
        let mut controller =
            PlaybackController::new(bus.clone(), Rc::new(RefCell::new(library)), Box::new(SilentSink::default()));
        controller.start();

        bus.emit::<topic::AlgoTarget>(target(130));
        assert_eq!(controller.current_track().map(|t| t.id), Some("a".into()));

        controller.skip();
        assert_eq!(controller.current_track().map(|t| t.id), Some("b".into()));
    }

    #[test]
    fn test_stopped_controller_ignores_targets() {
        let (bus, mut controller, seen) = setup(Box::new(SilentSink::default()));
        controller.stop();

        bus.emit::<topic::AlgoTarget>(target(120));

        assert!(seen.borrow().is_empty());
        assert_eq!(bus.subscriber_count(EventKind::AlgoTarget), 0);
    }
}
