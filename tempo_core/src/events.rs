//! The closed set of events exchanged over the [`EventBus`](crate::EventBus).
//!
//! Every event is a variant of [`Event`]. Each variant also has a zero-sized
//! marker in [`topic`] so subscribers and publishers can work with the typed
//! payload directly:
//!
//! ```rust,ignore
//! bus.on::<topic::HrReading>(|reading| println!("{}", reading.bpm));
//! bus.emit::<topic::HrReading>(HeartRateReading::new(72.0, now));
//! ```

use crate::{
    AlgorithmState, BleDeviceInfo, BpmTarget, ConnectionState, Disconnection, HeartRateReading,
    ModeChange, PlaybackFault, PlaybackState, SensorFault, SessionEnd, SessionStart,
    TrackMetadata,
};
use std::fmt;

/// Every event in the system
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    HrReading(HeartRateReading),
    HrConnected(BleDeviceInfo),
    HrDisconnected(Disconnection),
    HrConnectionStateChanged(ConnectionState),
    HrScanResult(BleDeviceInfo),
    HrError(SensorFault),

    AlgoTarget(BpmTarget),
    AlgoStateChanged(AlgorithmState),
    AlgoModeChanged(ModeChange),

    MusicChanged(TrackMetadata),
    MusicPlaybackStateChanged(PlaybackState),
    MusicError(PlaybackFault),

    SessionStarted(SessionStart),
    SessionEnded(SessionEnd),
}

/// Discriminant of [`Event`], used as the subscription key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    HrReading,
    HrConnected,
    HrDisconnected,
    HrConnectionStateChanged,
    HrScanResult,
    HrError,
    AlgoTarget,
    AlgoStateChanged,
    AlgoModeChanged,
    MusicChanged,
    MusicPlaybackStateChanged,
    MusicError,
    SessionStarted,
    SessionEnded,
}

impl EventKind {
    /// Wire name of the event, e.g. `hr:reading`
    pub fn name(self) -> &'static str {
        match self {
            EventKind::HrReading => "hr:reading",
            EventKind::HrConnected => "hr:connected",
            EventKind::HrDisconnected => "hr:disconnected",
            EventKind::HrConnectionStateChanged => "hr:connectionStateChanged",
            EventKind::HrScanResult => "hr:scanResult",
            EventKind::HrError => "hr:error",
            EventKind::AlgoTarget => "algo:target",
            EventKind::AlgoStateChanged => "algo:stateChanged",
            EventKind::AlgoModeChanged => "algo:modeChanged",
            EventKind::MusicChanged => "music:changed",
            EventKind::MusicPlaybackStateChanged => "music:playbackStateChanged",
            EventKind::MusicError => "music:error",
            EventKind::SessionStarted => "session:started",
            EventKind::SessionEnded => "session:ended",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::HrReading(_) => EventKind::HrReading,
            Event::HrConnected(_) => EventKind::HrConnected,
            Event::HrDisconnected(_) => EventKind::HrDisconnected,
            Event::HrConnectionStateChanged(_) => EventKind::HrConnectionStateChanged,
            Event::HrScanResult(_) => EventKind::HrScanResult,
            Event::HrError(_) => EventKind::HrError,
            Event::AlgoTarget(_) => EventKind::AlgoTarget,
            Event::AlgoStateChanged(_) => EventKind::AlgoStateChanged,
            Event::AlgoModeChanged(_) => EventKind::AlgoModeChanged,
            Event::MusicChanged(_) => EventKind::MusicChanged,
            Event::MusicPlaybackStateChanged(_) => EventKind::MusicPlaybackStateChanged,
            Event::MusicError(_) => EventKind::MusicError,
            Event::SessionStarted(_) => EventKind::SessionStarted,
            Event::SessionEnded(_) => EventKind::SessionEnded,
        }
    }
}

/// Typed view of one [`Event`] variant
pub trait Topic {
    const KIND: EventKind;
    type Payload: 'static;

    fn wrap(payload: Self::Payload) -> Event;
    fn payload(event: &Event) -> Option<&Self::Payload>;
}

macro_rules! topics {
    ($($name:ident => $payload:ty),* $(,)?) => {
        /// Marker types, one per [`Event`] variant
        pub mod topic {
            use super::*;

            $(
                #[derive(Clone, Copy, Debug)]
                pub struct $name;

                impl Topic for $name {
                    const KIND: EventKind = EventKind::$name;
                    type Payload = $payload;

                    fn wrap(payload: $payload) -> Event {
                        Event::$name(payload)
                    }

                    fn payload(event: &Event) -> Option<&$payload> {
                        match event {
                            Event::$name(payload) => Some(payload),
                            _ => None,
                        }
                    }
                }
            )*
        }
    };
}

topics! {
    HrReading => HeartRateReading,
    HrConnected => BleDeviceInfo,
    HrDisconnected => Disconnection,
    HrConnectionStateChanged => ConnectionState,
    HrScanResult => BleDeviceInfo,
    HrError => SensorFault,
    AlgoTarget => BpmTarget,
    AlgoStateChanged => AlgorithmState,
    AlgoModeChanged => ModeChange,
    MusicChanged => TrackMetadata,
    MusicPlaybackStateChanged => PlaybackState,
    MusicError => PlaybackFault,
    SessionStarted => SessionStart,
    SessionEnded => SessionEnd,
}
