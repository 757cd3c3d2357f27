#![forbid(unsafe_code)]

//! Core domain model and business logic for hrtempo.
//!
//! This crate provides:
//! - Domain types (readings, zones, algorithm state, tracks, session logs)
//! - A synchronous event bus over a closed set of events
//! - The target-control strategy and the engine that drives it
//! - Track selection and a playback controller
//! - Session logging, merging and export
//! - Configuration, presets and heart-rate payload decoding

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod presets;
pub mod clock;
pub mod events;
pub mod bus;
pub mod strategy;
pub mod engine;
pub mod heartrate;
pub mod library;
pub mod playback;
pub mod logger;
pub mod export;
pub mod pipeline;
pub mod replay;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{AlgorithmConfig, Config};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{topic, Event, EventKind, Topic};
pub use bus::{EventBus, SubscriptionId, WeakEventBus};
pub use strategy::{strategy_for, strategy_named, Computation, Strategy, StrategyKind};
pub use engine::TargetEngine;
pub use heartrate::{parse_measurement, publish_measurement, ParsedHeartRate};
pub use library::{select_track, MusicLibrary, TrackSelection};
pub use playback::{PlaybackController, PlaybackSink, SilentSink};
pub use logger::SessionLogger;
pub use export::{export_events_csv, export_json, export_time_series_csv, write_exports};
pub use pipeline::Pipeline;
pub use replay::load_readings;
