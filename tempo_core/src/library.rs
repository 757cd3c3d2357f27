//! Track library and tempo-based track selection.

use crate::clock::{Clock, SystemClock};
use crate::{Result, TrackMetadata};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

/// The set of tracks available for playback, indexed by rounded BPM
#[derive(Clone)]
pub struct MusicLibrary {
    tracks: Vec<TrackMetadata>,
    bpm_index: BTreeMap<i64, Vec<String>>,
    last_updated: i64,
    clock: Rc<dyn Clock>,
}

impl Default for MusicLibrary {
    fn default() -> Self {
        Self::with_clock(Rc::new(SystemClock))
    }
}

impl fmt::Debug for MusicLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MusicLibrary")
            .field("tracks", &self.tracks)
            .field("bpm_index", &self.bpm_index)
            .field("last_updated", &self.last_updated)
            .finish()
    }
}

impl MusicLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty library that stamps modifications with `clock`
    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self {
            tracks: Vec::new(),
            bpm_index: BTreeMap::new(),
            last_updated: 0,
            clock,
        }
    }

    /// Read a JSON array of tracks
    pub fn load_from(path: &Path, clock: Rc<dyn Clock>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let tracks: Vec<TrackMetadata> = serde_json::from_str(&contents)?;
        tracing::info!("Loaded {} tracks from {:?}", tracks.len(), path);

        let mut library = Self::with_clock(clock);
        library.load_tracks(tracks);
        Ok(library)
    }

    /// Replace the whole library
    pub fn load_tracks(&mut self, tracks: Vec<TrackMetadata>) {
        self.tracks = tracks;
        self.touch();
    }

    pub fn add_track(&mut self, track: TrackMetadata) {
        self.tracks.push(track);
        self.touch();
    }

    /// Remove every track with this id. Returns whether anything was removed.
    pub fn remove_track(&mut self, track_id: &str) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.id != track_id);
        let removed = self.tracks.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn tracks(&self) -> &[TrackMetadata] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Ids of the tracks whose BPM rounds to `bpm`
    pub fn ids_at_bpm(&self, bpm: i64) -> &[String] {
        self.bpm_index.get(&bpm).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bpm_index(&self) -> &BTreeMap<i64, Vec<String>> {
        &self.bpm_index
    }

    /// Unix ms of the last modification, 0 if never modified
    pub fn last_updated(&self) -> i64 {
        self.last_updated
    }

    fn touch(&mut self) {
        self.bpm_index = build_bpm_index(&self.tracks);
        self.last_updated = self.clock.now_ms();
    }
}

fn build_bpm_index(tracks: &[TrackMetadata]) -> BTreeMap<i64, Vec<String>> {
    let mut index: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for track in tracks {
        index
            .entry(track.bpm.round() as i64)
            .or_default()
            .push(track.id.clone());
    }
    index
}

/// Outcome of [`select_track`]
#[derive(Clone, Debug, PartialEq)]
pub struct TrackSelection {
    pub track: TrackMetadata,
    pub actual_bpm: f64,
    pub requested_bpm: f64,
    pub bpm_delta: f64,
}

/// Pick the track whose BPM is closest to `target_bpm`.
///
/// Among equally close tracks, the first one that is not `current_id` wins,
/// so a tie never repeats the current track. Returns `None` for an empty
/// library.
pub fn select_track(
    target_bpm: f64,
    library: &MusicLibrary,
    current_id: Option<&str>,
) -> Option<TrackSelection> {
    let mut best: Vec<&TrackMetadata> = Vec::new();
    let mut best_delta = f64::INFINITY;

    for track in library.tracks() {
        let delta = (track.bpm - target_bpm).abs();
        if delta < best_delta {
            best_delta = delta;
            best.clear();
            best.push(track);
        } else if delta == best_delta {
            best.push(track);
        }
    }

    let first = *best.first()?;
    let selected = match current_id {
        Some(current) if best.len() > 1 => best
            .iter()
            .copied()
            .find(|t| t.id != current)
            .unwrap_or(first),
        _ => first,
    };

    Some(TrackSelection {
        track: selected.clone(),
        actual_bpm: selected.bpm,
        requested_bpm: target_bpm,
        bpm_delta: (selected.bpm - target_bpm).abs(),
    })
}
