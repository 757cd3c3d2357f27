//! Linear stepping strategy with dwell-time hysteresis.
//!
//! ## Mode transitions
//!
//! - **MAINTAIN → RAISE/LOWER**: the smoothed HR has been continuously below
//!   (above) the zone for at least `dwell_time_ms`.
//! - **RAISE/LOWER → MAINTAIN**: the retained history has been continuously
//!   in zone for at least `return_to_maintain_ms`.
//! - **RAISE ↔ LOWER**: the smoothed HR crossed to the opposite side and the
//!   dwell time re-accumulated. Evaluated after the return check and wins.
//!
//! ## Target stepping
//!
//! The step grows with the distance of the smoothed HR from the zone midpoint
//! (capped at two half-widths) and is clamped to the music BPM range, so the
//! target only ever moves by accumulation.

use super::{Computation, Strategy, StrategyKind};
use crate::{
    AlgorithmConfig, AlgorithmMode, AlgorithmState, BpmTarget, HeartRateReading, HrZone,
    ZonePosition,
};
use std::collections::VecDeque;

/// Error magnitudes beyond this many half-widths do not grow the step
const MAX_ERROR_MAGNITUDE: f64 = 2.0;

/// Linear target-control strategy
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearStrategy;

impl Strategy for LinearStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Linear
    }

    fn initial_state(&self, config: &AlgorithmConfig, now_ms: i64) -> AlgorithmState {
        let bpm_range = config.max_music_bpm - config.min_music_bpm;

        AlgorithmState {
            current_mode: AlgorithmMode::Maintain,
            mode_entered_at: now_ms,
            smoothed_hr: config.target_zone.midpoint(),
            hr_history: VecDeque::with_capacity(config.smoothing_window),
            consecutive_out_of_zone_ms: 0,
            current_target_bpm: config.min_music_bpm + bpm_range / 2.0,
            ms_since_last_target_change: None,
        }
    }

    fn compute(
        &self,
        reading: &HeartRateReading,
        state: &AlgorithmState,
        config: &AlgorithmConfig,
    ) -> Computation {
        let zone = &config.target_zone;
        let elapsed_ms = time_delta(reading, state.hr_history.back());

        let hr_history = push_bounded(&state.hr_history, reading, config.smoothing_window);
        let smoothed_hr = mean_bpm(&hr_history);
        let position = zone.classify(smoothed_hr);

        let consecutive_out_of_zone_ms = match position {
            ZonePosition::InZone => 0,
            _ => state.consecutive_out_of_zone_ms + elapsed_ms,
        };
        let ms_since_last_target_change = state
            .ms_since_last_target_change
            .map(|ms| ms + elapsed_ms);

        let current_mode = next_mode(
            state.current_mode,
            position,
            consecutive_out_of_zone_ms,
            &hr_history,
            config,
        );
        let mode_entered_at = if current_mode != state.current_mode {
            tracing::debug!(
                from = %state.current_mode,
                to = %current_mode,
                smoothed_hr,
                "Mode transition"
            );
            reading.timestamp
        } else {
            state.mode_entered_at
        };

        let error_magnitude = error_magnitude(smoothed_hr, zone);
        let step = step_size(error_magnitude, config);

        let next_target_bpm = match current_mode {
            AlgorithmMode::Raise => (state.current_target_bpm + step).min(config.max_music_bpm),
            AlgorithmMode::Lower => (state.current_target_bpm - step).max(config.min_music_bpm),
            AlgorithmMode::Maintain => state.current_target_bpm,
        };

        let bpm_delta = (next_target_bpm - state.current_target_bpm).abs();
        let cooled_down = ms_since_last_target_change
            .map_or(true, |ms| ms as f64 >= config.cooldown_ms());
        let should_emit = bpm_delta >= 1.0 && cooled_down;
        let rounded_bpm = next_target_bpm.round();

        let target = should_emit.then(|| BpmTarget {
            target_bpm: rounded_bpm as i64,
            triggering_hr: reading.bpm,
            timestamp: reading.timestamp,
            reason: format!(
                "Mode {}: HR {} {} zone [{}-{}]",
                current_mode,
                smoothed_hr.round() as i64,
                position,
                zone.min_bpm,
                zone.max_bpm
            ),
            urgency: (error_magnitude / 2.0).min(1.0),
            mode: current_mode,
        });

        let next_state = AlgorithmState {
            current_mode,
            mode_entered_at,
            smoothed_hr,
            hr_history,
            consecutive_out_of_zone_ms,
            current_target_bpm: if should_emit { rounded_bpm } else { next_target_bpm },
            ms_since_last_target_change: if should_emit {
                Some(0)
            } else {
                ms_since_last_target_change
            },
        };

        Computation { next_state, target }
    }
}

/// Time since the previous buffered reading; zero for the first reading.
/// Out-of-order timestamps count as zero.
fn time_delta(current: &HeartRateReading, previous: Option<&HeartRateReading>) -> i64 {
    previous.map_or(0, |prev| (current.timestamp - prev.timestamp).max(0))
}

/// Copy of `history` with `reading` appended, oldest entries evicted past `capacity`
fn push_bounded(
    history: &VecDeque<HeartRateReading>,
    reading: &HeartRateReading,
    capacity: usize,
) -> VecDeque<HeartRateReading> {
    let capacity = capacity.max(1);
    let mut next = VecDeque::with_capacity(capacity);
    let keep = history.len().min(capacity - 1);
    next.extend(history.iter().skip(history.len() - keep).cloned());
    next.push_back(reading.clone());
    next
}

fn mean_bpm(history: &VecDeque<HeartRateReading>) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    history.iter().map(|r| r.bpm).sum::<f64>() / history.len() as f64
}

/// Distance from the zone midpoint in half-widths, capped
fn error_magnitude(smoothed_hr: f64, zone: &HrZone) -> f64 {
    ((smoothed_hr - zone.midpoint()).abs() / (zone.width() / 2.0)).min(MAX_ERROR_MAGNITUDE)
}

fn step_size(error_magnitude: f64, config: &AlgorithmConfig) -> f64 {
    let base_step = (config.max_music_bpm - config.min_music_bpm) / 100.0;
    base_step * config.responsiveness * error_magnitude
}

fn next_mode(
    current: AlgorithmMode,
    position: ZonePosition,
    consecutive_out_of_zone_ms: i64,
    history: &VecDeque<HeartRateReading>,
    config: &AlgorithmConfig,
) -> AlgorithmMode {
    let dwell_met = consecutive_out_of_zone_ms >= config.dwell_time_ms;

    match current {
        AlgorithmMode::Maintain => match position {
            ZonePosition::Above if dwell_met => AlgorithmMode::Lower,
            ZonePosition::Below if dwell_met => AlgorithmMode::Raise,
            _ => AlgorithmMode::Maintain,
        },
        AlgorithmMode::Raise | AlgorithmMode::Lower => {
            let mut next = current;
            if position == ZonePosition::InZone
                && consecutive_in_zone_ms(history, &config.target_zone)
                    >= config.return_to_maintain_ms
            {
                next = AlgorithmMode::Maintain;
            }

            // Reversal is checked last and overrides the return above
            match (current, position) {
                (AlgorithmMode::Raise, ZonePosition::Above) if dwell_met => AlgorithmMode::Lower,
                (AlgorithmMode::Lower, ZonePosition::Below) if dwell_met => AlgorithmMode::Raise,
                _ => next,
            }
        }
    }
}

/// Walk the history backwards summing inter-sample gaps until the first
/// out-of-zone sample
fn consecutive_in_zone_ms(history: &VecDeque<HeartRateReading>, zone: &HrZone) -> i64 {
    if history.len() < 2 {
        return 0;
    }

    let mut duration = 0;
    for i in (1..history.len()).rev() {
        let reading = &history[i];
        if zone.classify(reading.bpm) != ZonePosition::InZone {
            break;
        }
        duration += reading.timestamp - history[i - 1].timestamp;
    }
    duration
}
