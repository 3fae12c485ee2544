//! Level transition policy.
//!
//! A four-state machine with asymmetric hysteresis bands: a student moves up
//! only at or above a band's upper threshold and down only below its lower
//! threshold, so identical scores near a boundary never flip the level back
//! and forth. `high` reuses the medium band; `mastered` is terminal.

use crate::model::{Level, LevelChange, LevelThresholds};

/// Decide the next level for `current` given a total score.
pub fn decide_transition(
    current: Level,
    total_score: f64,
    thresholds: &LevelThresholds,
) -> (Level, LevelChange) {
    let t = thresholds;
    match current {
        Level::Low => {
            if total_score >= t.max_threshold_low {
                (Level::Medium, LevelChange::Up)
            } else {
                (Level::Low, LevelChange::Stay)
            }
        }
        Level::Medium => {
            if total_score < t.min_threshold_medium {
                (Level::Low, LevelChange::Down)
            } else if total_score >= t.max_threshold_medium {
                (Level::High, LevelChange::Up)
            } else {
                (Level::Medium, LevelChange::Stay)
            }
        }
        Level::High => {
            if total_score < t.min_threshold_medium {
                (Level::Medium, LevelChange::Down)
            } else if total_score >= t.max_threshold_medium {
                (Level::Mastered, LevelChange::Mastered)
            } else {
                (Level::High, LevelChange::Stay)
            }
        }
        Level::Mastered => (Level::Mastered, LevelChange::Stay),
    }
}

/// Same as [`decide_transition`] for a level stored as free text.
///
/// A blank label is treated as `low`; any label that is not a known level
/// is terminal and stays `mastered`.
pub fn decide_transition_label(
    current: &str,
    total_score: f64,
    thresholds: &LevelThresholds,
) -> (Level, LevelChange) {
    let level = if current.trim().is_empty() {
        Level::Low
    } else {
        current.parse().unwrap_or(Level::Mastered)
    };
    decide_transition(level, total_score, thresholds)
}
