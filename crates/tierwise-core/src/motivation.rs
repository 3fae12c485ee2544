//! Behavioral motivation model: consistency plus engagement.
//!
//! Consistency rewards regular practice on working weekdays. Engagement
//! rewards weekend initiative, attempt intensity and spread across the week.
//! `engagement_weight_alpha` tilts the balance between the two.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::attempts::AttemptSet;
use crate::model::SystemConfig;
use crate::scoring::clamp;

/// Working days needed for full consistency.
const CONSISTENCY_TARGET_DAYS: f64 = 5.0;
/// Expected attempts per active working day at full intensity.
const ATTEMPTS_PER_ACTIVE_DAY: f64 = 15.0;
const WEEKEND_BONUS: f64 = 0.4;
const MAX_INTENSITY: f64 = 0.4;
const MAX_DISTRIBUTION: f64 = 0.2;

/// Activity-day counts over one evaluation period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDetails {
    /// Distinct active days falling on a working weekday.
    pub active_working_days: u32,
    /// Distinct active days falling outside the working weekdays.
    pub weekend_days: u32,
    pub attempts_count: u32,
    pub unique_days: u32,
}

impl ActivityDetails {
    pub fn from_attempts(attempts: &AttemptSet, config: &SystemConfig) -> Self {
        let days = attempts.distinct_days();
        let active_working_days = days
            .iter()
            .filter(|d| config.is_working_day(d.weekday()))
            .count() as u32;
        let unique_days = days.len() as u32;

        Self {
            active_working_days,
            weekend_days: unique_days - active_working_days,
            attempts_count: attempts.len() as u32,
            unique_days,
        }
    }
}

/// Split of the motivation score between its two components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotivationWeights {
    pub consistency: f64,
    pub engagement: f64,
}

impl MotivationWeights {
    /// `1 / (1 + alpha)` and `alpha / (1 + alpha)`; negative alpha is read as 0.
    pub fn from_alpha(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() { alpha.max(0.0) } else { 0.0 };
        Self {
            consistency: 1.0 / (1.0 + alpha),
            engagement: alpha / (1.0 + alpha),
        }
    }
}

pub fn consistency(details: &ActivityDetails) -> f64 {
    (details.active_working_days as f64 / CONSISTENCY_TARGET_DAYS).min(1.0)
}

pub fn engagement(details: &ActivityDetails) -> f64 {
    let weekend = if details.weekend_days > 0 {
        WEEKEND_BONUS
    } else {
        0.0
    };
    let intensity = if details.active_working_days > 0 {
        let expected = details.active_working_days as f64 * ATTEMPTS_PER_ACTIVE_DAY;
        (details.attempts_count as f64 / expected).min(MAX_INTENSITY)
    } else {
        0.0
    };
    let distribution = (details.unique_days as f64 / 7.0).min(MAX_DISTRIBUTION);

    (weekend + intensity + distribution).min(1.0)
}

/// Motivation score in [0, 1].
pub fn compute_motivation(details: &ActivityDetails, engagement_weight_alpha: f64) -> f64 {
    let w = MotivationWeights::from_alpha(engagement_weight_alpha);
    clamp(
        w.consistency * consistency(details) + w.engagement * engagement(details),
        0.0,
        1.0,
    )
}
