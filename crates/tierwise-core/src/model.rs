//! Core data model types for tierwise.
//!
//! Attempts, levels, per-level and system configuration, and evaluation
//! periods. These are the inputs every scoring model works from.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::penalty::PenaltyWeights;

pub type UserId = u64;
pub type TopicId = u64;
pub type TaskId = u64;

/// A difficulty tier assigned per student per topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
    Mastered,
}

impl Level {
    /// Every level, in progression order.
    pub const ALL: [Level; 4] = [Level::Low, Level::Medium, Level::High, Level::Mastered];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
            Level::Mastered => "mastered",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Level::Low),
            "medium" => Ok(Level::Medium),
            "high" => Ok(Level::High),
            "mastered" => Ok(Level::Mastered),
            other => Err(format!("unknown level: {other}")),
        }
    }
}

/// Kind of transition produced by the level policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelChange {
    Up,
    Down,
    Stay,
    Mastered,
}

impl fmt::Display for LevelChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelChange::Up => write!(f, "up"),
            LevelChange::Down => write!(f, "down"),
            LevelChange::Stay => write!(f, "stay"),
            LevelChange::Mastered => write!(f, "mastered"),
        }
    }
}

/// One graded submission by a student for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// Task this submission was for.
    pub task_id: TaskId,
    /// Outcome of this single submission.
    pub is_correct: bool,
    /// Seconds spent; absent or zero values are ignored by timing statistics.
    #[serde(default)]
    pub time_spent: Option<f64>,
    /// 1-based ordinal of this submission for the (student, task) pair.
    #[serde(default = "default_attempt_number")]
    pub attempt_number: u32,
    /// Submission time, used for period filtering and weekday bucketing.
    pub created_at: NaiveDateTime,
}

pub(crate) fn default_attempt_number() -> u32 {
    1
}

/// An attempt as served by an attempt store, with the task metadata needed
/// to infer a level when no progress row exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAttempt {
    pub user_id: UserId,
    pub topic_id: TopicId,
    /// Level of the attempted task, when the store knows it.
    #[serde(default)]
    pub task_level: Option<Level>,
    #[serde(flatten)]
    pub attempt: Attempt,
}

/// Per topic × level scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Distinct solved tasks that count as full progress.
    pub task_count_threshold: u32,
    /// Expected solve duration in seconds.
    pub reference_time: f64,
    /// Multipliers for a first success on the 2nd or 3rd attempt.
    #[serde(default)]
    pub penalty_weights: PenaltyWeights,
}

impl LevelConfig {
    /// Parameters used when a topic has no configuration for a level.
    pub fn fallback() -> Self {
        Self {
            task_count_threshold: 20,
            reference_time: 300.0,
            penalty_weights: PenaltyWeights::standard(),
        }
    }
}

/// Hysteresis bands used by the level transition policy.
///
/// `high` reuses the medium band in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelThresholds {
    pub min_threshold_low: f64,
    pub max_threshold_low: f64,
    pub min_threshold_medium: f64,
    pub max_threshold_medium: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            min_threshold_low: 0.3,
            max_threshold_low: 0.7,
            min_threshold_medium: 0.4,
            max_threshold_medium: 0.8,
        }
    }
}

/// Weights applied by the score combiner. Not required to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub accuracy: f64,
    pub time: f64,
    pub progress: f64,
    pub motivation: f64,
}

/// Global evaluation configuration; one snapshot is read per batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub weight_accuracy: f64,
    pub weight_time: f64,
    pub weight_progress: f64,
    pub weight_motivation: f64,
    /// Balance between consistency and engagement in the motivation model.
    pub engagement_weight_alpha: f64,
    /// Weekday indices (Monday = 0) treated as expected activity days.
    pub working_weekdays: Vec<u32>,
    /// Length of the default trailing evaluation period.
    pub evaluation_period_days: u32,
    #[serde(flatten)]
    pub thresholds: LevelThresholds,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            weight_accuracy: 0.3,
            weight_time: 0.2,
            weight_progress: 0.3,
            weight_motivation: 0.2,
            engagement_weight_alpha: 0.667,
            working_weekdays: vec![0, 1, 2, 3, 4],
            evaluation_period_days: 7,
            thresholds: LevelThresholds::default(),
        }
    }
}

impl SystemConfig {
    pub fn weights(&self) -> ScoreWeights {
        ScoreWeights {
            accuracy: self.weight_accuracy,
            time: self.weight_time,
            progress: self.weight_progress,
            motivation: self.weight_motivation,
        }
    }

    /// Returns `true` if `day` is one of the configured working weekdays.
    pub fn is_working_day(&self, day: Weekday) -> bool {
        self.working_weekdays.contains(&day.num_days_from_monday())
    }

    /// Clamp every weight, alpha and threshold into [0, 1], swap inverted
    /// bands, and drop weekday indices outside 0..=6.
    pub fn sanitized(&self) -> Self {
        let unit = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        let band = |min: f64, max: f64| {
            let (min, max) = (unit(min), unit(max));
            if min > max {
                (max, min)
            } else {
                (min, max)
            }
        };

        let (min_low, max_low) = band(
            self.thresholds.min_threshold_low,
            self.thresholds.max_threshold_low,
        );
        let (min_med, max_med) = band(
            self.thresholds.min_threshold_medium,
            self.thresholds.max_threshold_medium,
        );

        let working_weekdays: BTreeSet<u32> = self
            .working_weekdays
            .iter()
            .copied()
            .filter(|d| *d <= 6)
            .collect();

        Self {
            weight_accuracy: unit(self.weight_accuracy),
            weight_time: unit(self.weight_time),
            weight_progress: unit(self.weight_progress),
            weight_motivation: unit(self.weight_motivation),
            engagement_weight_alpha: unit(self.engagement_weight_alpha),
            working_weekdays: working_weekdays.into_iter().collect(),
            evaluation_period_days: self.evaluation_period_days.max(1),
            thresholds: LevelThresholds {
                min_threshold_low: min_low,
                max_threshold_low: max_low,
                min_threshold_medium: min_med,
                max_threshold_medium: max_med,
            },
        }
    }
}

/// Inclusive date range an evaluation aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Datetime bounds of a period: `[start 00:00:00, end 23:59:59.999999]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl PeriodWindow {
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at <= self.end
    }
}

impl EvaluationPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The last `days` days ending on `end` (at least one day).
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start: end - Duration::days(span),
            end,
        }
    }

    /// Monday through Sunday of an ISO week.
    pub fn iso_week(year: i32, week: u32) -> Option<Self> {
        let start = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
        let end = NaiveDate::from_isoywd_opt(year, week, Weekday::Sun)?;
        Some(Self { start, end })
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    pub fn window(&self) -> PeriodWindow {
        let midnight = NaiveTime::default();
        PeriodWindow {
            start: self.start.and_time(midnight),
            end: self.end.and_time(midnight) + Duration::days(1) - Duration::microseconds(1),
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for EvaluationPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Parses an ISO week such as `2025-W02`.
impl FromStr for EvaluationPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (year, week) = s
            .split_once("-W")
            .or_else(|| s.split_once("-w"))
            .ok_or_else(|| format!("expected an ISO week like 2025-W02, got '{s}'"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{s}'"))?;
        let week: u32 = week
            .parse()
            .map_err(|_| format!("invalid week number in '{s}'"))?;
        Self::iso_week(year, week).ok_or_else(|| format!("week {week} does not exist in {year}"))
    }
}

/// Monday-based weekday index of a timestamp (Monday = 0 .. Sunday = 6).
pub fn weekday_index(at: NaiveDateTime) -> usize {
    at.weekday().num_days_from_monday() as usize
}
