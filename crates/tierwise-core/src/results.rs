//! Evaluation result types and the records handed to a persistence layer.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::attempts::{AttemptSet, WeekdayHistogram};
use crate::model::{EvaluationPeriod, Level, LevelChange, LevelConfig, SystemConfig, TopicId, UserId};
use crate::motivation::{compute_motivation, ActivityDetails};
use crate::scoring::{
    compute_accuracy, compute_median_time, compute_progress, compute_time_score, compute_total,
    AttemptBreakdown, SubScores,
};

/// A degraded-input condition absorbed with a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    /// The student has no recorded level for the topic.
    NoProgressRow,
    /// No attempts for the topic in the period.
    ///
    /// Appended after any earlier warning rather than replacing it, so a
    /// student with no progress row and no attempts reports
    /// `no_progress_row; no_attempts`.
    NoAttempts,
    /// No configuration for the resolved level; fallback parameters used.
    NoLevelConfig,
}

impl Warning {
    pub fn code(&self) -> &'static str {
        match self {
            Warning::NoProgressRow => "no_progress_row",
            Warning::NoAttempts => "no_attempts",
            Warning::NoLevelConfig => "no_level_config",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How the scored attempts were selected when the recorded level gave none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Note {
    UsedLevelInferred,
    UsedAllLevels,
}

impl Note {
    pub fn code(&self) -> &'static str {
        match self {
            Note::UsedLevelInferred => "used_level_inferred",
            Note::UsedAllLevels => "used_all_levels",
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Every metric computed for one (student, topic) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// The level's task quota.
    pub tasks_total: u32,
    pub tasks_solved: u32,
    pub attempts_total: u32,
    pub breakdown: AttemptBreakdown,
    pub accuracy: f64,
    /// Median seconds per attempt, when any attempt recorded a time.
    pub median_time: Option<f64>,
    pub time_score: f64,
    pub progress_score: f64,
    pub motivation_score: f64,
    pub total_score: f64,
    pub activity: ActivityDetails,
    pub activity_by_weekday: WeekdayHistogram,
    pub solved_by_weekday: WeekdayHistogram,
}

impl EvaluationMetrics {
    /// Run accuracy, timing, progress and motivation over `attempts`, then
    /// combine them with the system weights.
    pub fn compute(attempts: &AttemptSet, level: &LevelConfig, system: &SystemConfig) -> Self {
        let (accuracy, breakdown) = compute_accuracy(attempts, &level.penalty_weights);
        let median_time = compute_median_time(attempts);
        let time_score = compute_time_score(median_time, level.reference_time);
        let tasks_solved = attempts.tasks_solved();
        let progress_score = compute_progress(tasks_solved, level.task_count_threshold);
        let activity = ActivityDetails::from_attempts(attempts, system);
        let motivation_score = compute_motivation(&activity, system.engagement_weight_alpha);

        let scores = SubScores {
            accuracy,
            time: time_score,
            progress: progress_score,
            motivation: motivation_score,
        };

        Self {
            tasks_total: level.task_count_threshold,
            tasks_solved: tasks_solved as u32,
            attempts_total: attempts.len() as u32,
            breakdown,
            accuracy,
            median_time,
            time_score,
            progress_score,
            motivation_score,
            total_score: compute_total(&scores, &system.weights()),
            activity,
            activity_by_weekday: attempts.activity_by_weekday(),
            solved_by_weekday: attempts.solved_by_weekday(),
        }
    }
}

/// Outcome of evaluating one (student, topic) pair. Never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub user_id: UserId,
    pub topic_id: TopicId,
    pub level_before: Option<Level>,
    pub level_after: Option<Level>,
    pub level_change: Option<LevelChange>,
    pub period: EvaluationPeriod,
    /// Absent when the student had no attempts in the period.
    pub metrics: Option<EvaluationMetrics>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

impl EvaluationResult {
    pub fn total_score(&self) -> Option<f64> {
        self.metrics.as_ref().map(|m| m.total_score)
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has_warning(&self, warning: Warning) -> bool {
        self.warnings.contains(&warning)
    }

    /// Warning codes joined with `"; "`, `None` when there are none.
    pub fn warning_text(&self) -> Option<String> {
        join_codes(self.warnings.iter().map(Warning::code))
    }

    pub fn notes_text(&self) -> Option<String> {
        join_codes(self.notes.iter().map(Note::code))
    }

    /// The "current progress" upsert for this result.
    pub fn progress_update(&self, evaluated_at: NaiveDateTime) -> Option<ProgressUpdate> {
        self.metrics.as_ref()?;
        let level = self.level_after?;
        Some(ProgressUpdate {
            user_id: self.user_id,
            topic_id: self.topic_id,
            current_level: level,
            is_mastered: level == Level::Mastered,
            last_evaluated_at: evaluated_at,
        })
    }

    /// The evaluation-log row for this result.
    pub fn log_entry(&self, created_at: NaiveDateTime) -> Option<EvaluationLogEntry> {
        let metrics = self.metrics.as_ref()?;
        let level = self.level_before?;
        Some(EvaluationLogEntry {
            user_id: self.user_id,
            topic_id: self.topic_id,
            level,
            period_start: self.period.start,
            period_end: self.period.end,
            accuracy: metrics.accuracy,
            avg_time: metrics.median_time,
            progress: metrics.progress_score,
            motivation: metrics.motivation_score,
            total_score: metrics.total_score,
            level_change: self.level_change.unwrap_or(LevelChange::Stay),
            created_at,
        })
    }
}

fn join_codes<'a>(codes: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined = codes.collect::<Vec<_>>().join("; ");
    (!joined.is_empty()).then_some(joined)
}

/// A pair whose attempts could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFailure {
    pub user_id: UserId,
    pub topic_id: TopicId,
    pub error: String,
}

/// Upsert for a student's current level on a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub user_id: UserId,
    pub topic_id: TopicId,
    pub current_level: Level,
    pub is_mastered: bool,
    pub last_evaluated_at: NaiveDateTime,
}

/// Append-only record of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationLogEntry {
    pub user_id: UserId,
    pub topic_id: TopicId,
    /// Level the student was evaluated at.
    pub level: Level,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub accuracy: f64,
    #[serde(default)]
    pub avg_time: Option<f64>,
    pub progress: f64,
    pub motivation: f64,
    pub total_score: f64,
    pub level_change: LevelChange,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period() -> EvaluationPeriod {
        EvaluationPeriod::new(
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
        )
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 13)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn metrics(total: f64) -> EvaluationMetrics {
        EvaluationMetrics {
            tasks_total: 5,
            tasks_solved: 2,
            attempts_total: 6,
            breakdown: AttemptBreakdown {
                a1: 1,
                a2: 1,
                a3: 0,
                unsolved: 1,
            },
            accuracy: 0.5667,
            median_time: Some(240.0),
            time_score: 1.0,
            progress_score: 0.4,
            motivation_score: 0.6,
            total_score: total,
            activity: ActivityDetails::default(),
            activity_by_weekday: [1, 2, 2, 1, 0, 0, 0],
            solved_by_weekday: [1, 1, 0, 0, 0, 0, 0],
        }
    }

    #[test]
    fn compute_matches_scenario_a() {
        use crate::model::Attempt;
        use chrono::Duration;

        let monday = NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let rows = [
            (1, true, 120.0, 1, Duration::zero()),
            (2, false, 200.0, 1, Duration::days(1)),
            (2, true, 180.0, 2, Duration::days(1) + Duration::minutes(5)),
            (3, false, 300.0, 1, Duration::days(2)),
            (3, false, 320.0, 2, Duration::days(2) + Duration::minutes(10)),
            (3, false, 280.0, 3, Duration::days(3)),
        ];
        let set: AttemptSet = rows
            .iter()
            .map(|&(task, ok, time, n, off)| Attempt {
                task_id: task,
                is_correct: ok,
                time_spent: Some(time),
                attempt_number: n,
                created_at: monday + off,
            })
            .collect();
        let level = LevelConfig {
            task_count_threshold: 5,
            reference_time: 300.0,
            penalty_weights: crate::penalty::PenaltyWeights::standard(),
        };
        let system = SystemConfig {
            weight_accuracy: 0.5,
            weight_time: 0.2,
            weight_progress: 0.2,
            weight_motivation: 0.1,
            engagement_weight_alpha: 2.0 / 3.0,
            ..SystemConfig::default()
        };

        let m = EvaluationMetrics::compute(&set, &level, &system);
        assert!((m.accuracy - 0.5667).abs() < 1e-4);
        assert_eq!(m.median_time, Some(240.0));
        assert_eq!(m.time_score, 1.0);
        assert_eq!(m.tasks_solved, 2);
        assert!((m.progress_score - 0.4).abs() < 1e-12);
        assert!((m.motivation_score - 0.6).abs() < 1e-9);
        let expected = 0.5 * m.accuracy + 0.2 * 1.0 + 0.2 * 0.4 + 0.1 * m.motivation_score;
        assert_eq!(m.total_score, expected);
        assert_eq!(m.activity_by_weekday, [1, 2, 2, 1, 0, 0, 0]);
        assert_eq!(m.solved_by_weekday, [1, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn warning_and_note_codes() {
        let result = EvaluationResult {
            user_id: 1,
            topic_id: 2,
            level_before: None,
            level_after: None,
            level_change: None,
            period: period(),
            metrics: None,
            notes: vec![Note::UsedLevelInferred],
            warnings: vec![Warning::NoProgressRow, Warning::NoLevelConfig],
        };
        assert_eq!(
            result.warning_text().as_deref(),
            Some("no_progress_row; no_level_config")
        );
        assert_eq!(result.notes_text().as_deref(), Some("used_level_inferred"));
        assert!(result.is_degraded());

        let json = serde_json::to_string(&result.warnings).unwrap();
        assert_eq!(json, r#"["no_progress_row","no_level_config"]"#);
    }

    #[test]
    fn handoff_records() {
        let result = EvaluationResult {
            user_id: 7,
            topic_id: 3,
            level_before: Some(Level::High),
            level_after: Some(Level::Mastered),
            level_change: Some(LevelChange::Mastered),
            period: period(),
            metrics: Some(metrics(0.85)),
            notes: vec![],
            warnings: vec![],
        };

        let update = result.progress_update(now()).unwrap();
        assert_eq!(update.current_level, Level::Mastered);
        assert!(update.is_mastered);

        let log = result.log_entry(now()).unwrap();
        assert_eq!(log.level, Level::High);
        assert_eq!(log.level_change, LevelChange::Mastered);
        assert_eq!(log.avg_time, Some(240.0));
        assert_eq!(log.period_end, period().end);
    }

    #[test]
    fn no_handoff_without_metrics() {
        let result = EvaluationResult {
            user_id: 7,
            topic_id: 3,
            level_before: Some(Level::Low),
            level_after: None,
            level_change: None,
            period: period(),
            metrics: None,
            notes: vec![],
            warnings: vec![Warning::NoAttempts],
        };
        assert!(result.progress_update(now()).is_none());
        assert!(result.log_entry(now()).is_none());
        assert_eq!(result.total_score(), None);
    }
}
