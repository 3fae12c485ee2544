//! Accuracy, timing and progress sub-scores and the weighted combiner.
//!
//! All functions are total: every input shape yields a value in the
//! documented range.

use serde::{Deserialize, Serialize};

use crate::attempts::AttemptSet;
use crate::model::ScoreWeights;
use crate::penalty::PenaltyWeights;

pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

/// How tasks were first solved: on attempt 1, 2, 3, or not within three.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptBreakdown {
    pub a1: u32,
    pub a2: u32,
    pub a3: u32,
    pub unsolved: u32,
}

impl AttemptBreakdown {
    pub fn total(&self) -> u32 {
        self.a1 + self.a2 + self.a3 + self.unsolved
    }
}

/// First-success-weighted accuracy over the distinct tasks of `attempts`.
///
/// A task scores 1.0 when first solved on attempt 1, the configured penalty
/// weight on attempt 2 or 3, and 0.0 otherwise. A first success past the
/// third attempt counts as unsolved.
pub fn compute_accuracy(
    attempts: &AttemptSet,
    penalty_weights: &PenaltyWeights,
) -> (f64, AttemptBreakdown) {
    let mut breakdown = AttemptBreakdown::default();
    let mut sum = 0.0;
    let mut tasks = 0usize;

    for first in attempts.first_successes().into_values() {
        tasks += 1;
        let Some(first) = first else {
            breakdown.unsolved += 1;
            continue;
        };
        let n = first.attempt_number;
        match n {
            0 | 1 => breakdown.a1 += 1,
            2 => breakdown.a2 += 1,
            3 => breakdown.a3 += 1,
            _ => breakdown.unsolved += 1,
        }
        sum += penalty_weights.weight_for(n);
    }

    let accuracy = if tasks == 0 { 0.0 } else { sum / tasks as f64 };
    (accuracy, breakdown)
}

/// Median of the positive `time_spent` samples, `None` without samples.
pub fn compute_median_time(attempts: &AttemptSet) -> Option<f64> {
    median(attempts.time_samples())
}

fn median(mut samples: Vec<f64>) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(|a, b| a.total_cmp(b));
    let mid = samples.len() / 2;
    if samples.len() % 2 == 0 {
        Some((samples[mid - 1] + samples[mid]) / 2.0)
    } else {
        Some(samples[mid])
    }
}

/// `reference_time / median_time`, clamped to [0, 1]; 0.0 without a median.
pub fn compute_time_score(median_time: Option<f64>, reference_time: f64) -> f64 {
    match median_time {
        None => 0.0,
        Some(m) => {
            let score = reference_time / m.max(1.0);
            if score.is_nan() {
                0.0
            } else {
                clamp(score, 0.0, 1.0)
            }
        }
    }
}

/// Fraction of the level's task quota solved, clamped to [0, 1].
pub fn compute_progress(tasks_solved: usize, task_count_threshold: u32) -> f64 {
    let denom = task_count_threshold.max(1) as f64;
    clamp(tasks_solved as f64 / denom, 0.0, 1.0)
}

/// The four sub-scores of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub accuracy: f64,
    pub time: f64,
    pub progress: f64,
    pub motivation: f64,
}

/// Plain weighted sum; no clamping.
pub fn compute_total(scores: &SubScores, weights: &ScoreWeights) -> f64 {
    weights.accuracy * scores.accuracy
        + weights.time * scores.time
        + weights.progress * scores.progress
        + weights.motivation * scores.motivation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attempt;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn monday_noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn attempt(task: u64, ok: bool, time: f64, n: u32, offset: Duration) -> Attempt {
        Attempt {
            task_id: task,
            is_correct: ok,
            time_spent: Some(time),
            attempt_number: n,
            created_at: monday_noon() + offset,
        }
    }

    /// Task 1 solved first try, task 2 on the second try, task 3 never.
    fn scenario_a() -> Vec<Attempt> {
        vec![
            attempt(1, true, 120.0, 1, Duration::zero()),
            attempt(2, false, 200.0, 1, Duration::days(1)),
            attempt(2, true, 180.0, 2, Duration::days(1) + Duration::minutes(5)),
            attempt(3, false, 300.0, 1, Duration::days(2)),
            attempt(3, false, 320.0, 2, Duration::days(2) + Duration::minutes(10)),
            attempt(3, false, 280.0, 3, Duration::days(3)),
        ]
    }

    #[test]
    fn scenario_a_accuracy_and_timing() {
        let set = AttemptSet::new(scenario_a());
        let (acc, breakdown) = compute_accuracy(&set, &PenaltyWeights::standard());
        assert!((acc - (1.0 + 0.7 + 0.0) / 3.0).abs() < 1e-9);
        assert!((acc - 0.5667).abs() < 1e-4);
        assert_eq!(
            breakdown,
            AttemptBreakdown {
                a1: 1,
                a2: 1,
                a3: 0,
                unsolved: 1
            }
        );

        let median = compute_median_time(&set);
        assert_eq!(median, Some(240.0));
        assert_eq!(compute_time_score(median, 300.0), 1.0);
    }

    #[test]
    fn breakdown_sums_to_distinct_tasks() {
        let mut attempts = scenario_a();
        attempts.push(attempt(4, true, 50.0, 3, Duration::hours(1)));
        attempts.push(attempt(5, true, 50.0, 7, Duration::hours(2)));
        let set = AttemptSet::new(attempts);
        let (acc, breakdown) = compute_accuracy(&set, &PenaltyWeights::standard());
        assert_eq!(breakdown.total() as usize, set.task_count());
        assert!((0.0..=1.0).contains(&acc));
        assert_eq!(breakdown.a3, 1);
    }

    #[test]
    fn accuracy_stays_bounded_with_hostile_weights() {
        let set = AttemptSet::new(vec![
            attempt(1, false, 100.0, 1, Duration::zero()),
            attempt(1, true, 90.0, 2, Duration::minutes(3)),
        ]);
        for raw in ["nan,0.4", "inf,0.4", "1.5,0.4", "-2,0.4"] {
            let (acc, _) = compute_accuracy(&set, &PenaltyWeights::parse_str(raw));
            assert!((0.0..=1.0).contains(&acc), "{raw} gave {acc}");
        }
    }

    #[test]
    fn first_success_ignores_array_order() {
        let mut attempts = scenario_a();
        let (forward, _) = compute_accuracy(
            &AttemptSet::new(attempts.clone()),
            &PenaltyWeights::standard(),
        );
        attempts.reverse();
        let (reversed, breakdown) =
            compute_accuracy(&AttemptSet::new(attempts), &PenaltyWeights::standard());
        assert_eq!(forward, reversed);
        assert_eq!(breakdown.a2, 1);
    }

    #[test]
    fn fourth_attempt_success_is_unsolved() {
        let set = AttemptSet::new(vec![
            attempt(9, false, 10.0, 1, Duration::zero()),
            attempt(9, false, 10.0, 2, Duration::zero()),
            attempt(9, false, 10.0, 3, Duration::zero()),
            attempt(9, true, 10.0, 4, Duration::zero()),
        ]);
        let (acc, breakdown) = compute_accuracy(&set, &PenaltyWeights::standard());
        assert_eq!(acc, 0.0);
        assert_eq!(breakdown.unsolved, 1);
        assert_eq!(breakdown.a3, 0);
    }

    #[test]
    fn accuracy_uses_configured_penalties() {
        let set = AttemptSet::new(vec![
            attempt(1, false, 10.0, 1, Duration::zero()),
            attempt(1, false, 10.0, 2, Duration::zero()),
            attempt(1, true, 10.0, 3, Duration::zero()),
        ]);
        let (acc, _) = compute_accuracy(&set, &PenaltyWeights::from_pair(0.5, 0.2));
        assert!((acc - 0.2).abs() < 1e-12);
    }

    #[test]
    fn accuracy_of_empty_set_is_zero() {
        let (acc, breakdown) = compute_accuracy(&AttemptSet::default(), &PenaltyWeights::standard());
        assert_eq!(acc, 0.0);
        assert_eq!(breakdown.total(), 0);
    }

    #[test]
    fn median_sorts_even_inputs() {
        assert_eq!(median(vec![320.0, 120.0, 280.0, 180.0]), Some(230.0));
        assert_eq!(median(vec![5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn median_skips_missing_and_zero_times() {
        let mut a = attempt(1, true, 0.0, 1, Duration::zero());
        let mut b = a.clone();
        b.time_spent = None;
        a.task_id = 2;
        let set = AttemptSet::new(vec![a, b]);
        assert_eq!(compute_median_time(&set), None);
        assert_eq!(compute_time_score(None, 300.0), 0.0);
    }

    #[test]
    fn time_score_non_decreasing_as_median_falls() {
        let mut previous = 0.0;
        for median in [2000.0, 900.0, 600.0, 450.0, 300.0, 100.0, 0.5] {
            let score = compute_time_score(Some(median), 300.0);
            assert!(score >= previous, "median {median} gave {score} < {previous}");
            assert!((0.0..=1.0).contains(&score));
            previous = score;
        }
        assert_eq!(compute_time_score(Some(600.0), 300.0), 0.5);
    }

    #[test]
    fn progress_clamps() {
        assert_eq!(compute_progress(0, 5), 0.0);
        assert!((compute_progress(2, 5) - 0.4).abs() < 1e-12);
        assert_eq!(compute_progress(5, 5), 1.0);
        assert_eq!(compute_progress(9, 5), 1.0);
        assert_eq!(compute_progress(1, 0), 1.0);
    }

    #[test]
    fn total_is_weighted_sum() {
        let scores = SubScores {
            accuracy: (1.0 + 0.7) / 3.0,
            time: 1.0,
            progress: compute_progress(2, 5),
            motivation: 0.6,
        };
        let weights = ScoreWeights {
            accuracy: 0.5,
            time: 0.2,
            progress: 0.2,
            motivation: 0.1,
        };
        let expected = 0.5 * scores.accuracy + 0.2 * 1.0 + 0.2 * 0.4 + 0.1 * 0.6;
        assert_eq!(compute_total(&scores, &weights), expected);
    }
}
