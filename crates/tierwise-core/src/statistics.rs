//! Aggregate statistics over an evaluation batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{LevelChange, TopicId};
use crate::results::{EvaluationMetrics, EvaluationResult, PairFailure};

/// Batch-wide counts plus per-topic means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub pairs_requested: usize,
    /// Pairs that produced a result, with or without scores.
    pub pairs_evaluated: usize,
    pub pairs_failed: usize,
    pub pairs_without_attempts: usize,
    /// Pairs carrying at least one warning.
    pub degraded_pairs: usize,
    pub level_changes: LevelChangeCounts,
    pub per_topic: BTreeMap<TopicId, TopicStats>,
}

/// How many pairs ended in each kind of transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelChangeCounts {
    pub up: usize,
    pub down: usize,
    pub stay: usize,
    pub mastered: usize,
}

impl LevelChangeCounts {
    fn record(&mut self, change: LevelChange) {
        match change {
            LevelChange::Up => self.up += 1,
            LevelChange::Down => self.down += 1,
            LevelChange::Stay => self.stay += 1,
            LevelChange::Mastered => self.mastered += 1,
        }
    }
}

/// Means over the scored students of one topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicStats {
    pub topic_id: TopicId,
    pub students_scored: usize,
    pub mean_accuracy: f64,
    pub mean_time_score: f64,
    pub mean_progress: f64,
    pub mean_motivation: f64,
    pub mean_total: f64,
    /// Transitions up, including `high -> mastered`.
    pub promotions: usize,
    pub demotions: usize,
}

/// Summarize a batch from its results and failures.
pub fn summarize(
    pairs_requested: usize,
    results: &[EvaluationResult],
    failures: &[PairFailure],
) -> BatchSummary {
    let mut summary = BatchSummary {
        pairs_requested,
        pairs_evaluated: results.len(),
        pairs_failed: failures.len(),
        ..BatchSummary::default()
    };

    let mut by_topic: BTreeMap<TopicId, Vec<&EvaluationResult>> = BTreeMap::new();
    for r in results {
        if r.metrics.is_none() {
            summary.pairs_without_attempts += 1;
        }
        if r.is_degraded() {
            summary.degraded_pairs += 1;
        }
        if let Some(change) = r.level_change {
            summary.level_changes.record(change);
        }
        by_topic.entry(r.topic_id).or_default().push(r);
    }

    summary.per_topic = by_topic
        .into_iter()
        .map(|(topic, group)| (topic, topic_stats(topic, &group)))
        .collect();

    summary
}

fn topic_stats(topic_id: TopicId, group: &[&EvaluationResult]) -> TopicStats {
    let scored: Vec<_> = group.iter().filter_map(|r| r.metrics.as_ref()).collect();
    let n = scored.len();
    let mean = |f: &dyn Fn(&EvaluationMetrics) -> f64| {
        if n == 0 {
            0.0
        } else {
            scored.iter().map(|m| f(*m)).sum::<f64>() / n as f64
        }
    };

    TopicStats {
        topic_id,
        students_scored: n,
        mean_accuracy: mean(&|m| m.accuracy),
        mean_time_score: mean(&|m| m.time_score),
        mean_progress: mean(&|m| m.progress_score),
        mean_motivation: mean(&|m| m.motivation_score),
        mean_total: mean(&|m| m.total_score),
        promotions: group
            .iter()
            .filter(|r| matches!(r.level_change, Some(LevelChange::Up | LevelChange::Mastered)))
            .count(),
        demotions: group
            .iter()
            .filter(|r| r.level_change == Some(LevelChange::Down))
            .count(),
    }
}
