//! Evaluation report types with JSON persistence and drift detection.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{EvaluationPeriod, Level, TopicId, UserId};
use crate::results::{EvaluationResult, PairFailure};
use crate::statistics::BatchSummary;

/// Everything one evaluation batch produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Where the evaluated data came from, e.g. a dataset name.
    #[serde(default)]
    pub source: Option<String>,
    pub period: EvaluationPeriod,
    pub user_ids: Vec<UserId>,
    pub topic_ids: Vec<TopicId>,
    /// One entry per evaluated pair, users outer and topics inner.
    pub results: Vec<EvaluationResult>,
    #[serde(default)]
    pub failures: Vec<PairFailure>,
    pub summary: BatchSummary,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl EvaluationReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: EvaluationReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    pub fn result_for(&self, user: UserId, topic: TopicId) -> Option<&EvaluationResult> {
        self.results
            .iter()
            .find(|r| r.user_id == user && r.topic_id == topic)
    }

    /// Compare total scores and levels against a baseline report.
    ///
    /// Pairs without scores on one side count as new or removed.
    pub fn compare(&self, baseline: &EvaluationReport, threshold: f64) -> DriftReport {
        let score_map = |report: &EvaluationReport| -> BTreeMap<(UserId, TopicId), f64> {
            report
                .results
                .iter()
                .filter_map(|r| Some(((r.user_id, r.topic_id), r.total_score()?)))
                .collect()
        };

        let baseline_scores = score_map(baseline);
        let current_scores = score_map(self);

        let mut declines = Vec::new();
        let mut gains = Vec::new();
        let mut unchanged = 0usize;
        let mut new_pairs = 0usize;

        for (&(user_id, topic_id), &current) in &current_scores {
            let Some(&baseline_score) = baseline_scores.get(&(user_id, topic_id)) else {
                new_pairs += 1;
                continue;
            };
            let delta = current - baseline_score;
            let drift = ScoreDrift {
                user_id,
                topic_id,
                baseline_score,
                current_score: current,
                delta,
            };
            if delta < -threshold {
                declines.push(drift);
            } else if delta > threshold {
                gains.push(drift);
            } else {
                unchanged += 1;
            }
        }

        let removed_pairs = baseline_scores
            .keys()
            .filter(|k| !current_scores.contains_key(k))
            .count();

        let level_moves = self
            .results
            .iter()
            .filter_map(|current| {
                let before = baseline.result_for(current.user_id, current.topic_id)?;
                (before.level_after != current.level_after).then(|| LevelMove {
                    user_id: current.user_id,
                    topic_id: current.topic_id,
                    baseline_level: before.level_after,
                    current_level: current.level_after,
                })
            })
            .collect();

        DriftReport {
            declines,
            gains,
            unchanged,
            new_pairs,
            removed_pairs,
            level_moves,
        }
    }
}

/// Result of comparing two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    /// Pairs whose total score fell by more than the threshold.
    pub declines: Vec<ScoreDrift>,
    pub gains: Vec<ScoreDrift>,
    pub unchanged: usize,
    /// Scored in current but not baseline.
    pub new_pairs: usize,
    /// Scored in baseline but not current.
    pub removed_pairs: usize,
    pub level_moves: Vec<LevelMove>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDrift {
    pub user_id: UserId,
    pub topic_id: TopicId,
    pub baseline_score: f64,
    pub current_score: f64,
    pub delta: f64,
}

/// A pair whose resulting level differs between the two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelMove {
    pub user_id: UserId,
    pub topic_id: TopicId,
    pub baseline_level: Option<Level>,
    pub current_level: Option<Level>,
}

fn level_label(level: Option<Level>) -> &'static str {
    level.map(|l| l.as_str()).unwrap_or("-")
}

impl DriftReport {
    /// Format the drift report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} declines, {} gains, {} unchanged, {} level moves\n\n",
            self.declines.len(),
            self.gains.len(),
            self.unchanged,
            self.level_moves.len()
        ));

        let mut table = |title: &str, rows: &[ScoreDrift], sign: &str| {
            if rows.is_empty() {
                return;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| User | Topic | Baseline | Current | Delta |\n");
            md.push_str("|------|-------|----------|---------|-------|\n");
            for d in rows {
                md.push_str(&format!(
                    "| {} | {} | {:.1}% | {:.1}% | {}{:.1}% |\n",
                    d.user_id,
                    d.topic_id,
                    d.baseline_score * 100.0,
                    d.current_score * 100.0,
                    sign,
                    d.delta * 100.0
                ));
            }
            md.push('\n');
        };
        table("Declines", &self.declines, "");
        table("Gains", &self.gains, "+");

        if !self.level_moves.is_empty() {
            md.push_str("### Level moves\n\n");
            md.push_str("| User | Topic | Baseline | Current |\n");
            md.push_str("|------|-------|----------|---------|\n");
            for m in &self.level_moves {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    m.user_id,
                    m.topic_id,
                    level_label(m.baseline_level),
                    level_label(m.current_level)
                ));
            }
        }

        md
    }

    /// Returns true if any pair's total score declined.
    pub fn has_declines(&self) -> bool {
        !self.declines.is_empty()
    }
}
