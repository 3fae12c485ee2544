//! Central evaluation orchestrator.
//!
//! Validates a request, prefetches one configuration and progress snapshot per
//! batch, then evaluates every (user, topic) pair concurrently against that
//! snapshot. Nothing is written back; callers persist results themselves.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::attempts::AttemptSet;
use crate::error::EvaluationError;
use crate::model::{
    EvaluationPeriod, Level, LevelConfig, StoredAttempt, SystemConfig, TopicId, UserId,
};
use crate::report::EvaluationReport;
use crate::results::{EvaluationMetrics, EvaluationResult, Note, PairFailure, Warning};
use crate::statistics::summarize;
use crate::traits::{AttemptStore, ConfigStore, ProgressStore};
use crate::transition::decide_transition;

/// Configuration for the evaluation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum pairs evaluated concurrently.
    pub parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { parallelism: 4 }
    }
}

/// Which students and topics to evaluate, over which dates.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub user_ids: Vec<UserId>,
    pub topic_ids: Vec<TopicId>,
    pub period: EvaluationPeriod,
}

impl EvaluationRequest {
    pub fn new(user_ids: Vec<UserId>, topic_ids: Vec<TopicId>, period: EvaluationPeriod) -> Self {
        Self {
            user_ids,
            topic_ids,
            period,
        }
    }

    pub fn validate(&self) -> Result<(), EvaluationError> {
        if self.user_ids.is_empty() {
            return Err(EvaluationError::EmptyUserIds);
        }
        if self.topic_ids.is_empty() {
            return Err(EvaluationError::EmptyTopicIds);
        }
        if !self.period.is_valid() {
            return Err(EvaluationError::InvalidPeriod {
                start: self.period.start,
                end: self.period.end,
            });
        }
        Ok(())
    }

    /// Requested pairs, users outer and topics inner.
    pub fn pairs(&self) -> Vec<(UserId, TopicId)> {
        self.user_ids
            .iter()
            .flat_map(|&u| self.topic_ids.iter().map(move |&t| (u, t)))
            .collect()
    }
}

/// Progress callbacks for a running batch.
pub trait BatchObserver: Send + Sync {
    fn on_pair_start(&self, user: UserId, topic: TopicId);
    fn on_pair_complete(&self, result: &EvaluationResult);
    fn on_pair_error(&self, user: UserId, topic: TopicId, error: &str);
    fn on_batch_complete(&self, total: usize, evaluated: usize, failed: usize, elapsed: Duration);
}

/// No-op batch observer.
pub struct NoopObserver;

impl BatchObserver for NoopObserver {
    fn on_pair_start(&self, _: UserId, _: TopicId) {}
    fn on_pair_complete(&self, _: &EvaluationResult) {}
    fn on_pair_error(&self, _: UserId, _: TopicId, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Configuration and progress read once per batch and shared by every pair.
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    pub system: SystemConfig,
    pub level_configs: BTreeMap<(TopicId, Level), LevelConfig>,
    pub progress: BTreeMap<(UserId, TopicId), Level>,
}

/// The evaluation engine.
pub struct EvaluationEngine {
    attempts: Arc<dyn AttemptStore>,
    configs: Arc<dyn ConfigStore>,
    progress: Arc<dyn ProgressStore>,
    config: EngineConfig,
}

impl EvaluationEngine {
    pub fn new(
        attempts: Arc<dyn AttemptStore>,
        configs: Arc<dyn ConfigStore>,
        progress: Arc<dyn ProgressStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            attempts,
            configs,
            progress,
            config,
        }
    }

    /// Read the system config, level configs and progress rows for a request.
    pub async fn prefetch(
        &self,
        request: &EvaluationRequest,
    ) -> Result<BatchSnapshot, EvaluationError> {
        let system = self
            .configs
            .system_config()
            .await
            .map_err(|source| EvaluationError::Store {
                what: "system config",
                source,
            })?
            .sanitized();
        let level_configs = self
            .configs
            .level_configs(&request.topic_ids)
            .await
            .map_err(|source| EvaluationError::Store {
                what: "level configs",
                source,
            })?;
        let progress = self
            .progress
            .progress_levels(&request.user_ids, &request.topic_ids)
            .await
            .map_err(|source| EvaluationError::Store {
                what: "progress rows",
                source,
            })?;

        tracing::debug!(
            level_configs = level_configs.len(),
            progress_rows = progress.len(),
            "prefetched batch snapshot"
        );

        Ok(BatchSnapshot {
            system,
            level_configs,
            progress,
        })
    }

    /// Evaluate every requested pair.
    ///
    /// Only an invalid request or a failed prefetch aborts the batch; a pair
    /// whose attempts cannot be fetched is recorded as a failure.
    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
        observer: &dyn BatchObserver,
    ) -> Result<EvaluationReport, EvaluationError> {
        request.validate()?;

        let start = Instant::now();
        let report_id = Uuid::new_v4();
        let snapshot = Arc::new(self.prefetch(request).await?);
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let pairs = request.pairs();
        let period = request.period;

        tracing::info!(
            %report_id,
            pairs = pairs.len(),
            %period,
            "starting evaluation batch"
        );

        let mut futures = FuturesUnordered::new();
        for (index, &(user, topic)) in pairs.iter().enumerate() {
            let store = Arc::clone(&self.attempts);
            let snapshot = Arc::clone(&snapshot);
            let semaphore = Arc::clone(&semaphore);

            futures.push(async move {
                let outcome = async {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                    observer.on_pair_start(user, topic);
                    evaluate_pair(store.as_ref(), &snapshot, user, topic, period).await
                }
                .await;
                (index, user, topic, outcome)
            });
        }

        let total = futures.len();
        let mut completed = Vec::with_capacity(total);
        let mut failures = Vec::new();

        while let Some((index, user, topic, outcome)) = futures.next().await {
            match outcome {
                Ok(result) => {
                    observer.on_pair_complete(&result);
                    completed.push((index, result));
                }
                Err(e) => {
                    tracing::error!(user, topic, "evaluation failed: {e:#}");
                    observer.on_pair_error(user, topic, &format!("{e:#}"));
                    failures.push((
                        index,
                        PairFailure {
                            user_id: user,
                            topic_id: topic,
                            error: format!("{e:#}"),
                        },
                    ));
                }
            }
        }

        completed.sort_by_key(|(index, _)| *index);
        failures.sort_by_key(|(index, _)| *index);
        let results: Vec<EvaluationResult> = completed.into_iter().map(|(_, r)| r).collect();
        let failures: Vec<PairFailure> = failures.into_iter().map(|(_, f)| f).collect();

        let elapsed = start.elapsed();
        observer.on_batch_complete(total, results.len(), failures.len(), elapsed);

        let summary = summarize(total, &results, &failures);
        tracing::info!(
            %report_id,
            evaluated = summary.pairs_evaluated,
            failed = summary.pairs_failed,
            degraded = summary.degraded_pairs,
            elapsed_ms = elapsed.as_millis() as u64,
            "evaluation batch complete"
        );

        Ok(EvaluationReport {
            id: report_id,
            created_at: chrono::Utc::now(),
            source: None,
            period,
            user_ids: request.user_ids.clone(),
            topic_ids: request.topic_ids.clone(),
            results,
            failures,
            summary,
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}

/// Evaluate one pair against a batch snapshot.
///
/// Known-level path: score the attempts at the recorded level. Inferred path,
/// taken when there is no progress row or no attempts at the recorded level:
/// score the attempts at the most frequent task level in the period.
pub async fn evaluate_pair(
    store: &dyn AttemptStore,
    snapshot: &BatchSnapshot,
    user: UserId,
    topic: TopicId,
    period: EvaluationPeriod,
) -> anyhow::Result<EvaluationResult> {
    let window = period.window();
    let recorded = snapshot.progress.get(&(user, topic)).copied();
    let mut warnings = Vec::new();
    let mut notes = Vec::new();

    let mut rows = match recorded {
        Some(level) => store.fetch_attempts(user, topic, Some(level), &window).await?,
        None => {
            warnings.push(Warning::NoProgressRow);
            Vec::new()
        }
    };
    let mut level = recorded;

    if rows.is_empty() {
        let all = store.fetch_attempts(user, topic, None, &window).await?;
        if all.is_empty() {
            warnings.push(Warning::NoAttempts);
            tracing::debug!(user, topic, "no attempts in period");
            return Ok(EvaluationResult {
                user_id: user,
                topic_id: topic,
                level_before: recorded,
                level_after: None,
                level_change: None,
                period,
                metrics: None,
                notes,
                warnings,
            });
        }

        match infer_level(&all) {
            Some(inferred) => {
                notes.push(Note::UsedLevelInferred);
                level = level.or(Some(inferred));
                rows = all
                    .into_iter()
                    .filter(|a| a.task_level == Some(inferred))
                    .collect();
            }
            None => {
                notes.push(Note::UsedAllLevels);
                rows = all;
            }
        }
    }

    let level_cfg = match level.and_then(|l| snapshot.level_configs.get(&(topic, l))) {
        Some(cfg) => cfg.clone(),
        None => {
            warnings.push(Warning::NoLevelConfig);
            LevelConfig::fallback()
        }
    };

    let attempts: AttemptSet = rows.into_iter().map(|a| a.attempt).collect();
    let metrics = EvaluationMetrics::compute(&attempts, &level_cfg, &snapshot.system);

    let (level_after, level_change) = match level {
        Some(current) => {
            let (after, change) =
                decide_transition(current, metrics.total_score, &snapshot.system.thresholds);
            (Some(after), Some(change))
        }
        None => (None, None),
    };

    if !warnings.is_empty() {
        tracing::warn!(
            user,
            topic,
            warnings = ?warnings,
            "evaluated with degraded inputs"
        );
    }
    tracing::debug!(
        user,
        topic,
        level = ?level,
        total = metrics.total_score,
        change = ?level_change,
        "pair evaluated"
    );

    Ok(EvaluationResult {
        user_id: user,
        topic_id: topic,
        level_before: level,
        level_after,
        level_change,
        period,
        metrics: Some(metrics),
        notes,
        warnings,
    })
}

/// Most frequent task level among `attempts`; ties go to the level whose name
/// sorts first. `None` when no attempt carries a level.
pub fn infer_level(attempts: &[StoredAttempt]) -> Option<Level> {
    let mut counts: BTreeMap<&'static str, (Level, usize)> = BTreeMap::new();
    for level in attempts.iter().filter_map(|a| a.task_level) {
        counts.entry(level.as_str()).or_insert((level, 0)).1 += 1;
    }
    counts
        .into_values()
        .fold(None, |best: Option<(Level, usize)>, (level, n)| match best {
            Some((_, top)) if top >= n => best,
            _ => Some((level, n)),
        })
        .map(|(level, _)| level)
}
