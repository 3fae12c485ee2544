//! In-memory store over a parsed dataset.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use tierwise_core::dataset::{
    AttemptRecord, Dataset, DatasetInfo, LevelConfigRecord, ProgressRecord, TaskRecord,
};
use tierwise_core::model::{
    Level, LevelConfig, PeriodWindow, StoredAttempt, SystemConfig, TopicId, UserId,
};
use tierwise_core::report::EvaluationReport;
use tierwise_core::results::{EvaluationLogEntry, ProgressUpdate};
use tierwise_core::traits::{AttemptStore, ConfigStore, ProgressStore};

use crate::error::StoreError;

/// Rows written by evaluations and the lazily created system config.
#[derive(Debug, Default)]
struct MutableState {
    system: Option<SystemConfig>,
    progress: BTreeMap<(UserId, TopicId), ProgressRecord>,
    log: Vec<EvaluationLogEntry>,
}

/// What [`MemoryStore::apply`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub progress_updated: usize,
    pub progress_created: usize,
    pub log_entries: usize,
    /// Results without scores or without a resolved level.
    pub skipped: usize,
}

/// Serves attempts, configuration and progress from a [`Dataset`] and
/// accepts evaluation write-backs.
pub struct MemoryStore {
    info: DatasetInfo,
    tasks: Vec<TaskRecord>,
    attempt_rows: Vec<AttemptRecord>,
    attempts: Vec<StoredAttempt>,
    level_configs: BTreeMap<(TopicId, Level), LevelConfig>,
    state: RwLock<MutableState>,
}

impl MemoryStore {
    pub fn from_dataset(dataset: Dataset) -> Self {
        let attempts = dataset.stored_attempts();
        let level_configs = dataset
            .level_configs
            .iter()
            .map(|r| ((r.topic_id, r.level), r.config()))
            .collect();
        let progress = dataset
            .progress
            .into_iter()
            .map(|p| ((p.user_id, p.topic_id), p))
            .collect();

        Self {
            info: dataset.info,
            tasks: dataset.tasks,
            attempt_rows: dataset.attempts,
            attempts,
            level_configs,
            state: RwLock::new(MutableState {
                system: dataset.system,
                progress,
                log: dataset.evaluation_log,
            }),
        }
    }

    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MutableState>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MutableState>, StoreError> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }

    /// Upsert the progress row for one result.
    ///
    /// Returns `true` when a new row was created.
    pub fn upsert_progress(&self, update: &ProgressUpdate) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        let key = (update.user_id, update.topic_id);
        let created = !state.progress.contains_key(&key);
        state.progress.insert(
            key,
            ProgressRecord {
                user_id: update.user_id,
                topic_id: update.topic_id,
                current_level: update.current_level,
                is_mastered: update.is_mastered,
                last_evaluated_at: Some(update.last_evaluated_at),
            },
        );
        Ok(created)
    }

    pub fn append_log(&self, entry: EvaluationLogEntry) -> Result<(), StoreError> {
        self.write()?.log.push(entry);
        Ok(())
    }

    /// Persist every result of a report, one pair at a time.
    pub fn apply(
        &self,
        report: &EvaluationReport,
        at: NaiveDateTime,
    ) -> Result<ApplySummary, StoreError> {
        let mut summary = ApplySummary::default();
        for result in &report.results {
            let (Some(update), Some(entry)) = (result.progress_update(at), result.log_entry(at))
            else {
                summary.skipped += 1;
                continue;
            };
            if self.upsert_progress(&update)? {
                summary.progress_created += 1;
            } else {
                summary.progress_updated += 1;
            }
            self.append_log(entry)?;
            summary.log_entries += 1;
        }
        tracing::info!(
            updated = summary.progress_updated,
            created = summary.progress_created,
            skipped = summary.skipped,
            "applied evaluation results"
        );
        Ok(summary)
    }

    pub fn progress_row(&self, user: UserId, topic: TopicId) -> Result<Option<ProgressRecord>, StoreError> {
        Ok(self.read()?.progress.get(&(user, topic)).cloned())
    }

    pub fn evaluation_log(&self) -> Result<Vec<EvaluationLogEntry>, StoreError> {
        Ok(self.read()?.log.clone())
    }

    /// The current contents as a dataset, including written rows.
    pub fn to_dataset(&self) -> Result<Dataset, StoreError> {
        let state = self.read()?;
        Ok(Dataset {
            info: self.info.clone(),
            system: state.system.clone(),
            tasks: self.tasks.clone(),
            level_configs: self
                .level_configs
                .iter()
                .map(|(&(topic_id, level), cfg)| LevelConfigRecord {
                    topic_id,
                    level,
                    task_count_threshold: cfg.task_count_threshold,
                    reference_time: cfg.reference_time,
                    penalty_weights: cfg.penalty_weights.clone(),
                })
                .collect(),
            progress: state.progress.values().cloned().collect(),
            attempts: self.attempt_rows.clone(),
            evaluation_log: state.log.clone(),
        })
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn fetch_attempts(
        &self,
        user: UserId,
        topic: TopicId,
        level: Option<Level>,
        window: &PeriodWindow,
    ) -> anyhow::Result<Vec<StoredAttempt>> {
        Ok(self
            .attempts
            .iter()
            .filter(|a| a.user_id == user && a.topic_id == topic)
            .filter(|a| level.is_none() || a.task_level == level)
            .filter(|a| window.contains(a.attempt.created_at))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn level_config(
        &self,
        topic: TopicId,
        level: Level,
    ) -> anyhow::Result<Option<LevelConfig>> {
        Ok(self.level_configs.get(&(topic, level)).cloned())
    }

    async fn system_config(&self) -> anyhow::Result<SystemConfig> {
        if let Some(system) = &self.read()?.system {
            return Ok(system.clone());
        }
        let mut state = self.write()?;
        let system = state
            .system
            .get_or_insert_with(|| {
                tracing::info!(dataset = %self.info.id, "no system config found; creating defaults");
                SystemConfig::default()
            })
            .clone();
        Ok(system)
    }

    async fn level_configs(
        &self,
        topics: &[TopicId],
    ) -> anyhow::Result<BTreeMap<(TopicId, Level), LevelConfig>> {
        Ok(self
            .level_configs
            .iter()
            .filter(|((topic, _), _)| topics.contains(topic))
            .map(|(key, cfg)| (*key, cfg.clone()))
            .collect())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn current_level(&self, user: UserId, topic: TopicId) -> anyhow::Result<Option<Level>> {
        Ok(self.read()?.progress.get(&(user, topic)).map(|p| p.current_level))
    }

    async fn progress_levels(
        &self,
        users: &[UserId],
        topics: &[TopicId],
    ) -> anyhow::Result<BTreeMap<(UserId, TopicId), Level>> {
        Ok(self
            .read()?
            .progress
            .iter()
            .filter(|((user, topic), _)| users.contains(user) && topics.contains(topic))
            .map(|(key, row)| (*key, row.current_level))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tierwise_core::model::EvaluationPeriod;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn dataset() -> Dataset {
        Dataset {
            info: DatasetInfo {
                id: "mem".into(),
                name: "Memory".into(),
                description: String::new(),
            },
            tasks: vec![
                TaskRecord {
                    id: 1,
                    topic_id: 10,
                    level: Level::Low,
                    title: None,
                },
                TaskRecord {
                    id: 2,
                    topic_id: 10,
                    level: Level::Medium,
                    title: None,
                },
            ],
            level_configs: vec![LevelConfigRecord {
                topic_id: 10,
                level: Level::Low,
                task_count_threshold: 4,
                reference_time: 200.0,
                penalty_weights: Default::default(),
            }],
            progress: vec![ProgressRecord {
                user_id: 7,
                topic_id: 10,
                current_level: Level::Low,
                is_mastered: false,
                last_evaluated_at: None,
            }],
            attempts: vec![
                AttemptRecord {
                    user_id: 7,
                    task_id: 1,
                    is_correct: true,
                    time_spent: Some(100.0),
                    attempt_number: 1,
                    created_at: at(6, 9),
                },
                AttemptRecord {
                    user_id: 7,
                    task_id: 2,
                    is_correct: false,
                    time_spent: None,
                    attempt_number: 1,
                    created_at: at(8, 9),
                },
                AttemptRecord {
                    user_id: 7,
                    task_id: 1,
                    is_correct: true,
                    time_spent: Some(90.0),
                    attempt_number: 2,
                    created_at: at(14, 9),
                },
            ],
            ..Dataset::default()
        }
    }

    #[tokio::test]
    async fn filters_attempts_by_level_and_window() {
        let store = MemoryStore::from_dataset(dataset());
        let window = EvaluationPeriod::new(at(6, 0).date(), at(12, 0).date()).window();

        let all = store.fetch_attempts(7, 10, None, &window).await.unwrap();
        assert_eq!(all.len(), 2);

        let low = store
            .fetch_attempts(7, 10, Some(Level::Low), &window)
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].attempt.task_id, 1);

        let other_user = store.fetch_attempts(8, 10, None, &window).await.unwrap();
        assert!(other_user.is_empty());
    }

    #[tokio::test]
    async fn creates_default_system_config_once() {
        let store = MemoryStore::from_dataset(dataset());
        assert!(store.to_dataset().unwrap().system.is_none());

        let system = store.system_config().await.unwrap();
        assert_eq!(system, SystemConfig::default());
        assert_eq!(store.to_dataset().unwrap().system, Some(SystemConfig::default()));
    }

    #[tokio::test]
    async fn bulk_lookups_match_single_lookups() {
        let store = MemoryStore::from_dataset(dataset());
        let configs = store.level_configs(&[10, 11]).await.unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(
            store.level_config(10, Level::Low).await.unwrap(),
            configs.get(&(10, Level::Low)).cloned()
        );

        let levels = store.progress_levels(&[7, 8], &[10]).await.unwrap();
        assert_eq!(levels.get(&(7, 10)), Some(&Level::Low));
        assert_eq!(store.current_level(8, 10).await.unwrap(), None);
    }

    #[test]
    fn upsert_reports_creation() {
        let store = MemoryStore::from_dataset(dataset());
        let update = ProgressUpdate {
            user_id: 8,
            topic_id: 10,
            current_level: Level::Medium,
            is_mastered: false,
            last_evaluated_at: at(13, 8),
        };
        assert!(store.upsert_progress(&update).unwrap());
        assert!(!store.upsert_progress(&update).unwrap());
        let row = store.progress_row(8, 10).unwrap().unwrap();
        assert_eq!(row.last_evaluated_at, Some(at(13, 8)));
    }
}
