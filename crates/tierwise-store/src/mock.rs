//! Call-recording store wrapper for testing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use tierwise_core::model::{Level, LevelConfig, PeriodWindow, StoredAttempt, SystemConfig, TopicId, UserId};
use tierwise_core::traits::{AttemptStore, ConfigStore, ProgressStore};

use crate::error::StoreError;

/// One call received by a [`CountingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    FetchAttempts {
        user: UserId,
        topic: TopicId,
        level: Option<Level>,
    },
    LevelConfig {
        topic: TopicId,
        level: Level,
    },
    LevelConfigs {
        topics: Vec<TopicId>,
    },
    SystemConfig,
    CurrentLevel {
        user: UserId,
        topic: TopicId,
    },
    ProgressLevels {
        users: Vec<UserId>,
        topics: Vec<TopicId>,
    },
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wraps another store, recording every call and optionally failing some.
pub struct CountingStore<S> {
    inner: S,
    calls: Mutex<Vec<StoreCall>>,
    failing_users: Mutex<BTreeSet<UserId>>,
    fail_system_config: AtomicBool,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            failing_users: Mutex::new(BTreeSet::new()),
            fail_system_config: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Make every attempt fetch for `user` fail.
    pub fn fail_attempts_for(&self, user: UserId) {
        lock(&self.failing_users).insert(user);
    }

    pub fn fail_system_config(&self) {
        self.fail_system_config.store(true, Ordering::Relaxed);
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    pub fn attempt_fetches(&self) -> usize {
        self.count(|c| matches!(c, StoreCall::FetchAttempts { .. }))
    }

    fn record(&self, call: StoreCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl<S: AttemptStore> AttemptStore for CountingStore<S> {
    async fn fetch_attempts(
        &self,
        user: UserId,
        topic: TopicId,
        level: Option<Level>,
        window: &PeriodWindow,
    ) -> anyhow::Result<Vec<StoredAttempt>> {
        self.record(StoreCall::FetchAttempts { user, topic, level });
        let failing = lock(&self.failing_users).contains(&user);
        if failing {
            return Err(StoreError::Unavailable {
                operation: "fetch_attempts",
            }
            .into());
        }
        self.inner.fetch_attempts(user, topic, level, window).await
    }
}

#[async_trait]
impl<S: ConfigStore> ConfigStore for CountingStore<S> {
    async fn level_config(
        &self,
        topic: TopicId,
        level: Level,
    ) -> anyhow::Result<Option<LevelConfig>> {
        self.record(StoreCall::LevelConfig { topic, level });
        self.inner.level_config(topic, level).await
    }

    async fn system_config(&self) -> anyhow::Result<SystemConfig> {
        self.record(StoreCall::SystemConfig);
        if self.fail_system_config.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable {
                operation: "system_config",
            }
            .into());
        }
        self.inner.system_config().await
    }

    async fn level_configs(
        &self,
        topics: &[TopicId],
    ) -> anyhow::Result<BTreeMap<(TopicId, Level), LevelConfig>> {
        self.record(StoreCall::LevelConfigs {
            topics: topics.to_vec(),
        });
        self.inner.level_configs(topics).await
    }
}

#[async_trait]
impl<S: ProgressStore> ProgressStore for CountingStore<S> {
    async fn current_level(&self, user: UserId, topic: TopicId) -> anyhow::Result<Option<Level>> {
        self.record(StoreCall::CurrentLevel { user, topic });
        self.inner.current_level(user, topic).await
    }

    async fn progress_levels(
        &self,
        users: &[UserId],
        topics: &[TopicId],
    ) -> anyhow::Result<BTreeMap<(UserId, TopicId), Level>> {
        self.record(StoreCall::ProgressLevels {
            users: users.to_vec(),
            topics: topics.to_vec(),
        });
        self.inner.progress_levels(users, topics).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use tierwise_core::dataset::Dataset;

    #[tokio::test]
    async fn records_calls_in_order() {
        let store = CountingStore::new(MemoryStore::from_dataset(Dataset::default()));

        store.system_config().await.unwrap();
        store.current_level(1, 2).await.unwrap();

        assert_eq!(
            store.calls(),
            vec![
                StoreCall::SystemConfig,
                StoreCall::CurrentLevel { user: 1, topic: 2 }
            ]
        );
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = CountingStore::new(MemoryStore::from_dataset(Dataset::default()));
        store.fail_system_config();
        store.fail_attempts_for(3);

        let err = store.system_config().await.unwrap_err();
        assert!(err.to_string().contains("system_config"));

        let window = tierwise_core::model::EvaluationPeriod::trailing(
            chrono::NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            7,
        )
        .window();
        assert!(store.fetch_attempts(3, 1, None, &window).await.is_err());
        assert!(store.fetch_attempts(4, 1, None, &window).await.unwrap().is_empty());
        assert_eq!(store.attempt_fetches(), 2);
    }
}
