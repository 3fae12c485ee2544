//! Storage collaborator traits consumed by the evaluation engine.
//!
//! Implemented by the `tierwise-store` crate. Every method is read-only; the
//! engine never writes through these traits.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::model::{Level, LevelConfig, PeriodWindow, StoredAttempt, SystemConfig, TopicId, UserId};

/// Source of graded attempts.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Attempts by `user` on `topic` created inside `window`.
    ///
    /// With `level` set, only attempts on tasks of that level are returned;
    /// with `None`, attempts at every level are returned.
    async fn fetch_attempts(
        &self,
        user: UserId,
        topic: TopicId,
        level: Option<Level>,
        window: &PeriodWindow,
    ) -> anyhow::Result<Vec<StoredAttempt>>;
}

/// Source of per-level and system-wide evaluation parameters.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The configuration for one topic and level, `None` when absent.
    async fn level_config(&self, topic: TopicId, level: Level)
        -> anyhow::Result<Option<LevelConfig>>;

    /// The system configuration; stores create the default one on first read.
    async fn system_config(&self) -> anyhow::Result<SystemConfig>;

    /// Every level configuration for `topics`.
    ///
    /// The default implementation issues one lookup per topic and level;
    /// stores that can answer in bulk should override it.
    async fn level_configs(
        &self,
        topics: &[TopicId],
    ) -> anyhow::Result<BTreeMap<(TopicId, Level), LevelConfig>> {
        let mut configs = BTreeMap::new();
        for &topic in topics {
            for level in Level::ALL {
                if let Some(cfg) = self.level_config(topic, level).await? {
                    configs.insert((topic, level), cfg);
                }
            }
        }
        Ok(configs)
    }
}

/// Source of each student's current level per topic.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn current_level(&self, user: UserId, topic: TopicId) -> anyhow::Result<Option<Level>>;

    /// Current levels for every requested pair that has one.
    async fn progress_levels(
        &self,
        users: &[UserId],
        topics: &[TopicId],
    ) -> anyhow::Result<BTreeMap<(UserId, TopicId), Level>> {
        let mut levels = BTreeMap::new();
        for &user in users {
            for &topic in topics {
                if let Some(level) = self.current_level(user, topic).await? {
                    levels.insert((user, topic), level);
                }
            }
        }
        Ok(levels)
    }
}
