//! Dataset types: the external state an evaluation reads and writes.
//!
//! A dataset stands in for the surrounding application's tables (tasks,
//! per-level configuration, student progress, attempts and the evaluation
//! log). See [`crate::parser`] for the file format.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::{
    default_attempt_number, Attempt, Level, LevelConfig, StoredAttempt, SystemConfig, TaskId,
    TopicId, UserId,
};
use crate::penalty::PenaltyWeights;
use crate::results::EvaluationLogEntry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(rename = "dataset")]
    pub info: DatasetInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemConfig>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub level_configs: Vec<LevelConfigRecord>,
    #[serde(default)]
    pub progress: Vec<ProgressRecord>,
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
    #[serde(default)]
    pub evaluation_log: Vec<EvaluationLogEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub topic_id: TopicId,
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfigRecord {
    pub topic_id: TopicId,
    pub level: Level,
    pub task_count_threshold: u32,
    pub reference_time: f64,
    #[serde(default)]
    pub penalty_weights: PenaltyWeights,
}

impl LevelConfigRecord {
    pub fn config(&self) -> LevelConfig {
        LevelConfig {
            task_count_threshold: self.task_count_threshold,
            reference_time: self.reference_time,
            penalty_weights: self.penalty_weights.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub topic_id: TopicId,
    pub current_level: Level,
    #[serde(default)]
    pub is_mastered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub user_id: UserId,
    pub task_id: TaskId,
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<f64>,
    #[serde(default = "default_attempt_number")]
    pub attempt_number: u32,
    pub created_at: NaiveDateTime,
}

impl AttemptRecord {
    pub fn to_attempt(&self) -> Attempt {
        Attempt {
            task_id: self.task_id,
            is_correct: self.is_correct,
            time_spent: self.time_spent,
            attempt_number: self.attempt_number,
            created_at: self.created_at,
        }
    }
}

impl Dataset {
    /// The configured system config, or the defaults when the dataset has none.
    pub fn system_config(&self) -> SystemConfig {
        self.system.clone().unwrap_or_default()
    }

    pub fn tasks_by_id(&self) -> BTreeMap<TaskId, &TaskRecord> {
        self.tasks.iter().map(|t| (t.id, t)).collect()
    }

    /// Attempts joined with their task's topic and level.
    ///
    /// Attempts on unknown tasks are skipped: they belong to no topic.
    pub fn stored_attempts(&self) -> Vec<StoredAttempt> {
        let tasks = self.tasks_by_id();
        self.attempts
            .iter()
            .filter_map(|a| {
                let task = tasks.get(&a.task_id)?;
                Some(StoredAttempt {
                    user_id: a.user_id,
                    topic_id: task.topic_id,
                    task_level: Some(task.level),
                    attempt: a.to_attempt(),
                })
            })
            .collect()
    }

    /// Every user with attempts or progress rows, ascending.
    pub fn user_ids(&self) -> Vec<UserId> {
        self.attempts
            .iter()
            .map(|a| a.user_id)
            .chain(self.progress.iter().map(|p| p.user_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every topic with tasks, ascending.
    pub fn topic_ids(&self) -> Vec<TopicId> {
        self.tasks
            .iter()
            .map(|t| t.topic_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
