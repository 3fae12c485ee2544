//! Period- and level-scoped attempt collections.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::model::{weekday_index, Attempt, TaskId};

/// Attempt counts (or solves) per weekday, Monday = 0 .. Sunday = 6.
pub type WeekdayHistogram = [u32; 7];

/// All attempts of one student on one topic at one level within a period.
///
/// Array order carries no meaning: per-task sequences are always ordered by
/// `(attempt_number, created_at)`.
#[derive(Debug, Clone, Default)]
pub struct AttemptSet {
    attempts: Vec<Attempt>,
}

impl AttemptSet {
    pub fn new(attempts: Vec<Attempt>) -> Self {
        Self { attempts }
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attempt> {
        self.attempts.iter()
    }

    /// Attempts grouped by task, each group sorted by attempt number then time.
    pub fn by_task(&self) -> BTreeMap<TaskId, Vec<&Attempt>> {
        let mut grouped: BTreeMap<TaskId, Vec<&Attempt>> = BTreeMap::new();
        for a in &self.attempts {
            grouped.entry(a.task_id).or_default().push(a);
        }
        for seq in grouped.values_mut() {
            seq.sort_by_key(|a| (a.attempt_number, a.created_at));
        }
        grouped
    }

    /// The lowest-numbered correct attempt of every task, `None` when a task
    /// was never solved.
    pub fn first_successes(&self) -> BTreeMap<TaskId, Option<&Attempt>> {
        self.by_task()
            .into_iter()
            .map(|(task, seq)| (task, seq.into_iter().find(|a| a.is_correct)))
            .collect()
    }

    /// Distinct tasks attempted.
    pub fn task_count(&self) -> usize {
        self.attempts
            .iter()
            .map(|a| a.task_id)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Distinct tasks with at least one correct attempt, regardless of ordinal.
    pub fn tasks_solved(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.is_correct)
            .map(|a| a.task_id)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Positive `time_spent` samples.
    pub fn time_samples(&self) -> Vec<f64> {
        self.attempts
            .iter()
            .filter_map(|a| a.time_spent)
            .filter(|t| *t > 0.0)
            .collect()
    }

    /// Calendar days with at least one attempt.
    pub fn distinct_days(&self) -> BTreeSet<NaiveDate> {
        self.attempts.iter().map(|a| a.created_at.date()).collect()
    }

    pub fn activity_by_weekday(&self) -> WeekdayHistogram {
        let mut counts = [0u32; 7];
        for a in &self.attempts {
            counts[weekday_index(a.created_at)] += 1;
        }
        counts
    }

    /// Solved tasks bucketed by the weekday of their first success.
    pub fn solved_by_weekday(&self) -> WeekdayHistogram {
        let mut counts = [0u32; 7];
        for first in self.first_successes().into_values().flatten() {
            counts[weekday_index(first.created_at)] += 1;
        }
        counts
    }
}

impl From<Vec<Attempt>> for AttemptSet {
    fn from(attempts: Vec<Attempt>) -> Self {
        Self::new(attempts)
    }
}

impl FromIterator<Attempt> for AttemptSet {
    fn from_iter<I: IntoIterator<Item = Attempt>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
