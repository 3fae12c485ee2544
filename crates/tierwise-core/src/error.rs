//! Evaluation error types.
//!
//! Degraded inputs (missing progress, missing configuration, empty history)
//! are not errors: they surface as warnings on each result. The variants here
//! are the conditions that reject a whole batch before any pair is scored.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that abort an evaluation batch.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// No user identifiers were requested.
    #[error("at least one user id is required")]
    EmptyUserIds,

    /// No topic identifiers were requested.
    #[error("at least one topic id is required")]
    EmptyTopicIds,

    /// The period starts after it ends.
    #[error("invalid period: start {start} is after end {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },

    /// A configuration or progress prefetch failed.
    #[error("failed to load {what}: {source:#}")]
    Store {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl EvaluationError {
    /// Returns `true` if the caller supplied a malformed request.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            EvaluationError::EmptyUserIds
                | EvaluationError::EmptyTopicIds
                | EvaluationError::InvalidPeriod { .. }
        )
    }
}
