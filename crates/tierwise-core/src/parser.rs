//! Dataset file parser.
//!
//! Loads datasets from TOML (or JSON, by extension) files and directories,
//! writes them back, and validates them.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use anyhow::{Context, Result};

use crate::dataset::Dataset;

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Parse a single dataset file.
pub fn parse_dataset(path: &Path) -> Result<Dataset> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset file: {}", path.display()))?;

    parse_dataset_str(&content, path)
}

/// Parse dataset text; `source_path` picks the format and labels errors.
pub fn parse_dataset_str(content: &str, source_path: &Path) -> Result<Dataset> {
    if is_json(source_path) {
        serde_json::from_str(content)
            .with_context(|| format!("failed to parse JSON: {}", source_path.display()))
    } else {
        toml::from_str(content)
            .with_context(|| format!("failed to parse TOML: {}", source_path.display()))
    }
}

/// Write a dataset, creating parent directories as needed.
pub fn save_dataset(dataset: &Dataset, path: &Path) -> Result<()> {
    let content = if is_json(path) {
        serde_json::to_string_pretty(dataset).context("failed to serialize dataset")?
    } else {
        toml::to_string(dataset).context("failed to serialize dataset")?
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("failed to write dataset to {}", path.display()))?;
    Ok(())
}

/// Recursively load all `.toml` and `.json` datasets from a directory.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_dataset_directory(dir: &Path) -> Result<Vec<Dataset>> {
    let mut datasets = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            datasets.extend(load_dataset_directory(&path)?);
        } else if path
            .extension()
            .is_some_and(|ext| ext == "toml" || ext == "json")
        {
            match parse_dataset(&path) {
                Ok(dataset) => datasets.push(dataset),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(datasets)
}

/// A warning from dataset validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// What the warning is about, e.g. `task 12`.
    pub subject: Option<String>,
    pub message: String,
}

impl ValidationWarning {
    fn about(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "[{subject}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Check a dataset for inconsistencies that would silently degrade scores.
pub fn validate_dataset(dataset: &Dataset) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_tasks = HashSet::new();
    for task in &dataset.tasks {
        if !seen_tasks.insert(task.id) {
            warnings.push(ValidationWarning::about(
                format!("task {}", task.id),
                format!("duplicate task ID: {}", task.id),
            ));
        }
    }
    let topics: BTreeSet<_> = dataset.tasks.iter().map(|t| t.topic_id).collect();

    for (i, attempt) in dataset.attempts.iter().enumerate() {
        let subject = format!("attempt #{} (user {}, task {})", i + 1, attempt.user_id, attempt.task_id);
        if !seen_tasks.contains(&attempt.task_id) {
            warnings.push(ValidationWarning::about(
                subject.clone(),
                "attempt references an unknown task and will be ignored",
            ));
        }
        if attempt.attempt_number == 0 {
            warnings.push(ValidationWarning::about(
                subject.clone(),
                "attempt_number is 0; attempt numbers start at 1",
            ));
        }
        if attempt.time_spent.is_some_and(|t| t < 0.0) {
            warnings.push(ValidationWarning::about(
                subject,
                "time_spent is negative and will be ignored",
            ));
        }
    }

    let mut seen_configs = HashSet::new();
    for cfg in &dataset.level_configs {
        let subject = format!("level config {}/{}", cfg.topic_id, cfg.level);
        if !seen_configs.insert((cfg.topic_id, cfg.level)) {
            warnings.push(ValidationWarning::about(
                subject.clone(),
                "duplicate level config; the last one wins",
            ));
        }
        if !topics.contains(&cfg.topic_id) {
            warnings.push(ValidationWarning::about(
                subject.clone(),
                format!("topic {} has no tasks", cfg.topic_id),
            ));
        }
        if cfg.reference_time <= 0.0 {
            warnings.push(ValidationWarning::about(
                subject,
                "reference_time is not positive; time scores will be 0",
            ));
        }
    }

    for row in &dataset.progress {
        let subject = format!("progress {}/{}", row.user_id, row.topic_id);
        if !topics.contains(&row.topic_id) {
            warnings.push(ValidationWarning::about(
                subject.clone(),
                format!("topic {} has no tasks", row.topic_id),
            ));
        }
        if row.is_mastered != (row.current_level == crate::model::Level::Mastered) {
            warnings.push(ValidationWarning::about(
                subject,
                format!(
                    "is_mastered = {} disagrees with current_level = {}",
                    row.is_mastered, row.current_level
                ),
            ));
        }
    }

    if let Some(system) = &dataset.system {
        let w = system.sanitized().weights();
        if w.accuracy + w.time + w.progress + w.motivation <= 0.0 {
            warnings.push(ValidationWarning {
                subject: Some("system".into()),
                message: "all score weights are zero; every total score will be 0".into(),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Level;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[dataset]
id = "algebra"
name = "Algebra week"
description = "One week of linear equations"

[system]
weight_accuracy = 0.5
weight_time = 0.2
weight_progress = 0.2
weight_motivation = 0.1

[[tasks]]
id = 1
topic_id = 10
level = "low"

[[tasks]]
id = 2
topic_id = 10
level = "medium"

[[level_configs]]
topic_id = 10
level = "low"
task_count_threshold = 5
reference_time = 300
penalty_weights = "0.7,0.4"

[[level_configs]]
topic_id = 10
level = "medium"
task_count_threshold = 8
reference_time = 240.0
penalty_weights = { "2" = 0.6, "3" = 0.3 }

[[progress]]
user_id = 7
topic_id = 10
current_level = "low"

[[attempts]]
user_id = 7
task_id = 1
is_correct = false
time_spent = 200.0
created_at = "2025-01-06T09:00:00"

[[attempts]]
user_id = 7
task_id = 1
is_correct = true
time_spent = 150.0
attempt_number = 2
created_at = "2025-01-06T09:10:00"
"#;

    fn parse(toml: &str) -> Dataset {
        parse_dataset_str(toml, &PathBuf::from("test.toml")).unwrap()
    }

    #[test]
    fn parse_valid_toml() {
        let dataset = parse(VALID_TOML);
        assert_eq!(dataset.info.id, "algebra");
        assert_eq!(dataset.tasks.len(), 2);
        assert_eq!(dataset.attempts[0].attempt_number, 1);
        assert_eq!(dataset.attempts[1].attempt_number, 2);
        assert_eq!(dataset.progress[0].current_level, Level::Low);
        assert!(!dataset.progress[0].is_mastered);

        let low = dataset.level_configs[0].config();
        assert_eq!(low.reference_time, 300.0);
        assert_eq!(low.penalty_weights.weight_for(2), 0.7);
        let medium = dataset.level_configs[1].config();
        assert_eq!(medium.penalty_weights.weight_for(3), 0.3);

        let system = dataset.system_config();
        assert_eq!(system.weight_accuracy, 0.5);
        assert_eq!(system.engagement_weight_alpha, 0.667);
        assert!(validate_dataset(&dataset).is_empty());
    }

    #[test]
    fn parse_minimal_dataset() {
        let dataset = parse(
            r#"
[dataset]
id = "empty"
name = "Empty"
"#,
        );
        assert!(dataset.system.is_none());
        assert!(dataset.attempts.is_empty());
        assert_eq!(dataset.system_config(), crate::model::SystemConfig::default());
    }

    #[test]
    fn parse_json_by_extension() {
        let json = r#"{
            "dataset": {"id": "j", "name": "JSON"},
            "tasks": [{"id": 1, "topic_id": 3, "level": "high"}],
            "level_configs": [{"topic_id": 3, "level": "high", "task_count_threshold": 4,
                               "reference_time": 120, "penalty_weights": [0.5, 0.25]}]
        }"#;
        let dataset = parse_dataset_str(json, &PathBuf::from("set.json")).unwrap();
        assert_eq!(dataset.tasks[0].level, Level::High);
        assert_eq!(dataset.level_configs[0].penalty_weights.weight_for(3), 0.25);
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_dataset_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn parse_rejects_unknown_level() {
        let toml = r#"
[dataset]
id = "x"
name = "x"

[[tasks]]
id = 1
topic_id = 1
level = "expert"
"#;
        assert!(parse_dataset_str(toml, &PathBuf::from("x.toml")).is_err());
    }

    #[test]
    fn validate_reports_inconsistencies() {
        let toml = r#"
[dataset]
id = "broken"
name = "Broken"

[system]
weight_accuracy = 0.0
weight_time = 0.0
weight_progress = 0.0
weight_motivation = 0.0

[[tasks]]
id = 1
topic_id = 10
level = "low"

[[tasks]]
id = 1
topic_id = 10
level = "medium"

[[level_configs]]
topic_id = 10
level = "low"
task_count_threshold = 5
reference_time = 300

[[level_configs]]
topic_id = 10
level = "low"
task_count_threshold = 6
reference_time = 0

[[level_configs]]
topic_id = 99
level = "low"
task_count_threshold = 5
reference_time = 300

[[progress]]
user_id = 1
topic_id = 10
current_level = "high"
is_mastered = true

[[attempts]]
user_id = 1
task_id = 5
is_correct = true
attempt_number = 0
time_spent = -3.0
created_at = "2025-01-06T09:00:00"
"#;
        let warnings = validate_dataset(&parse(toml));
        let has = |needle: &str| warnings.iter().any(|w| w.message.contains(needle));
        assert!(has("duplicate task ID"));
        assert!(has("unknown task"));
        assert!(has("attempt_number is 0"));
        assert!(has("time_spent is negative"));
        assert!(has("duplicate level config"));
        assert!(has("topic 99 has no tasks"));
        assert!(has("reference_time is not positive"));
        assert!(has("disagrees with current_level"));
        assert!(has("all score weights are zero"));
    }

    #[test]
    fn save_and_reload_toml() {
        let dataset = parse(VALID_TOML);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("algebra.toml");

        save_dataset(&dataset, &path).unwrap();
        let reloaded = parse_dataset(&path).unwrap();
        assert_eq!(reloaded, dataset);
    }

    #[test]
    fn load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not = [valid").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(
            dir.path().join("nested").join("b.json"),
            r#"{"dataset": {"id": "b", "name": "B"}}"#,
        )
        .unwrap();

        let datasets = load_dataset_directory(dir.path()).unwrap();
        let ids: Vec<&str> = datasets.iter().map(|d| d.info.id.as_str()).collect();
        assert_eq!(ids, vec!["algebra", "b"]);
    }
}
