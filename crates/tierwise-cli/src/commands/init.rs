//! The `tierwise init` command.

use std::path::Path;

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("tierwise.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("datasets").context("failed to create datasets/")?;
    write_if_missing(Path::new("datasets/example.toml"), EXAMPLE_DATASET)?;

    println!("\nNext steps:");
    println!("  1. Run: tierwise validate --dataset datasets/example.toml");
    println!("  2. Run: tierwise show-config --dataset datasets/example.toml");
    println!("  3. Run: tierwise run --week 2025-W02");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# tierwise configuration

# Dataset used when --dataset is not given. ${VAR} references are expanded.
dataset = "datasets/example.toml"

# Max (student, topic) pairs evaluated concurrently.
parallelism = 4

output_dir = "./tierwise-results"

# Report formats written by `tierwise run`: json, html.
formats = ["json", "html"]
"#;

const EXAMPLE_DATASET: &str = r#"[dataset]
id = "example"
name = "Example dataset"
description = "Two students practising fractions for one week"

[[tasks]]
id = 1
topic_id = 1
level = "low"
title = "Add 1/2 and 1/4"

[[tasks]]
id = 2
topic_id = 1
level = "low"
title = "Simplify 6/8"

[[tasks]]
id = 3
topic_id = 1
level = "medium"
title = "Divide 3/4 by 2/5"

[[level_configs]]
topic_id = 1
level = "low"
task_count_threshold = 2
reference_time = 120
penalty_weights = { "2" = 0.7, "3" = 0.4 }

[[level_configs]]
topic_id = 1
level = "medium"
task_count_threshold = 3
reference_time = 240

[[progress]]
user_id = 1
topic_id = 1
current_level = "low"

[[attempts]]
user_id = 1
task_id = 1
is_correct = true
time_spent = 80.0
created_at = "2025-01-06T15:00:00"

[[attempts]]
user_id = 1
task_id = 2
is_correct = false
time_spent = 140.0
created_at = "2025-01-08T15:30:00"

[[attempts]]
user_id = 1
task_id = 2
is_correct = true
time_spent = 95.0
attempt_number = 2
created_at = "2025-01-08T15:40:00"

[[attempts]]
user_id = 2
task_id = 3
is_correct = true
time_spent = 200.0
created_at = "2025-01-09T10:00:00"
"#;
