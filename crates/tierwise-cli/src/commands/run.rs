//! The `tierwise run` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use tierwise_core::engine::{BatchObserver, EngineConfig, EvaluationEngine, EvaluationRequest};
use tierwise_core::model::{EvaluationPeriod, TopicId, UserId};
use tierwise_core::parser;
use tierwise_core::report::EvaluationReport;
use tierwise_core::results::EvaluationResult;
use tierwise_report::html::write_html_report;
use tierwise_store::{load_config_from, MemoryStore};

/// Console progress observer.
struct ConsoleObserver;

impl BatchObserver for ConsoleObserver {
    fn on_pair_start(&self, user: UserId, topic: TopicId) {
        tracing::debug!(user, topic, "evaluating");
    }

    fn on_pair_complete(&self, result: &EvaluationResult) {
        let total = result
            .total_score()
            .map(|t| format!("{t:.3}"))
            .unwrap_or_else(|| "-".into());
        let change = result
            .level_change
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".into());
        eprintln!(
            "  Done: student {} :: topic {} total {} ({})",
            result.user_id, result.topic_id, total, change
        );
    }

    fn on_pair_error(&self, user: UserId, topic: TopicId, error: &str) {
        eprintln!("  ERROR: student {user} :: topic {topic}: {error}");
    }

    fn on_batch_complete(&self, total: usize, evaluated: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {evaluated}/{total} evaluated, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

/// Arguments of `tierwise run`.
pub struct RunArgs {
    pub dataset: Option<PathBuf>,
    pub users: Option<String>,
    pub topics: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub week: Option<String>,
    pub parallelism: Option<usize>,
    pub output: Option<PathBuf>,
    pub format: Option<String>,
    pub apply: bool,
    pub config: Option<PathBuf>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;

    let dataset_path = args
        .dataset
        .or_else(|| config.dataset.clone())
        .context("no dataset given: pass --dataset or set `dataset` in tierwise.toml")?;
    let parallelism = args.parallelism.unwrap_or(config.parallelism);
    anyhow::ensure!(parallelism >= 1, "parallelism must be at least 1");
    let output = args.output.unwrap_or_else(|| config.output_dir.clone());
    let formats = resolve_formats(args.format.as_deref(), &config.formats)?;

    let dataset = parser::parse_dataset(&dataset_path)?;
    for w in parser::validate_dataset(&dataset) {
        tracing::warn!("{}: {w}", dataset_path.display());
    }

    let users = match &args.users {
        Some(list) => parse_ids(list, "user")?,
        None => dataset.user_ids(),
    };
    let topics = match &args.topics {
        Some(list) => parse_ids(list, "topic")?,
        None => dataset.topic_ids(),
    };

    let period = match (args.from, args.to, &args.week) {
        (Some(from), Some(to), _) => EvaluationPeriod::new(from, to),
        (_, _, Some(week)) => week.parse::<EvaluationPeriod>().map_err(anyhow::Error::msg)?,
        _ => {
            let days = dataset.system_config().sanitized().evaluation_period_days;
            EvaluationPeriod::trailing(chrono::Local::now().date_naive(), days)
        }
    };

    let source = dataset.info.name.clone();
    let store = Arc::new(MemoryStore::from_dataset(dataset));
    let engine = EvaluationEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        EngineConfig { parallelism },
    );

    eprintln!(
        "tierwise v{}: evaluating {} students x {} topics over {}",
        env!("CARGO_PKG_VERSION"),
        users.len(),
        topics.len(),
        period
    );
    eprintln!();

    let request = EvaluationRequest::new(users, topics, period);
    let mut report = engine.evaluate(&request, &ConsoleObserver).await?;
    report.source = Some(source);

    print_summary(&report);
    write_outputs(&report, &output, &formats)?;

    if args.apply {
        let now = chrono::Local::now().naive_local();
        let applied = store.apply(&report, now)?;
        parser::save_dataset(&store.to_dataset()?, &dataset_path)?;
        eprintln!(
            "Applied: {} progress rows updated, {} created, {} log entries, {} skipped -> {}",
            applied.progress_updated,
            applied.progress_created,
            applied.log_entries,
            applied.skipped,
            dataset_path.display()
        );
    }

    Ok(())
}

fn parse_ids(list: &str, what: &str) -> Result<Vec<u64>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| anyhow::anyhow!("invalid {what} id: '{s}'"))
        })
        .collect()
}

fn resolve_formats(arg: Option<&str>, configured: &[String]) -> Result<Vec<String>> {
    let requested: Vec<String> = match arg {
        Some(s) => s.split(',').map(|f| f.trim().to_lowercase()).collect(),
        None => configured.iter().map(|f| f.to_lowercase()).collect(),
    };

    let mut formats: Vec<String> = Vec::new();
    for fmt in requested {
        let expanded: &[&str] = match fmt.as_str() {
            "all" => &["json", "html"],
            "none" | "" => &[],
            "json" => &["json"],
            "html" => &["html"],
            other => anyhow::bail!("unknown format: {other} (expected json, html, all or none)"),
        };
        for f in expanded {
            if !formats.iter().any(|x| x == f) {
                formats.push(f.to_string());
            }
        }
    }
    Ok(formats)
}

fn write_outputs(report: &EvaluationReport, output: &Path, formats: &[String]) -> Result<()> {
    if formats.is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let timestamp = report.created_at.format("%Y-%m-%dT%H%M%S");

    for fmt in formats {
        match fmt.as_str() {
            "json" => {
                let path = output.join(format!("report-{timestamp}.json"));
                report.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            "html" => {
                let path = output.join(format!("report-{timestamp}.html"));
                write_html_report(report, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            _ => {}
        }
    }
    Ok(())
}

fn print_summary(report: &EvaluationReport) {
    use comfy_table::{Cell, Table};

    let dash = || "-".to_string();
    let mut table = Table::new();
    table.set_header(vec![
        "Student", "Topic", "Before", "After", "Change", "Accuracy", "Time", "Progress",
        "Motivation", "Total", "Warnings",
    ]);

    for r in &report.results {
        let score = |f: fn(&tierwise_core::results::EvaluationMetrics) -> f64| {
            r.metrics
                .as_ref()
                .map(|m| format!("{:.3}", f(m)))
                .unwrap_or_else(dash)
        };
        table.add_row(vec![
            Cell::new(r.user_id),
            Cell::new(r.topic_id),
            Cell::new(r.level_before.map(|l| l.to_string()).unwrap_or_else(dash)),
            Cell::new(r.level_after.map(|l| l.to_string()).unwrap_or_else(dash)),
            Cell::new(r.level_change.map(|c| c.to_string()).unwrap_or_else(dash)),
            Cell::new(score(|m| m.accuracy)),
            Cell::new(score(|m| m.time_score)),
            Cell::new(score(|m| m.progress_score)),
            Cell::new(score(|m| m.motivation_score)),
            Cell::new(score(|m| m.total_score)),
            Cell::new(r.warning_text().unwrap_or_default()),
        ]);
    }

    eprintln!("\n{table}");

    let changes = &report.summary.level_changes;
    eprintln!(
        "Level changes: {} up, {} down, {} stay, {} mastered",
        changes.up, changes.down, changes.stay, changes.mastered
    );
    for f in &report.failures {
        eprintln!("FAILED: student {} :: topic {}: {}", f.user_id, f.topic_id, f.error);
    }
}
