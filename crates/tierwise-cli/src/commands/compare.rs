//! The `tierwise compare` command.

use std::path::PathBuf;

use anyhow::Result;

use tierwise_core::report::{EvaluationReport, ScoreDrift};

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_decline: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = EvaluationReport::load_json(&baseline_path)?;
    let current = EvaluationReport::load_json(&current_path)?;

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "Comparison: {} declines, {} gains, {} unchanged, {} level moves",
                report.declines.len(),
                report.gains.len(),
                report.unchanged,
                report.level_moves.len()
            );

            print_drifts("Declines", &report.declines);
            print_drifts("Gains", &report.gains);

            if !report.level_moves.is_empty() {
                println!("\nLevel moves:");
                for m in &report.level_moves {
                    let label = |l: Option<tierwise_core::model::Level>| {
                        l.map(|l| l.to_string()).unwrap_or_else(|| "-".into())
                    };
                    println!(
                        "  student {} topic {}: {} -> {}",
                        m.user_id,
                        m.topic_id,
                        label(m.baseline_level),
                        label(m.current_level)
                    );
                }
            }

            if report.new_pairs > 0 {
                println!("\n{} new pair(s)", report.new_pairs);
            }
            if report.removed_pairs > 0 {
                println!("{} removed pair(s)", report.removed_pairs);
            }
        }
    }

    if fail_on_decline && report.has_declines() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_drifts(title: &str, drifts: &[ScoreDrift]) {
    if drifts.is_empty() {
        return;
    }
    println!("\n{title}:");
    for d in drifts {
        println!(
            "  student {} topic {}: {:.3} -> {:.3} ({:+.3})",
            d.user_id, d.topic_id, d.baseline_score, d.current_score, d.delta
        );
    }
}
