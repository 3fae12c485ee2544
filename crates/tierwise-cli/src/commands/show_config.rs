//! The `tierwise show-config` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use tierwise_core::parser;

pub fn execute(dataset_path: PathBuf) -> Result<()> {
    let dataset = parser::parse_dataset(&dataset_path)?;
    let stored = dataset.system_config();
    let system = stored.sanitized();

    println!("Dataset: {} ({})", dataset.info.name, dataset.info.id);
    if dataset.system.is_none() {
        println!("No [system] section; defaults apply.");
    } else if stored != system {
        println!("Stored system config was out of range; showing adjusted values.");
    }

    let t = &system.thresholds;
    println!("\nSystem configuration:");
    println!(
        "  weights     accuracy {:.3}  time {:.3}  progress {:.3}  motivation {:.3}",
        system.weight_accuracy, system.weight_time, system.weight_progress, system.weight_motivation
    );
    println!("  engagement  alpha {:.3}", system.engagement_weight_alpha);
    println!(
        "  low band    {:.3} .. {:.3}",
        t.min_threshold_low, t.max_threshold_low
    );
    println!(
        "  medium band {:.3} .. {:.3}",
        t.min_threshold_medium, t.max_threshold_medium
    );
    println!("  working weekdays {:?}", system.working_weekdays);
    println!("  period days {}", system.evaluation_period_days);

    let mut table = Table::new();
    table.set_header(vec![
        "Topic",
        "Level",
        "Tasks",
        "Reference time",
        "2nd attempt",
        "3rd attempt",
        "Stored weights",
    ]);

    let mut configs: Vec<_> = dataset.level_configs.iter().collect();
    configs.sort_by_key(|r| (r.topic_id, r.level));
    for record in configs {
        let cfg = record.config();
        let stored = if cfg.penalty_weights.is_empty() {
            "(defaults)".to_string()
        } else {
            serde_json::to_string(cfg.penalty_weights.as_map())?
        };
        table.add_row(vec![
            Cell::new(record.topic_id),
            Cell::new(record.level),
            Cell::new(cfg.task_count_threshold),
            Cell::new(format!("{:.0}s", cfg.reference_time)),
            Cell::new(format!("{:.2}", cfg.penalty_weights.weight_for(2))),
            Cell::new(format!("{:.2}", cfg.penalty_weights.weight_for(3))),
            Cell::new(stored),
        ]);
    }

    println!("\nLevel configurations:");
    println!("{table}");

    Ok(())
}
