//! tierwise CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "tierwise",
    version,
    about = "Adaptive level evaluation for learners"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate students over a period and decide level transitions
    Run {
        /// Dataset file (.toml or .json); defaults to `dataset` in tierwise.toml
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Student ids (comma-separated); defaults to every student in the dataset
        #[arg(long)]
        users: Option<String>,

        /// Topic ids (comma-separated); defaults to every topic in the dataset
        #[arg(long)]
        topics: Option<String>,

        /// First day of the period (YYYY-MM-DD)
        #[arg(long, requires = "to", conflicts_with = "week")]
        from: Option<NaiveDate>,

        /// Last day of the period (YYYY-MM-DD)
        #[arg(long, requires = "from", conflicts_with = "week")]
        to: Option<NaiveDate>,

        /// ISO week to evaluate, e.g. 2025-W02
        #[arg(long)]
        week: Option<String>,

        /// Max concurrent pairs
        #[arg(long)]
        parallelism: Option<usize>,

        /// Output directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: json, html, all, none (comma-separated)
        #[arg(long)]
        format: Option<String>,

        /// Write progress updates and log entries back into the dataset
        #[arg(long)]
        apply: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two evaluation reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Score delta below which a pair counts as unchanged
        #[arg(long, default_value = "0.05")]
        threshold: f64,

        /// Exit code 1 if any total score declined
        #[arg(long)]
        fail_on_decline: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate dataset files
    Validate {
        /// Path to dataset file or directory
        #[arg(long)]
        dataset: PathBuf,
    },

    /// Print the effective evaluation configuration of a dataset
    ShowConfig {
        /// Dataset file (.toml or .json)
        #[arg(long)]
        dataset: PathBuf,
    },

    /// Create starter config and example dataset
    Init,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tierwise=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            dataset,
            users,
            topics,
            from,
            to,
            week,
            parallelism,
            output,
            format,
            apply,
            config,
        } => {
            commands::run::execute(commands::run::RunArgs {
                dataset,
                users,
                topics,
                from,
                to,
                week,
                parallelism,
                output,
                format,
                apply,
                config,
            })
            .await
        }
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_decline,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_decline, format),
        Commands::Validate { dataset } => commands::validate::execute(dataset),
        Commands::ShowConfig { dataset } => commands::show_config::execute(dataset),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
