//! Tool configuration: `tierwise.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level tierwise configuration.
///
/// Evaluation parameters (weights, thresholds, level configs) are data and
/// live in the dataset; this file only configures the tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierwiseConfig {
    /// Dataset used when `--dataset` is not given.
    #[serde(default)]
    pub dataset: Option<PathBuf>,
    /// Max pairs evaluated concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Report formats written by `run` (`json`, `html`).
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
}

fn default_parallelism() -> usize {
    4
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./tierwise-results")
}
fn default_formats() -> Vec<String> {
    vec!["json".into()]
}

impl Default for TierwiseConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            parallelism: default_parallelism(),
            output_dir: default_output_dir(),
            formats: default_formats(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are not scanned again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `tierwise.toml` in the current directory
/// 2. `~/.config/tierwise/config.toml`
///
/// Environment variable overrides: `TIERWISE_PARALLELISM`, `TIERWISE_OUTPUT_DIR`.
pub fn load_config() -> Result<TierwiseConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<TierwiseConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("tierwise.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<TierwiseConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => TierwiseConfig::default(),
    };

    apply_env_overrides(&mut config)?;

    config.dataset = config.dataset.as_deref().map(resolve_path);
    config.output_dir = resolve_path(&config.output_dir);

    Ok(config)
}

fn apply_env_overrides(config: &mut TierwiseConfig) -> Result<()> {
    if let Ok(value) = std::env::var("TIERWISE_PARALLELISM") {
        config.parallelism = value
            .trim()
            .parse()
            .with_context(|| format!("TIERWISE_PARALLELISM is not a number: {value}"))?;
    }
    if let Ok(dir) = std::env::var("TIERWISE_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("tierwise"))
}
