//! Run configuration, loadable from TOML.
//!
//! Every section has defaults, so a file only needs the keys it changes.

use hlsforge_directives::{PlacementLimits, SpaceLimits};
use hlsforge_synth::{RunnerOptions, ToolCommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelSection {
    pub source: PathBuf,
    pub metadata: PathBuf,
    /// Loop-nest description used by `place`.
    pub structure: PathBuf,
}

impl Default for KernelSection {
    fn default() -> Self {
        Self {
            source: PathBuf::from("kernel.cpp"),
            metadata: PathBuf::from("kernel_info.txt"),
            structure: PathBuf::from("src_info.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSection {
    pub program: String,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    pub device: String,
    pub clock_period_ns: f64,
    pub timeout_secs: u64,
    pub default_optimizations: bool,
    pub project_prefix: String,
}

impl Default for ToolSection {
    fn default() -> Self {
        let runner = RunnerOptions::default();
        Self {
            program: runner.tool.program,
            args: runner.tool.args,
            work_dir: runner.work_dir,
            device: runner.device,
            clock_period_ns: runner.clock_period_ns,
            timeout_secs: runner.timeout_secs,
            default_optimizations: runner.default_optimizations,
            project_prefix: runner.project_prefix,
        }
    }
}

impl ToolSection {
    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            tool: ToolCommand::new(self.program.clone()).with_args(self.args.iter().cloned()),
            work_dir: self.work_dir.clone(),
            device: self.device.clone(),
            clock_period_ns: self.clock_period_ns,
            timeout_secs: self.timeout_secs,
            default_optimizations: self.default_optimizations,
            project_prefix: self.project_prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum StrategyKind {
    Random,
    Exhaustive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub strategy: StrategyKind,
    pub batch_size: usize,
    pub max_batches: usize,
    pub seed: u64,
    pub threads: usize,
    /// Result cache journal.
    pub cache: PathBuf,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Random,
            batch_size: 24,
            max_batches: 10,
            seed: 1,
            threads: 24,
            cache: PathBuf::from("dse_cache.jsonl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
    /// Destination of the `place` command's source.
    pub placed_source: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("optimized"),
            placed_source: PathBuf::from("placed_kernel.cpp"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub kernel: KernelSection,
    pub tool: ToolSection,
    pub space: SpaceLimits,
    pub placement: PlacementLimits,
    pub search: SearchSection,
    pub output: OutputSection,
}

impl ExplorerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.threads == 0 {
            return Err(ConfigError::Invalid("search.threads must be at least 1".into()));
        }
        if self.search.batch_size == 0 {
            return Err(ConfigError::Invalid("search.batch_size must be at least 1".into()));
        }
        if self.tool.timeout_secs == 0 {
            return Err(ConfigError::Invalid("tool.timeout_secs must be positive".into()));
        }
        if !(self.tool.clock_period_ns.is_finite() && self.tool.clock_period_ns > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "tool.clock_period_ns must be positive, got {}",
                self.tool.clock_period_ns
            )));
        }
        if self.tool.program.trim().is_empty() {
            return Err(ConfigError::Invalid("tool.program is empty".into()));
        }
        Ok(())
    }
}
