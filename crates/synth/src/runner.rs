//! One configuration in, one metric vector out.

use crate::metrics::MetricVector;
use crate::report::{load_report, report_path};
use crate::script::{ScriptSpec, SOLUTION_NAME};
use crate::supervisor::{CandidateFiles, Supervision, ToolCommand, ToolProcess};
use anyhow::{Context, Result};
use hlsforge_directives::{apply_all, Configuration, DirectiveSpace};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Anything that can turn a configuration into metrics. Failures are part
/// of the result ([`MetricVector::FAILED`]), never an error.
pub trait Synthesize: Send + Sync {
    fn synthesize(&self, config: &Configuration) -> MetricVector;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerOptions {
    pub tool: ToolCommand,
    pub work_dir: PathBuf,
    pub device: String,
    pub clock_period_ns: f64,
    pub timeout_secs: u64,
    pub default_optimizations: bool,
    pub project_prefix: String,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            tool: ToolCommand::default(),
            work_dir: PathBuf::from("."),
            device: "xczu7ev-ffvc1156-2-e".into(),
            clock_period_ns: 3.33,
            timeout_secs: 3600,
            default_optimizations: false,
            project_prefix: "hls_dse".into(),
        }
    }
}

pub struct SynthesisRunner {
    space: Arc<DirectiveSpace>,
    source: String,
    source_extension: String,
    options: RunnerOptions,
    next_id: AtomicU64,
    runtime: tokio::runtime::Runtime,
}

impl SynthesisRunner {
    pub fn new(
        space: Arc<DirectiveSpace>,
        source_path: &Path,
        options: RunnerOptions,
    ) -> Result<Self> {
        let source = fs::read_to_string(source_path)
            .with_context(|| format!("reading kernel source {}", source_path.display()))?;
        let source_extension = source_path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_else(|| ".cpp".to_string());
        Self::from_source(space, source, source_extension, options)
    }

    pub fn from_source(
        space: Arc<DirectiveSpace>,
        source: String,
        source_extension: String,
        options: RunnerOptions,
    ) -> Result<Self> {
        fs::create_dir_all(&options.work_dir)
            .with_context(|| format!("creating work dir {}", options.work_dir.display()))?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("hlsforge-supervisor")
            .enable_all()
            .build()
            .context("building supervisor runtime")?;
        Ok(Self {
            space,
            source,
            source_extension,
            options,
            next_id: AtomicU64::new(0),
            runtime,
        })
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Candidates launched so far.
    pub fn launched(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    fn run_candidate(&self, id: u64, config: &Configuration) -> Result<MetricVector> {
        let project = format!("{}_{}", self.options.project_prefix, id);
        let files = CandidateFiles::new(
            &self.options.work_dir,
            &project,
            id,
            &self.source_extension,
        );

        let outcome = self.prepare_and_run(&project, &files, config);
        files.remove();
        outcome
    }

    fn prepare_and_run(
        &self,
        project: &str,
        files: &CandidateFiles,
        config: &Configuration,
    ) -> Result<MetricVector> {
        let directives = self.space.resolve(config)?;
        let applied = apply_all(&self.source, &directives);
        if applied.inserted != directives.len() {
            warn!(
                config = %config,
                expected = directives.len(),
                inserted = applied.inserted,
                "not every action point marker was found in the source"
            );
        }
        fs::write(&files.source, &applied.text)
            .with_context(|| format!("writing {}", files.source.display()))?;

        let script = ScriptSpec {
            project: project.to_string(),
            top_function: self.space.top_function().to_string(),
            source_file: file_name(&files.source),
            device: self.options.device.clone(),
            clock_period_ns: self.options.clock_period_ns,
            default_optimizations: self.options.default_optimizations,
        };
        fs::write(&files.script, script.render())
            .with_context(|| format!("writing {}", files.script.display()))?;

        let timeout = Duration::from_secs(self.options.timeout_secs);
        let supervision = self.runtime.block_on(async {
            let process = ToolProcess::spawn(
                &self.options.tool,
                &self.options.work_dir,
                Path::new(&file_name(&files.script)),
                Path::new(&file_name(&files.log)),
            )?;
            Ok::<_, std::io::Error>(process.supervise(timeout).await)
        });

        let supervision = match supervision {
            Ok(supervision) => supervision,
            Err(err) => {
                warn!(config = %config, error = %err, "failed to launch synthesis tool");
                return Ok(MetricVector::FAILED);
            }
        };

        match supervision {
            Supervision::Exited { status, elapsed } => {
                info!(
                    config = %config,
                    project,
                    success = status.success(),
                    elapsed_secs = elapsed.as_secs_f64(),
                    "synthesis finished"
                );
            }
            Supervision::TimedOut { .. } => return Ok(MetricVector::FAILED),
        }

        let report = report_path(&files.project_dir, SOLUTION_NAME);
        match load_report(&report, self.space.top_function()) {
            Ok(metrics) => Ok(metrics),
            Err(err) => {
                warn!(config = %config, error = %err, "no usable synthesis report");
                Ok(MetricVector::FAILED)
            }
        }
    }
}

impl Synthesize for SynthesisRunner {
    fn synthesize(&self, config: &Configuration) -> MetricVector {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        match self.run_candidate(id, config) {
            Ok(metrics) => metrics,
            Err(err) => {
                warn!(config = %config, candidate = id, error = %err, "candidate could not be prepared");
                MetricVector::FAILED
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
