//! Bridge between search strategies and synthesis.
//!
//! The adapter turns a configuration into objectives and constraints,
//! consulting the [`ResultCache`] first and falling back to the
//! synthesizer on a miss. Every evaluation lands in the [`EvaluationLog`].

use hlsforge_cache::{CacheError, ResultCache};
use hlsforge_directives::{Configuration, DirectiveError, DirectiveSpace};
use hlsforge_synth::{MetricVector, Synthesize};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Configuration(#[from] DirectiveError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// What a search strategy sees for one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub config: Configuration,
    /// Minimized: latency (ms) and five utilization percentages.
    pub objectives: MetricVector,
    /// `util - 100` per resource; satisfied when `<= 0`.
    pub constraints: [f64; 5],
}

impl Evaluation {
    pub fn new(config: Configuration, objectives: MetricVector) -> Self {
        Self {
            constraints: objectives.constraints(),
            config,
            objectives,
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.constraints.iter().all(|c| *c <= 0.0)
    }

    /// Sum of positive constraint values.
    pub fn violation(&self) -> f64 {
        self.constraints.iter().map(|c| c.max(0.0)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub batch: usize,
    pub config: Configuration,
    pub objectives: MetricVector,
    /// Synthesis wall time in seconds. For cache hits this is the time the
    /// original synthesis took.
    pub wall_time_secs: f64,
    pub cached: bool,
}

/// Append-only record of every evaluation in a run.
#[derive(Debug, Default)]
pub struct EvaluationLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl EvaluationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn cache_hits(&self) -> usize {
        self.entries.lock().iter().filter(|e| e.cached).count()
    }

    /// Time a cold run with one worker per candidate would have taken:
    /// batches run one after another, each as long as its slowest member.
    pub fn estimated_cost(&self) -> f64 {
        let mut slowest: BTreeMap<usize, f64> = BTreeMap::new();
        for entry in self.entries.lock().iter() {
            let max = slowest.entry(entry.batch).or_insert(0.0);
            *max = max.max(entry.wall_time_secs);
        }
        slowest.values().sum()
    }
}

pub struct EvaluationAdapter {
    space: Arc<DirectiveSpace>,
    synthesizer: Arc<dyn Synthesize>,
    cache: Arc<ResultCache>,
    log: EvaluationLog,
}

impl EvaluationAdapter {
    pub fn new(
        space: Arc<DirectiveSpace>,
        synthesizer: Arc<dyn Synthesize>,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            space,
            synthesizer,
            cache,
            log: EvaluationLog::new(),
        }
    }

    pub fn space(&self) -> &Arc<DirectiveSpace> {
        &self.space
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn log(&self) -> &EvaluationLog {
        &self.log
    }

    pub fn evaluate(
        &self,
        config: &Configuration,
        batch: usize,
    ) -> Result<Evaluation, EvaluationError> {
        self.space.validate(config)?;

        if let Some(entry) = self.cache.entry(config) {
            debug!(config = %config, batch, "cache hit");
            let objectives = entry.metrics();
            self.log.append(LogEntry {
                batch,
                config: config.clone(),
                objectives,
                wall_time_secs: entry.synth_time,
                cached: true,
            });
            return Ok(Evaluation::new(config.clone(), objectives));
        }

        let started = Instant::now();
        let objectives = self.synthesizer.synthesize(config);
        let wall_time_secs = started.elapsed().as_secs_f64();

        let fresh = self.cache.insert(config, objectives, wall_time_secs)?;
        // A concurrent evaluation of the same key may have won the insert.
        let objectives = if fresh {
            objectives
        } else {
            self.cache.lookup(config).unwrap_or(objectives)
        };

        info!(
            config = %config,
            batch,
            latency_ms = objectives.latency,
            feasible = objectives.is_feasible(),
            wall_time_secs,
            "evaluated configuration"
        );
        self.log.append(LogEntry {
            batch,
            config: config.clone(),
            objectives,
            wall_time_secs,
            cached: false,
        });
        Ok(Evaluation::new(config.clone(), objectives))
    }
}
