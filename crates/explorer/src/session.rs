//! Exploration session: strategy in, Pareto front out.

use crate::adapter::{Evaluation, EvaluationAdapter};
use crate::strategy::SearchStrategy;
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationOutcome {
    pub strategy: String,
    pub front: Vec<Evaluation>,
    pub evaluations: usize,
    pub cache_hits: usize,
    pub batches: usize,
    /// Actual wall-clock duration of the run.
    pub elapsed_secs: f64,
    /// Duration of the same run with an empty cache.
    pub estimated_cost_secs: f64,
}

pub struct Explorer {
    adapter: EvaluationAdapter,
    pool: rayon::ThreadPool,
}

impl Explorer {
    pub fn new(adapter: EvaluationAdapter, threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("hlsforge-eval-{}", i))
            .build()
            .context("building evaluation thread pool")?;
        Ok(Self { adapter, pool })
    }

    pub fn adapter(&self) -> &EvaluationAdapter {
        &self.adapter
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluate one batch on the pool. Results keep the proposal order.
    fn evaluate_batch(
        &self,
        batch: &[hlsforge_directives::Configuration],
        index: usize,
    ) -> Result<Vec<Evaluation>> {
        let results: Vec<_> = self.pool.install(|| {
            batch
                .par_iter()
                .map(|config| self.adapter.evaluate(config, index))
                .collect()
        });
        results
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("evaluating batch {}", index))
    }

    pub fn run(&self, strategy: &mut dyn SearchStrategy) -> Result<ExplorationOutcome> {
        let started = Instant::now();
        let space = self.adapter.space().clone();
        info!(
            strategy = strategy.name(),
            points = space.len(),
            cardinality = %space.cardinality(),
            threads = self.threads(),
            "starting exploration"
        );

        let mut batches = 0usize;
        while !strategy.is_finished() {
            let proposals = strategy.propose(&space);
            if proposals.is_empty() {
                break;
            }
            let evaluations = self.evaluate_batch(&proposals, batches)?;
            let feasible = evaluations.iter().filter(|e| e.is_feasible()).count();
            strategy.observe(&evaluations);
            info!(
                batch = batches,
                size = evaluations.len(),
                feasible,
                "batch complete"
            );
            batches += 1;
        }

        let log = self.adapter.log();
        let outcome = ExplorationOutcome {
            strategy: strategy.name().to_string(),
            front: strategy.front(),
            evaluations: log.len(),
            cache_hits: log.cache_hits(),
            batches,
            elapsed_secs: started.elapsed().as_secs_f64(),
            estimated_cost_secs: log.estimated_cost(),
        };
        info!(
            front = outcome.front.len(),
            evaluations = outcome.evaluations,
            cache_hits = outcome.cache_hits,
            elapsed_secs = outcome.elapsed_secs,
            estimated_cost_secs = outcome.estimated_cost_secs,
            "exploration finished"
        );
        Ok(outcome)
    }
}
