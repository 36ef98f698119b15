//! Search strategies driving the exploration.
//!
//! A strategy proposes batches of configurations and is told how they
//! scored. The session keeps asking until the strategy finishes or returns
//! an empty batch.

use crate::adapter::Evaluation;
use crate::pareto::non_dominated;
use hlsforge_directives::{Configuration, DirectiveSpace};
use std::collections::HashSet;
use tracing::debug;

pub trait SearchStrategy: Send {
    fn name(&self) -> &str;

    /// Next batch to evaluate. Empty means the strategy has nothing left.
    fn propose(&mut self, space: &DirectiveSpace) -> Vec<Configuration>;

    fn observe(&mut self, evaluations: &[Evaluation]);

    fn is_finished(&self) -> bool;

    /// Current non-dominated set over everything observed.
    fn front(&self) -> Vec<Evaluation>;
}

/// Seeded uniform sampling without repeats.
pub struct RandomSearch {
    batch_size: usize,
    max_batches: usize,
    rng: fastrand::Rng,
    proposed: HashSet<Configuration>,
    batches: usize,
    exhausted: bool,
    observed: Vec<Evaluation>,
}

impl RandomSearch {
    pub fn new(batch_size: usize, max_batches: usize, seed: u64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_batches,
            rng: fastrand::Rng::with_seed(seed),
            proposed: HashSet::new(),
            batches: 0,
            exhausted: false,
            observed: Vec::new(),
        }
    }

    fn sample(&mut self, upper: &[usize]) -> Configuration {
        Configuration::new(upper.iter().map(|&u| self.rng.usize(0..=u)).collect())
    }
}

impl SearchStrategy for RandomSearch {
    fn name(&self) -> &str {
        "random"
    }

    fn propose(&mut self, space: &DirectiveSpace) -> Vec<Configuration> {
        if self.is_finished() {
            return Vec::new();
        }

        let remaining = space
            .cardinality()
            .saturating_sub(self.proposed.len() as u128);
        let wanted = (self.batch_size as u128).min(remaining) as usize;
        let upper = space.upper_bounds();

        let mut batch = Vec::with_capacity(wanted);
        let mut attempts = 0usize;
        let max_attempts = wanted.saturating_mul(1024);
        while batch.len() < wanted && attempts < max_attempts {
            attempts += 1;
            let config = self.sample(&upper);
            if self.proposed.insert(config.clone()) {
                batch.push(config);
            }
        }

        if batch.is_empty() {
            self.exhausted = true;
        } else {
            self.batches += 1;
        }
        debug!(batch = self.batches, size = batch.len(), remaining = %remaining, "random proposals");
        batch
    }

    fn observe(&mut self, evaluations: &[Evaluation]) {
        self.observed.extend_from_slice(evaluations);
    }

    fn is_finished(&self) -> bool {
        self.exhausted || self.batches >= self.max_batches
    }

    fn front(&self) -> Vec<Evaluation> {
        non_dominated(&self.observed)
    }
}

/// Every configuration, in lexicographic order.
pub struct ExhaustiveSearch {
    batch_size: usize,
    cursor: Option<Vec<usize>>,
    started: bool,
    observed: Vec<Evaluation>,
}

impl ExhaustiveSearch {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            cursor: None,
            started: false,
            observed: Vec::new(),
        }
    }
}

/// Mixed-radix increment, last position fastest. `false` on wrap-around.
fn advance(digits: &mut [usize], upper: &[usize]) -> bool {
    for (digit, &max) in digits.iter_mut().zip(upper).rev() {
        if *digit < max {
            *digit += 1;
            return true;
        }
        *digit = 0;
    }
    false
}

impl SearchStrategy for ExhaustiveSearch {
    fn name(&self) -> &str {
        "exhaustive"
    }

    fn propose(&mut self, space: &DirectiveSpace) -> Vec<Configuration> {
        if !self.started {
            self.started = true;
            self.cursor = Some(space.lower_bounds());
        }
        let upper = space.upper_bounds();

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            let Some(cursor) = self.cursor.as_mut() else {
                break;
            };
            batch.push(Configuration::new(cursor.clone()));
            if !advance(cursor, &upper) {
                self.cursor = None;
            }
        }
        batch
    }

    fn observe(&mut self, evaluations: &[Evaluation]) {
        self.observed.extend_from_slice(evaluations);
    }

    fn is_finished(&self) -> bool {
        self.started && self.cursor.is_none()
    }

    fn front(&self) -> Vec<Evaluation> {
        non_dominated(&self.observed)
    }
}
