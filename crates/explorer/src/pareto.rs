//! Non-dominated filtering over the six minimized objectives.

use crate::adapter::Evaluation;
use std::collections::HashSet;

/// `a` dominates `b`: no worse in every objective and better in one.
pub fn dominates(a: &[f64; 6], b: &[f64; 6]) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b) {
        if x > y {
            return false;
        }
        if x < y {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Pareto-optimal subset of `evaluations`, in first-seen order.
///
/// Only feasible evaluations compete. When nothing is feasible, the ones
/// with the smallest total violation stand in for the feasible set.
/// Repeated configurations count once.
pub fn non_dominated(evaluations: &[Evaluation]) -> Vec<Evaluation> {
    let mut seen = HashSet::new();
    let unique: Vec<&Evaluation> = evaluations
        .iter()
        .filter(|eval| seen.insert(eval.config.clone()))
        .collect();

    let mut pool: Vec<&Evaluation> = unique
        .iter()
        .copied()
        .filter(|eval| eval.is_feasible())
        .collect();
    if pool.is_empty() {
        let least = unique
            .iter()
            .map(|eval| eval.violation())
            .fold(f64::INFINITY, f64::min);
        pool = unique
            .iter()
            .copied()
            .filter(|eval| eval.violation() == least)
            .collect();
    }

    let objectives: Vec<[f64; 6]> = pool.iter().map(|e| e.objectives.to_array()).collect();
    pool.iter()
        .enumerate()
        .filter(|(i, _)| {
            !objectives
                .iter()
                .enumerate()
                .any(|(j, other)| j != *i && dominates(other, &objectives[*i]))
        })
        .map(|(_, eval)| (*eval).clone())
        .collect()
}
