//! Deterministic directive placement from the loop-nesting structure.
//!
//! Unlike [`crate::space::DirectiveSpace`], this yields at most one directive
//! per action point. Loops are unrolled bottom-up when their whole subtree is
//! small enough, pipelined when they are innermost or sit directly above
//! unrolled loops, and arrays are partitioned by element count.

use crate::error::{DirectiveError, DirectiveResult};
use crate::metadata::{ActionPoint, ActionPointKind, KernelMetadata};
use crate::space::{doubling_factors, halved_cap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementLimits {
    pub unroll_iteration_limit: u64,
    pub array_partition_limit: u64,
}

impl Default for PlacementLimits {
    fn default() -> Self {
        Self {
            unroll_iteration_limit: 16,
            array_partition_limit: 4096,
        }
    }
}

/// Front-end description of one loop, keyed by its action point id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoopInfo {
    pub innermost: bool,
    pub outermost: bool,
    /// Actual iteration count; non-positive when unknown.
    pub loop_lim_actual: i64,
    #[serde(default)]
    pub subloops: Vec<String>,
    #[serde(rename = "UID")]
    pub uid: String,
}

/// Loop nest and array shapes, as emitted by the source analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralMetadata {
    pub loops: BTreeMap<String, LoopInfo>,
    /// Array name to `dimension -> size`.
    #[serde(default)]
    pub arrays: BTreeMap<String, BTreeMap<String, u64>>,
}

impl StructuralMetadata {
    pub fn load(path: &Path) -> DirectiveResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| DirectiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> DirectiveResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// One optional directive per action point, in action point order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub directives: Vec<Option<String>>,
}

impl Placement {
    pub fn as_slice(&self) -> Vec<Option<&str>> {
        self.directives.iter().map(|d| d.as_deref()).collect()
    }

    pub fn placed(&self) -> usize {
        self.directives.iter().filter(|d| d.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopDecision {
    Unroll,
    Pipeline,
}

pub fn place(
    metadata: &KernelMetadata,
    structure: &StructuralMetadata,
    limits: &PlacementLimits,
) -> Placement {
    let by_uid: HashMap<&str, &str> = structure
        .loops
        .iter()
        .map(|(id, info)| (info.uid.as_str(), id.as_str()))
        .collect();

    let mut unrolled = HashSet::new();
    for (id, info) in &structure.loops {
        if info.outermost {
            mark_unrollable(id, structure, &by_uid, limits, &mut unrolled);
        }
    }

    let mut decisions: HashMap<&str, LoopDecision> = HashMap::new();
    for (id, info) in &structure.loops {
        if unrolled.contains(id.as_str()) {
            decisions.insert(id, LoopDecision::Unroll);
            continue;
        }
        let subloops_unrolled = info
            .subloops
            .iter()
            .filter_map(|uid| by_uid.get(uid.as_str()))
            .all(|sub| unrolled.contains(*sub));
        if info.innermost || subloops_unrolled {
            decisions.insert(id, LoopDecision::Pipeline);
        }
    }

    let directives = metadata
        .action_points
        .iter()
        .map(|point| match &point.kind {
            ActionPointKind::Loop { .. } => {
                decisions
                    .get(point.label.as_str())
                    .map(|decision| match decision {
                        LoopDecision::Unroll => "#pragma HLS unroll".to_string(),
                        LoopDecision::Pipeline => "#pragma HLS pipeline".to_string(),
                    })
            }
            ActionPointKind::Array { name, .. } => {
                Some(array_directive(name, &array_shape(point, structure), limits))
            }
        })
        .collect::<Vec<_>>();

    debug!(
        points = directives.len(),
        placed = directives.iter().filter(|d| d.is_some()).count(),
        "computed directive placement"
    );

    Placement { directives }
}

/// Returns whether `id` (and therefore its whole subtree) can be fully unrolled.
fn mark_unrollable<'a>(
    id: &'a str,
    structure: &'a StructuralMetadata,
    by_uid: &HashMap<&str, &'a str>,
    limits: &PlacementLimits,
    unrolled: &mut HashSet<&'a str>,
) -> bool {
    let Some(info) = structure.loops.get(id) else {
        return false;
    };
    let within_limit =
        info.loop_lim_actual > 0 && info.loop_lim_actual as u64 <= limits.unroll_iteration_limit;

    let eligible = if info.innermost {
        within_limit
    } else {
        // Visit every subloop so that deeper nests are marked too.
        let mut all_subloops = true;
        for uid in &info.subloops {
            let Some(&sub) = by_uid.get(uid.as_str()) else {
                continue;
            };
            if !mark_unrollable(sub, structure, by_uid, limits, unrolled) {
                all_subloops = false;
            }
        }
        all_subloops && within_limit
    };

    if eligible {
        unrolled.insert(id);
    }
    eligible
}

fn array_shape(point: &ActionPoint, structure: &StructuralMetadata) -> Vec<u64> {
    let ActionPointKind::Array { name, dimensions } = &point.kind else {
        return Vec::new();
    };
    match structure.arrays.get(name) {
        Some(dims) => {
            let mut sized: Vec<(u64, u64)> = dims
                .iter()
                .map(|(dim, size)| (dim.parse().unwrap_or(u64::MAX), *size))
                .collect();
            sized.sort();
            sized.into_iter().map(|(_, size)| size).collect()
        }
        None => dimensions.iter().map(|d| d.size).collect(),
    }
}

fn array_directive(name: &str, shape: &[u64], limits: &PlacementLimits) -> String {
    let total = shape
        .iter()
        .fold(1u64, |acc, size| acc.saturating_mul(*size));
    if total < limits.array_partition_limit {
        return format!("#pragma HLS array_partition variable={} complete", name);
    }
    let first = shape.first().copied().unwrap_or(0);
    let factor = doubling_factors(limits.array_partition_limit.min(halved_cap(first)))
        .last()
        .unwrap_or(2);
    format!(
        "#pragma HLS array_partition variable={} cyclic factor={} dim=1",
        name, factor
    )
}
