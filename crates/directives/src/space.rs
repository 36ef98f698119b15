//! Combinatorial directive search space.
//!
//! Every action point gets an ordered list of candidate directives; a
//! [`Configuration`] picks one entry per list. The list position is the gene
//! value seen by the search strategy.

use crate::error::{DirectiveError, DirectiveResult};
use crate::metadata::{ActionPoint, ActionPointKind, ArrayDimension, KernelMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Thresholds that shape the candidate lists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceLimits {
    /// Largest `unroll factor=` emitted for a loop.
    pub max_unroll_factor: u64,
    /// Loops with at most this many iterations also get a full unroll.
    pub full_unroll_limit: u64,
    /// Dimensions strictly smaller than this get a complete partition; it
    /// also caps block/cyclic partition factors.
    pub complete_partition_threshold: u64,
}

impl Default for SpaceLimits {
    fn default() -> Self {
        Self {
            max_unroll_factor: 64,
            full_unroll_limit: 64,
            complete_partition_threshold: 1024,
        }
    }
}

/// One choice per action point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(pub Vec<usize>);

impl Configuration {
    pub fn new(values: Vec<usize>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical key, e.g. `[0,3,1]`. Stable across processes.
    pub fn key(&self) -> String {
        let values: Vec<String> = self.0.iter().map(usize::to_string).collect();
        format!("[{}]", values.join(","))
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<Vec<usize>> for Configuration {
    fn from(values: Vec<usize>) -> Self {
        Self(values)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveCandidateSet {
    pub point: ActionPoint,
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveSpace {
    top_function: String,
    sets: Vec<DirectiveCandidateSet>,
}

impl DirectiveSpace {
    /// Build candidate lists for every action point of `metadata`.
    pub fn build(metadata: &KernelMetadata, limits: &SpaceLimits) -> DirectiveResult<Self> {
        let sets = metadata
            .action_points
            .iter()
            .map(|point| DirectiveCandidateSet {
                point: point.clone(),
                directives: candidates_for(point, limits),
            })
            .collect();
        Self::from_sets(metadata.top_function.clone(), sets)
    }

    /// Assemble a space from explicit candidate lists. Empty lists are rejected.
    pub fn from_sets(
        top_function: String,
        sets: Vec<DirectiveCandidateSet>,
    ) -> DirectiveResult<Self> {
        if let Some(empty) = sets.iter().find(|set| set.directives.is_empty()) {
            return Err(DirectiveError::EmptyCandidateSet {
                ordinal: empty.point.ordinal,
            });
        }
        for set in &sets {
            debug!(
                point = %set.point.label,
                candidates = set.directives.len(),
                "built candidate set"
            );
        }
        Ok(Self { top_function, sets })
    }

    pub fn top_function(&self) -> &str {
        &self.top_function
    }

    pub fn sets(&self) -> &[DirectiveCandidateSet] {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn domain_size(&self, index: usize) -> usize {
        self.sets[index].directives.len()
    }

    pub fn lower_bounds(&self) -> Vec<usize> {
        vec![0; self.sets.len()]
    }

    pub fn upper_bounds(&self) -> Vec<usize> {
        self.sets.iter().map(|set| set.directives.len() - 1).collect()
    }

    /// Number of distinct configurations, saturating at `u128::MAX`.
    pub fn cardinality(&self) -> u128 {
        self.sets
            .iter()
            .fold(1u128, |acc, set| acc.saturating_mul(set.directives.len() as u128))
    }

    pub fn validate(&self, config: &Configuration) -> DirectiveResult<()> {
        if config.len() != self.sets.len() {
            return Err(DirectiveError::ArityMismatch {
                expected: self.sets.len(),
                actual: config.len(),
            });
        }
        for (set, &value) in self.sets.iter().zip(config.values()) {
            if value >= set.directives.len() {
                return Err(DirectiveError::OutOfDomain {
                    ordinal: set.point.ordinal,
                    value,
                    upper: set.directives.len() - 1,
                });
            }
        }
        Ok(())
    }

    /// Map a configuration to its directive strings, one per action point.
    pub fn resolve(&self, config: &Configuration) -> DirectiveResult<Vec<&str>> {
        self.validate(config)?;
        Ok(self
            .sets
            .iter()
            .zip(config.values())
            .map(|(set, &value)| set.directives[value].as_str())
            .collect())
    }
}

fn candidates_for(point: &ActionPoint, limits: &SpaceLimits) -> Vec<String> {
    match &point.kind {
        ActionPointKind::Loop { trip_count } => {
            let mut out = vec![
                "#pragma HLS pipeline".to_string(),
                "#pragma HLS pipeline II=1".to_string(),
            ];
            if let Some(count) = trip_count.usable() {
                if count <= limits.full_unroll_limit {
                    out.push("#pragma HLS unroll".to_string());
                }
                let max_factor = limits.max_unroll_factor.min(halved_cap(count));
                out.extend(
                    doubling_factors(max_factor)
                        .map(|factor| format!("#pragma HLS unroll factor={}", factor)),
                );
            }
            out
        }
        ActionPointKind::Array { name, dimensions } => dimensions
            .iter()
            .flat_map(|dim| partition_candidates(name, dim, limits))
            .collect(),
    }
}

fn partition_candidates(name: &str, dim: &ArrayDimension, limits: &SpaceLimits) -> Vec<String> {
    let threshold = limits.complete_partition_threshold;
    let mut out = Vec::new();
    if dim.size < threshold {
        out.push(format!(
            "#pragma HLS array_partition variable={} complete dim={}",
            name, dim.dim
        ));
    }
    let max_factor = threshold.min(halved_cap(dim.size));
    for style in ["block", "cyclic"] {
        out.extend(doubling_factors(max_factor).map(|factor| {
            format!(
                "#pragma HLS array_partition variable={} {} factor={} dim={}",
                name, style, factor, dim.dim
            )
        }));
    }
    out
}

/// `n/2` for even `n`, `n/2 - 1` for odd `n`.
pub fn halved_cap(n: u64) -> u64 {
    if n % 2 == 0 {
        n / 2
    } else {
        (n / 2).saturating_sub(1)
    }
}

/// 2, 4, 8, ... up to and including `max`.
pub fn doubling_factors(max: u64) -> impl Iterator<Item = u64> {
    std::iter::successors(Some(2u64), |f| f.checked_mul(2)).take_while(move |&f| f <= max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn space(text: &str, limits: SpaceLimits) -> DirectiveSpace {
        DirectiveSpace::build(&KernelMetadata::parse(text).unwrap(), &limits).unwrap()
    }

    fn unroll_factors(directives: &[String]) -> Vec<u64> {
        directives
            .iter()
            .filter_map(|d| d.strip_prefix("#pragma HLS unroll factor="))
            .map(|f| f.parse().unwrap())
            .collect()
    }

    #[test]
    fn long_loop_gets_capped_unroll_factors() {
        let space = space("top\nL1,loop,100\n", SpaceLimits::default());
        let directives = &space.sets()[0].directives;
        assert_eq!(unroll_factors(directives), vec![2, 4, 8, 16, 32]);
        assert!(!directives.iter().any(|d| d == "#pragma HLS unroll"));
        assert_eq!(directives[0], "#pragma HLS pipeline");
        assert_eq!(directives[1], "#pragma HLS pipeline II=1");
    }

    #[test]
    fn short_loop_gets_full_unroll() {
        let space = space("top\nL1,loop,16\nL2,loop,7\n", SpaceLimits::default());
        let first = &space.sets()[0].directives;
        assert_eq!(first[2], "#pragma HLS unroll");
        assert_eq!(unroll_factors(first), vec![2, 4, 8]);

        let odd = &space.sets()[1].directives;
        assert_eq!(unroll_factors(odd), vec![2]);
    }

    #[test]
    fn very_long_loop_is_capped_by_max_factor() {
        let space = space("top\nL1,loop,4096\n", SpaceLimits::default());
        assert_eq!(
            unroll_factors(&space.sets()[0].directives),
            vec![2, 4, 8, 16, 32, 64]
        );
    }

    #[test]
    fn unknown_trip_count_is_pipeline_only() {
        let space = space("top\nL1,loop,?\nL2,loop,0\n", SpaceLimits::default());
        for set in space.sets() {
            assert_eq!(set.directives.len(), 2);
        }
    }

    #[test]
    fn array_at_threshold_has_no_complete_partition() {
        let space = space("top\nL1,array,buf,1,1024\n", SpaceLimits::default());
        let directives = &space.sets()[0].directives;
        assert!(!directives.iter().any(|d| d.contains("complete")));
        let cyclic: Vec<&String> = directives.iter().filter(|d| d.contains("cyclic")).collect();
        assert_eq!(cyclic.len(), 9); // 2..=512
        assert!(cyclic
            .last()
            .unwrap()
            .ends_with("cyclic factor=512 dim=1"));
        assert_eq!(directives.len(), 18);
    }

    #[test]
    fn small_array_dimensions_are_listed_in_order() {
        let space = space("top\nL1,array,a,1,8,2,6\n", SpaceLimits::default());
        assert_eq!(
            space.sets()[0].directives,
            vec![
                "#pragma HLS array_partition variable=a complete dim=1",
                "#pragma HLS array_partition variable=a block factor=2 dim=1",
                "#pragma HLS array_partition variable=a block factor=4 dim=1",
                "#pragma HLS array_partition variable=a cyclic factor=2 dim=1",
                "#pragma HLS array_partition variable=a cyclic factor=4 dim=1",
                "#pragma HLS array_partition variable=a complete dim=2",
                "#pragma HLS array_partition variable=a block factor=2 dim=2",
                "#pragma HLS array_partition variable=a cyclic factor=2 dim=2",
            ]
        );
    }

    #[test]
    fn lower_threshold_is_configuration() {
        let limits = SpaceLimits {
            complete_partition_threshold: 128,
            ..SpaceLimits::default()
        };
        let space = space("top\nL1,array,a,1,1000\n", limits);
        let directives = &space.sets()[0].directives;
        assert!(!directives.iter().any(|d| d.contains("complete")));
        assert!(directives.last().unwrap().ends_with("cyclic factor=128 dim=1"));
    }

    #[test]
    fn empty_candidate_set_is_rejected() {
        let limits = SpaceLimits {
            complete_partition_threshold: 1,
            ..SpaceLimits::default()
        };
        let meta = KernelMetadata::parse("top\nL1,array,a,1,2\n").unwrap();
        assert!(matches!(
            DirectiveSpace::build(&meta, &limits),
            Err(DirectiveError::EmptyCandidateSet { ordinal: 1 })
        ));
    }

    #[test]
    fn resolve_checks_domain() {
        let space = space("top\nL1,loop,4\nL2,loop,?\n", SpaceLimits::default());
        assert_eq!(space.upper_bounds(), vec![3, 1]);
        assert_eq!(space.lower_bounds(), vec![0, 0]);
        assert_eq!(space.cardinality(), 8);

        let picked = space.resolve(&Configuration::new(vec![3, 1])).unwrap();
        assert_eq!(picked, vec!["#pragma HLS unroll factor=2", "#pragma HLS pipeline II=1"]);

        assert!(matches!(
            space.resolve(&Configuration::new(vec![4, 0])),
            Err(DirectiveError::OutOfDomain { ordinal: 1, value: 4, upper: 3 })
        ));
        assert!(matches!(
            space.resolve(&Configuration::new(vec![0])),
            Err(DirectiveError::ArityMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn configuration_key_is_canonical() {
        assert_eq!(Configuration::new(vec![0, 3, 1]).key(), "[0,3,1]");
        assert_eq!(Configuration::new(vec![]).key(), "[]");
    }

    proptest! {
        #[test]
        fn bounds_cover_exactly_the_candidate_sets(
            trips in proptest::collection::vec(1u64..5000, 1..6),
            sizes in proptest::collection::vec(1u64..5000, 1..4),
        ) {
            let mut text = String::from("top\n");
            for (i, t) in trips.iter().enumerate() {
                text.push_str(&format!("L{},loop,{}\n", i + 1, t));
            }
            for (j, s) in sizes.iter().enumerate() {
                text.push_str(&format!("L{},array,arr{},1,{}\n", trips.len() + j + 1, j, s));
            }
            let space = space(&text, SpaceLimits::default());
            let upper = space.upper_bounds();
            for (i, &u) in upper.iter().enumerate() {
                prop_assert_eq!(u + 1, space.domain_size(i));
            }
            prop_assert!(space.resolve(&Configuration::new(upper.clone())).is_ok());
            let mut over = upper.clone();
            over[0] += 1;
            prop_assert!(space.resolve(&Configuration::new(over)).is_err());
        }
    }
}
