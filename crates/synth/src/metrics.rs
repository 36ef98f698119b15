//! Latency and utilization figures for one synthesized design.

use serde::{Deserialize, Serialize};

/// Latency reported when the tool ran but could not bound the latency.
pub const UNDEFINED_LATENCY_MS: f64 = 1_000_000.0;

/// Utilization value used by the failure sentinel; above any feasible bound.
pub const FAILED_UTILIZATION: f64 = 101.0;

pub const UTILIZATION_LIMIT: f64 = 100.0;

pub const OBJECTIVE_NAMES: [&str; 6] = [
    "latency",
    "bram_util",
    "dsp_util",
    "ff_util",
    "lut_util",
    "uram_util",
];

/// Latency in milliseconds plus five utilization percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricVector {
    pub latency: f64,
    pub util_bram: f64,
    pub util_dsp: f64,
    pub util_ff: f64,
    pub util_lut: f64,
    pub util_uram: f64,
}

impl MetricVector {
    /// `[0, 101, 101, 101, 101, 101]`: no usable synthesis result.
    pub const FAILED: MetricVector = MetricVector {
        latency: 0.0,
        util_bram: FAILED_UTILIZATION,
        util_dsp: FAILED_UTILIZATION,
        util_ff: FAILED_UTILIZATION,
        util_lut: FAILED_UTILIZATION,
        util_uram: FAILED_UTILIZATION,
    };

    pub fn from_array(values: [f64; 6]) -> Self {
        Self {
            latency: values[0],
            util_bram: values[1],
            util_dsp: values[2],
            util_ff: values[3],
            util_lut: values[4],
            util_uram: values[5],
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.latency,
            self.util_bram,
            self.util_dsp,
            self.util_ff,
            self.util_lut,
            self.util_uram,
        ]
    }

    pub fn utilizations(&self) -> [f64; 5] {
        [
            self.util_bram,
            self.util_dsp,
            self.util_ff,
            self.util_lut,
            self.util_uram,
        ]
    }

    /// `utilization - 100` per resource; satisfied when `<= 0`.
    pub fn constraints(&self) -> [f64; 5] {
        self.utilizations().map(|u| u - UTILIZATION_LIMIT)
    }

    pub fn is_feasible(&self) -> bool {
        self.utilizations().iter().all(|u| *u <= UTILIZATION_LIMIT)
    }

    pub fn is_failure(&self) -> bool {
        *self == Self::FAILED
    }

    pub fn has_undefined_latency(&self) -> bool {
        self.latency >= UNDEFINED_LATENCY_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_sentinel_is_never_feasible() {
        let failed = MetricVector::FAILED;
        assert_eq!(failed.to_array(), [0.0, 101.0, 101.0, 101.0, 101.0, 101.0]);
        assert!(!failed.is_feasible());
        assert!(failed.constraints().iter().all(|c| *c > 0.0));
        assert!(failed.is_failure());
    }

    #[test]
    fn constraints_are_offsets_from_full_utilization() {
        let metrics = MetricVector::from_array([1.5, 10.0, 100.0, 0.0, 55.0, 0.0]);
        assert_eq!(metrics.constraints(), [-90.0, 0.0, -100.0, -45.0, -100.0]);
        assert!(metrics.is_feasible());
        assert!(!metrics.has_undefined_latency());
    }
}
