//! Tool invocation script generation.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

pub const SOLUTION_NAME: &str = "solution1";

/// Inputs for one synthesis script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSpec {
    pub project: String,
    pub top_function: String,
    pub source_file: String,
    pub device: String,
    pub clock_period_ns: f64,
    /// When false, automatic partitioning and pipelining are switched off so
    /// only the inserted directives take effect.
    pub default_optimizations: bool,
}

impl ScriptSpec {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "open_project {}", self.project);
        let _ = writeln!(out, "set_top {}", self.top_function);
        let _ = writeln!(out, "add_files {}", self.source_file);
        let _ = writeln!(out, "open_solution \"{}\" -flow_target vivado", SOLUTION_NAME);
        let _ = writeln!(out, "set_part {{{}}}", self.device);
        let _ = writeln!(out, "create_clock -period {} -name default", self.clock_period_ns);
        if !self.default_optimizations {
            out.push_str("config_array_partition -complete_threshold 0 -throughput_driven off\n");
            out.push_str("config_compile -pipeline_loops 0\n");
        }
        out.push_str("csynth_design\n");
        out.push_str("export_design -format ip_catalog\n");
        out.push_str("exit\n");
        out
    }
}
