//! Synthesis of a single directive configuration with the external HLS tool.
//!
//! [`runner::SynthesisRunner`] applies the chosen directives to the kernel
//! source, writes the tool script, supervises the tool under a wall-clock
//! timeout and turns the report into a [`metrics::MetricVector`].

pub mod metrics;
pub mod report;
pub mod runner;
pub mod script;
pub mod supervisor;

pub use metrics::{MetricVector, OBJECTIVE_NAMES, UNDEFINED_LATENCY_MS};
pub use report::{parse_report, ReportError};
pub use runner::{RunnerOptions, Synthesize, SynthesisRunner};
pub use script::ScriptSpec;
pub use supervisor::{Supervision, ToolCommand, ToolProcess};
