//! Design-space exploration over HLS directive configurations.
//!
//! A [`strategy::SearchStrategy`] proposes configurations, the
//! [`adapter::EvaluationAdapter`] scores them through the result cache or a
//! fresh synthesis, and [`export::ParetoExporter`] writes out the final
//! non-dominated set.

pub mod adapter;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod export;
pub mod pareto;
pub mod session;
pub mod strategy;

pub use adapter::{Evaluation, EvaluationAdapter, EvaluationError, EvaluationLog, LogEntry};
pub use config::{ConfigError, ExplorerConfig, StrategyKind};
pub use export::{ExportSummary, FrontEntry, ParetoExporter};
pub use pareto::{dominates, non_dominated};
pub use session::{ExplorationOutcome, Explorer};
pub use strategy::{ExhaustiveSearch, RandomSearch, SearchStrategy};
