//! Directive search spaces for HLS kernels.
//!
//! - [`metadata`]: parse the kernel metadata file into action points
//! - [`space`]: per-action-point candidate directives and configurations
//! - [`placement`]: deterministic one-directive-per-point placement
//! - [`apply`]: insert chosen directives after their source markers

pub mod apply;
pub mod error;
pub mod metadata;
pub mod placement;
pub mod space;

pub use apply::{apply_all, apply_directives, AppliedSource};
pub use error::{DirectiveError, DirectiveResult};
pub use metadata::{ActionPoint, ActionPointKind, ArrayDimension, KernelMetadata, TripCount};
pub use placement::{place, LoopInfo, Placement, PlacementLimits, StructuralMetadata};
pub use space::{Configuration, DirectiveCandidateSet, DirectiveSpace, SpaceLimits};
