//! Durable, write-once cache of synthesis results keyed by configuration.

pub mod cache;

pub use cache::{CacheEntry, CacheError, ResultCache};
