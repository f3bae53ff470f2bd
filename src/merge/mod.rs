//! Merging partial results from concurrent producers.

pub mod collector;

pub use collector::{MergeCollector, RowComparator};
