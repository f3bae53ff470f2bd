//! Ordered maintenance dispatch.
//!
//! - `router` -- deterministic blake3 routing of identifiers to buckets
//! - `dispatcher` -- per-identifier ordered queues with a drain barrier

pub mod dispatcher;
pub mod router;

pub use dispatcher::{Task, TaskDispatcher};
pub use router::{RouteHasher, Router};
