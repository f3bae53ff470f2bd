//! In-process search engine surface: documents, boolean queries and sorts.

pub mod document;
pub mod query;
pub mod sort;

pub use document::{Document, PARTITION_FIELD};
pub use query::{KeyRangeQuery, Query};
pub use sort::{Sort, SortField};
