//! keyslice: composite-key range translation and ordered index maintenance
//! for an embedded search index.
//!
//! The row store orders rows inside a partition by a multi-component
//! clustering key. This crate reproduces that ordering on the search side:
//!
//! - `key` -- native values, the sortable key codec, and the key comparator
//! - `translator` -- key slices to boolean queries and sorts (columns or generic strategy)
//! - `dispatch` -- per-partition ordered maintenance queues with a drain barrier
//! - `merge` -- bounded sorted collection of partial results
//! - `index` -- a sharded in-memory index tying the above together

pub mod config;
pub mod dispatch;
pub mod error;
pub mod index;
pub mod key;
pub mod merge;
pub mod metrics;
pub mod resource;
pub mod schema;
pub mod search;
pub mod translator;

pub use config::{DispatcherConfig, IndexConfig};
pub use dispatch::TaskDispatcher;
pub use error::{DispatchError, IndexError, Result};
pub use index::{Row, SearchIndex, SearchRequest};
pub use key::{
    ClusteringOrder, CompositeKey, KeyComparator, KeyComponent, KeyType, NativeType, RangeBoundary, Value,
};
pub use merge::{MergeCollector, RowComparator};
pub use metrics::{IndexMetrics, MetricsSnapshot};
pub use schema::{IndexSchema, Mapper, MapperRegistry, MapperSpec, TableSchema};
pub use search::{Document, Query, Sort, SortField};
pub use translator::{RangeTranslator, StrategyKind};
