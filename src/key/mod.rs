//! Composite key model: native values, the sortable codec, key types,
//! range boundaries and the native-order comparator.

pub mod codec;
pub mod comparator;
pub mod composite;
pub mod value;

pub use codec::{SortableCodec, ValueCodec};
pub use comparator::KeyComparator;
pub use composite::{ClusteringOrder, CompositeKey, KeyComponent, KeyType, RangeBoundary};
pub use value::{NativeType, Value};
