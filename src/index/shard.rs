//! One in-memory index shard.
//!
//! Rows are keyed by `(partition, encoded clustering key)`. Every row of a
//! partition lives in the same shard, chosen by the partition's route hash.

use std::collections::HashMap;

use crate::index::row::StoredRow;
use crate::search::{Query, Sort};

type RowId = (String, Vec<u8>);

#[derive(Debug, Default)]
pub struct IndexShard {
    rows: HashMap<RowId, StoredRow>,
}

impl IndexShard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns true if a row was replaced.
    pub fn upsert(&mut self, encoded_key: Vec<u8>, stored: StoredRow) -> bool {
        let id = (stored.row.partition.clone(), encoded_key);
        self.rows.insert(id, stored).is_some()
    }

    pub fn delete(&mut self, partition: &str, encoded_key: &[u8]) -> bool {
        self.rows
            .remove(&(partition.to_string(), encoded_key.to_vec()))
            .is_some()
    }

    /// Remove every row of `partition`. Returns the number removed.
    pub fn delete_partition(&mut self, partition: &str) -> usize {
        let before = self.rows.len();
        self.rows.retain(|(p, _), _| p != partition);
        before - self.rows.len()
    }

    /// Remove everything. Returns the number removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.rows.len();
        self.rows.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Matching rows in `sort` order, at most `limit` of them.
    pub fn search(&self, query: &Query, sort: &Sort, limit: Option<usize>) -> Vec<StoredRow> {
        let mut hits: Vec<StoredRow> = self
            .rows
            .values()
            .filter(|stored| query.matches(&stored.document))
            .cloned()
            .collect();
        for hit in &hits {
            if let Some((field, e)) = sort.corrupt_key(&hit.document) {
                tracing::warn!(
                    partition = %hit.row.partition,
                    field = %field,
                    "corrupt clustering key ordered last: {}",
                    e
                );
            }
        }
        hits.sort_by(|a, b| sort.compare(&a.document, &b.document));
        if let Some(limit) = limit {
            hits.truncate(limit);
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::row::Row;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use crate::key::{KeyComparator, KeyComponent, KeyType, NativeType, Value};
    use crate::search::{Document, SortField, PARTITION_FIELD};

    /// Counts WARN events emitted while installed.
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn stored(partition: &str, k: i32) -> (Vec<u8>, StoredRow) {
        let row = Row::new(partition, vec![Value::Int(k)]);
        let document = Document::new()
            .with_field(PARTITION_FIELD, Value::from(partition))
            .with_field("k", Value::Int(k));
        (vec![k as u8], StoredRow { row, document })
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let mut shard = IndexShard::new();
        let (key, row) = stored("p", 1);
        assert!(!shard.upsert(key.clone(), row.clone()));
        assert!(shard.upsert(key, row));
        assert_eq!(shard.len(), 1);
    }

    #[test]
    fn test_delete_and_delete_partition() {
        let mut shard = IndexShard::new();
        for k in 0..5 {
            let (key, row) = stored("p", k);
            shard.upsert(key, row);
            let (key, row) = stored("q", k);
            shard.upsert(key, row);
        }
        assert!(shard.delete("p", &[3]));
        assert!(!shard.delete("p", &[3]));
        assert_eq!(shard.delete_partition("p"), 4);
        assert_eq!(shard.len(), 5);
        assert_eq!(shard.clear(), 5);
        assert!(shard.is_empty());
    }

    #[test]
    fn test_search_sorts_and_limits() {
        let mut shard = IndexShard::new();
        for k in [4, 1, 3, 0, 2] {
            let (key, row) = stored("p", k);
            shard.upsert(key, row);
        }
        let query = Query::lower_bound("k", Value::Int(1), true);
        let sort = Sort::new(vec![SortField::field("k", true)]);
        let hits = shard.search(&query, &sort, Some(2));
        let keys: Vec<_> = hits.iter().map(|h| h.row.key.values()[0].clone()).collect();
        assert_eq!(keys, vec![Value::Int(4), Value::Int(3)]);
    }

    #[test]
    fn test_corrupt_key_reported_once_per_row() {
        let kt = Arc::new(KeyType::new(vec![KeyComponent::new("k", NativeType::Int)]));
        let sort = Sort::new(vec![SortField::Key {
            field: "_key".to_string(),
            comparator: KeyComparator::new(Arc::clone(&kt)),
            reverse: false,
        }]);

        let mut shard = IndexShard::new();
        for k in 0..64 {
            let bytes = kt.encode(&vec![Value::Int(k)].into()).unwrap();
            let row = Row::new("p", vec![Value::Int(k)]);
            let document = Document::new().with_field("_key", Value::Blob(bytes.clone()));
            shard.upsert(bytes, StoredRow { row, document });
        }
        let corrupt = StoredRow {
            row: Row::new("p", vec![Value::Int(-1)]),
            document: Document::new().with_field("_key", Value::Blob(vec![0xee])),
        };
        shard.upsert(vec![0xee], corrupt.clone());

        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));
        let hits = tracing::subscriber::with_default(subscriber, || shard.search(&Query::MatchAll, &sort, None));

        assert_eq!(hits.len(), 65);
        assert_eq!(hits[64], corrupt);
        assert_eq!(hits[0].row.key.values()[0], Value::Int(0));
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }
}
