//! Bounded sorted merge collector.
//!
//! Concurrent producers `add` rows under a single mutex; the append is the
//! whole critical section. A single terminal `merge()` stable-sorts by the
//! optional comparator and truncates to the optional limit.
//!
//! `merge()` is never implicit: `size()` and `rows()` report whatever has
//! been accumulated so far, sorted or not.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Row ordering used by `merge()`.
pub type RowComparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

pub struct MergeCollector<T> {
    rows: Mutex<Vec<T>>,
    limit: Option<usize>,
    comparator: Option<RowComparator<T>>,
}

impl<T> MergeCollector<T> {
    // -- Constructors ---------------------------------------------------------

    pub fn new(limit: Option<usize>, comparator: Option<RowComparator<T>>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            limit,
            comparator,
        }
    }

    /// Pre-size the row buffer for `capacity` rows.
    pub fn with_capacity(
        capacity: usize,
        limit: Option<usize>,
        comparator: Option<RowComparator<T>>,
    ) -> Self {
        Self {
            rows: Mutex::new(Vec::with_capacity(capacity)),
            limit,
            comparator,
        }
    }

    /// Unsorted, unbounded collector.
    pub fn unbounded() -> Self {
        Self::new(None, None)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Producers ------------------------------------------------------------

    pub fn add(&self, row: T) {
        self.lock().push(row);
    }

    /// Append a batch atomically: rows from one call stay contiguous.
    pub fn add_all<I: IntoIterator<Item = T>>(&self, rows: I) {
        let batch: Vec<T> = rows.into_iter().collect();
        if batch.is_empty() {
            return;
        }
        self.lock().extend(batch);
    }

    // -- Consolidation --------------------------------------------------------

    /// Sort by the comparator (stable) and truncate to the limit.
    ///
    /// Without a comparator rows keep lock-acquisition order. Calling it
    /// again is harmless: sorted input stays sorted, and a truncated buffer
    /// is already within the limit.
    pub fn merge(&self) {
        let mut rows = self.lock();
        if let Some(cmp) = &self.comparator {
            rows.sort_by(|a, b| cmp(a, b));
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn has_comparator(&self) -> bool {
        self.comparator.is_some()
    }

    /// Copy of the accumulated rows.
    pub fn rows(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.lock().clone()
    }

    /// Consume the collector, returning the accumulated rows.
    pub fn into_rows(self) -> Vec<T> {
        self.rows.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for MergeCollector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeCollector")
            .field("size", &self.size())
            .field("limit", &self.limit)
            .field("sorted", &self.comparator.is_some())
            .finish()
    }
}
