//! Sharded in-memory secondary index.
//!
//! `SearchIndex` wires the pieces together:
//!
//! ```text
//! upsert / delete ──> TaskDispatcher (ordered per partition) ──> shard[route(partition)]
//! commit / truncate ──> submit_sync barrier
//! search ──> RangeTranslator ──> Query ──> rayon fan-out over shards ──> MergeCollector
//! ```
//!
//! Maintenance is asynchronous: a write is visible to searches once its
//! dispatcher task has run, and all writes submitted before a `commit()`
//! are visible once `commit()` returns.

pub mod row;
pub mod shard;

pub use row::{Row, SearchRequest, StoredRow};
pub use shard::IndexShard;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use rayon::prelude::*;

use crate::config::IndexConfig;
use crate::dispatch::{Router, TaskDispatcher};
use crate::error::{IndexError, Result};
use crate::key::{CompositeKey, Value};
use crate::merge::{MergeCollector, RowComparator};
use crate::metrics::{IndexMetrics, MetricsSnapshot};
use crate::schema::{IndexSchema, MapperRegistry, TableSchema};
use crate::search::{Document, Query, Sort, SortField, PARTITION_FIELD};
use crate::translator::RangeTranslator;

type Shards = Arc<Vec<RwLock<IndexShard>>>;

pub struct SearchIndex {
    table: TableSchema,
    schema: IndexSchema,
    translator: RangeTranslator,
    /// Translator sort with the partition as the final tiebreak.
    sort: Arc<Sort>,
    router: Router,
    shards: Shards,
    dispatcher: TaskDispatcher,
    metrics: Arc<IndexMetrics>,
}

impl SearchIndex {
    // -- Constructors ---------------------------------------------------------

    /// Open an empty index over `table`.
    ///
    /// Resolves the configured column mappers through `registry`, selects
    /// the range translation strategy, and starts the maintenance workers.
    pub fn open(config: &IndexConfig, table: TableSchema, registry: &MapperRegistry) -> Result<Self> {
        config.validate()?;
        let schema = IndexSchema::from_specs(&config.columns, &table, registry)?;
        let translator = RangeTranslator::for_schema(Arc::clone(table.key_type()), &schema);
        let sort = Arc::new(translator.sort().then(SortField::field(PARTITION_FIELD, false)));

        let metrics = Arc::new(IndexMetrics::new());
        let dispatcher = TaskDispatcher::with_metrics(&config.dispatcher, Arc::clone(&metrics))?;
        let shards: Shards = Arc::new(
            (0..config.shard_count)
                .map(|_| RwLock::new(IndexShard::new()))
                .collect(),
        );

        tracing::info!(
            table = table.name(),
            strategy = %translator.kind(),
            shards = config.shard_count,
            workers = config.dispatcher.worker_count,
            "search index opened"
        );

        Ok(Self {
            table,
            schema,
            translator,
            sort,
            router: Router::new(config.shard_count),
            shards,
            dispatcher,
            metrics,
        })
    }

    // -- Accessors ------------------------------------------------------------

    pub fn table(&self) -> &TableSchema {
        &self.table
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub fn translator(&self) -> &RangeTranslator {
        &self.translator
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Rows currently visible to searches.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // -- Maintenance ----------------------------------------------------------

    /// Index `row`, replacing any row with the same partition and key.
    ///
    /// The row is validated and its document built on the calling thread;
    /// only the shard write is deferred to the dispatcher.
    pub fn upsert(&self, row: Row) -> Result<()> {
        let encoded_key = self.table.key_type().encode(&row.key)?;
        let document = self.document_for(&row)?;
        let shard = self.router.bucket_for(row.partition.as_str());
        let partition = row.partition.clone();

        let shards = Arc::clone(&self.shards);
        let metrics = Arc::clone(&self.metrics);
        self.dispatcher.submit_async(partition.as_str(), move || {
            let stored = StoredRow { row, document };
            shards[shard]
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .upsert(encoded_key, stored);
            metrics.record_indexed(1);
        })?;
        Ok(())
    }

    /// Remove the row at `key` in `partition`, if any.
    pub fn delete_row(&self, partition: &str, key: &CompositeKey) -> Result<()> {
        let encoded_key = self.table.key_type().encode(key)?;
        let shard = self.router.bucket_for(partition);
        let owned = partition.to_string();

        let shards = Arc::clone(&self.shards);
        let metrics = Arc::clone(&self.metrics);
        self.dispatcher.submit_async(partition, move || {
            let removed = shards[shard]
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .delete(&owned, &encoded_key);
            if removed {
                metrics.record_deleted(1);
            }
        })?;
        Ok(())
    }

    /// Remove every row of `partition`.
    pub fn delete_partition(&self, partition: &str) -> Result<()> {
        let shard = self.router.bucket_for(partition);
        let owned = partition.to_string();

        let shards = Arc::clone(&self.shards);
        let metrics = Arc::clone(&self.metrics);
        self.dispatcher.submit_async(partition, move || {
            let removed = shards[shard]
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .delete_partition(&owned);
            metrics.record_deleted(removed as u64);
            metrics.record_partition_deleted();
            tracing::debug!(partition = %owned, removed, "partition deleted");
        })?;
        Ok(())
    }

    /// Wait until every previously submitted write is visible.
    pub fn commit(&self) -> Result<()> {
        self.dispatcher.submit_sync(|| ())?;
        Ok(())
    }

    /// Remove every row once pending writes have drained. Returns the
    /// number of rows removed.
    pub fn truncate(&self) -> Result<usize> {
        let shards = &self.shards;
        let removed = self.dispatcher.submit_sync(|| {
            shards
                .iter()
                .map(|s| s.write().unwrap_or_else(PoisonError::into_inner).clear())
                .sum::<usize>()
        })?;
        self.metrics.record_deleted(removed as u64);
        tracing::info!(table = self.table.name(), removed, "index truncated");
        Ok(removed)
    }

    /// Stop the maintenance workers after they finish queued writes.
    ///
    /// Later writes fail with a dispatch error; searches keep working.
    pub fn close(&self) {
        self.dispatcher.shutdown();
        tracing::info!(table = self.table.name(), "search index closed");
    }

    // -- Search ---------------------------------------------------------------

    /// Rows matching `request`, in clustering order, at most `limit`.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<Row>> {
        let started = Instant::now();
        let query = self.query_for(request)?;

        let comparator: RowComparator<StoredRow> = {
            let sort = Arc::clone(&self.sort);
            Arc::new(move |a: &StoredRow, b: &StoredRow| sort.compare(&a.document, &b.document))
        };
        let collector = MergeCollector::new(request.limit, Some(comparator));

        match &request.partition {
            Some(partition) => {
                let shard = self.router.bucket_for(partition.as_str());
                collector.add_all(self.search_shard(shard, &query, request.limit));
            }
            None => {
                (0..self.shards.len()).into_par_iter().for_each(|shard| {
                    collector.add_all(self.search_shard(shard, &query, request.limit));
                });
            }
        }

        collector.merge();
        let rows: Vec<Row> = collector.into_rows().into_iter().map(|s| s.row).collect();
        self.metrics
            .record_search(started.elapsed().as_micros() as u64, rows.len() as u64);
        Ok(rows)
    }

    fn search_shard(&self, shard: usize, query: &Query, limit: Option<usize>) -> Vec<StoredRow> {
        self.shards[shard]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .search(query, &self.sort, limit)
    }

    fn query_for(&self, request: &SearchRequest) -> Result<Query> {
        let mut clauses = Vec::with_capacity(request.filters.len() + 2);
        if let Some(partition) = &request.partition {
            clauses.push(Query::term(PARTITION_FIELD, Value::from(partition.as_str())));
        }
        if let Some(range) = self
            .translator
            .query(request.start.as_ref(), request.stop.as_ref())?
        {
            clauses.push(range);
        }
        for (column, value) in &request.filters {
            clauses.push(Query::term(column.clone(), self.schema.base(column, value)?));
        }
        Ok(if clauses.is_empty() {
            Query::MatchAll
        } else {
            Query::and(clauses)
        })
    }

    /// Build the indexed document for `row`.
    ///
    /// Key components get their translator fields. Mapped columns, key
    /// components included, also get their own base-value field. Unmapped
    /// regular columns are stored but not searchable.
    fn document_for(&self, row: &Row) -> Result<Document> {
        let mut document = Document::new().with_field(PARTITION_FIELD, Value::from(row.partition.as_str()));
        self.translator.add_fields(&mut document, &row.key)?;

        for (component, value) in self.table.key_type().components().iter().zip(row.key.values()) {
            if document.get(&component.name).is_none() && self.schema.mapping(&component.name).is_some() {
                document.insert(component.name.clone(), self.schema.base(&component.name, value)?);
            }
        }

        for (column, value) in &row.columns {
            let ty = match self.table.column_type(column) {
                Some(ty) if self.table.key_type().position(column).is_none() => ty,
                _ => {
                    return Err(IndexError::Schema(format!(
                        "'{}' is not a regular column of table '{}'",
                        column,
                        self.table.name()
                    )))
                }
            };
            if !value.conforms_to(ty) {
                return Err(IndexError::Schema(format!(
                    "value {} does not fit column '{}' of type {}",
                    value, column, ty
                )));
            }
            if self.schema.mapping(column).is_some() {
                document.insert(column.clone(), self.schema.base(column, value)?);
            }
        }
        Ok(document)
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("table", &self.table.name())
            .field("strategy", &self.translator.kind())
            .field("shards", &self.shards.len())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
