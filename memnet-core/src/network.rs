//! The memory network: owning store for records and every structure
//! derived from them.
//!
//! ```text
//!            store(record)
//!                 │ validate (reject → no mutation)
//!                 ▼
//!   ┌──────────────────────────┐
//!   │ records: id → Entry      │◀── sole owner of Record values
//!   └──────────────────────────┘
//!        │ ids only     │ ids only
//!        ▼              ▼
//!   DimensionIndices  AssociationGraph
//!                 │
//!                 ▼
//!         capacity manager (evict lowest scores)
//! ```
//!
//! Writers (`store`, `remove`) take `&mut self`; readers (`query`, `get`,
//! `get_associated`, `statistics`) take `&self`. The only state a reader
//! mutates is per-record usage, held behind a per-record mutex, so a
//! `MemoryNetwork` behind an `RwLock` serves concurrent queries without
//! lost updates. See [`SharedMemoryNetwork`](crate::shared::SharedMemoryNetwork).

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::association::{AssociationGraph, AssociationStrategy, ExhaustiveScan};
use crate::config::NetworkConfig;
use crate::error::{Result, ValidationError};
use crate::eviction::{self, EvictionCandidate};
use crate::index::DimensionIndices;
use crate::metrics::NetworkCounters;
use crate::persistence::{NetworkSnapshot, SnapshotEdge, SnapshotRecord, SNAPSHOT_VERSION};
use crate::query::{Query, RankKey};
use crate::record::Record;
use crate::stats::NetworkStatistics;
use crate::types::RecordId;

/// Usage metadata, the only part of a stored record that changes.
#[derive(Debug, Clone, Copy, Default)]
struct Usage {
    retrieval_count: u32,
    last_accessed: Option<DateTime<Utc>>,
}

/// A stored record. `record.retrieval_count`, `record.last_accessed` and
/// `record.associations` are stale here; `usage` and the graph are
/// authoritative.
#[derive(Debug)]
struct Entry {
    record: Record,
    usage: Mutex<Usage>,
}

impl Entry {
    fn new(mut record: Record) -> Self {
        let usage = Usage {
            retrieval_count: record.retrieval_count,
            last_accessed: record.last_accessed,
        };
        record.associations.clear();
        Self {
            record,
            usage: Mutex::new(usage),
        }
    }
}

/// Capacity-bounded associative record store.
pub struct MemoryNetwork {
    config: NetworkConfig,
    records: HashMap<RecordId, Entry>,
    indices: DimensionIndices,
    graph: AssociationGraph,
    strategy: Box<dyn AssociationStrategy>,
    counters: NetworkCounters,
}

impl fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("records", &self.records.len())
            .field("edges", &self.graph.edge_count())
            .field("config", &self.config)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::build(NetworkConfig::default())
    }
}

impl MemoryNetwork {
    /// Create an empty store.
    ///
    /// # Errors
    /// Returns `MemnetError::Config` if the configuration is out of range.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create an empty store with default settings and the given capacity.
    ///
    /// # Errors
    /// Returns `MemnetError::Config` if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::new(NetworkConfig::with_capacity(capacity))
    }

    fn build(config: NetworkConfig) -> Self {
        Self {
            indices: DimensionIndices::new(&config.index),
            config,
            records: HashMap::new(),
            graph: AssociationGraph::new(),
            strategy: Box::new(ExhaustiveScan),
            counters: NetworkCounters::new(),
        }
    }

    /// Replace the association discovery strategy.
    ///
    /// Already-stored records are replayed into the new strategy.
    #[must_use]
    pub fn with_strategy(mut self, mut strategy: Box<dyn AssociationStrategy>) -> Self {
        for (id, entry) in &self.records {
            strategy.on_insert(*id, &entry.record);
        }
        self.strategy = strategy;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Maximum retained record count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `id` is stored.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    /// All stored ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Read-only view of the dimension indices.
    #[must_use]
    pub fn indices(&self) -> &DimensionIndices {
        &self.indices
    }

    /// Read-only view of the association graph.
    #[must_use]
    pub fn graph(&self) -> &AssociationGraph {
        &self.graph
    }

    /// Runtime counters.
    #[must_use]
    pub fn counters(&self) -> &NetworkCounters {
        &self.counters
    }

    /// Snapshot of one record without touching its usage counters.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.records.get(&id).map(|entry| self.materialize(id, entry))
    }

    fn materialize(&self, id: RecordId, entry: &Entry) -> Record {
        let usage = *entry.usage.lock();
        self.materialize_with(id, entry, usage)
    }

    fn materialize_with(&self, id: RecordId, entry: &Entry, usage: Usage) -> Record {
        let mut record = entry.record.clone();
        record.retrieval_count = usage.retrieval_count;
        record.last_accessed = usage.last_accessed;
        record.associations = self.graph.neighbors(id);
        record
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Validate, store, index and associate `record`, then enforce capacity.
    ///
    /// # Errors
    /// Returns the [`ValidationError`] for the first violated invariant; the
    /// store is left exactly as it was.
    pub fn store(&mut self, record: Record) -> std::result::Result<RecordId, ValidationError> {
        self.store_at(record, Utc::now())
    }

    /// [`store`](Self::store) with an explicit clock for the capacity manager.
    ///
    /// # Errors
    /// Returns the [`ValidationError`] for the first violated invariant.
    pub fn store_at(
        &mut self,
        record: Record,
        now: DateTime<Utc>,
    ) -> std::result::Result<RecordId, ValidationError> {
        if let Err(e) = record.validate() {
            NetworkCounters::add(&self.counters.records_rejected, 1);
            debug!(error = %e, "Rejected record");
            return Err(e);
        }
        if !record.associations.is_empty() {
            debug!(
                supplied = record.associations.len(),
                "Discarding producer-supplied associations"
            );
        }

        let id = RecordId::new();
        let entry = Entry::new(record);

        let peers = {
            let mut existing = self.records.iter().map(|(oid, e)| (*oid, &e.record));
            self.strategy.discover(
                &entry.record,
                &mut existing,
                &self.config.association,
                self.config.association_threshold,
            )
        };

        self.indices.index(id, &entry.record);
        for (peer, strength) in &peers {
            trace!(%id, %peer, strength, "Association created");
            self.graph.link(id, *peer, *strength);
        }
        self.strategy.on_insert(id, &entry.record);
        self.records.insert(id, entry);

        NetworkCounters::add(&self.counters.records_stored, 1);
        NetworkCounters::add(&self.counters.associations_created, peers.len() as u64);

        let evicted = self.enforce_capacity(now);
        debug!(
            %id,
            associations = peers.len(),
            evicted = evicted.len(),
            total = self.records.len(),
            "Stored record"
        );
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Remove `id` with all its index entries and edges.
    ///
    /// Returns the record as it was at removal time, or `None` if unknown.
    pub fn remove(&mut self, id: RecordId) -> Option<Record> {
        let snapshot = self.get(id)?;
        self.detach(id);
        NetworkCounters::add(&self.counters.records_removed, 1);
        debug!(%id, "Removed record");
        Some(snapshot)
    }

    /// Evict the lowest-scoring records until `len() <= capacity()`.
    ///
    /// Runs automatically after every insertion. Returns the evicted ids.
    pub fn enforce_capacity(&mut self, now: DateTime<Utc>) -> Vec<RecordId> {
        if self.records.len() <= self.config.capacity {
            return Vec::new();
        }
        let candidates: Vec<EvictionCandidate> = self
            .records
            .iter()
            .map(|(id, entry)| EvictionCandidate {
                id: *id,
                importance: entry.record.importance,
                timestamp: entry.record.timestamp,
                retrieval_count: entry.usage.lock().retrieval_count,
            })
            .collect();

        let victims =
            eviction::select_evictions(candidates, self.config.capacity, now, &self.config.eviction);
        for id in &victims {
            self.detach(*id);
            debug!(%id, "Evicted record");
        }
        NetworkCounters::add(&self.counters.records_evicted, victims.len() as u64);
        debug_assert!(self.records.len() <= self.config.capacity);
        victims
    }

    fn detach(&mut self, id: RecordId) -> Option<Entry> {
        let entry = self.records.remove(&id)?;
        self.indices.deindex(id, &entry.record);
        self.graph.unlink_all(id);
        self.strategy.on_remove(id);
        Some(entry)
    }

    // ------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------

    /// Run `query`, returning matches ranked by importance then retrieval
    /// count (both descending), then id.
    ///
    /// Every returned record has its `retrieval_count` incremented and
    /// `last_accessed` set; the returned snapshots include the increment.
    #[must_use]
    pub fn query(&self, query: &Query) -> Vec<(RecordId, Record)> {
        self.query_at(query, Utc::now())
    }

    /// [`query`](Self::query) with an explicit access time.
    #[must_use]
    pub fn query_at(&self, query: &Query, now: DateTime<Utc>) -> Vec<(RecordId, Record)> {
        let candidates = query.resolve(
            &self.indices,
            self.records.iter().map(|(id, e)| (*id, &e.record)),
        );

        let mut hits: Vec<(RankKey, &Entry)> = candidates
            .into_iter()
            .filter_map(|id| {
                let entry = self.records.get(&id);
                debug_assert!(entry.is_some(), "index references missing record {id}");
                entry.map(|e| {
                    let key = RankKey {
                        id,
                        importance: e.record.importance,
                        retrieval_count: e.usage.lock().retrieval_count,
                    };
                    (key, e)
                })
            })
            .collect();
        hits.sort_by(|a, b| a.0.rank_cmp(&b.0));

        let results: Vec<(RecordId, Record)> = hits
            .into_iter()
            .map(|(key, entry)| {
                let usage = {
                    let mut usage = entry.usage.lock();
                    usage.retrieval_count = usage.retrieval_count.saturating_add(1);
                    usage.last_accessed = Some(now);
                    *usage
                };
                (key.id, self.materialize_with(key.id, entry, usage))
            })
            .collect();

        NetworkCounters::add(&self.counters.queries_served, 1);
        NetworkCounters::add(&self.counters.records_returned, results.len() as u64);
        results
    }

    /// Peers of `id` with stored strength ≥ `threshold`, strongest first,
    /// at most `max_results`. Unknown ids yield an empty list.
    #[must_use]
    pub fn get_associated(
        &self,
        id: RecordId,
        threshold: f64,
        max_results: usize,
    ) -> Vec<(RecordId, f64)> {
        if !self.records.contains_key(&id) {
            return Vec::new();
        }
        self.graph.associated(id, threshold, max_results)
    }

    /// [`get_associated`](Self::get_associated) with the configured defaults.
    #[must_use]
    pub fn associated(&self, id: RecordId) -> Vec<(RecordId, f64)> {
        self.get_associated(
            id,
            self.config.default_strength_threshold,
            self.config.default_max_associated,
        )
    }

    /// Count, means, edge count and time span of the store.
    #[must_use]
    pub fn statistics(&self) -> NetworkStatistics {
        NetworkStatistics::collect(
            self.records.values().map(|e| {
                (
                    e.record.importance,
                    e.usage.lock().retrieval_count,
                    e.record.timestamp,
                )
            }),
            self.graph.edge_count(),
        )
    }

    /// Check that indices and graph reference only stored ids and that
    /// every edge is mirrored. O(n) over all buckets; intended for tests.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let indexed_ok = self
            .indices
            .ids()
            .iter()
            .all(|id| self.records.contains_key(id));
        let graph_ok = self.graph.edges().iter().all(|e| {
            self.records.contains_key(&e.a) && self.records.contains_key(&e.b)
        });
        indexed_ok && graph_ok && self.graph.is_symmetric()
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Capture every record (with usage and id) and every edge once.
    #[must_use]
    pub fn snapshot(&self) -> NetworkSnapshot {
        let mut records: Vec<SnapshotRecord> = self
            .records
            .iter()
            .map(|(id, entry)| SnapshotRecord {
                id: *id,
                record: self.materialize(*id, entry),
            })
            .collect();
        records.sort_by_key(|r| r.id);

        let edges = self
            .graph
            .edges()
            .into_iter()
            .map(|e| SnapshotEdge {
                a: e.a,
                b: e.b,
                strength: e.strength,
            })
            .collect();

        NetworkSnapshot {
            version: SNAPSHOT_VERSION,
            records,
            edges,
        }
    }

    /// Rebuild a store from a snapshot, preserving ids.
    ///
    /// Indices are rebuilt from the records; edges are taken from the
    /// snapshot rather than recomputed. Edges naming an unknown id are
    /// skipped. The capacity manager runs once at the end.
    ///
    /// # Errors
    /// Returns `MemnetError::Config` for an invalid config, or
    /// `MemnetError::Validation` if any record is invalid.
    pub fn restore(snapshot: NetworkSnapshot, config: NetworkConfig) -> Result<Self> {
        let mut network = Self::new(config)?;

        for SnapshotRecord { id, record } in snapshot.records {
            record.validate()?;
            if network.records.contains_key(&id) {
                warn!(%id, "Duplicate record id in snapshot; keeping the first");
                continue;
            }
            let entry = Entry::new(record);
            network.indices.index(id, &entry.record);
            network.strategy.on_insert(id, &entry.record);
            network.records.insert(id, entry);
        }

        for edge in snapshot.edges {
            if edge.a != edge.b
                && network.records.contains_key(&edge.a)
                && network.records.contains_key(&edge.b)
            {
                network.graph.link(edge.a, edge.b, edge.strength);
            } else {
                warn!(a = %edge.a, b = %edge.b, "Skipping snapshot edge with unknown endpoint");
            }
        }

        let evicted = network.enforce_capacity(Utc::now());
        debug!(
            records = network.records.len(),
            edges = network.graph.edge_count(),
            evicted = evicted.len(),
            "Restored memory network"
        );
        Ok(network)
    }
}
