//! Thread-safe handle to a [`MemoryNetwork`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::config::NetworkConfig;
use crate::error::{Result, ValidationError};
use crate::network::MemoryNetwork;
use crate::persistence::NetworkSnapshot;
use crate::query::Query;
use crate::record::Record;
use crate::stats::NetworkStatistics;
use crate::types::RecordId;

/// Cloneable, `Send + Sync` handle to one store.
///
/// Writers take the write lock for the whole insert, index, associate and
/// evict sequence, so readers never observe a half-evicted record. Queries
/// share the read lock; their usage increments are serialized per record.
#[derive(Debug, Clone, Default)]
pub struct SharedMemoryNetwork {
    inner: Arc<RwLock<MemoryNetwork>>,
}

impl SharedMemoryNetwork {
    /// Wrap an existing store.
    #[must_use]
    pub fn new(network: MemoryNetwork) -> Self {
        Self {
            inner: Arc::new(RwLock::new(network)),
        }
    }

    /// Create an empty store under `config`.
    ///
    /// # Errors
    /// Returns `MemnetError::Config` if the configuration is out of range.
    pub fn with_config(config: NetworkConfig) -> Result<Self> {
        MemoryNetwork::new(config).map(Self::new)
    }

    /// See [`MemoryNetwork::store`].
    ///
    /// # Errors
    /// Returns the [`ValidationError`] for the first violated invariant.
    pub fn store(&self, record: Record) -> std::result::Result<RecordId, ValidationError> {
        self.inner.write().store(record)
    }

    /// See [`MemoryNetwork::store_at`].
    ///
    /// # Errors
    /// Returns the [`ValidationError`] for the first violated invariant.
    pub fn store_at(
        &self,
        record: Record,
        now: DateTime<Utc>,
    ) -> std::result::Result<RecordId, ValidationError> {
        self.inner.write().store_at(record, now)
    }

    /// See [`MemoryNetwork::remove`].
    pub fn remove(&self, id: RecordId) -> Option<Record> {
        self.inner.write().remove(id)
    }

    /// Replace the whole store with one rebuilt from `snapshot`.
    ///
    /// On error the current store is left untouched.
    ///
    /// # Errors
    /// See [`MemoryNetwork::restore`].
    pub fn restore(&self, snapshot: NetworkSnapshot, config: NetworkConfig) -> Result<()> {
        let rebuilt = MemoryNetwork::restore(snapshot, config)?;
        *self.inner.write() = rebuilt;
        Ok(())
    }

    /// See [`MemoryNetwork::query`].
    #[must_use]
    pub fn query(&self, query: &Query) -> Vec<(RecordId, Record)> {
        self.inner.read().query(query)
    }

    /// See [`MemoryNetwork::query_at`].
    #[must_use]
    pub fn query_at(&self, query: &Query, now: DateTime<Utc>) -> Vec<(RecordId, Record)> {
        self.inner.read().query_at(query, now)
    }

    /// See [`MemoryNetwork::get`].
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.inner.read().get(id)
    }

    /// See [`MemoryNetwork::get_associated`].
    #[must_use]
    pub fn get_associated(
        &self,
        id: RecordId,
        threshold: f64,
        max_results: usize,
    ) -> Vec<(RecordId, f64)> {
        self.inner.read().get_associated(id, threshold, max_results)
    }

    /// See [`MemoryNetwork::statistics`].
    #[must_use]
    pub fn statistics(&self) -> NetworkStatistics {
        self.inner.read().statistics()
    }

    /// See [`MemoryNetwork::snapshot`].
    #[must_use]
    pub fn snapshot(&self) -> NetworkSnapshot {
        self.inner.read().snapshot()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Run `f` with shared access to the underlying store.
    pub fn read<R>(&self, f: impl FnOnce(&MemoryNetwork) -> R) -> R {
        f(&self.inner.read())
    }
}
