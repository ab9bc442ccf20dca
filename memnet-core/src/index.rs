//! Dimension indices: context, temporal, emotional, and tag lookups.
//!
//! Each index maps a derived dimension value to the set of record ids that
//! carry it. `index` and `deindex` touch exactly the same buckets for a
//! given record, so removing a record leaves no id behind.
//!
//! ```text
//! context   ("location", "office")  → {a, c}
//! temporal  bucket 475_131          → {a, b}      (hour since epoch)
//! emotional step 6                  → {a}         (valence 0.6)
//! tag       "work"                  → {a, b, c}
//! ```
//!
//! Temporal and emotional keys live in ordered maps so range filters walk
//! only the populated buckets inside the interval.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::config::IndexConfig;
use crate::record::Record;
use crate::types::RecordId;

/// Set of record ids held by a single bucket.
pub type IdSet = HashSet<RecordId>;

/// The four dimension indices of a store.
#[derive(Debug, Clone)]
pub struct DimensionIndices {
    context: HashMap<(String, String), IdSet>,
    temporal: BTreeMap<i64, IdSet>,
    emotional: BTreeMap<i64, IdSet>,
    tags: HashMap<String, IdSet>,
    time_bucket_secs: i64,
    valence_step: f64,
}

impl DimensionIndices {
    /// Create empty indices with the given discretization.
    #[must_use]
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            context: HashMap::new(),
            temporal: BTreeMap::new(),
            emotional: BTreeMap::new(),
            tags: HashMap::new(),
            time_bucket_secs: config.time_bucket_secs.max(1),
            valence_step: config.valence_step,
        }
    }

    /// Temporal bucket of a timestamp (whole buckets since the Unix epoch).
    #[must_use]
    pub fn time_bucket(&self, timestamp: DateTime<Utc>) -> i64 {
        timestamp.timestamp().div_euclid(self.time_bucket_secs)
    }

    /// Emotional step of a valence (`round(valence / step)`, half away
    /// from zero).
    ///
    /// The quotient is snapped to six decimals first, so a valence stored as
    /// `0.35f32` (widened to `0.3499999…`) lands on step 4 like the decimal
    /// `0.35` does.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn valence_step(&self, valence: f64) -> i64 {
        let ratio = ((valence / self.valence_step) * 1e6).round() / 1e6;
        ratio.round() as i64
    }

    /// Add `id` to every bucket derived from `record`.
    pub fn index(&mut self, id: RecordId, record: &Record) {
        for (key, value) in &record.context {
            self.context
                .entry((key.clone(), value.clone()))
                .or_default()
                .insert(id);
        }
        let bucket = self.time_bucket(record.timestamp);
        let step = self.valence_step(f64::from(record.emotional_valence));
        self.temporal.entry(bucket).or_default().insert(id);
        self.emotional.entry(step).or_default().insert(id);
        for tag in &record.tags {
            self.tags.entry(tag.clone()).or_default().insert(id);
        }
    }

    /// Remove `id` from every bucket derived from `record`.
    ///
    /// Buckets left empty are dropped.
    pub fn deindex(&mut self, id: RecordId, record: &Record) {
        for (key, value) in &record.context {
            let bucket_key = (key.clone(), value.clone());
            remove_from(&mut self.context, &bucket_key, id);
        }
        let bucket = self.time_bucket(record.timestamp);
        let step = self.valence_step(f64::from(record.emotional_valence));
        remove_from_ordered(&mut self.temporal, bucket, id);
        remove_from_ordered(&mut self.emotional, step, id);
        for tag in &record.tags {
            remove_from(&mut self.tags, tag, id);
        }
    }

    /// Ids whose context has exactly `key = value`.
    #[must_use]
    pub fn by_context(&self, key: &str, value: &str) -> IdSet {
        self.context
            .get(&(key.to_string(), value.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Ids carrying `tag`.
    #[must_use]
    pub fn by_tag(&self, tag: &str) -> IdSet {
        self.tags.get(tag).cloned().unwrap_or_default()
    }

    /// Union of every temporal bucket from `start`'s bucket through `end`'s
    /// bucket, inclusive. Empty when `start > end`.
    #[must_use]
    pub fn by_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> IdSet {
        if start > end {
            return IdSet::new();
        }
        let (lo, hi) = (self.time_bucket(start), self.time_bucket(end));
        self.temporal
            .range(lo..=hi)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Union of every emotional step from `min`'s step through `max`'s step,
    /// inclusive. Empty when `min > max`.
    #[must_use]
    pub fn by_valence_range(&self, min: f64, max: f64) -> IdSet {
        if !(min <= max) {
            return IdSet::new();
        }
        let (lo, hi) = (self.valence_step(min), self.valence_step(max));
        self.emotional
            .range(lo..=hi)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Whether `id` appears in any bucket of any index.
    #[must_use]
    pub fn contains_anywhere(&self, id: RecordId) -> bool {
        self.context.values().any(|s| s.contains(&id))
            || self.temporal.values().any(|s| s.contains(&id))
            || self.emotional.values().any(|s| s.contains(&id))
            || self.tags.values().any(|s| s.contains(&id))
    }

    /// Every id referenced by any bucket.
    #[must_use]
    pub fn ids(&self) -> IdSet {
        self.context
            .values()
            .chain(self.temporal.values())
            .chain(self.emotional.values())
            .chain(self.tags.values())
            .flat_map(|s| s.iter().copied())
            .collect()
    }

    /// Total bucket count across all four indices.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.context.len() + self.temporal.len() + self.emotional.len() + self.tags.len()
    }

    /// Whether every index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bucket_count() == 0
    }
}

fn remove_from<K, Q>(map: &mut HashMap<K, IdSet>, key: &Q, id: RecordId)
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if let Some(bucket) = map.get_mut(key) {
        bucket.remove(&id);
        if bucket.is_empty() {
            map.remove(key);
        }
    }
}

fn remove_from_ordered(map: &mut BTreeMap<i64, IdSet>, key: i64, id: RecordId) {
    if let Some(bucket) = map.get_mut(&key) {
        bucket.remove(&id);
        if bucket.is_empty() {
            map.remove(&key);
        }
    }
}
