//! Capacity manager: score-based eviction.
//!
//! Once the store holds more than `capacity` records, every record is
//! scored and the lowest-scoring surplus is evicted:
//!
//! ```text
//! score   = 0.4 · importance + 0.3 · recency + 0.3 · min(retrievals, 10) / 10
//! recency = 1 / (1 + seconds_since_creation)
//! ```
//!
//! **Lower** scores are evicted first. Equal scores evict the older record
//! first, then the lower id. This module only selects victims; the store
//! performs the removal so indices and edges stay consistent.

use chrono::{DateTime, Utc};

use crate::config::EvictionConfig;
use crate::types::{RecordId, Score};

/// The inputs the capacity manager needs from one stored record.
#[derive(Debug, Clone, Copy)]
pub struct EvictionCandidate {
    /// Record id.
    pub id: RecordId,
    /// Record importance.
    pub importance: f32,
    /// When the record's fact was formed.
    pub timestamp: DateTime<Utc>,
    /// Query hits so far.
    pub retrieval_count: u32,
}

/// `1 / (1 + seconds)`; timestamps in the future count as zero seconds old.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn recency_factor(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_ms = (now - timestamp).num_milliseconds().max(0);
    1.0 / (1.0 + age_ms as f64 / 1000.0)
}

/// Retention score of one record. Higher is kept longer.
#[must_use]
pub fn eviction_score(
    importance: f32,
    timestamp: DateTime<Utc>,
    retrieval_count: u32,
    now: DateTime<Utc>,
    config: &EvictionConfig,
) -> f64 {
    let saturation = config.usage_saturation.max(1);
    let usage = f64::from(retrieval_count.min(saturation)) / f64::from(saturation);
    config.importance * f64::from(importance)
        + config.recency * recency_factor(timestamp, now)
        + config.usage * usage
}

/// Pick the ids to evict so that at most `capacity` candidates remain.
///
/// Returns an empty list when already within capacity.
#[must_use]
pub fn select_evictions(
    candidates: Vec<EvictionCandidate>,
    capacity: usize,
    now: DateTime<Utc>,
    config: &EvictionConfig,
) -> Vec<RecordId> {
    if candidates.len() <= capacity {
        return Vec::new();
    }
    let surplus = candidates.len() - capacity;

    let mut scored: Vec<(Score, DateTime<Utc>, RecordId)> = candidates
        .into_iter()
        .map(|c| {
            let score = eviction_score(c.importance, c.timestamp, c.retrieval_count, now, config);
            (Score::new(score), c.timestamp, c.id)
        })
        .collect();

    // Weakest first.
    scored.sort_unstable();
    scored.truncate(surplus);
    scored.into_iter().map(|(_, _, id)| id).collect()
}
