//! Pairwise similarity scoring for association discovery.
//!
//! strength = w₁·Context + w₂·Tags + w₃·Temporal + w₄·Emotional
//!
//! Where:
//!   Context(a, b)   = |shared (key, value) pairs| / max(|a.context|, |b.context|)
//!   Tags(a, b)      = |shared tags| / max(|a.tags|, |b.tags|), 0 if either is empty
//!   Temporal(a, b)  = 1 / (1 + Δt / scale)           (scale = 1 hour by default)
//!   Emotional(a, b) = 1 − |a.valence − b.valence| / 2

use std::fmt;

use crate::config::AssociationConfig;
use crate::record::Record;
use crate::types::RecordId;

/// Weighted per-factor contributions to one association strength.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimilarityBreakdown {
    /// Context factor contribution.
    pub context: f64,
    /// Tag factor contribution.
    pub tags: f64,
    /// Temporal factor contribution.
    pub temporal: f64,
    /// Emotional factor contribution.
    pub emotional: f64,
}

impl SimilarityBreakdown {
    /// Sum of all contributions.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.context + self.tags + self.temporal + self.emotional
    }
}

/// Compute the weighted breakdown for a pair of records.
#[must_use]
pub fn compute_breakdown(a: &Record, b: &Record, config: &AssociationConfig) -> SimilarityBreakdown {
    SimilarityBreakdown {
        context: config.context * context_similarity(a, b),
        tags: config.tags * tag_similarity(a, b),
        temporal: config.temporal * temporal_similarity(a, b, config.temporal_scale_secs),
        emotional: config.emotional * emotional_similarity(a, b),
    }
}

/// Association strength between two records.
#[must_use]
pub fn association_strength(a: &Record, b: &Record, config: &AssociationConfig) -> f64 {
    compute_breakdown(a, b, config).total()
}

/// Fraction of identical context pairs. Zero when both contexts are empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn context_similarity(a: &Record, b: &Record) -> f64 {
    let denom = a.context.len().max(b.context.len());
    if denom == 0 {
        return 0.0;
    }
    let shared = a
        .context
        .iter()
        .filter(|(k, v)| b.context.get(*k) == Some(*v))
        .count();
    shared as f64 / denom as f64
}

/// Fraction of shared tags. Zero when either tag set is empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn tag_similarity(a: &Record, b: &Record) -> f64 {
    if a.tags.is_empty() || b.tags.is_empty() {
        return 0.0;
    }
    let shared = a.tags.intersection(&b.tags).count();
    shared as f64 / a.tags.len().max(b.tags.len()) as f64
}

/// Hyperbolic decay over the time gap: 1.0 at Δt = 0, 0.5 at Δt = `scale_secs`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn temporal_similarity(a: &Record, b: &Record, scale_secs: f64) -> f64 {
    let delta = (a.timestamp - b.timestamp).abs();
    let delta_secs = delta.num_milliseconds() as f64 / 1000.0;
    1.0 / (1.0 + delta_secs / scale_secs)
}

/// Closeness of emotional valence, in `[0, 1]`.
#[must_use]
pub fn emotional_similarity(a: &Record, b: &Record) -> f64 {
    let diff = (f64::from(a.emotional_valence) - f64::from(b.emotional_valence)).abs();
    (1.0 - diff / 2.0).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Candidate discovery
// ---------------------------------------------------------------------------

/// Finds the existing records a newly inserted record should link to.
///
/// The store notifies the strategy of every insertion and removal so an
/// implementation can maintain its own candidate structure.
pub trait AssociationStrategy: Send + Sync + fmt::Debug {
    /// Return `(peer, strength)` for every peer whose strength is strictly
    /// above `threshold`. `existing` never yields `record` itself.
    fn discover(
        &self,
        record: &Record,
        existing: &mut dyn Iterator<Item = (RecordId, &Record)>,
        config: &AssociationConfig,
        threshold: f64,
    ) -> Vec<(RecordId, f64)>;

    /// Called after `id` has been stored.
    fn on_insert(&mut self, _id: RecordId, _record: &Record) {}

    /// Called after `id` has been removed.
    fn on_remove(&mut self, _id: RecordId) {}
}

/// Compares the new record against every stored record. O(n) per insertion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveScan;

impl AssociationStrategy for ExhaustiveScan {
    fn discover(
        &self,
        record: &Record,
        existing: &mut dyn Iterator<Item = (RecordId, &Record)>,
        config: &AssociationConfig,
        threshold: f64,
    ) -> Vec<(RecordId, f64)> {
        existing
            .filter_map(|(other_id, other)| {
                let strength = association_strength(record, other, config);
                (strength > threshold).then_some((other_id, strength))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().expect("valid date")
    }

    fn started_project() -> Record {
        Record::new("Started new project", t0(), 0.7, 0.6)
            .expect("valid")
            .with_context("location", "work")
            .with_context("activity", "project")
            .with_tags(["project", "work", "planning"])
    }

    #[test]
    fn same_context_one_hour_apart_scores_high() {
        let a = started_project();
        let b = Record::new("Project sync", t0() + Duration::hours(1), 0.6, 0.5)
            .expect("valid")
            .with_context("location", "work")
            .with_context("activity", "project")
            .with_tags(["project", "work", "team"]);

        assert!((context_similarity(&a, &b) - 1.0).abs() < 1e-9);
        assert!((tag_similarity(&a, &b) - 2.0 / 3.0).abs() < 1e-9);
        assert!((temporal_similarity(&a, &b, 3600.0) - 0.5).abs() < 1e-9);
        assert!((emotional_similarity(&a, &b) - 0.95).abs() < 1e-6);

        let strength = association_strength(&a, &b, &AssociationConfig::default());
        // 0.3·1 + 0.3·0.667 + 0.2·0.5 + 0.2·0.95 ≈ 0.79
        assert!((strength - 0.79).abs() < 1e-3, "strength = {strength}");
    }

    #[test]
    fn context_counts_only_identical_pairs() {
        let a = started_project();
        let b = Record::new("Team meeting", t0(), 0.6, 0.5)
            .expect("valid")
            .with_context("location", "work")
            .with_context("activity", "meeting")
            .with_context("outcome", "success");
        assert!((context_similarity(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_sets_contribute_zero() {
        let a = Record::new("a", t0(), 0.5, 0.0).expect("valid");
        let b = Record::new("b", t0(), 0.5, 0.0).expect("valid").with_tag("x");
        assert!(context_similarity(&a, &b).abs() < f64::EPSILON);
        assert!(tag_similarity(&a, &b).abs() < f64::EPSILON);
    }

    #[test]
    fn emotional_similarity_spans_unit_interval() {
        let pos = Record::new("a", t0(), 0.5, 1.0).expect("valid");
        let neg = Record::new("b", t0(), 0.5, -1.0).expect("valid");
        assert!(emotional_similarity(&pos, &neg).abs() < f64::EPSILON);
        assert!((emotional_similarity(&pos, &pos) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn temporal_similarity_is_symmetric_and_decays() {
        let a = started_project();
        let mut b = started_project();
        b.timestamp = t0() - Duration::hours(3);
        let s1 = temporal_similarity(&a, &b, 3600.0);
        let s2 = temporal_similarity(&b, &a, 3600.0);
        assert!((s1 - s2).abs() < f64::EPSILON);
        assert!((s1 - 0.25).abs() < 1e-9);
    }

    #[test]
    fn exhaustive_scan_applies_strict_threshold() {
        let a = started_project();
        let twin = started_project();
        let stranger = Record::new("Unrelated", t0() + Duration::days(30), 0.1, -1.0)
            .expect("valid")
            .with_context("location", "beach");
        let twin_id = RecordId::new();
        let stranger_id = RecordId::new();
        let existing = [(twin_id, &twin), (stranger_id, &stranger)];

        let found = ExhaustiveScan.discover(
            &a,
            &mut existing.iter().copied(),
            &AssociationConfig::default(),
            0.3,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, twin_id);
        assert!((found[0].1 - 1.0).abs() < 1e-9);

        // A threshold equal to the strength excludes the pair.
        let none = ExhaustiveScan.discover(
            &a,
            &mut existing.iter().copied(),
            &AssociationConfig::default(),
            1.0,
        );
        assert!(none.is_empty());
    }
}
