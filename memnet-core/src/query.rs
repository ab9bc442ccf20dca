//! Query engine: compound filters resolved against the dimension indices.
//!
//! Every filter that is set narrows the candidate set by intersection,
//! starting from all stored ids. Filters left unset (or empty) do not
//! constrain the result.
//!
//! | Filter             | Source                 | Semantics                            |
//! |--------------------|------------------------|--------------------------------------|
//! | `content`          | scan                   | case-insensitive substring           |
//! | `context`          | context index          | every pair (`All`) or any pair (`Any`) |
//! | `time_range`       | temporal index buckets | buckets overlapping the range        |
//! | `tags`             | tag index              | any listed tag                       |
//! | `emotional_range`  | emotional index steps  | steps overlapping the range          |
//! | `importance_floor` | scan                   | `importance >= floor`                |
//!
//! Results are ordered by importance, then retrieval count (both
//! descending), then id.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::index::{DimensionIndices, IdSet};
use crate::record::Record;
use crate::types::RecordId;

/// How the `context` filter combines multiple attribute/value pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextMatch {
    /// A record must carry every requested pair.
    #[default]
    All,
    /// A record must carry at least one requested pair.
    Any,
}

/// A compound record filter. All set fields combine by conjunction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Case-insensitive substring of `content`.
    #[serde(default)]
    pub content: Option<String>,
    /// Required context attribute/value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Combination rule for `context`.
    #[serde(default)]
    pub context_match: ContextMatch,
    /// Inclusive `(start, end)` time interval.
    #[serde(default)]
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Match records carrying any of these tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Inclusive `(min, max)` valence interval.
    #[serde(default)]
    pub emotional_range: Option<(f32, f32)>,
    /// Minimum importance, inclusive.
    #[serde(default)]
    pub importance_floor: Option<f32>,
}

impl Query {
    /// A query with no filters; matches every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by case-insensitive content substring.
    #[must_use]
    pub fn with_content(mut self, needle: impl Into<String>) -> Self {
        self.content = Some(needle.into());
        self
    }

    /// Require a context attribute/value pair.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Choose how multiple context pairs combine.
    #[must_use]
    pub fn with_context_match(mut self, mode: ContextMatch) -> Self {
        self.context_match = mode;
        self
    }

    /// Restrict to an inclusive time interval.
    #[must_use]
    pub fn with_time_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.time_range = Some((start, end));
        self
    }

    /// Accept records carrying `tag` (any-of with other tags).
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Restrict to an inclusive valence interval.
    #[must_use]
    pub fn with_emotional_range(mut self, min: f32, max: f32) -> Self {
        self.emotional_range = Some((min, max));
        self
    }

    /// Require `importance >= floor`.
    #[must_use]
    pub fn with_importance_floor(mut self, floor: f32) -> Self {
        self.importance_floor = Some(floor);
        self
    }

    /// Resolve the filter to a set of matching ids.
    ///
    /// `records` must yield every stored record exactly once; it is walked
    /// a single time for the scan filters (content, importance).
    pub fn resolve<'a, I>(&self, indices: &DimensionIndices, records: I) -> IdSet
    where
        I: IntoIterator<Item = (RecordId, &'a Record)>,
    {
        let needle = self
            .content
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut candidates: IdSet = records
            .into_iter()
            .filter(|(_, r)| {
                needle
                    .as_deref()
                    .is_none_or(|n| r.content.to_lowercase().contains(n))
            })
            .filter(|(_, r)| self.importance_floor.is_none_or(|f| r.importance >= f))
            .map(|(id, _)| id)
            .collect();

        if !self.context.is_empty() {
            let matched = match self.context_match {
                ContextMatch::All => self.context.iter().fold(None, |acc: Option<IdSet>, (k, v)| {
                    let ids = indices.by_context(k, v);
                    Some(match acc {
                        None => ids,
                        Some(prev) => prev.intersection(&ids).copied().collect(),
                    })
                }),
                ContextMatch::Any => Some(
                    self.context
                        .iter()
                        .flat_map(|(k, v)| indices.by_context(k, v))
                        .collect(),
                ),
            };
            intersect(&mut candidates, &matched.unwrap_or_default());
        }

        if let Some((start, end)) = self.time_range {
            intersect(&mut candidates, &indices.by_time_range(start, end));
        }

        if !self.tags.is_empty() {
            let matched: IdSet = self.tags.iter().flat_map(|t| indices.by_tag(t)).collect();
            intersect(&mut candidates, &matched);
        }

        if let Some((min, max)) = self.emotional_range {
            intersect(
                &mut candidates,
                &indices.by_valence_range(f64::from(min), f64::from(max)),
            );
        }

        candidates
    }
}

fn intersect(candidates: &mut IdSet, matched: &IdSet) {
    candidates.retain(|id| matched.contains(id));
}

/// Sort key for query results.
#[derive(Debug, Clone, Copy)]
pub struct RankKey {
    /// Record id.
    pub id: RecordId,
    /// Record importance.
    pub importance: f32,
    /// Retrieval count before this query's increment.
    pub retrieval_count: u32,
}

impl RankKey {
    /// Importance desc, retrieval count desc, id asc.
    #[must_use]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        OrderedFloat(other.importance)
            .cmp(&OrderedFloat(self.importance))
            .then_with(|| other.retrieval_count.cmp(&self.retrieval_count))
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().expect("valid date")
    }

    struct Fixture {
        records: HashMap<RecordId, Record>,
        indices: DimensionIndices,
        ids: Vec<RecordId>,
    }

    impl Fixture {
        fn new(records: Vec<Record>) -> Self {
            let mut indices = DimensionIndices::new(&IndexConfig::default());
            let mut map = HashMap::new();
            let mut ids = Vec::new();
            for r in records {
                let id = RecordId::new();
                indices.index(id, &r);
                map.insert(id, r);
                ids.push(id);
            }
            Self { records: map, indices, ids }
        }

        fn run(&self, q: &Query) -> IdSet {
            q.resolve(&self.indices, self.records.iter().map(|(id, r)| (*id, r)))
        }
    }

    fn sample() -> Fixture {
        Fixture::new(vec![
            Record::new("Had a great conversation about AI", t0(), 0.8, 0.7)
                .expect("valid")
                .with_context("location", "office")
                .with_context("activity", "meeting")
                .with_tags(["AI", "work"]),
            Record::new("Felt anxious about the presentation", t0() + Duration::hours(2), 0.6, -0.4)
                .expect("valid")
                .with_context("location", "office")
                .with_context("activity", "presentation")
                .with_tags(["work", "anxiety"]),
            Record::new("Walked the dog", t0() + Duration::days(1), 0.2, 0.3)
                .expect("valid")
                .with_context("location", "park")
                .with_tag("leisure"),
        ])
    }

    #[test]
    fn empty_query_matches_everything() {
        let f = sample();
        assert_eq!(f.run(&Query::new()).len(), 3);
    }

    #[test]
    fn content_is_case_insensitive() {
        let f = sample();
        let hits = f.run(&Query::new().with_content("CONVERSATION"));
        assert_eq!(hits.len(), 1);
        assert!(hits.contains(&f.ids[0]));
    }

    #[test]
    fn context_all_requires_every_pair() {
        let f = sample();
        let q = Query::new()
            .with_context("location", "office")
            .with_context("activity", "meeting");
        let hits = f.run(&q);
        assert_eq!(hits.len(), 1);
        assert!(hits.contains(&f.ids[0]));

        let any = f.run(&q.with_context_match(ContextMatch::Any));
        assert_eq!(any.len(), 2);
    }

    #[test]
    fn tags_match_any() {
        let f = sample();
        let hits = f.run(&Query::new().with_tag("AI").with_tag("leisure"));
        assert_eq!(hits.len(), 2);
        assert!(!hits.contains(&f.ids[1]));
    }

    #[test]
    fn filters_combine_by_conjunction() {
        let f = sample();
        let q = Query::new()
            .with_context("location", "office")
            .with_tag("work")
            .with_importance_floor(0.7);
        let hits = f.run(&q);
        assert_eq!(hits.len(), 1);
        assert!(hits.contains(&f.ids[0]));
    }

    #[test]
    fn time_and_valence_ranges() {
        let f = sample();
        let hits = f.run(&Query::new().with_time_range(t0(), t0() + Duration::hours(3)));
        assert_eq!(hits.len(), 2);

        let negative = f.run(&Query::new().with_emotional_range(-1.0, 0.0));
        assert_eq!(negative.len(), 1);
        assert!(negative.contains(&f.ids[1]));
    }

    #[test]
    fn unknown_values_yield_empty() {
        let f = sample();
        assert!(f.run(&Query::new().with_tag("nope")).is_empty());
        assert!(f.run(&Query::new().with_context("location", "moon")).is_empty());
    }

    #[test]
    fn rank_orders_importance_then_count_then_id() {
        let (a, b) = (RecordId::new(), RecordId::new());
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let mut keys = vec![
            RankKey { id: hi, importance: 0.5, retrieval_count: 1 },
            RankKey { id: lo, importance: 0.5, retrieval_count: 1 },
            RankKey { id: RecordId::new(), importance: 0.5, retrieval_count: 3 },
            RankKey { id: RecordId::new(), importance: 0.9, retrieval_count: 0 },
        ];
        keys.sort_by(RankKey::rank_cmp);
        assert!((keys[0].importance - 0.9).abs() < f32::EPSILON);
        assert_eq!(keys[1].retrieval_count, 3);
        assert_eq!(keys[2].id, lo);
        assert_eq!(keys[3].id, hi);
    }
}
