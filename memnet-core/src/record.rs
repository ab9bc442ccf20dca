//! Record: the stored unit of memory.
//!
//! Content is immutable once stored; only usage metadata (`retrieval_count`,
//! `last_accessed`) changes afterwards, and only through queries.
//! `associations` is owned by the association graph: values returned by the
//! store carry the graph's current view, and values handed to the store have
//! it discarded.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::RecordId;

/// A single remembered fact plus its indexing attributes and usage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The remembered fact. Never empty.
    pub content: String,
    /// When the fact was formed.
    pub timestamp: DateTime<Utc>,
    /// Externally supplied salience (0.0 to 1.0).
    pub importance: f32,
    /// Affective sign and magnitude (-1.0 to +1.0).
    pub emotional_valence: f32,
    /// Attribute name → attribute value.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Free-form labels.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// How many times a query has returned this record.
    #[serde(default)]
    pub retrieval_count: u32,
    /// When a query last returned this record.
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Records linked to this one by the association graph.
    #[serde(default)]
    pub associations: BTreeSet<RecordId>,
}

impl Record {
    /// Create a validated record with empty context and tags.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if content is empty, importance is
    /// outside `[0, 1]`, or valence is outside `[-1, 1]`.
    pub fn new(
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        importance: f32,
        emotional_valence: f32,
    ) -> Result<Self, ValidationError> {
        let record = Self {
            content: content.into(),
            timestamp,
            importance,
            emotional_valence,
            context: BTreeMap::new(),
            tags: BTreeSet::new(),
            retrieval_count: 0,
            last_accessed: None,
            associations: BTreeSet::new(),
        };
        record.validate()?;
        Ok(record)
    }

    /// Add one context attribute, replacing any previous value for `key`.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Add one tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Add several tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Check the value invariants.
    ///
    /// Fields are public, so the store re-runs this on every insertion.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        if !(0.0..=1.0).contains(&self.importance) {
            return Err(ValidationError::ImportanceOutOfRange(self.importance));
        }
        if !(-1.0..=1.0).contains(&self.emotional_valence) {
            return Err(ValidationError::ValenceOutOfRange(self.emotional_valence));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().expect("valid date")
    }

    #[test]
    fn valid_record_builds() {
        let record = Record::new("Completed project milestone", t0(), 0.8, 0.7)
            .expect("valid")
            .with_context("location", "work")
            .with_context("activity", "project")
            .with_tags(["achievement", "work"]);

        assert_eq!(record.context.len(), 2);
        assert_eq!(record.tags.len(), 2);
        assert_eq!(record.retrieval_count, 0);
        assert!(record.last_accessed.is_none());
        assert!(record.associations.is_empty());
    }

    #[test]
    fn empty_content_rejected() {
        let err = Record::new("", t0(), 0.5, 0.0).expect_err("empty content");
        assert_eq!(err, ValidationError::EmptyContent);
    }

    #[test]
    fn importance_bounds_inclusive() {
        assert!(Record::new("a", t0(), 0.0, 0.0).is_ok());
        assert!(Record::new("a", t0(), 1.0, 0.0).is_ok());
        assert!(matches!(
            Record::new("a", t0(), 1.5, 0.0),
            Err(ValidationError::ImportanceOutOfRange(_))
        ));
        assert!(matches!(
            Record::new("a", t0(), -0.01, 0.0),
            Err(ValidationError::ImportanceOutOfRange(_))
        ));
    }

    #[test]
    fn valence_bounds_inclusive() {
        assert!(Record::new("a", t0(), 0.5, -1.0).is_ok());
        assert!(Record::new("a", t0(), 0.5, 1.0).is_ok());
        assert!(matches!(
            Record::new("a", t0(), 0.5, 2.0),
            Err(ValidationError::ValenceOutOfRange(_))
        ));
    }

    #[test]
    fn nan_scores_rejected() {
        assert!(matches!(
            Record::new("a", t0(), f32::NAN, 0.0),
            Err(ValidationError::ImportanceOutOfRange(_))
        ));
        assert!(matches!(
            Record::new("a", t0(), 0.5, f32::NAN),
            Err(ValidationError::ValenceOutOfRange(_))
        ));
    }

    #[test]
    fn mutated_fields_fail_revalidation() {
        let mut record = Record::new("a", t0(), 0.5, 0.0).expect("valid");
        record.content.clear();
        assert_eq!(record.validate(), Err(ValidationError::EmptyContent));
    }
}
