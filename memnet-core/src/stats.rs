//! Store-wide statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a store at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatistics {
    /// Number of stored records.
    pub count: usize,
    /// Mean importance; 0.0 when the store is empty.
    pub mean_importance: f64,
    /// Mean retrieval count; 0.0 when the store is empty.
    pub mean_retrieval_count: f64,
    /// Distinct undirected association edges.
    pub edge_count: usize,
    /// Earliest and latest record timestamp; `None` when the store is empty.
    pub time_span: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl NetworkStatistics {
    /// Aggregate `(importance, retrieval_count, timestamp)` triples.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn collect<I>(records: I, edge_count: usize) -> Self
    where
        I: IntoIterator<Item = (f32, u32, DateTime<Utc>)>,
    {
        let mut count = 0usize;
        let mut importance_sum = 0.0_f64;
        let mut retrieval_sum = 0.0_f64;
        let mut time_span: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

        for (importance, retrievals, timestamp) in records {
            count += 1;
            importance_sum += f64::from(importance);
            retrieval_sum += f64::from(retrievals);
            time_span = Some(match time_span {
                None => (timestamp, timestamp),
                Some((lo, hi)) => (lo.min(timestamp), hi.max(timestamp)),
            });
        }

        let (mean_importance, mean_retrieval_count) = if count == 0 {
            (0.0, 0.0)
        } else {
            (importance_sum / count as f64, retrieval_sum / count as f64)
        };

        Self {
            count,
            mean_importance,
            mean_retrieval_count,
            edge_count,
            time_span,
        }
    }
}
