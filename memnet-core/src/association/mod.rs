//! Association graph: symmetric weighted links between records.
//!
//! Edges are stored once per ordered pair, so `strength(a, b)` and
//! `strength(b, a)` are always present together and always equal. Records
//! never hold live references to each other; a record's `associations` set
//! is read out of this graph by id.

pub mod scoring;

use std::collections::{BTreeSet, HashMap};

use crate::types::{RecordId, Score};

pub use scoring::{AssociationStrategy, ExhaustiveScan, SimilarityBreakdown};

/// One undirected edge, reported once with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Lower endpoint.
    pub a: RecordId,
    /// Higher endpoint.
    pub b: RecordId,
    /// Stored strength.
    pub strength: f64,
}

/// Adjacency map from each record to its linked peers and their strengths.
#[derive(Debug, Clone, Default)]
pub struct AssociationGraph {
    adjacency: HashMap<RecordId, HashMap<RecordId, f64>>,
}

impl AssociationGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `a` and `b` in both directions. Self-links are ignored.
    pub fn link(&mut self, a: RecordId, b: RecordId, strength: f64) {
        if a == b {
            return;
        }
        self.adjacency.entry(a).or_default().insert(b, strength);
        self.adjacency.entry(b).or_default().insert(a, strength);
    }

    /// Remove every edge touching `id`, in both directions.
    ///
    /// Returns the former peers.
    pub fn unlink_all(&mut self, id: RecordId) -> Vec<RecordId> {
        let Some(peers) = self.adjacency.remove(&id) else {
            return Vec::new();
        };
        for peer in peers.keys() {
            if let Some(back) = self.adjacency.get_mut(peer) {
                let removed = back.remove(&id);
                debug_assert!(removed.is_some(), "asymmetric edge {peer} -> {id}");
                if back.is_empty() {
                    self.adjacency.remove(peer);
                }
            }
        }
        peers.into_keys().collect()
    }

    /// Stored strength of the `a → b` edge.
    #[must_use]
    pub fn strength(&self, a: RecordId, b: RecordId) -> Option<f64> {
        self.adjacency.get(&a).and_then(|peers| peers.get(&b)).copied()
    }

    /// Ids linked to `id`.
    #[must_use]
    pub fn neighbors(&self, id: RecordId) -> BTreeSet<RecordId> {
        self.adjacency
            .get(&id)
            .map(|peers| peers.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Peers of `id` with strength ≥ `threshold`, strongest first, at most
    /// `max_results`. Equal strengths are ordered by id. Unknown ids yield
    /// an empty list.
    #[must_use]
    pub fn associated(
        &self,
        id: RecordId,
        threshold: f64,
        max_results: usize,
    ) -> Vec<(RecordId, f64)> {
        let Some(peers) = self.adjacency.get(&id) else {
            return Vec::new();
        };
        let mut hits: Vec<(RecordId, f64)> = peers
            .iter()
            .filter(|(_, s)| **s >= threshold)
            .map(|(peer, s)| (*peer, *s))
            .collect();
        hits.sort_by(|x, y| {
            Score::new(y.1)
                .cmp(&Score::new(x.1))
                .then_with(|| x.0.cmp(&y.0))
        });
        hits.truncate(max_results);
        hits
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(HashMap::len).sum::<usize>() / 2
    }

    /// Every undirected edge once, ordered by endpoints.
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .adjacency
            .iter()
            .flat_map(|(a, peers)| {
                peers
                    .iter()
                    .filter(move |(b, _)| a < *b)
                    .map(move |(b, s)| Edge { a: *a, b: *b, strength: *s })
            })
            .collect();
        edges.sort_by(|x, y| (x.a, x.b).cmp(&(y.a, y.b)));
        edges
    }

    /// Whether every edge has a mirror with identical strength.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_symmetric(&self) -> bool {
        self.adjacency.iter().all(|(a, peers)| {
            peers
                .iter()
                .all(|(b, s)| self.strength(*b, *a) == Some(*s))
        })
    }

    /// Whether `id` has any edge.
    #[must_use]
    pub fn has_node(&self, id: RecordId) -> bool {
        self.adjacency.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_is_bidirectional() {
        let mut g = AssociationGraph::new();
        let (a, b) = (RecordId::new(), RecordId::new());
        g.link(a, b, 0.42);

        assert_eq!(g.strength(a, b), Some(0.42));
        assert_eq!(g.strength(b, a), Some(0.42));
        assert!(g.neighbors(a).contains(&b));
        assert!(g.neighbors(b).contains(&a));
        assert_eq!(g.edge_count(), 1);
        assert!(g.is_symmetric());
    }

    #[test]
    fn self_link_ignored() {
        let mut g = AssociationGraph::new();
        let a = RecordId::new();
        g.link(a, a, 0.9);
        assert_eq!(g.edge_count(), 0);
        assert!(!g.has_node(a));
    }

    #[test]
    fn unlink_all_removes_both_directions() {
        let mut g = AssociationGraph::new();
        let (a, b, c) = (RecordId::new(), RecordId::new(), RecordId::new());
        g.link(a, b, 0.5);
        g.link(a, c, 0.6);
        g.link(b, c, 0.7);

        let mut peers = g.unlink_all(a);
        peers.sort();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(peers, expected);

        assert_eq!(g.strength(b, a), None);
        assert_eq!(g.strength(c, a), None);
        assert!(!g.neighbors(b).contains(&a));
        assert_eq!(g.edge_count(), 1);
        assert!(g.is_symmetric());
    }

    #[test]
    fn unlink_drops_isolated_peers() {
        let mut g = AssociationGraph::new();
        let (a, b) = (RecordId::new(), RecordId::new());
        g.link(a, b, 0.5);
        g.unlink_all(b);
        assert!(!g.has_node(a));
        assert!(!g.has_node(b));
    }

    #[test]
    fn associated_sorts_filters_and_truncates() {
        let mut g = AssociationGraph::new();
        let hub = RecordId::new();
        let peers: Vec<RecordId> = (0..4).map(|_| RecordId::new()).collect();
        for (peer, s) in peers.iter().zip([0.35, 0.9, 0.5, 0.31]) {
            g.link(hub, *peer, s);
        }

        let top = g.associated(hub, 0.4, 10);
        assert_eq!(top, vec![(peers[1], 0.9), (peers[2], 0.5)]);

        let one = g.associated(hub, 0.0, 1);
        assert_eq!(one, vec![(peers[1], 0.9)]);

        assert!(g.associated(RecordId::new(), 0.0, 10).is_empty());
    }

    #[test]
    fn edges_reports_each_pair_once() {
        let mut g = AssociationGraph::new();
        let (a, b, c) = (RecordId::new(), RecordId::new(), RecordId::new());
        g.link(a, b, 0.5);
        g.link(b, c, 0.6);
        let edges = g.edges();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.a < e.b));
    }
}
