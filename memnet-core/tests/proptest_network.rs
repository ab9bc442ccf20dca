//! Property-based tests for memnet core.
//!
//! Random insertion / query / removal sequences must never break the
//! structural invariants of the store: bounded size, symmetric edges,
//! indices and graph referencing only live records, and faithful snapshots.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use memnet_core::association::scoring::association_strength;
use memnet_core::config::{AssociationConfig, NetworkConfig};
use memnet_core::{MemoryNetwork, Query, Record, RecordId};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date")
}

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

const LOCATIONS: &[&str] = &["office", "home", "park", "train"];
const TAGS: &[&str] = &["work", "family", "AI", "travel", "health"];

fn arb_record() -> impl Strategy<Value = Record> {
    (
        "[a-z]{1,12}",
        0i64..(14 * 24 * 60),
        0.0..=1.0f32,
        -1.0..=1.0f32,
        proptest::option::of(0..LOCATIONS.len()),
        proptest::collection::btree_set(0..TAGS.len(), 0..3),
    )
        .prop_map(|(content, minutes, importance, valence, location, tags)| {
            let mut record = Record::new(content, t0() + Duration::minutes(minutes), importance, valence)
                .expect("generated values are in range");
            if let Some(l) = location {
                record = record.with_context("location", LOCATIONS[l]);
            }
            record.with_tags(tags.into_iter().map(|t| TAGS[t]))
        })
}

#[derive(Debug, Clone)]
enum Op {
    Store(Record),
    QueryTag(usize),
    QueryFloor(f32),
    RemoveNth(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => arb_record().prop_map(Op::Store),
        1 => (0..TAGS.len()).prop_map(Op::QueryTag),
        1 => (0.0..=1.0f32).prop_map(Op::QueryFloor),
        1 => any::<usize>().prop_map(Op::RemoveNth),
    ]
}

fn apply(net: &mut MemoryNetwork, ops: Vec<Op>) {
    let now = t0() + Duration::days(30);
    for op in ops {
        match op {
            Op::Store(r) => {
                net.store_at(r, now).expect("valid record");
            }
            Op::QueryTag(t) => {
                let _ = net.query_at(&Query::new().with_tag(TAGS[t]), now);
            }
            Op::QueryFloor(f) => {
                let _ = net.query_at(&Query::new().with_importance_floor(f), now);
            }
            Op::RemoveNth(n) => {
                let ids = net.ids();
                if !ids.is_empty() {
                    net.remove(ids[n % ids.len()]);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn size_never_exceeds_capacity(
        capacity in 1usize..12,
        ops in proptest::collection::vec(arb_op(), 0..60),
    ) {
        let mut net = MemoryNetwork::with_capacity(capacity).expect("config");
        for op in ops {
            apply(&mut net, vec![op]);
            prop_assert!(net.len() <= capacity);
        }
        prop_assert!(net.statistics().count <= capacity);
    }

    #[test]
    fn structure_stays_consistent(ops in proptest::collection::vec(arb_op(), 0..80)) {
        let mut net = MemoryNetwork::with_capacity(15).expect("config");
        apply(&mut net, ops);

        prop_assert!(net.is_consistent());
        prop_assert!(net.graph().is_symmetric());
        for id in net.ids() {
            let record = net.get(id).expect("listed id is stored");
            for peer in &record.associations {
                let back = net.get(*peer).expect("peer is stored");
                prop_assert!(back.associations.contains(&id));
            }
        }
    }

    #[test]
    fn edges_match_scoring(records in proptest::collection::vec(arb_record(), 2..12)) {
        let mut net = MemoryNetwork::default();
        let config = AssociationConfig::default();
        let threshold = net.config().association_threshold;
        let stored: Vec<(RecordId, Record)> = records
            .into_iter()
            .map(|r| (net.store_at(r.clone(), t0()).expect("store"), r))
            .collect();

        for (i, (a, ra)) in stored.iter().enumerate() {
            for (b, rb) in &stored[i + 1..] {
                let expected = association_strength(ra, rb, &config);
                match net.graph().strength(*a, *b) {
                    Some(s) => {
                        prop_assert!(expected > threshold);
                        prop_assert!((s - expected).abs() < 1e-12);
                    }
                    None => prop_assert!(expected <= threshold),
                }
            }
        }
    }

    #[test]
    fn every_query_hit_gains_exactly_one_retrieval(
        records in proptest::collection::vec(arb_record(), 1..20),
        floor in 0.0..=1.0f32,
    ) {
        let mut net = MemoryNetwork::default();
        for r in records {
            net.store_at(r, t0()).expect("store");
        }
        let before: Vec<(RecordId, u32)> = net
            .ids()
            .into_iter()
            .map(|id| (id, net.get(id).expect("stored").retrieval_count))
            .collect();

        let hits = net.query_at(&Query::new().with_importance_floor(floor), t0());
        for (_, r) in &hits {
            prop_assert!(r.importance >= floor);
        }
        for pair in hits.windows(2) {
            prop_assert!(pair[0].1.importance >= pair[1].1.importance);
        }
        for (id, count) in before {
            let returned = hits.iter().any(|(h, _)| *h == id);
            let now = net.get(id).expect("stored").retrieval_count;
            prop_assert_eq!(now, count + u32::from(returned));
        }
    }

    #[test]
    fn stored_record_is_found_by_its_own_attributes(
        records in proptest::collection::vec(arb_record(), 1..15),
    ) {
        let mut net = MemoryNetwork::default();
        let stored: Vec<(RecordId, Record)> = records
            .into_iter()
            .map(|r| (net.store_at(r.clone(), t0()).expect("store"), r))
            .collect();

        for (id, r) in &stored {
            let mut q = Query::new()
                .with_content(r.content.to_uppercase())
                .with_time_range(r.timestamp, r.timestamp)
                .with_emotional_range(r.emotional_valence, r.emotional_valence);
            for (k, v) in &r.context {
                q = q.with_context(k.clone(), v.clone());
            }
            for t in &r.tags {
                q = q.with_tag(t.clone());
            }
            let hits = net.query_at(&q, t0());
            prop_assert!(hits.iter().any(|(h, _)| h == id));
        }
    }

    #[test]
    fn repeated_query_returns_same_ids(
        records in proptest::collection::vec(arb_record(), 0..20),
        tag in 0..TAGS.len(),
    ) {
        let mut net = MemoryNetwork::default();
        for r in records {
            net.store_at(r, t0()).expect("store");
        }
        let q = Query::new().with_tag(TAGS[tag]);
        let mut first: Vec<RecordId> = net.query_at(&q, t0()).into_iter().map(|(id, _)| id).collect();
        let mut second: Vec<RecordId> = net.query_at(&q, t0()).into_iter().map(|(id, _)| id).collect();
        first.sort_unstable();
        second.sort_unstable();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn snapshot_restore_is_faithful(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut net = MemoryNetwork::with_capacity(20).expect("config");
        apply(&mut net, ops);

        let snapshot = net.snapshot();
        let json = snapshot.to_json().expect("encode");
        let decoded = memnet_core::NetworkSnapshot::from_json(&json).expect("decode");
        prop_assert_eq!(&decoded, &snapshot);

        let restored = MemoryNetwork::restore(decoded, NetworkConfig::with_capacity(20))
            .expect("restore");
        prop_assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn removal_leaves_no_trace(records in proptest::collection::vec(arb_record(), 1..15)) {
        let mut net = MemoryNetwork::default();
        let ids: Vec<RecordId> = records
            .into_iter()
            .map(|r| net.store_at(r, t0()).expect("store"))
            .collect();
        for id in &ids {
            prop_assert!(net.remove(*id).is_some());
            prop_assert!(!net.indices().contains_anywhere(*id));
            prop_assert!(!net.graph().has_node(*id));
        }
        prop_assert!(net.is_empty());
        prop_assert!(net.indices().is_empty());
        prop_assert_eq!(net.graph().edge_count(), 0);
    }
}
