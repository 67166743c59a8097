#![cfg(test)]

// Internal property suite: runs random op sequences over a fleet of handles
// and then audits the fragment chains directly. Kept inside the crate so the
// audits can read private fields; the tests/ suites exercise the same
// operations through the public API only.
//
// Structural invariants audited after every operation:
// - the cached `size` of every reachable fragment equals a recount of the
//   logical view rooted at that fragment;
// - per-fragment locals and tombstones are disjoint;
// - every tombstone shadows a binding still resolvable through the
//   fragment's ancestors;
// - a handle that just mutated holds the only strong reference to its head;
// - iteration yields each key at most once and exactly `len()` of them.

use crate::fragment::Fragment;
use crate::CowHashMap;
use proptest::prelude::*;
use std::collections::hash_map::RandomState;
use std::collections::HashSet;
use std::sync::Arc;

type Map = CowHashMap<String, i32>;
type Frag = Fragment<String, i32, RandomState>;

// Recounts the logical view rooted at `root`: a key is live iff its nearest
// deciding fragment binds it locally rather than tombstoning it.
fn logical_count(root: &Frag) -> usize {
    let mut decided: HashSet<&str> = HashSet::new();
    let mut live = 0;
    let mut frag = Some(root);
    while let Some(f) = frag {
        for k in f.locals.keys() {
            if decided.insert(k) {
                live += 1;
            }
        }
        for k in f.tombstones.iter() {
            decided.insert(k);
        }
        frag = f.parent.as_deref();
    }
    live
}

fn audit_chain(m: &Map) {
    let mut frag: Option<&Frag> = Some(&m.head);
    while let Some(f) = frag {
        assert_eq!(
            f.size,
            logical_count(f),
            "cached size drifted from the logical view"
        );
        for k in f.tombstones.iter() {
            assert!(
                !f.locals.contains_key(k),
                "key {k:?} both bound and tombstoned in one fragment"
            );
            assert!(
                Fragment::resolves(f.parent.as_deref(), k.as_str()),
                "tombstone {k:?} shadows no ancestor binding"
            );
        }
        frag = f.parent.as_deref();
    }
}

fn audit_iteration(m: &Map) {
    let mut seen: HashSet<String> = HashSet::new();
    for (k, _) in m.iter() {
        assert!(seen.insert(k.clone()), "duplicate key yielded: {k}");
        assert!(m.contains_key(k.as_str()), "iteration yielded a dead key");
    }
    assert_eq!(seen.len(), m.len());
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_fragment_chain_invariants(
        ops in proptest::collection::vec(
            (0u8..=9u8, 0usize..8, 0usize..8, 0i32..1000),
            1..120,
        ),
    ) {
        let mut fleet: Vec<Map> = vec![Map::new()];

        for (op, key_sel, fleet_sel, val) in ops {
            let idx = fleet_sel % fleet.len();
            let key = format!("k{}", key_sel);
            // `mutated` tracks whether the op is required to leave the
            // handle's head uniquely owned.
            let mutated = match op {
                0 => fleet[idx].insert(key, val),
                1 => {
                    fleet[idx].insert_or_assign(key, val);
                    true
                }
                2 => fleet[idx].remove(key.as_str()),
                3 => fleet[idx].insert_with(key, || val),
                // Copy the handle (bounded fleet so strong counts stay small).
                4 => {
                    if fleet.len() < 4 {
                        let copy = fleet[idx].clone();
                        fleet.push(copy);
                    }
                    false
                }
                // Drop a handle, releasing its share of the chain.
                5 => {
                    if fleet.len() > 1 {
                        fleet.remove(idx);
                    }
                    false
                }
                // take may leave the head shared; no uniqueness claim.
                6 => {
                    let _ = fleet[idx].take(key.as_str());
                    false
                }
                7 => fleet[idx].take_remove(key.as_str()).is_ok(),
                8 => fleet[idx].detach(),
                9 => {
                    fleet[idx].clear();
                    true
                }
                _ => unreachable!(),
            };

            if mutated {
                prop_assert_eq!(Arc::strong_count(&fleet[idx].head), 1);
            }

            // Per-op audit covers the touched handle; the whole fleet is
            // audited once the sequence is done (chains can get deep, and
            // the recount is quadratic in depth).
            let m = &fleet[idx.min(fleet.len() - 1)];
            audit_chain(m);
            audit_iteration(m);
        }

        for m in &fleet {
            audit_chain(m);
            audit_iteration(m);
        }
    }
}
