//! cow-hashmap: a hashmap whose copies are cheap and isolated.
//!
//! [`CowHashMap`] keeps standard mutable-map semantics per handle while
//! making `clone()` O(1): copies share a chain of immutable fragments, and a
//! handle only materializes a private head fragment the first time it writes
//! after being shared (copy-on-write). Deletions against shared ancestors
//! are recorded as tombstones; [`CowHashMap::detach`] collapses the chain
//! back into a single standalone fragment.
//!
//! ```
//! use cow_hashmap::CowHashMap;
//!
//! let a = CowHashMap::from([(1, "one"), (2, "two")]);
//! let mut b = a.clone(); // O(1), shares structure
//! b.insert(3, "three");
//! b.remove(&1);
//! assert_eq!(a.len(), 2);
//! assert!(a.contains_key(&1));
//! assert_eq!(b.len(), 2);
//! assert!(!b.contains_key(&1));
//! ```
//!
//! Uniqueness of the head also powers the `take` family: when a handle is
//! the sole owner of its head, [`CowHashMap::take`] and
//! [`CowHashMap::take_unique`] move a value out without cloning it.

mod fragment;
mod iter;
mod map;

#[cfg(test)]
mod map_proptest;

pub use iter::Iter;
pub use map::{CowHashMap, LookupError};
