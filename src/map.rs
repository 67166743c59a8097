//! CowHashMap: the user-facing handle over a fragment chain.
//!
//! Cloning a handle shares the head fragment (one atomic increment, no data
//! copied). Every mutation first runs prepare-for-edit: if the head is
//! observed shared, a fresh empty fragment is chained over it and becomes
//! the new head, so a shared fragment is never written. `Arc::get_mut` is
//! the uniqueness observation; when it succeeds on this thread, no other
//! handle or fragment can reach the head.

use crate::fragment::Fragment;
use crate::iter::Iter;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::mem;
use core::ops;
use std::collections::hash_map::RandomState;
use std::sync::Arc;

/// A hashmap with cheap value-semantic copies.
///
/// Copies share structure: each handle points at a head fragment whose chain
/// of ancestors holds the bindings inherited from the handles it was copied
/// from. Reads walk the chain; writes land only on a uniquely owned head.
pub struct CowHashMap<K, V, S = RandomState> {
    pub(crate) head: Arc<Fragment<K, V, S>>,
}

/// Error for operations that require the key to be present in the
/// logical view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    KeyNotFound,
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::KeyNotFound => f.write_str("key not found"),
        }
    }
}

impl std::error::Error for LookupError {}

impl<K, V> CowHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V, S> CowHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            head: Arc::new(Fragment::root(hasher)),
        }
    }

    /// Number of keys in the logical view.
    pub fn len(&self) -> usize {
        self.head.size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the ancestor chain above the head; 0 for a standalone map.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frag = self.head.parent.as_deref();
        while let Some(f) = frag {
            depth += 1;
            frag = f.parent.as_deref();
        }
        depth
    }

    /// True iff the head has no parent, i.e. reads never leave the head.
    pub fn is_detached(&self) -> bool {
        self.head.parent.is_none()
    }

    pub fn contains_key<Q>(&self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        Fragment::resolves(Some(&*self.head), k)
    }

    pub fn get<Q>(&self, k: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        Fragment::lookup(Some(&*self.head), k).map(|(_, v)| v)
    }

    /// The stored key and value for `k`, or `None` if `k` is not live.
    pub fn find<Q>(&self, k: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        Fragment::lookup(Some(&*self.head), k)
    }

    /// Inserts `(k, v)` if `k` is not already live. Returns whether the
    /// insertion happened.
    pub fn insert(&mut self, k: K, v: V) -> bool {
        if self.contains_key(&k) {
            return false;
        }
        self.prepare_for_edit();
        let head = self.head_mut();
        head.tombstones.remove(&k);
        head.locals.insert(k, v);
        head.size += 1;
        true
    }

    /// As [`insert`](Self::insert), but the value is built by `make` and only
    /// if the key is absent.
    pub fn insert_with<F>(&mut self, k: K, make: F) -> bool
    where
        F: FnOnce() -> V,
    {
        if self.contains_key(&k) {
            return false;
        }
        self.prepare_for_edit();
        let head = self.head_mut();
        head.tombstones.remove(&k);
        head.locals.insert(k, make());
        head.size += 1;
        true
    }

    /// Binds `k` to `v`, overwriting any previous binding.
    pub fn insert_or_assign(&mut self, k: K, v: V) {
        self.prepare_for_edit();
        let fresh = !self.contains_key(&k);
        let head = self.head_mut();
        if fresh {
            head.size += 1;
        }
        head.tombstones.remove(&k);
        head.locals.insert(k, v);
    }

    /// Removes `k` from the logical view. Returns whether the key was live.
    ///
    /// If an ancestor fragment still binds `k`, a tombstone is recorded in
    /// the head so the ancestor binding stays shadowed.
    pub fn remove<Q>(&mut self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
    {
        if !self.contains_key(k) {
            return false;
        }
        self.prepare_for_edit();
        let head = self.head_mut();
        head.locals.remove(k);
        if Fragment::resolves(head.parent.as_deref(), k) {
            head.tombstones.insert(k.to_owned());
        }
        head.size -= 1;
        true
    }

    /// Resets this handle to an empty standalone map. Other handles sharing
    /// the old head are unaffected, so no prepare-for-edit is needed.
    pub fn clear(&mut self) {
        let hasher = self.head.locals.hasher().clone();
        self.head = Arc::new(Fragment::root(hasher));
    }

    /// Collapses the ancestor chain into the head, preserving the logical
    /// view. Returns `false` if the head already has no parent.
    ///
    /// After a successful detach the map is a single standalone fragment:
    /// reads and iteration no longer walk shared ancestors. Cost is O(n)
    /// over the logical view.
    pub fn detach(&mut self) -> bool
    where
        K: Clone,
        V: Clone,
    {
        if self.head.parent.is_none() {
            return false;
        }
        self.prepare_for_edit();
        let head = self.head_mut();
        let mut ancestor = head.parent.take();
        while let Some(frag) = ancestor {
            for (k, v) in &frag.locals {
                // Nearer bindings and accumulated tombstones shadow this one.
                if !head.tombstones.contains(k) && !head.locals.contains_key(k) {
                    head.locals.insert(k.clone(), v.clone());
                }
            }
            head.tombstones.extend(frag.tombstones.iter().cloned());
            ancestor = frag.parent.clone();
        }
        head.tombstones.clear();
        true
    }

    /// Moves the value for `k` out of the map when the head is uniquely
    /// owned and binds `k` locally; otherwise returns a clone of the
    /// resolved value.
    ///
    /// In the moved-out case the slot is left holding `V::default()` and the
    /// key stays visible; the expected follow-up is an
    /// [`insert_or_assign`](Self::insert_or_assign) of the updated value.
    pub fn take<Q>(&mut self, k: &Q) -> Result<V, LookupError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone + Default,
    {
        if let Some(head) = Arc::get_mut(&mut self.head) {
            if let Some(slot) = head.locals.get_mut(k) {
                return Ok(mem::take(slot));
            }
        }
        match self.get(k) {
            Some(v) => Ok(v.clone()),
            None => Err(LookupError::KeyNotFound),
        }
    }

    /// As [`take`](Self::take), but never clones: when the head is shared or
    /// the binding lives in an ancestor, returns `Ok(None)` so the caller
    /// can tell sharing apart from absence without paying for a copy.
    pub fn take_unique<Q>(&mut self, k: &Q) -> Result<Option<V>, LookupError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Default,
    {
        if !self.contains_key(k) {
            return Err(LookupError::KeyNotFound);
        }
        if let Some(head) = Arc::get_mut(&mut self.head) {
            if let Some(slot) = head.locals.get_mut(k) {
                return Ok(Some(mem::take(slot)));
            }
        }
        Ok(None)
    }

    /// Moves the value for `k` out and removes `k` from the logical view in
    /// one pass. The unique-and-local case moves with no clone and leaves no
    /// moved-from slot behind; otherwise the resolved value is cloned and
    /// the key erased as in [`remove`](Self::remove).
    pub fn take_remove<Q>(&mut self, k: &Q) -> Result<V, LookupError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
        V: Clone,
    {
        if !self.contains_key(k) {
            return Err(LookupError::KeyNotFound);
        }
        if let Some(head) = Arc::get_mut(&mut self.head) {
            if head.locals.contains_key(k) {
                let (key, value) = head
                    .locals
                    .remove_entry(k)
                    .expect("checked contains_key above");
                if Fragment::resolves(head.parent.as_deref(), k) {
                    head.tombstones.insert(key);
                }
                head.size -= 1;
                return Ok(value);
            }
        }
        let value = self.get(k).cloned().expect("liveness checked above");
        self.remove(k);
        Ok(value)
    }

    /// Iterates the logical view; each live key is yielded exactly once, in
    /// unspecified order.
    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter::new(&self.head)
    }

    /// Chains a fresh head over the current one if it is shared. Afterwards
    /// the head is uniquely owned and safe to mutate.
    fn prepare_for_edit(&mut self) {
        if Arc::get_mut(&mut self.head).is_none() {
            let parent = Arc::clone(&self.head);
            self.head = Arc::new(Fragment::child(parent));
        }
    }

    fn head_mut(&mut self) -> &mut Fragment<K, V, S> {
        Arc::get_mut(&mut self.head).expect("head is uniquely owned after prepare_for_edit")
    }
}

impl<K, V, S> Clone for CowHashMap<K, V, S> {
    /// Shares the head fragment; no entry is copied.
    fn clone(&self) -> Self {
        Self {
            head: Arc::clone(&self.head),
        }
    }
}

impl<K, V, S> Default for CowHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for CowHashMap<K, V>
where
    K: Eq + Hash,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<K, V, S> FromIterator<(K, V)> for CowHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    /// Duplicate keys resolve last-write-wins.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            head: Arc::new(Fragment::from_entries(iter, S::default())),
        }
    }
}

impl<K, V, S> Extend<(K, V)> for CowHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert_or_assign(k, v);
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a CowHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, Q, V, S> ops::Index<&Q> for CowHashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher + Clone,
{
    type Output = V;

    fn index(&self, k: &Q) -> &V {
        self.get(k).expect("no entry found for key")
    }
}

impl<K, V, S> fmt::Debug for CowHashMap<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
