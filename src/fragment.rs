//! Fragment: one node of the copy-on-write chain.
//!
//! A fragment records the edits made on top of its parent: local bindings,
//! tombstones for keys deleted relative to ancestors, and the cached size of
//! the logical view rooted at it. Fragments are passive; `CowHashMap` is
//! responsible for never mutating a fragment that is shared.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::{HashMap, HashSet};
use std::sync::Arc;

pub(crate) struct Fragment<K, V, S> {
    pub(crate) locals: HashMap<K, V, S>,
    pub(crate) tombstones: HashSet<K, S>,
    pub(crate) parent: Option<Arc<Fragment<K, V, S>>>,
    pub(crate) size: usize,
}

impl<K, V, S> Fragment<K, V, S>
where
    S: BuildHasher + Clone,
{
    pub(crate) fn root(hasher: S) -> Self {
        Self {
            locals: HashMap::with_hasher(hasher.clone()),
            tombstones: HashSet::with_hasher(hasher),
            parent: None,
            size: 0,
        }
    }

    /// A fresh empty fragment chained over `parent`, inheriting its size.
    /// This is the fragment minted by prepare-for-edit.
    pub(crate) fn child(parent: Arc<Self>) -> Self {
        let hasher = parent.locals.hasher().clone();
        Self {
            locals: HashMap::with_hasher(hasher.clone()),
            tombstones: HashSet::with_hasher(hasher),
            size: parent.size,
            parent: Some(parent),
        }
    }
}

impl<K, V, S> Fragment<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// A root fragment populated from `entries`. Later duplicates overwrite
    /// earlier ones.
    pub(crate) fn from_entries<I>(entries: I, hasher: S) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        S: Clone,
    {
        let mut locals = HashMap::with_hasher(hasher.clone());
        for (k, v) in entries {
            locals.insert(k, v);
        }
        let size = locals.len();
        Self {
            locals,
            tombstones: HashSet::with_hasher(hasher),
            parent: None,
            size,
        }
    }

    /// Resolves `k` by walking the chain from `frag` toward the root: a local
    /// binding wins, a tombstone ends the walk as absent, otherwise the
    /// parent is consulted.
    pub(crate) fn lookup<'a, Q>(mut frag: Option<&'a Self>, k: &Q) -> Option<(&'a K, &'a V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        while let Some(f) = frag {
            if let Some(entry) = f.locals.get_key_value(k) {
                return Some(entry);
            }
            if f.tombstones.contains(k) {
                return None;
            }
            frag = f.parent.as_deref();
        }
        None
    }

    pub(crate) fn resolves<Q>(frag: Option<&Self>, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        Self::lookup(frag, k).is_some()
    }
}
