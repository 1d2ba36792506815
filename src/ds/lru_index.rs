//! Bounded key → value index with least-recently-used eviction.
//!
//! `LruIndex` owns capacity, promotion and eviction for a keyed collection
//! and knows nothing about what the values are. It is single-threaded; the
//! label cache wraps it in a mutex.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                         LruIndex<K, V>                           │
//!   │                                                                  │
//!   │   FxHashMap<K, SlotId>              IntrusiveList<(K, V)>        │
//!   │   ┌─────────┬────────┐                                           │
//!   │   │ "a"     │ id_3 ──┼──────┐   head ─► [id_1] ◄─► [id_2] ◄─►    │
//!   │   │ "b"     │ id_1 ──┼──┐   │           (MRU)                    │
//!   │   │ "c"     │ id_2 ──┼──┘   └──────────► [id_3] ◄── tail (LRU)   │
//!   │   └─────────┴────────┘                                           │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Method          | Complexity | Recency effect                    |
//! |-----------------|------------|-----------------------------------|
//! | `get`           | O(1)       | promotes to MRU                   |
//! | `peek`          | O(1)       | none                              |
//! | `insert`        | O(1)       | new/updated key becomes MRU       |
//! | `remove`        | O(1)       | n/a                               |
//! | `pop_lru`       | O(1)       | n/a                               |
//! | `recency_rank`  | O(n)       | none                              |
//!
//! `insert` returns whatever it displaced: the evicted LRU pair when the
//! index was full, the previous value when the key was already present, or
//! the rejected pair itself when capacity is zero.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::intrusive_list::IntrusiveList;
use crate::ds::slot_arena::SlotId;
use crate::error::InvariantError;

pub struct LruIndex<K, V> {
    map: FxHashMap<K, SlotId>,
    order: IntrusiveList<(K, V)>,
    capacity: usize,
}

impl<K, V> LruIndex<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an index holding at most `capacity` keys.
    ///
    /// # Example
    ///
    /// ```
    /// use counterkit::ds::LruIndex;
    ///
    /// let mut index: LruIndex<&str, u32> = LruIndex::new(2);
    /// index.insert("a", 1);
    /// index.insert("b", 2);
    /// assert_eq!(index.insert("c", 3), Some(("a", 1)));
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self::with_index_capacity(capacity, capacity)
    }

    /// Like [`new`](Self::new), pre-sizing storage for `index_capacity` keys.
    pub fn with_index_capacity(capacity: usize, index_capacity: usize) -> Self {
        Self {
            map: FxHashMap::with_capacity_and_hasher(index_capacity, Default::default()),
            order: IntrusiveList::with_capacity(index_capacity),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Looks up `key` and promotes it to most-recently-used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.map.get(key)?;
        self.order.move_to_front(id);
        self.order.get(id).map(|(_, value)| value)
    }

    /// Looks up `key` without touching recency order.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.map.get(key)?;
        self.order.get(id).map(|(_, value)| value)
    }

    /// Inserts `key` at most-recently-used and returns the displaced pair.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&id) = self.map.get(&key) {
            self.order.move_to_front(id);
            let (_, slot_value) = self.order.get_mut(id)?;
            let previous = std::mem::replace(slot_value, value);
            return Some((key, previous));
        }

        if self.capacity == 0 {
            return Some((key, value));
        }

        let evicted = if self.map.len() >= self.capacity {
            self.pop_lru()
        } else {
            None
        };

        let id = self.order.push_front((key.clone(), value));
        self.map.insert(key, id);

        #[cfg(debug_assertions)]
        self.debug_validate_invariants();

        evicted
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = self.map.remove(key)?;
        self.order.remove(id).map(|(_, value)| value)
    }

    /// Removes `key` only when `predicate` accepts its current value.
    pub fn remove_if<Q>(&mut self, key: &Q, predicate: impl FnOnce(&V) -> bool) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.map.get(key)?;
        let (_, value) = self.order.get(id)?;
        if !predicate(value) {
            return None;
        }
        self.map.remove(key);
        self.order.remove(id).map(|(_, value)| value)
    }

    /// Removes and returns the least-recently-used pair.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let (key, value) = self.order.pop_back()?;
        self.map.remove(&key);
        Some((key, value))
    }

    /// Least-recently-used pair, without removing it.
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        self.order.back().map(|(key, value)| (key, value))
    }

    /// Position of `key` in recency order (0 = MRU).
    pub fn recency_rank<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let target = *self.map.get(key)?;
        self.order
            .iter_entries()
            .position(|(id, _)| id == target)
    }

    /// Iterates pairs from MRU to LRU.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order.iter().map(|(key, value)| (key, value))
    }

    /// Removes every pair, returned in LRU-first order.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        let mut drained = Vec::with_capacity(self.len());
        while let Some(pair) = self.order.pop_back() {
            drained.push(pair);
        }
        self.map.clear();
        drained
    }

    /// Verifies that the hash index and the recency list agree.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.map.len() != self.order.len() {
            return Err(InvariantError::new(format!(
                "index holds {} keys but recency list holds {} nodes",
                self.map.len(),
                self.order.len()
            )));
        }
        if self.map.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "{} resident keys exceed capacity {}",
                self.map.len(),
                self.capacity
            )));
        }
        for (id, (key, _)) in self.order.iter_entries() {
            match self.map.get(key) {
                Some(&mapped) if mapped == id => {},
                Some(_) => {
                    return Err(InvariantError::new(
                        "index maps a key to a different list node",
                    ));
                },
                None => {
                    return Err(InvariantError::new("list node key missing from index"));
                },
            }
        }
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.order.debug_validate_invariants();
        if let Err(err) = self.check_invariants() {
            panic!("LruIndex invariant violated: {}", err);
        }
    }
}

impl<K, V> fmt::Debug for LruIndex<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruIndex")
            .field("len", &self.map.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
