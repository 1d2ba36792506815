//! # Label-Keyed Counter Group Cache
//!
//! A bounded LRU cache mapping a label (tenant, bucket, ...) to a lazily
//! created, registry-registered counter group. The number of resident labels
//! never exceeds the configured capacity; the least-recently-used label is
//! torn down (unregistered) to make room for a new one.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                          LabelCache<R>                               │
//!   │                                                                      │
//!   │   registry: Arc<R>  ── build / register / unregister                 │
//!   │                                                                      │
//!   │   ┌──────────────────────────────────────────────────────────────┐   │
//!   │   │  Mutex<CacheState>                                           │   │
//!   │   │                                                              │   │
//!   │   │  index:    LruIndex<Label, Arc<Entry<G>>>                    │   │
//!   │   │  head ─► [bucket-c] ◄─► [bucket-a] ◄─► [bucket-b] ◄─ tail    │   │
//!   │   │           (MRU)                          (LRU)               │   │
//!   │   │                                                              │   │
//!   │   │  pending:  FxHashMap<Label, Arc<Entry<G>>>  (group being     │   │
//!   │   │            built and registered, not yet in the LRU order)   │   │
//!   │   │  retiring: FxHashMap<Label, Arc<Entry<G>>>  (unlinked,       │   │
//!   │   │            group not yet unregistered)                       │   │
//!   │   └──────────────────────────────────────────────────────────────┘   │
//!   │                                                                      │
//!   │   Entry<G>: label + OnceLock<G> + lifecycle lock + retired flag      │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## get_or_create Flow
//!
//! ```text
//!   1. lock state
//!        resident ──► promote, clone Arc<Entry>
//!        pending  ──► clone the in-flight Arc<Entry>
//!        miss     ──► park a new pending entry in `pending`
//!      unlock state
//!   2. entry.initialize()                                [entry lock only]
//!        Err     ──► drop the entry from `pending`, return error
//!        Retired ──► another caller's creation failed, yield and go to 1
//!   3. lock state
//!        still pending ──► insert at MRU, take evicted LRU entry
//!        resident      ──► promote
//!      unlock state
//!   4. retire evicted entry (unregister its group)      [no state lock]
//! ```
//!
//! Concurrent callers for the same label all find the same pending entry and
//! queue on its lifecycle lock, so exactly one of them builds and registers
//! the group. A pending entry never sits in the LRU order, so it can never be
//! chosen as a victim. Eviction only ever retires live entries and never
//! waits on another label's registry call. The victim is picked only once the
//! new group is registered; a failed creation leaves the resident labels
//! untouched. While creations are in flight the registry may briefly hold
//! more groups than the capacity.
//!
//! Entries unlinked from the index stay in a `retiring` map until their group
//! is unregistered. A pending entry created for a label that is still
//! retiring takes the old entry as its predecessor and retires it before
//! registering, so the registry never sees two groups for one label.
//!
//! ## Forwarding
//!
//! `increment`, `decrement`, `set` and `read` look the label up with `get`
//! (promoting it), and forward to the group outside the index lock. A label
//! that is absent, or whose group is still being created, is a silent no-op;
//! `read` returns 0.
//!
//! ## Example Usage
//!
//! ```
//! use counterkit::cache::LabelCache;
//! use counterkit::registry::MemoryRegistry;
//! use counterkit::schema::Counter;
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(MemoryRegistry::new());
//! let cache = LabelCache::new(Arc::clone(&registry), NonZeroUsize::new(2).unwrap());
//!
//! cache.add("a").unwrap();
//! cache.add("b").unwrap();
//! cache.add("c").unwrap(); // evicts "a"
//!
//! assert!(cache.get("a").is_none());
//! assert!(!registry.contains("a"));
//!
//! cache.increment("b", Counter::Requests.index(), 1);
//! assert_eq!(cache.read("b", Counter::Requests.index()), 1);
//! ```

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::builder::LabelCacheConfig;
use crate::ds::LruIndex;
use crate::entry::{Entry, EntryRef, Initialized, Label};
use crate::error::{ConfigError, CreateError, InvariantError};
#[cfg(feature = "metrics")]
use crate::metrics::{
    LabelCacheMetrics, LabelCacheMetricsRecorder, LabelCacheMetricsSnapshot, MetricsReset,
    MetricsSnapshotProvider,
};
use crate::schema::REQUEST_STATS;
use crate::traits::{CounterGroup, MetricsRegistry};

struct CacheState<G> {
    // Live entries only.
    index: LruIndex<Label, Arc<Entry<G>>>,
    // Entries whose group is being created; at most one per label.
    pending: FxHashMap<Label, Arc<Entry<G>>>,
    // Unlinked entries whose group may still be registered.
    retiring: FxHashMap<Label, Arc<Entry<G>>>,
}

impl<G> CacheState<G> {
    fn unlinked(&mut self, entry: &Arc<Entry<G>>) {
        self.retiring
            .insert(Arc::clone(entry.label_arc()), Arc::clone(entry));
    }
}

/// Where [`LabelCache::reserve`] found or put the entry for a label.
enum Reservation<G> {
    Resident(Arc<Entry<G>>),
    Pending(Arc<Entry<G>>),
}

pub struct LabelCache<R>
where
    R: MetricsRegistry,
{
    registry: Arc<R>,
    state: Mutex<CacheState<R::Group>>,
    capacity: NonZeroUsize,
    #[cfg(feature = "metrics")]
    metrics: LabelCacheMetrics,
}

impl<R> LabelCache<R>
where
    R: MetricsRegistry,
{
    /// Creates a cache holding at most `capacity` labels.
    pub fn new(registry: Arc<R>, capacity: NonZeroUsize) -> Self {
        Self::with_config(registry, LabelCacheConfig::new(capacity))
    }

    /// Fallible constructor for user-supplied capacities.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `capacity` is zero.
    pub fn try_new(registry: Arc<R>, capacity: usize) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| ConfigError::new("label cache capacity must be > 0"))?;
        Ok(Self::new(registry, capacity))
    }

    pub fn with_config(registry: Arc<R>, config: LabelCacheConfig) -> Self {
        let capacity = config.capacity();
        Self {
            registry,
            state: Mutex::new(CacheState {
                index: LruIndex::with_index_capacity(capacity.get(), config.index_capacity()),
                pending: FxHashMap::default(),
                retiring: FxHashMap::default(),
            }),
            capacity,
            #[cfg(feature = "metrics")]
            metrics: LabelCacheMetrics::new(),
        }
    }

    /// Returns the entry for `label`, creating and registering its counter
    /// group on a miss.
    ///
    /// The returned entry always carries a group. At most one group is ever
    /// registered per resident label, however many callers race on it.
    ///
    /// # Errors
    ///
    /// Returns [`CreateError`] if the registry fails to build or register the
    /// group. No entry for `label` is left behind.
    pub fn get_or_create(&self, label: &str) -> Result<EntryRef<R::Group>, CreateError> {
        #[cfg(feature = "metrics")]
        self.metrics.record_create_call();

        loop {
            let entry = match self.reserve(label) {
                Reservation::Resident(entry) => {
                    #[cfg(feature = "metrics")]
                    self.metrics.record_create_hit();
                    return Ok(EntryRef::new(entry));
                },
                Reservation::Pending(entry) => entry,
            };

            match entry.initialize(&*self.registry, &REQUEST_STATS) {
                Ok(Initialized::Created) => {
                    debug!(label, "created counter group");
                    self.install(&entry);
                    #[cfg(feature = "metrics")]
                    self.metrics.record_create_new();
                    return Ok(EntryRef::new(entry));
                },
                Ok(Initialized::Existing) => {
                    self.install(&entry);
                    #[cfg(feature = "metrics")]
                    self.metrics.record_create_hit();
                    return Ok(EntryRef::new(entry));
                },
                Ok(Initialized::Retired) => {
                    trace!(label, "concurrent creation failed, retrying");
                    #[cfg(feature = "metrics")]
                    self.metrics.record_create_retry();
                    // Let the failed creator discard its entry first.
                    std::thread::yield_now();
                },
                Err(err) => {
                    self.discard(&entry);
                    warn!(label, error = %err, "counter group creation failed");
                    #[cfg(feature = "metrics")]
                    self.metrics.record_create_failure();
                    return Err(err);
                },
            }
        }
    }

    /// Ensures a counter group exists for `label`.
    pub fn add(&self, label: &str) -> Result<(), CreateError> {
        self.get_or_create(label).map(|_| ())
    }

    /// Returns the entry for `label` if resident, promoting it to MRU.
    ///
    /// Never creates. A label whose group is still being created is not
    /// resident yet.
    pub fn get(&self, label: &str) -> Option<EntryRef<R::Group>> {
        let found = {
            let mut state = self.state.lock();
            state.index.get(label).map(Arc::clone)
        };

        #[cfg(feature = "metrics")]
        if found.is_some() {
            self.metrics.record_get_hit();
        } else {
            self.metrics.record_get_miss();
        }

        found.map(EntryRef::new)
    }

    /// Like [`get`](Self::get) but leaves recency order untouched.
    pub fn peek(&self, label: &str) -> Option<EntryRef<R::Group>> {
        let state = self.state.lock();
        state
            .index
            .peek(label)
            .map(|entry| EntryRef::new(Arc::clone(entry)))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.state.lock().index.contains(label)
    }

    /// Number of resident labels. Creations still in flight are not counted.
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Resident labels, most recently used first.
    pub fn labels(&self) -> Vec<Label> {
        self.state
            .lock()
            .index
            .iter()
            .map(|(label, _)| Arc::clone(label))
            .collect()
    }

    /// Evicts `label` now, unregistering its group. Returns `false` if the
    /// label was not resident. A creation still in flight is not cancelled.
    pub fn remove(&self, label: &str) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.index.remove(label);
            if let Some(entry) = &removed {
                state.unlinked(entry);
            }
            removed
        };
        match removed {
            Some(entry) => {
                #[cfg(feature = "metrics")]
                self.metrics.record_removal();
                self.release(&entry, "removed");
                true
            },
            None => false,
        }
    }

    /// Evicts every label, unregistering their groups.
    pub fn clear(&self) {
        let drained = {
            let mut state = self.state.lock();
            let drained = state.index.drain();
            for (_, entry) in &drained {
                state.unlinked(entry);
            }
            drained
        };
        for (_, entry) in drained {
            #[cfg(feature = "metrics")]
            self.metrics.record_removal();
            self.release(&entry, "cleared");
        }
    }

    /// Adds `amount` to `slot` of `label`'s group; no-op if not resident.
    pub fn increment(&self, label: &str, slot: usize, amount: u64) {
        self.with_group(label, |group| group.inc(slot, amount));
    }

    /// Subtracts `amount` from `slot` of `label`'s group; no-op if not resident.
    pub fn decrement(&self, label: &str, slot: usize, amount: u64) {
        self.with_group(label, |group| group.dec(slot, amount));
    }

    /// Overwrites `slot` of `label`'s group; no-op if not resident.
    pub fn set(&self, label: &str, slot: usize, value: u64) {
        self.with_group(label, |group| group.set(slot, value));
    }

    /// Reads `slot` of `label`'s group; 0 if not resident.
    pub fn read(&self, label: &str, slot: usize) -> u64 {
        self.with_group(label, |group| group.get(slot))
            .unwrap_or_default()
    }

    /// Verifies index consistency and the capacity bound.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let state = self.state.lock();
        state.index.check_invariants()?;
        if state.index.len() > self.capacity.get() {
            return Err(InvariantError::new(format!(
                "{} resident labels exceed capacity {}",
                state.index.len(),
                self.capacity
            )));
        }
        for (label, entry) in state.index.iter() {
            if **label != *entry.label() {
                return Err(InvariantError::new(format!(
                    "label `{}` indexes the entry for `{}`",
                    label,
                    entry.label()
                )));
            }
            if !entry.is_live() {
                return Err(InvariantError::new(format!(
                    "resident label `{}` has no live group",
                    label
                )));
            }
        }
        for label in state.pending.keys() {
            if state.index.contains(label) {
                return Err(InvariantError::new(format!(
                    "label `{}` is both resident and pending",
                    label
                )));
            }
        }
        for (label, entry) in &state.retiring {
            let resident = state
                .index
                .peek(label)
                .is_some_and(|current| Arc::ptr_eq(current, entry));
            if resident {
                return Err(InvariantError::new(format!(
                    "label `{}` is both resident and retiring",
                    label
                )));
            }
        }
        Ok(())
    }

    fn with_group<T>(&self, label: &str, f: impl FnOnce(&R::Group) -> T) -> Option<T> {
        let entry = self.get(label)?;
        entry.group().map(f)
    }

    /// Finds the resident or in-flight entry for `label`, or parks a new
    /// pending one.
    fn reserve(&self, label: &str) -> Reservation<R::Group> {
        let mut state = self.state.lock();
        if let Some(entry) = state.index.get(label) {
            return Reservation::Resident(Arc::clone(entry));
        }
        if let Some(entry) = state.pending.get(label) {
            if !entry.is_retired() {
                return Reservation::Pending(Arc::clone(entry));
            }
            // Failed, and its creator has not discarded it yet.
            state.pending.remove(label);
        }

        let predecessor = state.retiring.get(label).cloned();
        let entry = Arc::new(Entry::pending(Label::from(label), predecessor));
        state
            .pending
            .insert(Arc::clone(entry.label_arc()), Arc::clone(&entry));
        Reservation::Pending(entry)
    }

    /// Moves a freshly created entry into the LRU order, evicting the LRU
    /// label if full. Promotes it instead if another caller got there first.
    fn install(&self, entry: &Arc<Entry<R::Group>>) {
        let evicted = {
            let mut state = self.state.lock();
            let pending = state
                .pending
                .get(entry.label())
                .is_some_and(|current| Arc::ptr_eq(current, entry));
            if pending {
                state.pending.remove(entry.label());
                let evicted = state
                    .index
                    .insert(Arc::clone(entry.label_arc()), Arc::clone(entry))
                    .map(|(_, evicted)| evicted);
                if let Some(evicted) = &evicted {
                    state.unlinked(evicted);
                }
                evicted
            } else {
                let resident = state
                    .index
                    .peek(entry.label())
                    .is_some_and(|current| Arc::ptr_eq(current, entry));
                if resident {
                    state.index.get(entry.label());
                }
                None
            }
        };

        if let Some(evicted) = evicted {
            #[cfg(feature = "metrics")]
            self.metrics.record_eviction();
            self.release(&evicted, "evicted");
        }
    }

    /// Forgets a failed pending entry, unless it has been replaced already.
    fn discard(&self, entry: &Arc<Entry<R::Group>>) {
        let mut state = self.state.lock();
        let pending = state
            .pending
            .get(entry.label())
            .is_some_and(|current| Arc::ptr_eq(current, entry));
        if pending {
            state.pending.remove(entry.label());
        }
    }

    /// Retires an unlinked entry, then stops tracking it as retiring.
    fn release(&self, entry: &Arc<Entry<R::Group>>, reason: &'static str) {
        self.unregister(entry, reason);
        let mut state = self.state.lock();
        let tracked = state
            .retiring
            .get(entry.label())
            .is_some_and(|retiring| Arc::ptr_eq(retiring, entry));
        if tracked {
            state.retiring.remove(entry.label());
        }
    }

    fn unregister(&self, entry: &Entry<R::Group>, reason: &'static str) {
        match entry.retire(&*self.registry) {
            Ok(true) => debug!(label = entry.label(), reason, "unregistered counter group"),
            Ok(false) => {},
            Err(err) => {
                warn!(
                    label = entry.label(),
                    reason,
                    error = %err,
                    "failed to unregister counter group"
                );
                #[cfg(feature = "metrics")]
                self.metrics.record_unregister_failure();
            },
        }
    }
}

#[cfg(feature = "metrics")]
impl<R> LabelCache<R>
where
    R: MetricsRegistry,
{
    pub fn metrics_snapshot(&self) -> LabelCacheMetricsSnapshot {
        self.metrics.snapshot(self.len(), self.capacity())
    }
}

#[cfg(feature = "metrics")]
impl<R> MetricsSnapshotProvider<LabelCacheMetricsSnapshot> for LabelCache<R>
where
    R: MetricsRegistry,
{
    fn snapshot(&self) -> LabelCacheMetricsSnapshot {
        self.metrics_snapshot()
    }
}

#[cfg(feature = "metrics")]
impl<R> MetricsReset for LabelCache<R>
where
    R: MetricsRegistry,
{
    fn reset_metrics(&self) {
        self.metrics.reset_metrics();
    }
}

impl<R> Drop for LabelCache<R>
where
    R: MetricsRegistry,
{
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let mut drained: Vec<_> = state.index.drain().into_iter().map(|(_, e)| e).collect();
        drained.extend(state.pending.drain().map(|(_, e)| e));
        drained.extend(state.retiring.drain().map(|(_, e)| e));
        for entry in drained {
            self.unregister(&entry, "dropped");
        }
    }
}

impl<R> fmt::Debug for LabelCache<R>
where
    R: MetricsRegistry,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::registry::{AtomicCounterGroup, MemoryRegistry, RegistryStats};
    use crate::schema::{Counter, CounterSchema};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const REQ: usize = Counter::Requests.index();

    fn cache(capacity: usize) -> (Arc<MemoryRegistry>, LabelCache<MemoryRegistry>) {
        let registry = Arc::new(MemoryRegistry::new());
        let cache = LabelCache::try_new(Arc::clone(&registry), capacity).unwrap();
        (registry, cache)
    }

    /// Registry wrapper with switchable build/register/unregister failures.
    #[derive(Default)]
    struct FlakyRegistry {
        inner: MemoryRegistry,
        fail_build: AtomicBool,
        fail_register: AtomicBool,
        fail_unregister: AtomicBool,
        unregister_calls: AtomicUsize,
    }

    impl MetricsRegistry for FlakyRegistry {
        type Group = Arc<AtomicCounterGroup>;

        fn build(
            &self,
            schema: &CounterSchema,
            label: &str,
        ) -> Result<Self::Group, RegistryError> {
            if self.fail_build.load(Ordering::SeqCst) {
                return Err(RegistryError::Build {
                    label: label.into(),
                    reason: "injected".into(),
                });
            }
            self.inner.build(schema, label)
        }

        fn register(&self, group: &Self::Group) -> Result<(), RegistryError> {
            if self.fail_register.load(Ordering::SeqCst) {
                return Err(RegistryError::Unavailable("injected".into()));
            }
            self.inner.register(group)
        }

        fn unregister(&self, group: &Self::Group) -> Result<(), RegistryError> {
            self.unregister_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_unregister.load(Ordering::SeqCst) {
                return Err(RegistryError::Unavailable("injected".into()));
            }
            self.inner.unregister(group)
        }
    }

    // ==============================================
    // CORRECTNESS TESTS MODULE
    // ==============================================
    mod correctness {
        use super::*;

        #[test]
        fn zero_capacity_is_a_config_error() {
            let registry = Arc::new(MemoryRegistry::new());
            let err = LabelCache::try_new(registry, 0).unwrap_err();
            assert!(err.message().contains("capacity"));
        }

        #[test]
        fn get_or_create_returns_same_entry_until_evicted() {
            let (registry, cache) = cache(4);
            let first = cache.get_or_create("a").unwrap();
            let second = cache.get_or_create("a").unwrap();
            let looked_up = cache.get("a").unwrap();

            assert!(first.ptr_eq(&second));
            assert!(first.ptr_eq(&looked_up));
            assert!(first.is_live());
            assert_eq!(registry.stats().registered, 1);
            assert!(Arc::ptr_eq(
                first.group().unwrap(),
                &registry.group("a").unwrap()
            ));
        }

        #[test]
        fn overflow_evicts_lru_and_unregisters() {
            let (registry, cache) = cache(2);
            cache.add("a").unwrap();
            cache.add("b").unwrap();
            cache.add("c").unwrap();

            assert!(cache.get("a").is_none());
            assert!(cache.contains("b"));
            assert!(cache.contains("c"));
            assert_eq!(cache.len(), 2);
            assert_eq!(
                registry.labels(),
                vec![Label::from("b"), Label::from("c")]
            );
            assert_eq!(registry.stats().unregistered, 1);
        }

        #[test]
        fn get_promotes_and_changes_next_victim() {
            let (_registry, cache) = cache(2);
            cache.add("a").unwrap();
            cache.add("b").unwrap();
            assert!(cache.get("a").is_some());
            cache.add("c").unwrap();

            assert!(cache.contains("a"));
            assert!(!cache.contains("b"));
            assert_eq!(cache.labels(), vec![Label::from("c"), Label::from("a")]);
        }

        #[test]
        fn peek_does_not_promote() {
            let (_registry, cache) = cache(2);
            cache.add("a").unwrap();
            cache.add("b").unwrap();
            assert!(cache.peek("a").is_some());
            cache.add("c").unwrap();
            assert!(!cache.contains("a"));
        }

        #[test]
        fn forwarding_ops_reach_the_group() {
            let (_registry, cache) = cache(4);
            cache.add("b").unwrap();

            cache.increment("b", REQ, 5);
            cache.decrement("b", REQ, 2);
            assert_eq!(cache.read("b", REQ), 3);

            cache.set("b", Counter::PutBytes.index(), 1024);
            assert_eq!(cache.read("b", Counter::PutBytes.index()), 1024);
        }

        #[test]
        fn forwarding_on_absent_label_is_a_noop() {
            let (registry, cache) = cache(4);
            cache.increment("ghost", REQ, 1);
            cache.decrement("ghost", REQ, 1);
            cache.set("ghost", REQ, 9);
            assert_eq!(cache.read("ghost", REQ), 0);

            assert!(cache.is_empty());
            assert_eq!(registry.stats(), RegistryStats::default());
        }

        #[test]
        fn remove_and_clear_unregister_groups() {
            let (registry, cache) = cache(4);
            for label in ["a", "b", "c"] {
                cache.add(label).unwrap();
            }

            assert!(cache.remove("a"));
            assert!(!cache.remove("a"));
            assert!(!registry.contains("a"));

            cache.clear();
            assert!(cache.is_empty());
            assert!(registry.is_empty());
            assert_eq!(registry.stats().unregistered, 3);
        }

        #[test]
        fn drop_unregisters_every_resident_group() {
            let registry = Arc::new(MemoryRegistry::new());
            {
                let cache = LabelCache::try_new(Arc::clone(&registry), 8).unwrap();
                for label in ["x", "y", "z"] {
                    cache.add(label).unwrap();
                }
                assert_eq!(registry.len(), 3);
            }
            assert!(registry.is_empty());
            assert_eq!(registry.stats().unregistered, 3);
        }

        #[test]
        fn retained_entry_ref_outlives_eviction() {
            let (registry, cache) = cache(1);
            let a = cache.get_or_create("a").unwrap();
            cache.add("b").unwrap();

            assert!(a.is_retired());
            assert!(!a.is_live());
            // The handle still works; the group is simply no longer exported.
            a.group().unwrap().inc(REQ, 1);
            assert!(!registry.contains("a"));
        }

        #[test]
        fn invariants_hold_after_churn() {
            let (_registry, cache) = cache(3);
            for i in 0..20 {
                cache.add(&format!("label-{}", i % 7)).unwrap();
                if i % 3 == 0 {
                    cache.get(&format!("label-{}", i % 5));
                }
                cache.check_invariants().unwrap();
                assert!(cache.len() <= 3);
            }
        }
    }

    // ==============================================
    // FAILURE HANDLING TESTS MODULE
    // ==============================================
    mod failures {
        use super::*;

        fn flaky(capacity: usize) -> (Arc<FlakyRegistry>, LabelCache<FlakyRegistry>) {
            let registry = Arc::new(FlakyRegistry::default());
            let cache = LabelCache::try_new(Arc::clone(&registry), capacity).unwrap();
            (registry, cache)
        }

        #[test]
        fn build_failure_leaves_no_entry() {
            let (registry, cache) = flaky(2);
            registry.fail_build.store(true, Ordering::SeqCst);

            let err = cache.get_or_create("a").unwrap_err();
            assert!(matches!(err, CreateError::Build { .. }));
            assert_eq!(err.label(), "a");
            assert!(!cache.contains("a"));
            assert!(cache.is_empty());
            cache.check_invariants().unwrap();

            registry.fail_build.store(false, Ordering::SeqCst);
            assert!(cache.get_or_create("a").unwrap().is_live());
        }

        #[test]
        fn register_failure_rolls_back() {
            let (registry, cache) = flaky(2);
            registry.fail_register.store(true, Ordering::SeqCst);

            let err = cache.get_or_create("a").unwrap_err();
            assert!(matches!(err, CreateError::Register { .. }));
            assert!(cache.get("a").is_none());
            assert!(registry.inner.is_empty());
            assert_eq!(registry.inner.stats().registered, 0);
        }

        #[test]
        fn failed_create_keeps_resident_labels_and_counts() {
            let (registry, cache) = flaky(1);
            cache.add("a").unwrap();
            cache.increment("a", REQ, 7);
            registry.fail_build.store(true, Ordering::SeqCst);

            assert!(cache.get_or_create("b").is_err());
            assert!(cache.contains("a"));
            assert!(!cache.contains("b"));
            assert_eq!(cache.read("a", REQ), 7);
            assert_eq!(cache.len(), 1);
            assert!(registry.inner.contains("a"));
            assert_eq!(registry.unregister_calls.load(Ordering::SeqCst), 0);
            cache.check_invariants().unwrap();
        }

        #[test]
        fn failed_register_does_not_pick_a_victim() {
            let (registry, cache) = flaky(2);
            cache.add("a").unwrap();
            cache.add("b").unwrap();
            registry.fail_register.store(true, Ordering::SeqCst);

            assert!(cache.get_or_create("c").is_err());
            assert_eq!(cache.labels(), vec![Label::from("b"), Label::from("a")]);
            assert_eq!(registry.inner.labels().len(), 2);

            registry.fail_register.store(false, Ordering::SeqCst);
            cache.add("c").unwrap();
            assert!(!cache.contains("a"));
            assert!(!registry.inner.contains("a"));
        }

        #[test]
        fn remove_after_failed_create_is_not_a_removal() {
            let (registry, cache) = flaky(2);
            registry.fail_build.store(true, Ordering::SeqCst);
            assert!(cache.get_or_create("x").is_err());

            assert!(!cache.remove("x"));
            assert!(!cache.remove("never-seen"));
            assert_eq!(registry.unregister_calls.load(Ordering::SeqCst), 0);

            #[cfg(feature = "metrics")]
            {
                let snap = cache.metrics_snapshot();
                assert_eq!(snap.removals, 0);
                assert_eq!(snap.create_failures, 1);
            }
        }

        #[test]
        fn unregister_failure_still_frees_the_slot() {
            let (registry, cache) = flaky(1);
            cache.add("a").unwrap();
            registry.fail_unregister.store(true, Ordering::SeqCst);

            cache.add("b").unwrap();
            assert!(!cache.contains("a"));
            assert!(cache.contains("b"));
            assert_eq!(cache.len(), 1);
            assert_eq!(registry.unregister_calls.load(Ordering::SeqCst), 1);

            #[cfg(feature = "metrics")]
            assert_eq!(cache.metrics_snapshot().unregister_failures, 1);
        }
    }

    // ==============================================
    // METRICS TESTS MODULE
    // ==============================================
    #[cfg(feature = "metrics")]
    mod metrics {
        use super::*;

        #[test]
        fn snapshot_counts_hits_misses_and_evictions() {
            let (_registry, cache) = cache(2);
            cache.add("a").unwrap();
            cache.add("a").unwrap();
            cache.add("b").unwrap();
            cache.add("c").unwrap();
            cache.get("c");
            cache.get("a");
            cache.read("missing", REQ);

            let snap = cache.snapshot();
            assert_eq!(snap.create_calls, 4);
            assert_eq!(snap.create_new, 3);
            assert_eq!(snap.create_hits, 1);
            assert_eq!(snap.evictions, 1);
            assert_eq!(snap.get_hits, 1);
            assert_eq!(snap.get_misses, 2);
            assert_eq!(snap.resident, 2);
            assert_eq!(snap.capacity, 2);
        }

        #[test]
        fn removals_count_only_resident_labels() {
            let (_registry, cache) = cache(4);
            cache.add("a").unwrap();
            cache.add("b").unwrap();

            assert!(cache.remove("a"));
            assert!(!cache.remove("a"));
            assert!(!cache.remove("ghost"));
            assert_eq!(cache.snapshot().removals, 1);

            cache.clear();
            assert_eq!(cache.snapshot().removals, 2);
        }

        #[test]
        fn reset_keeps_gauges() {
            let (_registry, cache) = cache(4);
            cache.add("a").unwrap();
            cache.get("a");
            cache.reset_metrics();

            let snap = cache.snapshot();
            assert_eq!(snap.create_calls, 0);
            assert_eq!(snap.get_calls, 0);
            assert_eq!(snap.resident, 1);
        }
    }
}
