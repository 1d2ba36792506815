//! In-process metrics registry.
//!
//! [`MemoryRegistry`] keeps registered groups in a label-keyed map and hands
//! out [`AtomicCounterGroup`]s, one `AtomicU64` per declared counter. It is
//! the registry used by tests, benches and the demo, and a reasonable default
//! for processes whose exporter scrapes groups through [`MemoryRegistry::group`].
//!
//! ```text
//!   build(schema, "bucket-a") ──► Arc<AtomicCounterGroup> (unregistered)
//!   register(group)           ──► groups["bucket-a"] = group
//!   unregister(group)         ──► groups.remove("bucket-a") if same group
//! ```
//!
//! Registration is strict: a second group under a live label is rejected with
//! [`RegistryError::AlreadyRegistered`]. Unregistration is idempotent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::RegistryError;
use crate::schema::CounterSchema;
use crate::traits::{CounterGroup, MetricsRegistry};

/// Counter group storing one relaxed atomic per declared slot.
///
/// Out-of-range slots are ignored and read as zero. Decrements saturate at
/// zero rather than wrapping.
#[derive(Debug)]
pub struct AtomicCounterGroup {
    label: Arc<str>,
    schema: CounterSchema,
    values: Box<[AtomicU64]>,
}

impl AtomicCounterGroup {
    pub fn new(schema: &CounterSchema, label: impl Into<Arc<str>>) -> Self {
        Self {
            label: label.into(),
            schema: *schema,
            values: (0..schema.len()).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn schema(&self) -> &CounterSchema {
        &self.schema
    }

    /// `(counter name, value)` pairs in slot order.
    pub fn values(&self) -> Vec<(&'static str, u64)> {
        self.schema
            .iter()
            .zip(self.values.iter())
            .map(|(spec, value)| (spec.name, value.load(Ordering::Relaxed)))
            .collect()
    }
}

impl CounterGroup for AtomicCounterGroup {
    fn label(&self) -> &str {
        &self.label
    }

    fn inc(&self, slot: usize, amount: u64) {
        if let Some(value) = self.values.get(slot) {
            value.fetch_add(amount, Ordering::Relaxed);
        }
    }

    fn dec(&self, slot: usize, amount: u64) {
        if let Some(value) = self.values.get(slot) {
            let _ = value.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(amount))
            });
        }
    }

    fn set(&self, slot: usize, new_value: u64) {
        if let Some(value) = self.values.get(slot) {
            value.store(new_value, Ordering::Relaxed);
        }
    }

    fn get(&self, slot: usize) -> u64 {
        self.values
            .get(slot)
            .map_or(0, |value| value.load(Ordering::Relaxed))
    }
}

/// Lifetime totals of registry calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub built: usize,
    pub registered: usize,
    pub unregistered: usize,
}

#[derive(Debug, Default)]
pub struct MemoryRegistry {
    groups: Mutex<FxHashMap<Arc<str>, Arc<AtomicCounterGroup>>>,
    built: AtomicUsize,
    registered: AtomicUsize,
    unregistered: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered group for `label`.
    pub fn group(&self, label: &str) -> Option<Arc<AtomicCounterGroup>> {
        self.groups.lock().get(label).cloned()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.groups.lock().contains_key(label)
    }

    /// Number of currently registered groups.
    pub fn len(&self) -> usize {
        self.groups.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.lock().is_empty()
    }

    /// Registered labels, sorted.
    pub fn labels(&self) -> Vec<Arc<str>> {
        let mut labels: Vec<_> = self.groups.lock().keys().cloned().collect();
        labels.sort();
        labels
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            built: self.built.load(Ordering::Relaxed),
            registered: self.registered.load(Ordering::Relaxed),
            unregistered: self.unregistered.load(Ordering::Relaxed),
        }
    }
}

impl MetricsRegistry for MemoryRegistry {
    type Group = Arc<AtomicCounterGroup>;

    fn build(&self, schema: &CounterSchema, label: &str) -> Result<Self::Group, RegistryError> {
        if schema.is_empty() {
            return Err(RegistryError::Build {
                label: label.to_owned(),
                reason: format!("schema `{}` declares no counters", schema.name()),
            });
        }
        self.built.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(AtomicCounterGroup::new(schema, label)))
    }

    fn register(&self, group: &Self::Group) -> Result<(), RegistryError> {
        let mut groups = self.groups.lock();
        if groups.contains_key(group.label()) {
            return Err(RegistryError::AlreadyRegistered {
                label: group.label().to_owned(),
            });
        }
        groups.insert(Arc::clone(&group.label), Arc::clone(group));
        self.registered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn unregister(&self, group: &Self::Group) -> Result<(), RegistryError> {
        let mut groups = self.groups.lock();
        let registered = groups
            .get(group.label())
            .is_some_and(|current| Arc::ptr_eq(current, group));
        if registered {
            groups.remove(group.label());
            self.unregistered.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Counter, REQUEST_STATS};

    #[test]
    fn group_slots_are_independent() {
        let group = AtomicCounterGroup::new(&REQUEST_STATS, "bucket");
        group.inc(Counter::Requests.index(), 3);
        group.inc(Counter::PutBytes.index(), 4096);
        group.set(Counter::GetBytes.index(), 7);
        group.dec(Counter::Requests.index(), 1);

        assert_eq!(group.get(Counter::Requests.index()), 2);
        assert_eq!(group.get(Counter::FailedRequests.index()), 0);
        assert_eq!(
            group.values(),
            vec![("req", 2), ("failed_req", 0), ("put_b", 4096), ("get_b", 7)]
        );
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let group = AtomicCounterGroup::new(&REQUEST_STATS, "bucket");
        group.inc(99, 1);
        group.set(4, 1);
        group.dec(usize::MAX, 1);
        assert_eq!(group.get(99), 0);
        assert!(group.values().iter().all(|(_, v)| *v == 0));
    }

    #[test]
    fn decrement_saturates_at_zero() {
        let group = AtomicCounterGroup::new(&REQUEST_STATS, "bucket");
        group.inc(0, 2);
        group.dec(0, 5);
        assert_eq!(group.get(0), 0);
    }

    #[test]
    fn register_rejects_duplicate_labels() {
        let registry = MemoryRegistry::new();
        let first = registry.build(&REQUEST_STATS, "tenant").unwrap();
        let second = registry.build(&REQUEST_STATS, "tenant").unwrap();

        registry.register(&first).unwrap();
        assert_eq!(
            registry.register(&second),
            Err(RegistryError::AlreadyRegistered {
                label: "tenant".into()
            })
        );
        assert!(Arc::ptr_eq(&registry.group("tenant").unwrap(), &first));
        assert_eq!(
            registry.stats(),
            RegistryStats {
                built: 2,
                registered: 1,
                unregistered: 0
            }
        );
    }

    #[test]
    fn unregister_is_idempotent_and_identity_checked() {
        let registry = MemoryRegistry::new();
        let live = registry.build(&REQUEST_STATS, "tenant").unwrap();
        let stranger = registry.build(&REQUEST_STATS, "tenant").unwrap();
        registry.register(&live).unwrap();

        // A different group under the same label does not remove the live one.
        registry.unregister(&stranger).unwrap();
        assert!(registry.contains("tenant"));

        registry.unregister(&live).unwrap();
        registry.unregister(&live).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.stats().unregistered, 1);
    }

    #[test]
    fn empty_schema_fails_to_build() {
        static EMPTY: CounterSchema = CounterSchema::new("empty", &[]);
        let registry = MemoryRegistry::new();
        let err = registry.build(&EMPTY, "x").unwrap_err();
        assert!(matches!(err, RegistryError::Build { .. }));
        assert_eq!(registry.stats().built, 0);
    }

    #[test]
    fn labels_are_sorted() {
        let registry = MemoryRegistry::new();
        for label in ["c", "a", "b"] {
            let group = registry.build(&REQUEST_STATS, label).unwrap();
            registry.register(&group).unwrap();
        }
        let labels: Vec<String> = registry.labels().iter().map(|l| l.to_string()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
        assert_eq!(registry.len(), 3);
    }
}
