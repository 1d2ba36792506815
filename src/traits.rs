//! # Registry Capability Traits
//!
//! The cache never talks to a global metrics backend. It is handed a
//! [`MetricsRegistry`] at construction and only ever calls three operations
//! on it:
//!
//! ```text
//!   get_or_create(label) miss ──► build(schema, label) ──► register(group)
//!                                                              │
//!   eviction / remove / clear / drop ─────────────────► unregister(group)
//! ```
//!
//! The group type is opaque to the cache apart from the forwarding surface in
//! [`CounterGroup`].
//!
//! ## Contracts
//!
//! | Operation    | Contract                                                  |
//! |--------------|-----------------------------------------------------------|
//! | `build`      | returns a fresh, unregistered group labeled `label`       |
//! | `register`   | makes the group visible to the exporter                   |
//! | `unregister` | idempotent; unknown groups are `Ok(())`                   |
//!
//! The cache guarantees `register` is called at most once per live label and
//! that every registered group is eventually passed to `unregister`.

use std::sync::Arc;

use crate::error::RegistryError;
use crate::schema::CounterSchema;

/// A fixed-schema set of counters addressed by slot index.
///
/// Implementations decide how out-of-range slots are handled; the forwarding
/// layer performs no validation of its own.
pub trait CounterGroup: Send + Sync {
    /// Label the group was built for.
    fn label(&self) -> &str;

    /// Adds `amount` to `slot`.
    fn inc(&self, slot: usize, amount: u64);

    /// Subtracts `amount` from `slot`.
    fn dec(&self, slot: usize, amount: u64);

    /// Overwrites `slot` with `value`.
    fn set(&self, slot: usize, value: u64);

    /// Current value of `slot`.
    fn get(&self, slot: usize) -> u64;
}

impl<G: CounterGroup + ?Sized> CounterGroup for Arc<G> {
    #[inline]
    fn label(&self) -> &str {
        (**self).label()
    }

    #[inline]
    fn inc(&self, slot: usize, amount: u64) {
        (**self).inc(slot, amount)
    }

    #[inline]
    fn dec(&self, slot: usize, amount: u64) {
        (**self).dec(slot, amount)
    }

    #[inline]
    fn set(&self, slot: usize, value: u64) {
        (**self).set(slot, value)
    }

    #[inline]
    fn get(&self, slot: usize) -> u64 {
        (**self).get(slot)
    }
}

/// Process-wide collector that counter groups are registered into.
pub trait MetricsRegistry: Send + Sync {
    type Group: CounterGroup;

    /// Builds an unregistered group declaring `schema`, labeled `label`.
    fn build(&self, schema: &CounterSchema, label: &str) -> Result<Self::Group, RegistryError>;

    /// Publishes `group` to the exporter.
    fn register(&self, group: &Self::Group) -> Result<(), RegistryError>;

    /// Withdraws `group`; must succeed for groups that are not registered.
    fn unregister(&self, group: &Self::Group) -> Result<(), RegistryError>;
}

impl<R: MetricsRegistry + ?Sized> MetricsRegistry for Arc<R> {
    type Group = R::Group;

    #[inline]
    fn build(&self, schema: &CounterSchema, label: &str) -> Result<Self::Group, RegistryError> {
        (**self).build(schema, label)
    }

    #[inline]
    fn register(&self, group: &Self::Group) -> Result<(), RegistryError> {
        (**self).register(group)
    }

    #[inline]
    fn unregister(&self, group: &Self::Group) -> Result<(), RegistryError> {
        (**self).unregister(group)
    }
}
