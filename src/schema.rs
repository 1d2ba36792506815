//! Fixed counter declaration for per-label request statistics.
//!
//! Every counter group the cache creates is built from [`REQUEST_STATS`]:
//!
//! ```text
//!   slot │ Counter          │ name        │ description
//!   ─────┼──────────────────┼─────────────┼────────────────────
//!     0  │ Requests         │ req         │ number of reqs
//!     1  │ FailedRequests   │ failed_req  │ Aborted Requests
//!     2  │ PutBytes         │ put_b       │ Size of puts
//!     3  │ GetBytes         │ get_b       │ Size of gets
//! ```
//!
//! Slot indices follow declaration order. The schema is configuration, not
//! discovery: nothing at runtime adds or removes counters.

use std::fmt;

/// The four counters tracked for every label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Requests,
    FailedRequests,
    PutBytes,
    GetBytes,
}

impl Counter {
    /// All counters in slot order.
    pub const ALL: [Counter; 4] = [
        Counter::Requests,
        Counter::FailedRequests,
        Counter::PutBytes,
        Counter::GetBytes,
    ];

    /// Slot index of this counter within a group.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Counter::Requests => 0,
            Counter::FailedRequests => 1,
            Counter::PutBytes => 2,
            Counter::GetBytes => 3,
        }
    }

    /// Counter for a slot index, if the slot is declared.
    pub fn from_index(slot: usize) -> Option<Counter> {
        Counter::ALL.get(slot).copied()
    }

    /// Declaration of this counter in [`REQUEST_STATS`].
    #[inline]
    pub fn spec(self) -> &'static CounterSpec {
        &REQUEST_STATS_COUNTERS[self.index()]
    }
}

impl From<Counter> for usize {
    #[inline]
    fn from(counter: Counter) -> usize {
        counter.index()
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

/// Value type of a declared counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    /// Unsigned 64-bit value adjusted by inc/dec/set.
    U64Counter,
}

/// Unit hint passed through to the exporter. Counters carry no enforced unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    None,
}

/// Declaration of one counter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: CounterKind,
    pub unit: Unit,
    /// Exporter priority; higher values are exported more eagerly.
    pub priority: u8,
}

impl CounterSpec {
    const fn u64_counter(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind: CounterKind::U64Counter,
            unit: Unit::None,
            priority: 8,
        }
    }
}

/// An ordered, fixed set of counter declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSchema {
    name: &'static str,
    counters: &'static [CounterSpec],
}

impl CounterSchema {
    /// Creates a schema from a static declaration table.
    pub const fn new(name: &'static str, counters: &'static [CounterSpec]) -> Self {
        Self { name, counters }
    }

    /// Schema name (the exporter's metric family prefix).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of declared slots.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Declaration for `slot`, if declared.
    pub fn spec(&self, slot: usize) -> Option<&'static CounterSpec> {
        self.counters.get(slot)
    }

    /// Slot index of the counter called `name`.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.counters.iter().position(|spec| spec.name == name)
    }

    /// Declarations in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &'static CounterSpec> {
        self.counters.iter()
    }
}

static REQUEST_STATS_COUNTERS: [CounterSpec; 4] = [
    CounterSpec::u64_counter("req", "number of reqs"),
    CounterSpec::u64_counter("failed_req", "Aborted Requests"),
    CounterSpec::u64_counter("put_b", "Size of puts"),
    CounterSpec::u64_counter("get_b", "Size of gets"),
];

/// The schema every cached counter group is built from.
pub static REQUEST_STATS: CounterSchema =
    CounterSchema::new("rgw_metrics", &REQUEST_STATS_COUNTERS);
