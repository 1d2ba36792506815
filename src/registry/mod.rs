//! Registry implementations shipped with the crate.

pub mod memory;

pub use memory::{AtomicCounterGroup, MemoryRegistry, RegistryStats};
