//! Concrete [`RowStore`](super::RowStore) implementations.

pub mod memory;

pub use memory::MemoryRowStore;
