//! Storage layer beneath the scoping pipeline.
//!
//! - [`RowStore`]: tenant-agnostic relational persistence
//! - [`RowPolicyEnforcement`]: optional engine-level row policies used as a
//!   second, independent isolation layer
//! - [`engines`]: concrete implementations (in-memory)

pub mod engine;
pub mod engines;
pub mod record;

pub use engine::*;
pub use engines::MemoryRowStore;
pub use record::*;
