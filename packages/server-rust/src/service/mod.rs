//! Scoped operation pipeline.
//!
//! 1. **Operations** (`operation`): typed CRUD variants with tenant slots
//! 2. **Middleware** (`middleware`): Tower layers (timeout, metrics, scoping)
//! 3. **Execution** (`executor`): scoped operations against a `RowStore`
//! 4. **Facade** (`client`): the typed surface domain code uses

pub mod client;
pub mod config;
pub mod executor;
pub mod middleware;
pub mod operation;

pub use client::ScopedClient;
pub use config::ScopeConfig;
pub use executor::StoreExecutor;
pub use operation::{
    ModifyKind, Operation, OperationError, OperationFuture, OperationResponse, ReadKind,
};
