//! Tower middleware layers for the operation pipeline.
//!
//! - [`timeout`]: Per-operation timeout enforcement
//! - [`metrics`]: Operation timing and counting via `tracing` spans and `metrics`
//! - [`scoping`]: Tenant rules applied from the task's context
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod metrics;
pub mod pipeline;
pub mod scoping;
pub mod timeout;

pub use metrics::MetricsLayer;
pub use pipeline::build_scoped_pipeline;
pub use scoping::{scope_operation, ScopingLayer};
pub use timeout::TimeoutLayer;
