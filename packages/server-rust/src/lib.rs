//! tenantscope server -- carries a tenant context through every request,
//! scopes each persistence operation to it, and audits the result.
//!
//! - [`scope`]: context carrier and request boundary guard
//! - [`service`]: the Tower pipeline that rewrites operations
//! - [`storage`]: tenant-agnostic row stores
//! - [`audit`]: isolation probes and the admin surface
//! - [`network`]: HTTP adapter

pub mod audit;
pub mod network;
pub mod runtime;
pub mod scope;
pub mod service;
pub mod storage;
pub mod telemetry;

pub use audit::{AuditConfig, AuditReport, IsolationAdmin, IsolationAuditHarness};
pub use runtime::ScopeRuntime;
pub use scope::{AccessBoundaryGuard, GuardConfig, IsolationError, TenantContextCarrier};
pub use service::{ScopeConfig, ScopedClient};
