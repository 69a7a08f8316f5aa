//! Tenant context: who the current task acts for, and how that is decided.

pub mod carrier;
pub mod error;
pub mod guard;

pub use carrier::{CarrierSnapshot, TenantContextCarrier};
pub use error::IsolationError;
pub use guard::{AccessBoundaryGuard, GuardConfig, CUID_PATTERN};
