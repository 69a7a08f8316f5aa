//! Isolation auditing: fixture-driven probes, findings, and the admin surface.

pub mod admin;
pub mod harness;
pub mod report;
pub mod types;

pub use admin::{IsolationAdmin, IsolationStatus};
pub use harness::IsolationAuditHarness;
pub use report::{recommendations, AuditReport};
pub use types::{
    AuditConfig, AuditPerformance, AuditSummary, IsolationTestResult, IsolationViolation,
    SeedPrincipal, Severity, SkippedSuite, SuiteKind, SuiteReport, TenantTestFixture,
};
