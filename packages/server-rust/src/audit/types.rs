//! Audit inputs, findings, and results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tenantscope_core::TenantId;

/// How bad a finding is. `High` and `Critical` fail the audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn fails_audit(self) -> bool {
        self >= Self::High
    }
}

/// The four audit suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteKind {
    TenantScoping,
    CrossTenantAccess,
    RlsPolicy,
    Performance,
}

/// One isolation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationViolation {
    pub test_name: SuiteKind,
    pub entity_name: String,
    pub expected: u64,
    /// `None` when the probe itself failed.
    pub actual: Option<u64>,
    pub description: String,
    pub severity: Severity,
}

/// A user seeded into a fixture tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedPrincipal {
    pub id: String,
    pub email: String,
    pub role: String,
}

/// A tenant the audit probes, with the row counts it should see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantTestFixture {
    pub tenant_id: TenantId,
    #[serde(default)]
    pub seed_principals: Vec<SeedPrincipal>,
    /// Entities not listed are expected to be empty.
    #[serde(default)]
    pub expected_record_counts: BTreeMap<String, u64>,
}

impl TenantTestFixture {
    #[must_use]
    pub fn expected(&self, entity: &str) -> u64 {
        self.expected_record_counts.get(entity).copied().unwrap_or(0)
    }
}

/// Which suites run and with which thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditConfig {
    pub include_performance_tests: bool,
    pub include_cross_access_tests: bool,
    #[serde(rename = "testRLS", alias = "testRls")]
    pub test_rls: bool,
    /// Entity used by the cross-access and performance probes.
    pub probe_entity: String,
    /// A single probe slower than this is reported (LOW).
    pub performance_threshold_ms: u64,
    /// Average probe time above which an indexing recommendation is made.
    pub slow_average_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            include_performance_tests: false,
            include_cross_access_tests: false,
            test_rls: false,
            probe_entity: "appointment".to_string(),
            performance_threshold_ms: 100,
            slow_average_ms: 50,
        }
    }
}

/// Work done by one suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteReport {
    pub suite: SuiteKind,
    /// Sub-tests (probes) executed.
    pub executed: u64,
    pub violations: u64,
    pub elapsed_ms: u64,
}

/// A suite that did not run. Not a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSuite {
    pub suite: SuiteKind,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPerformance {
    pub total_ms: u64,
    /// `total_ms` over all executed sub-tests; 0 when none ran.
    pub avg_ms: f64,
}

/// Outcome of an audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationTestResult {
    /// No HIGH or CRITICAL violation was found.
    pub passed: bool,
    pub violations: Vec<IsolationViolation>,
    pub summary: AuditSummary,
    pub performance: AuditPerformance,
    pub suites: Vec<SuiteReport>,
    pub skipped: Vec<SkippedSuite>,
}

impl IsolationTestResult {
    /// Violations of exactly `severity`.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &IsolationViolation> {
        self.violations.iter().filter(move |v| v.severity == severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_accepts_partial_json() {
        let config: AuditConfig =
            serde_json::from_str(r#"{"includeCrossAccessTests":true,"testRLS":true}"#).unwrap();
        assert!(config.include_cross_access_tests);
        assert!(config.test_rls);
        assert!(!config.include_performance_tests);
        assert_eq!(config.probe_entity, "appointment");
        assert_eq!(config.performance_threshold_ms, 100);
    }

    #[test]
    fn fixture_rejects_blank_tenant() {
        let parsed: Result<TenantTestFixture, _> =
            serde_json::from_str(r#"{"tenantId":"  ","expectedRecordCounts":{}}"#);
        assert!(parsed.is_err());

        let fixture: TenantTestFixture =
            serde_json::from_str(r#"{"tenantId":"t-1","expectedRecordCounts":{"client":2}}"#)
                .unwrap();
        assert_eq!(fixture.expected("client"), 2);
        assert_eq!(fixture.expected("payment"), 0);
    }

    #[test]
    fn severity_ordering_and_wire_format() {
        assert!(Severity::Critical.fails_audit());
        assert!(Severity::High.fails_audit());
        assert!(!Severity::Medium.fails_audit());
        assert_eq!(serde_json::to_string(&Severity::Low).unwrap(), r#""LOW""#);
        assert_eq!(
            serde_json::to_string(&SuiteKind::RlsPolicy).unwrap(),
            r#""rls_policy""#
        );
    }
}
