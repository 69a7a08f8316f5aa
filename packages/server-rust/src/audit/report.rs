//! Remediation advice derived from an audit result.

use serde::{Deserialize, Serialize};

use super::types::{AuditConfig, IsolationTestResult, Severity};

/// An audit result together with the advice it warrants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    #[serde(flatten)]
    pub result: IsolationTestResult,
    pub recommendations: Vec<String>,
}

impl AuditReport {
    #[must_use]
    pub fn new(result: IsolationTestResult, config: &AuditConfig) -> Self {
        let recommendations = recommendations(&result, config);
        Self {
            result,
            recommendations,
        }
    }
}

/// Severity-bucketed remediation steps, most urgent first.
#[must_use]
pub fn recommendations(result: &IsolationTestResult, config: &AuditConfig) -> Vec<String> {
    let mut out = Vec::new();

    if result.with_severity(Severity::Critical).next().is_some() {
        out.push("URGENT: fix critical tenant isolation violations immediately".to_string());
        out.push("Enable row-level policies in the storage engine as a second line of defence".to_string());
        out.push("Review the scoped entity registry and the scoping layer configuration".to_string());
    }

    if result.with_severity(Severity::High).next().is_some() {
        out.push("Address high-severity tenant isolation issues".to_string());
        out.push("Verify tenant scoping on every persistence path".to_string());
    }

    #[allow(clippy::cast_precision_loss)]
    let slow = result.performance.avg_ms > config.slow_average_ms as f64;
    if slow {
        out.push("Consider indexing the tenant key column of scoped entities".to_string());
        out.push("Review query performance and optimise slow operations".to_string());
    }

    if result.violations.is_empty() {
        out.push("Tenant isolation is working correctly".to_string());
        out.push("Run this audit automatically in CI".to_string());
    }

    out
}
