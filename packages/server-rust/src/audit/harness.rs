//! Isolation audit: probes the live scoping stack with fixture tenants.
//!
//! Suites, in order:
//! 1. tenant scoping: each tenant's scoped count per entity vs its fixture
//! 2. cross-tenant access: an explicit foreign-tenant filter must see nothing
//! 3. row policies: engine-level counts vs application-level counts
//! 4. performance: one representative scoped read per tenant

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tenantscope_core::{Filter, ScopedEntityRegistry, TenantContext, TenantId};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::types::{
    AuditConfig, AuditPerformance, AuditSummary, IsolationTestResult, IsolationViolation,
    SeedPrincipal, Severity, SkippedSuite, SuiteKind, SuiteReport, TenantTestFixture,
};
use crate::scope::TenantContextCarrier;
use crate::service::{OperationError, ScopedClient};
use crate::storage::RowPolicyEnforcement;

/// Rows fetched by the performance probe.
const PERFORMANCE_PROBE_LIMIT: usize = 10;

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Default)]
struct SuiteOutcome {
    executed: u64,
    violations: Vec<IsolationViolation>,
}

#[derive(Default)]
struct Accumulator {
    violations: Vec<IsolationViolation>,
    suites: Vec<SuiteReport>,
    skipped: Vec<SkippedSuite>,
}

impl Accumulator {
    fn record(&mut self, suite: SuiteKind, outcome: SuiteOutcome, elapsed: Duration) {
        self.suites.push(SuiteReport {
            suite,
            executed: outcome.executed,
            violations: outcome.violations.len() as u64,
            elapsed_ms: millis(elapsed),
        });
        self.violations.extend(outcome.violations);
    }

    fn skip(&mut self, suite: SuiteKind, reason: &str) {
        debug!(?suite, reason, "audit suite skipped");
        self.skipped.push(SkippedSuite {
            suite,
            reason: reason.to_string(),
        });
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self, elapsed: Duration) -> IsolationTestResult {
        let total: u64 = self.suites.iter().map(|s| s.executed).sum();
        let failed = self.violations.len() as u64;
        let total_ms = millis(elapsed);
        let avg_ms = if total == 0 {
            0.0
        } else {
            total_ms as f64 / total as f64
        };
        IsolationTestResult {
            passed: !self.violations.iter().any(|v| v.severity.fails_audit()),
            violations: self.violations,
            summary: AuditSummary {
                total,
                passed: total.saturating_sub(failed),
                failed,
            },
            performance: AuditPerformance { total_ms, avg_ms },
            suites: self.suites,
            skipped: self.skipped,
        }
    }
}

/// Runs isolation audits against a [`ScopedClient`].
pub struct IsolationAuditHarness {
    client: ScopedClient,
    registry: Arc<ScopedEntityRegistry>,
    carrier: TenantContextCarrier,
    enforcement: Option<Arc<dyn RowPolicyEnforcement>>,
}

impl IsolationAuditHarness {
    #[must_use]
    pub fn new(
        client: ScopedClient,
        registry: Arc<ScopedEntityRegistry>,
        carrier: TenantContextCarrier,
    ) -> Self {
        Self {
            client,
            registry,
            carrier,
            enforcement: None,
        }
    }

    /// Enables the row-policy suite against `enforcement`.
    #[must_use]
    pub fn with_enforcement(mut self, enforcement: Arc<dyn RowPolicyEnforcement>) -> Self {
        self.enforcement = Some(enforcement);
        self
    }

    /// Builds a fixture with an owner and a manager seed principal.
    #[must_use]
    pub fn generate_fixture(
        tenant_id: TenantId,
        expected_record_counts: BTreeMap<String, u64>,
    ) -> TenantTestFixture {
        let seed_principals = vec![
            SeedPrincipal {
                id: "user1".to_string(),
                email: format!("owner@{tenant_id}.test"),
                role: "OWNER".to_string(),
            },
            SeedPrincipal {
                id: "user2".to_string(),
                email: format!("manager@{tenant_id}.test"),
                role: "MANAGER".to_string(),
            },
        ];
        TenantTestFixture {
            tenant_id,
            seed_principals,
            expected_record_counts,
        }
    }

    /// Runs the configured suites. Probe failures become findings; the run
    /// itself never fails.
    pub async fn run(
        &self,
        fixtures: &[TenantTestFixture],
        config: &AuditConfig,
    ) -> IsolationTestResult {
        let started = Instant::now();
        info!(tenants = fixtures.len(), "starting tenant isolation audit");
        let mut acc = Accumulator::default();

        let suite_start = Instant::now();
        let outcome = self.tenant_scoping(fixtures).await;
        acc.record(SuiteKind::TenantScoping, outcome, suite_start.elapsed());

        if !config.include_cross_access_tests {
            acc.skip(SuiteKind::CrossTenantAccess, "disabled");
        } else if fixtures.len() < 2 {
            warn!("cross-tenant access suite needs at least two fixtures");
            acc.skip(SuiteKind::CrossTenantAccess, "requires at least two fixtures");
        } else {
            let suite_start = Instant::now();
            let outcome = self.cross_tenant_access(fixtures, &config.probe_entity).await;
            acc.record(SuiteKind::CrossTenantAccess, outcome, suite_start.elapsed());
        }

        match (&self.enforcement, config.test_rls) {
            (_, false) => acc.skip(SuiteKind::RlsPolicy, "disabled"),
            (None, true) => acc.skip(SuiteKind::RlsPolicy, "no row policy engine configured"),
            (Some(enforcement), true) => {
                let suite_start = Instant::now();
                let outcome = self.row_policies(enforcement.as_ref(), fixtures).await;
                acc.record(SuiteKind::RlsPolicy, outcome, suite_start.elapsed());
            }
        }

        if config.include_performance_tests {
            let suite_start = Instant::now();
            let outcome = self.performance(fixtures, config).await;
            acc.record(SuiteKind::Performance, outcome, suite_start.elapsed());
        } else {
            acc.skip(SuiteKind::Performance, "disabled");
        }

        let result = acc.finish(started.elapsed());
        log_result(&result);
        result
    }

    async fn scoped_count(
        &self,
        tenant: &TenantId,
        entity: &str,
        filter: Filter,
    ) -> Result<u64, OperationError> {
        let ctx = TenantContext::new(tenant.clone());
        self.carrier
            .run_scoped(ctx, self.client.count(entity, filter))
            .await
    }

    async fn tenant_scoping(&self, fixtures: &[TenantTestFixture]) -> SuiteOutcome {
        let mut outcome = SuiteOutcome::default();
        for fixture in fixtures {
            let tenant = &fixture.tenant_id;
            for entity in self.registry.entity_names() {
                outcome.executed += 1;
                let expected = fixture.expected(entity);
                match self.scoped_count(tenant, entity, Filter::all()).await {
                    Ok(actual) if actual != expected => {
                        outcome.violations.push(IsolationViolation {
                            test_name: SuiteKind::TenantScoping,
                            entity_name: entity.to_string(),
                            expected,
                            actual: Some(actual),
                            description: format!(
                                "record count mismatch for {entity} in tenant {tenant}"
                            ),
                            severity: if expected == 0 {
                                Severity::Critical
                            } else {
                                Severity::High
                            },
                        });
                    }
                    Ok(_) => {}
                    Err(err) => outcome.violations.push(IsolationViolation {
                        test_name: SuiteKind::TenantScoping,
                        entity_name: entity.to_string(),
                        expected,
                        actual: None,
                        description: format!("error probing {entity} in tenant {tenant}: {err}"),
                        severity: Severity::Critical,
                    }),
                }
            }
            for (entity, &expected) in &fixture.expected_record_counts {
                if self.registry.contains(entity) {
                    continue;
                }
                outcome.executed += 1;
                warn!(entity = %entity, tenant = %tenant, "fixture names an unregistered entity");
                outcome.violations.push(IsolationViolation {
                    test_name: SuiteKind::TenantScoping,
                    entity_name: entity.clone(),
                    expected,
                    actual: None,
                    description: format!(
                        "fixture for tenant {tenant} expects {entity}, which is not a scoped entity"
                    ),
                    severity: Severity::Medium,
                });
            }
        }
        outcome
    }

    async fn cross_tenant_access(
        &self,
        fixtures: &[TenantTestFixture],
        probe_entity: &str,
    ) -> SuiteOutcome {
        let mut outcome = SuiteOutcome::default();
        for owner in fixtures {
            for intruder in fixtures {
                if owner.tenant_id == intruder.tenant_id {
                    continue;
                }
                outcome.executed += 1;
                let filter = Filter::all().for_tenant(owner.tenant_id.as_str());
                match self
                    .scoped_count(&intruder.tenant_id, probe_entity, filter)
                    .await
                {
                    Ok(0) => {}
                    Ok(leaked) => outcome.violations.push(IsolationViolation {
                        test_name: SuiteKind::CrossTenantAccess,
                        entity_name: probe_entity.to_string(),
                        expected: 0,
                        actual: Some(leaked),
                        description: format!(
                            "tenant {} can see {leaked} {probe_entity} rows of tenant {}",
                            intruder.tenant_id, owner.tenant_id
                        ),
                        severity: Severity::Critical,
                    }),
                    Err(err) => debug!(
                        owner = %owner.tenant_id,
                        intruder = %intruder.tenant_id,
                        %err,
                        "cross-tenant probe blocked"
                    ),
                }
            }
        }
        outcome
    }

    async fn row_policies(
        &self,
        enforcement: &dyn RowPolicyEnforcement,
        fixtures: &[TenantTestFixture],
    ) -> SuiteOutcome {
        let mut outcome = SuiteOutcome::default();
        for fixture in fixtures {
            let tenant = &fixture.tenant_id;
            for entity in self.registry.entity_names() {
                outcome.executed += 1;
                let engine = enforcement.session_count(entity, tenant).await;
                let application = self.scoped_count(tenant, entity, Filter::all()).await;
                let violation = match (engine, application) {
                    (Ok(engine), Ok(application)) if engine != application => {
                        IsolationViolation {
                            test_name: SuiteKind::RlsPolicy,
                            entity_name: entity.to_string(),
                            expected: application,
                            actual: Some(engine),
                            description: format!(
                                "row policy for {entity} disagrees with scoped count in tenant {tenant}"
                            ),
                            severity: Severity::High,
                        }
                    }
                    (Ok(_), Ok(_)) => continue,
                    (Err(err), _) => probe_error(entity, fixture, &err.to_string()),
                    (_, Err(err)) => probe_error(entity, fixture, &err.to_string()),
                };
                outcome.violations.push(violation);
            }
        }
        outcome
    }

    async fn performance(
        &self,
        fixtures: &[TenantTestFixture],
        config: &AuditConfig,
    ) -> SuiteOutcome {
        let threshold = config.performance_threshold_ms;
        let entity = config.probe_entity.as_str();
        let mut outcome = SuiteOutcome::default();
        for fixture in fixtures {
            let tenant = &fixture.tenant_id;
            outcome.executed += 1;
            let started = Instant::now();
            let result = self
                .carrier
                .run_scoped(
                    TenantContext::new(tenant.clone()),
                    self.client
                        .find_many(entity, Filter::all(), Some(PERFORMANCE_PROBE_LIMIT)),
                )
                .await;
            let elapsed = millis(started.elapsed());
            match result {
                Ok(_) if elapsed > threshold => outcome.violations.push(IsolationViolation {
                    test_name: SuiteKind::Performance,
                    entity_name: entity.to_string(),
                    expected: threshold,
                    actual: Some(elapsed),
                    description: format!(
                        "scoped read in tenant {tenant} took {elapsed}ms, over the {threshold}ms threshold"
                    ),
                    severity: Severity::Low,
                }),
                Ok(_) => {}
                Err(err) => outcome.violations.push(IsolationViolation {
                    test_name: SuiteKind::Performance,
                    entity_name: entity.to_string(),
                    expected: threshold,
                    actual: None,
                    description: format!("performance probe failed in tenant {tenant}: {err}"),
                    severity: Severity::Medium,
                }),
            }
        }
        outcome
    }
}

fn probe_error(entity: &str, fixture: &TenantTestFixture, err: &str) -> IsolationViolation {
    IsolationViolation {
        test_name: SuiteKind::RlsPolicy,
        entity_name: entity.to_string(),
        expected: fixture.expected(entity),
        actual: None,
        description: format!(
            "row policy probe failed for {entity} in tenant {}: {err}",
            fixture.tenant_id
        ),
        severity: Severity::Medium,
    }
}

fn log_result(result: &IsolationTestResult) {
    info!(
        passed = result.passed,
        total = result.summary.total,
        failed = result.summary.failed,
        total_ms = result.performance.total_ms,
        avg_ms = result.performance.avg_ms,
        skipped = result.skipped.len(),
        "tenant isolation audit finished"
    );
    for violation in &result.violations {
        metrics::counter!(
            "tenantscope_audit_violations_total",
            "severity" => format!("{:?}", violation.severity).to_lowercase()
        )
        .increment(1);
    }
    for v in result.with_severity(Severity::Critical) {
        error!(entity = %v.entity_name, suite = ?v.test_name, "{}", v.description);
    }
    for v in result.with_severity(Severity::High) {
        warn!(entity = %v.entity_name, suite = ?v.test_name, "{}", v.description);
    }
}
