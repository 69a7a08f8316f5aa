//! Request-boundary tenant resolution.

use std::future::Future;

use regex::Regex;
use tenantscope_core::{ContextSource, PrincipalClaims, TenantContext, TenantId};
use tracing::{debug, warn};

use super::carrier::TenantContextCarrier;
use super::error::IsolationError;

/// Shape of the collision-resistant ids issued by the original identity
/// provider (`c` followed by 24 lowercase alphanumerics).
pub const CUID_PATTERN: &str = "c[a-z0-9]{24}";

/// Configuration for [`AccessBoundaryGuard`].
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Header consulted when the request carries no claims.
    pub tenant_header: String,
    /// Whether the header is accepted at all.
    pub allow_header_fallback: bool,
    /// Optional format check applied to the resolved id (whole-value match).
    pub tenant_id_pattern: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            tenant_header: "x-tenant-id".to_string(),
            allow_header_fallback: true,
            tenant_id_pattern: None,
        }
    }
}

/// Resolves the tenant for an inbound request.
///
/// Claims always win. When a principal is present, its tenant claim is the
/// only candidate; the header is consulted solely for claim-less callers and
/// only if [`GuardConfig::allow_header_fallback`] is set.
#[derive(Debug, Clone)]
pub struct AccessBoundaryGuard {
    /// Lowercase, as header maps store names.
    tenant_header: String,
    allow_header_fallback: bool,
    pattern: Option<Regex>,
}

impl AccessBoundaryGuard {
    /// # Errors
    ///
    /// Returns an error if `tenant_id_pattern` is not a valid regex.
    pub fn new(config: &GuardConfig) -> Result<Self, regex::Error> {
        let pattern = config
            .tenant_id_pattern
            .as_deref()
            .map(|p| Regex::new(&format!("^(?:{p})$")))
            .transpose()?;
        Ok(Self {
            tenant_header: config.tenant_header.to_ascii_lowercase(),
            allow_header_fallback: config.allow_header_fallback,
            pattern,
        })
    }

    /// Header a boundary adapter should read the fallback tenant from.
    #[must_use]
    pub fn tenant_header(&self) -> &str {
        &self.tenant_header
    }

    /// Produces the request's [`TenantContext`].
    ///
    /// # Errors
    ///
    /// - [`IsolationError::UnauthenticatedNoTenantClaim`] when no source
    ///   yields a non-blank id.
    /// - [`IsolationError::InvalidTenantIdentifier`] when the id fails the
    ///   configured format.
    pub fn resolve(
        &self,
        claims: Option<&PrincipalClaims>,
        header: Option<&str>,
    ) -> Result<TenantContext, IsolationError> {
        let result = self.resolve_inner(claims, header);
        match &result {
            Ok(ctx) => debug!(
                tenant = %ctx.tenant_id(),
                user = ctx.user_id().unwrap_or("-"),
                source = ?ctx.source(),
                "tenant context resolved"
            ),
            Err(err) => warn!(
                reason = err.reason(),
                has_claims = claims.is_some(),
                has_header = header.is_some(),
                "tenant resolution failed"
            ),
        }
        result
    }

    fn resolve_inner(
        &self,
        claims: Option<&PrincipalClaims>,
        header: Option<&str>,
    ) -> Result<TenantContext, IsolationError> {
        let ctx = if let Some(claims) = claims {
            let tenant = claims
                .tenant_id
                .as_deref()
                .and_then(TenantId::parse)
                .ok_or(IsolationError::UnauthenticatedNoTenantClaim)?;
            TenantContext::resolved(
                tenant,
                claims.subject.clone(),
                claims.role.clone(),
                ContextSource::Claims,
            )
        } else {
            let tenant = header
                .filter(|_| self.allow_header_fallback)
                .and_then(TenantId::parse)
                .ok_or(IsolationError::UnauthenticatedNoTenantClaim)?;
            TenantContext::resolved(tenant, None, None, ContextSource::Header)
        };

        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(ctx.tenant_id().as_str()) {
                return Err(IsolationError::InvalidTenantIdentifier);
            }
        }
        Ok(ctx)
    }

    /// Resolves the tenant and runs `fut` inside its scope.
    ///
    /// # Errors
    ///
    /// Returns the resolution error without polling `fut`.
    pub async fn run_guarded<F>(
        &self,
        carrier: &TenantContextCarrier,
        claims: Option<&PrincipalClaims>,
        header: Option<&str>,
        fut: F,
    ) -> Result<F::Output, IsolationError>
    where
        F: Future,
    {
        let ctx = self.resolve(claims, header)?;
        Ok(carrier.run_scoped(ctx, fut).await)
    }
}

impl Default for AccessBoundaryGuard {
    fn default() -> Self {
        Self {
            tenant_header: GuardConfig::default().tenant_header,
            allow_header_fallback: true,
            pattern: None,
        }
    }
}
