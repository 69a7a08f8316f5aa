use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the tenant that owns a request or a row.
///
/// Always non-empty and free of surrounding whitespace; construct via
/// [`TenantId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Trims `raw` and returns `None` when nothing is left.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| "tenant id must not be empty".to_string())
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Where the guard found the tenant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextSource {
    /// Authenticated principal claims.
    Claims,
    /// Explicit tenant header from a trusted caller.
    Header,
    /// Constructed in-process (audit harness, admin tooling, tests).
    Internal,
}

/// Per-request tenant scope carried through every persistence call.
///
/// Immutable once built. Tasks share it only behind an `Arc`, so no two
/// tasks can ever write to the same context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    tenant_id: TenantId,
    user_id: Option<String>,
    user_role: Option<String>,
    source: ContextSource,
}

impl TenantContext {
    /// Context for in-process callers with no principal attached.
    #[must_use]
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            user_id: None,
            user_role: None,
            source: ContextSource::Internal,
        }
    }

    /// Context resolved at a request boundary.
    #[must_use]
    pub fn resolved(
        tenant_id: TenantId,
        user_id: Option<String>,
        user_role: Option<String>,
        source: ContextSource,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            user_role,
            source,
        }
    }

    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    #[must_use]
    pub fn user_role(&self) -> Option<&str> {
        self.user_role.as_deref()
    }

    #[must_use]
    pub fn source(&self) -> ContextSource {
        self.source
    }
}

/// Claims of an authenticated principal, as far as tenancy is concerned.
///
/// Token verification happens upstream; only the fields relevant to tenant
/// resolution are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalClaims {
    /// Subject (user) identifier.
    pub subject: Option<String>,
    /// Tenant claim, untrimmed as it arrived.
    pub tenant_id: Option<String>,
    /// Role within the tenant.
    pub role: Option<String>,
}
