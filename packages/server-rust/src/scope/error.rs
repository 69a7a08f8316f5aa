//! Tenant boundary violations.

use thiserror::Error;

/// Every way a request or persistence call can break the tenant boundary.
///
/// Display strings never contain tenant identifiers; the offending ids are
/// only written to operational logs at the point of rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsolationError {
    #[error("no tenant context is active")]
    MissingTenantContext,
    #[error("write to {entity} targets a different tenant")]
    TenantMismatchOnWrite { entity: String },
    #[error("modification of {entity} targets a different tenant")]
    TenantMismatchOnModify { entity: String },
    #[error("batch write to {entity} has {offending} item(s) for a different tenant")]
    CrossTenantBatchWrite { entity: String, offending: usize },
    #[error("request carries no usable tenant claim")]
    UnauthenticatedNoTenantClaim,
    #[error("entity {entity} is not tenant-scoped")]
    UnregisteredEntity { entity: String },
    #[error("tenant identifier has an invalid format")]
    InvalidTenantIdentifier,
    #[error("conflicting tenant values supplied for {entity}")]
    ConflictingTenantSlot { entity: String },
    #[error("{operation} on a resource owned by a different tenant")]
    ForeignResource { operation: String },
}

impl IsolationError {
    /// Stable label for metrics and structured logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingTenantContext => "missing_tenant_context",
            Self::TenantMismatchOnWrite { .. } => "tenant_mismatch_on_write",
            Self::TenantMismatchOnModify { .. } => "tenant_mismatch_on_modify",
            Self::CrossTenantBatchWrite { .. } => "cross_tenant_batch_write",
            Self::UnauthenticatedNoTenantClaim => "unauthenticated_no_tenant_claim",
            Self::UnregisteredEntity { .. } => "unregistered_entity",
            Self::InvalidTenantIdentifier => "invalid_tenant_identifier",
            Self::ConflictingTenantSlot { .. } => "conflicting_tenant_slot",
            Self::ForeignResource { .. } => "foreign_resource",
        }
    }

    /// True for failures that mean "no tenant identity", as opposed to "the
    /// identity is not allowed to do this".
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::MissingTenantContext | Self::UnauthenticatedNoTenantClaim
        )
    }

    /// The only text a caller outside the process ever sees.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        if self.is_unauthenticated() {
            "authentication required"
        } else {
            "access denied"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_message_is_generic() {
        let mismatch = IsolationError::TenantMismatchOnWrite {
            entity: "appointment".to_string(),
        };
        assert_eq!(mismatch.public_message(), "access denied");
        assert_eq!(
            IsolationError::UnauthenticatedNoTenantClaim.public_message(),
            "authentication required"
        );
        assert_eq!(
            IsolationError::MissingTenantContext.public_message(),
            "authentication required"
        );
    }

    #[test]
    fn display_never_names_a_tenant() {
        let err = IsolationError::CrossTenantBatchWrite {
            entity: "client".to_string(),
            offending: 2,
        };
        assert_eq!(
            err.to_string(),
            "batch write to client has 2 item(s) for a different tenant"
        );
        assert_eq!(err.reason(), "cross_tenant_batch_write");
    }
}
