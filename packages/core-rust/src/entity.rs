use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Column that carries the owning tenant in the standard catalog.
pub const DEFAULT_TENANT_KEY_FIELD: &str = "tenantId";

/// Entities the business application scopes by tenant.
pub const STANDARD_SCOPED_ENTITIES: &[&str] = &[
    "appointment",
    "client",
    "service",
    "location",
    "payment",
    "document",
    "template",
    "course",
    "enrollment",
    "event",
    "brand",
    "subscription",
    "userRole",
];

/// One registered tenant-scoped entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedEntityDescriptor {
    /// Entity (table/model) name as used by callers.
    pub entity_name: String,
    /// Column holding the owning tenant id.
    pub tenant_key_field: String,
}

/// Errors raised while assembling a [`ScopedEntityRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("entity name must not be empty")]
    EmptyEntityName,
    #[error("tenant key field for {entity} must not be empty")]
    EmptyTenantKeyField { entity: String },
    #[error("entity {entity} registered twice")]
    DuplicateEntity { entity: String },
}

/// Read-only catalog of tenant-scoped entities.
///
/// Built once at startup through [`RegistryBuilder`] and shared behind an
/// `Arc`. There is no mutation API: an entity that is not in the catalog is
/// not tenant-scoped and must be refused by the interceptor.
#[derive(Debug, Clone, Default)]
pub struct ScopedEntityRegistry {
    entries: BTreeMap<String, ScopedEntityDescriptor>,
}

impl ScopedEntityRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The business application's catalog: every standard entity keyed on
    /// [`DEFAULT_TENANT_KEY_FIELD`].
    #[must_use]
    pub fn standard() -> Self {
        let entries = STANDARD_SCOPED_ENTITIES
            .iter()
            .map(|name| {
                (
                    (*name).to_string(),
                    ScopedEntityDescriptor {
                        entity_name: (*name).to_string(),
                        tenant_key_field: DEFAULT_TENANT_KEY_FIELD.to_string(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Tenant-owning field for `entity`, or `None` when not registered.
    #[must_use]
    pub fn lookup(&self, entity: &str) -> Option<&str> {
        self.entries
            .get(entity)
            .map(|d| d.tenant_key_field.as_str())
    }

    #[must_use]
    pub fn contains(&self, entity: &str) -> bool {
        self.entries.contains_key(entity)
    }

    /// Descriptors ordered by entity name.
    pub fn descriptors(&self) -> impl Iterator<Item = &ScopedEntityDescriptor> {
        self.entries.values()
    }

    /// Entity names ordered alphabetically.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects registrations and validates them into a [`ScopedEntityRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    pending: Vec<(String, String)>,
}

impl RegistryBuilder {
    /// Registers `entity` with its tenant-owning column.
    #[must_use]
    pub fn entity(mut self, entity: impl Into<String>, tenant_key_field: impl Into<String>) -> Self {
        self.pending.push((entity.into(), tenant_key_field.into()));
        self
    }

    /// Validates and freezes the catalog.
    ///
    /// # Errors
    ///
    /// Fails on empty names or fields and on duplicate entity registrations.
    pub fn build(self) -> Result<ScopedEntityRegistry, RegistryError> {
        let mut entries = BTreeMap::new();
        for (entity, field) in self.pending {
            let entity = entity.trim().to_string();
            if entity.is_empty() {
                return Err(RegistryError::EmptyEntityName);
            }
            let field = field.trim().to_string();
            if field.is_empty() {
                return Err(RegistryError::EmptyTenantKeyField { entity });
            }
            if entries.contains_key(&entity) {
                return Err(RegistryError::DuplicateEntity { entity });
            }
            entries.insert(
                entity.clone(),
                ScopedEntityDescriptor {
                    entity_name: entity,
                    tenant_key_field: field,
                },
            );
        }
        tracing::debug!(entities = entries.len(), "scoped entity registry built");
        Ok(ScopedEntityRegistry { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_covers_business_entities() {
        let registry = ScopedEntityRegistry::standard();
        assert_eq!(registry.len(), STANDARD_SCOPED_ENTITIES.len());
        assert_eq!(registry.lookup("appointment"), Some("tenantId"));
        assert_eq!(registry.lookup("userRole"), Some("tenantId"));
        assert!(registry.lookup("tenant").is_none());
        assert!(registry.lookup("Appointment").is_none());
    }

    #[test]
    fn builder_registers_custom_fields() {
        let registry = ScopedEntityRegistry::builder()
            .entity("invoice", "owner_tenant")
            .entity(" note ", " tenantId ")
            .build()
            .unwrap();
        assert_eq!(registry.lookup("invoice"), Some("owner_tenant"));
        assert_eq!(registry.lookup("note"), Some("tenantId"));
        let names: Vec<_> = registry.entity_names().collect();
        assert_eq!(names, vec!["invoice", "note"]);
    }

    #[test]
    fn builder_rejects_duplicates() {
        let err = ScopedEntityRegistry::builder()
            .entity("invoice", "tenantId")
            .entity("invoice", "ownerId")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateEntity {
                entity: "invoice".to_string()
            }
        );
    }

    #[test]
    fn builder_rejects_blank_names_and_fields() {
        assert_eq!(
            ScopedEntityRegistry::builder().entity("  ", "tenantId").build().unwrap_err(),
            RegistryError::EmptyEntityName
        );
        assert!(matches!(
            ScopedEntityRegistry::builder().entity("invoice", "").build().unwrap_err(),
            RegistryError::EmptyTenantKeyField { .. }
        ));
    }

    #[test]
    fn empty_registry_knows_nothing() {
        let registry = ScopedEntityRegistry::default();
        assert!(registry.is_empty());
        assert!(!registry.contains("appointment"));
    }
}
