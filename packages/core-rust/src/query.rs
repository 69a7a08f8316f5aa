//! Typed tenant slots for write payloads and read/modify filters.
//!
//! Both carry the owning tenant in a dedicated `Option` slot instead of
//! leaving it somewhere inside an untyped column map. The interceptor decides
//! per operation kind whether an empty slot is filled or a populated slot is
//! rejected; [`Payload::seal`] / [`Filter::seal`] then write the slot back into
//! the column map under the entity's tenant key field.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::TenantId;
use crate::types::{Fields, Value};

/// The column map and the typed slot named two different tenants, or the
/// column held something that cannot be a tenant id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("conflicting tenant values for field {field}")]
pub struct SlotConflict {
    pub field: String,
}

/// Moves a tenant value found under `key` in `fields` into `slot`.
///
/// Blank values on either side count as absent.
fn lift(slot: &mut Option<String>, fields: &mut Fields, key: &str) -> Result<(), SlotConflict> {
    *slot = slot
        .take()
        .and_then(|s| TenantId::parse(&s))
        .map(String::from);

    let conflict = || SlotConflict {
        field: key.to_string(),
    };

    match fields.remove(key) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(raw)) => {
            let Some(found) = TenantId::parse(&raw) else {
                return Ok(());
            };
            match slot.as_deref() {
                Some(existing) if existing == found.as_str() => Ok(()),
                Some(_) => Err(conflict()),
                None => {
                    *slot = Some(found.into());
                    Ok(())
                }
            }
        }
        Some(_) => Err(conflict()),
    }
}

/// Column values for a create, upsert branch, or update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    tenant: Option<String>,
    fields: Fields,
}

impl Payload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an untyped column map. Any tenant value inside is picked up by
    /// [`Payload::lift_tenant_field`].
    #[must_use]
    pub fn from_fields(fields: Fields) -> Self {
        Self {
            tenant: None,
            fields,
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Names the owning tenant explicitly.
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    #[must_use]
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Normalises the slot and absorbs a tenant value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SlotConflict`] when the slot and the column disagree.
    pub fn lift_tenant_field(&mut self, key: &str) -> Result<(), SlotConflict> {
        lift(&mut self.tenant, &mut self.fields, key)
    }

    /// Fills the slot with `tenant` unless one is already present.
    pub fn fill_tenant(&mut self, tenant: &TenantId) {
        if self.tenant.is_none() {
            self.tenant = Some(tenant.as_str().to_string());
        }
    }

    /// Writes the slot into the column map under `key`.
    pub fn seal(&mut self, key: &str) {
        if let Some(tenant) = &self.tenant {
            self.fields
                .insert(key.to_string(), Value::String(tenant.clone()));
        }
    }

    #[must_use]
    pub fn into_fields(self) -> Fields {
        self.fields
    }
}

/// Equality predicates for reads, updates, and deletes.
///
/// An empty filter matches every row of the entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    tenant: Option<String>,
    predicates: Fields,
}

impl Filter {
    /// Matches everything (before tenant injection).
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_predicates(predicates: Fields) -> Self {
        Self {
            tenant: None,
            predicates,
        }
    }

    /// Adds an equality predicate on `name`.
    #[must_use]
    pub fn eq(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.insert(name.into(), value.into());
        self
    }

    /// Filters explicitly on `tenant`.
    #[must_use]
    pub fn for_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    #[must_use]
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    #[must_use]
    pub fn predicates(&self) -> &Fields {
        &self.predicates
    }

    /// See [`Payload::lift_tenant_field`].
    ///
    /// # Errors
    ///
    /// Returns [`SlotConflict`] when the slot and the predicate disagree.
    pub fn lift_tenant_field(&mut self, key: &str) -> Result<(), SlotConflict> {
        lift(&mut self.tenant, &mut self.predicates, key)
    }

    /// Fills the slot with `tenant` unless the caller already named one.
    pub fn fill_tenant(&mut self, tenant: &TenantId) {
        if self.tenant.is_none() {
            self.tenant = Some(tenant.as_str().to_string());
        }
    }

    /// Writes the slot into the predicates under `key`.
    pub fn seal(&mut self, key: &str) {
        if let Some(tenant) = &self.tenant {
            self.predicates
                .insert(key.to_string(), Value::String(tenant.clone()));
        }
    }

    /// True when every predicate equals the corresponding column of `row`.
    #[must_use]
    pub fn matches(&self, row: &Fields) -> bool {
        self.predicates
            .iter()
            .all(|(name, expected)| row.get(name) == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    #[test]
    fn lift_moves_column_value_into_slot() {
        let mut payload = Payload::new().field("tenantId", " t-1 ").field("name", "Facial");
        payload.lift_tenant_field("tenantId").unwrap();
        assert_eq!(payload.tenant(), Some("t-1"));
        assert!(!payload.fields().contains_key("tenantId"));
    }

    #[test]
    fn lift_detects_disagreement() {
        let mut payload = Payload::new().with_tenant("t-1").field("tenantId", "t-2");
        assert_eq!(
            payload.lift_tenant_field("tenantId").unwrap_err(),
            SlotConflict {
                field: "tenantId".to_string()
            }
        );
    }

    #[test]
    fn lift_accepts_agreeing_values() {
        let mut filter = Filter::all().for_tenant("t-1").eq("tenantId", "t-1");
        filter.lift_tenant_field("tenantId").unwrap();
        assert_eq!(filter.tenant(), Some("t-1"));
    }

    #[test]
    fn lift_rejects_non_string_tenant() {
        let mut filter = Filter::all().eq("tenantId", 7_i64);
        assert!(filter.lift_tenant_field("tenantId").is_err());
    }

    #[test]
    fn blank_slot_counts_as_absent() {
        let mut payload = Payload::new().with_tenant("   ").field("tenantId", "");
        payload.lift_tenant_field("tenantId").unwrap();
        assert_eq!(payload.tenant(), None);
        payload.fill_tenant(&tenant("t-9"));
        assert_eq!(payload.tenant(), Some("t-9"));
    }

    #[test]
    fn fill_never_overrides() {
        let mut filter = Filter::all().for_tenant("t-1");
        filter.fill_tenant(&tenant("t-2"));
        assert_eq!(filter.tenant(), Some("t-1"));
    }

    #[test]
    fn seal_writes_slot_under_key() {
        let mut payload = Payload::new().with_tenant("t-1").field("name", "x");
        payload.seal("ownerTenant");
        let fields = payload.into_fields();
        assert_eq!(fields["ownerTenant"], Value::from("t-1"));
        assert_eq!(fields["name"], Value::from("x"));
    }

    #[test]
    fn filter_matches_all_predicates() {
        let mut filter = Filter::all().eq("status", "BOOKED");
        filter.fill_tenant(&tenant("t-1"));
        filter.seal("tenantId");

        let mut row = Fields::new();
        row.insert("tenantId".into(), Value::from("t-1"));
        row.insert("status".into(), Value::from("BOOKED"));
        assert!(filter.matches(&row));

        row.insert("tenantId".into(), Value::from("t-2"));
        assert!(!filter.matches(&row));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::all().matches(&Fields::new()));
    }

    proptest! {
        #[test]
        fn filled_then_sealed_payload_always_carries_a_tenant(
            explicit in proptest::option::of("[a-z]{1,6}"),
            ctx in "[a-z]{1,6}",
        ) {
            let mut payload = Payload::new().field("name", "x");
            if let Some(t) = &explicit {
                payload = payload.with_tenant(t.clone());
            }
            payload.lift_tenant_field("tenantId").unwrap();
            payload.fill_tenant(&tenant(&ctx));
            payload.seal("tenantId");
            let expected = explicit.unwrap_or(ctx);
            prop_assert_eq!(payload.fields().get("tenantId"), Some(&Value::String(expected)));
        }
    }
}
