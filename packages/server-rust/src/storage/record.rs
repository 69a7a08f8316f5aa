//! Row type returned by the storage layer.

use serde::{Deserialize, Serialize};
use tenantscope_core::{Fields, Value};

/// A stored row: generated identifier, version counter, and its columns.
///
/// The owning tenant lives in `fields` under the entity's tenant key field,
/// exactly as in the external relational schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// Store-assigned identifier (UUID v4).
    pub id: String,
    /// Incremented on every update; 1 after insert.
    pub version: u32,
    /// Column values, including the tenant-owning column.
    pub fields: Fields,
}

impl Row {
    /// Creates a fresh row with a new identifier.
    #[must_use]
    pub fn new(fields: Fields) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            version: 1,
            fields,
        }
    }

    /// Value of `column`, if set.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Applies `changes` column by column and bumps the version.
    pub fn apply(&mut self, changes: &Fields) {
        for (column, value) in changes {
            self.fields.insert(column.clone(), value.clone());
        }
        self.version = self.version.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_overwrites_columns_and_bumps_version() {
        let mut fields = Fields::new();
        fields.insert("status".into(), Value::from("BOOKED"));
        let mut row = Row::new(fields);
        assert_eq!(row.version, 1);

        let mut changes = Fields::new();
        changes.insert("status".into(), Value::from("DONE"));
        row.apply(&changes);

        assert_eq!(row.get("status"), Some(&Value::from("DONE")));
        assert_eq!(row.version, 2);
    }

    #[test]
    fn new_rows_get_distinct_ids() {
        assert_ne!(Row::new(Fields::new()).id, Row::new(Fields::new()).id);
    }
}
