use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::EntityProperty;
use crate::storage::{RepositoryError, Result};

/// A schema-less entity: a key pair plus a bag of typed properties.
///
/// `timestamp` and `etag` are assigned by the store and ignored on write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicEntity {
    pub partition_key: String,
    pub row_key: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub properties: BTreeMap<String, EntityProperty>,
}

impl DynamicEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            ..Default::default()
        }
    }

    /// Builder-style property setter.
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<EntityProperty>,
    ) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&EntityProperty> {
        self.properties.get(name)
    }

    /// Whether both entities have the same keys and properties.
    ///
    /// Store-assigned metadata (timestamp, etag) is not compared.
    pub fn same_record(&self, other: &DynamicEntity) -> bool {
        self.partition_key == other.partition_key
            && self.row_key == other.row_key
            && self.properties == other.properties
    }

    /// Copy of the entity without store-assigned metadata.
    pub fn without_metadata(&self) -> DynamicEntity {
        DynamicEntity {
            timestamp: None,
            etag: None,
            ..self.clone()
        }
    }

    // ------------------------------------------------------------------------
    // Typed accessors used by `TableEntity` implementations
    // ------------------------------------------------------------------------

    pub fn get_string(&self, name: &str) -> Result<String> {
        self.typed(name, "String", |p| p.as_str().map(str::to_string))
    }

    pub fn get_optional_string(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|p| p.as_str()).map(str::to_string)
    }

    pub fn get_i32(&self, name: &str) -> Result<i32> {
        self.typed(name, "Int32", EntityProperty::as_i32)
    }

    pub fn get_i64(&self, name: &str) -> Result<i64> {
        self.typed(name, "Int64", EntityProperty::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Result<f64> {
        self.typed(name, "Double", EntityProperty::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        self.typed(name, "Boolean", EntityProperty::as_bool)
    }

    pub fn get_datetime(&self, name: &str) -> Result<DateTime<Utc>> {
        self.typed(name, "DateTime", EntityProperty::as_datetime)
    }

    pub fn get_guid(&self, name: &str) -> Result<Uuid> {
        self.typed(name, "Guid", EntityProperty::as_guid)
    }

    fn typed<V>(
        &self,
        name: &str,
        expected: &str,
        extract: impl FnOnce(&EntityProperty) -> Option<V>,
    ) -> Result<V> {
        let property = self.get(name).ok_or_else(|| {
            RepositoryError::Serialization(format!("Missing property: {name}"))
        })?;
        extract(property).ok_or_else(|| {
            RepositoryError::Serialization(format!(
                "Property {name} is {}, expected {expected}",
                property.edm_type().as_str()
            ))
        })
    }
}
