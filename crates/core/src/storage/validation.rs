//! Pure validation of table names, keys and batches.
//!
//! These run before any remote call so both backends reject the same inputs.

use std::collections::HashSet;

use super::{RepositoryError, Result};
use crate::entity::DynamicEntity;

/// Maximum number of entities in one batch insert.
pub const MAX_BATCH_SIZE: usize = 100;

/// Maximum length of a PartitionKey or RowKey, in bytes.
pub const MAX_KEY_BYTES: usize = 1024;

/// Maximum number of custom properties on one entity.
pub const MAX_PROPERTIES: usize = 252;

/// Maximum length of a property name, in characters.
pub const MAX_PROPERTY_NAME_LEN: usize = 255;

/// Property names owned by the store.
pub const RESERVED_PROPERTIES: [&str; 3] = ["PartitionKey", "RowKey", "Timestamp"];

/// Validates a table name: 3-63 alphanumeric characters, not starting with a digit.
pub fn validate_table_name(name: &str) -> Result<()> {
    if !(3..=63).contains(&name.len()) {
        return Err(RepositoryError::InvalidData(format!(
            "table name '{name}' must be between 3 and 63 characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RepositoryError::InvalidData(format!(
            "table name '{name}' may only contain letters and digits"
        )));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(RepositoryError::InvalidData(format!(
            "table name '{name}' may not start with a digit"
        )));
    }
    if name.eq_ignore_ascii_case("tables") {
        return Err(RepositoryError::InvalidData(
            "table name 'tables' is reserved".to_string(),
        ));
    }
    Ok(())
}

/// Validates a PartitionKey or RowKey value.
pub fn validate_key(kind: &str, value: &str) -> Result<()> {
    if value.len() > MAX_KEY_BYTES {
        return Err(RepositoryError::InvalidData(format!(
            "{kind} exceeds {MAX_KEY_BYTES} bytes"
        )));
    }
    if let Some(c) = value
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control())
    {
        return Err(RepositoryError::InvalidData(format!(
            "{kind} '{value}' contains disallowed character {c:?}"
        )));
    }
    Ok(())
}

/// Validates keys and property names of an entity about to be written.
pub fn validate_entity(entity: &DynamicEntity) -> Result<()> {
    validate_key("PartitionKey", &entity.partition_key)?;
    validate_key("RowKey", &entity.row_key)?;

    if entity.properties.len() > MAX_PROPERTIES {
        return Err(RepositoryError::InvalidData(format!(
            "entity has {} properties, at most {MAX_PROPERTIES} are allowed",
            entity.properties.len()
        )));
    }
    for name in entity.properties.keys() {
        if name.is_empty() || name.chars().count() > MAX_PROPERTY_NAME_LEN {
            return Err(RepositoryError::InvalidData(format!(
                "property name '{name}' must be 1 to {MAX_PROPERTY_NAME_LEN} characters"
            )));
        }
        if RESERVED_PROPERTIES.contains(&name.as_str()) {
            return Err(RepositoryError::InvalidData(format!(
                "property name '{name}' is reserved"
            )));
        }
    }
    Ok(())
}

/// Validates the shape of a batch insert.
///
/// A batch must be non-empty, hold at most [`MAX_BATCH_SIZE`] entities, share one
/// PartitionKey and never repeat a RowKey.
pub fn validate_batch(entities: &[DynamicEntity]) -> Result<()> {
    let Some(first) = entities.first() else {
        return Err(RepositoryError::InvalidData(
            "batch must contain at least one entity".to_string(),
        ));
    };
    if entities.len() > MAX_BATCH_SIZE {
        return Err(RepositoryError::InvalidData(format!(
            "batch holds {} entities, at most {MAX_BATCH_SIZE} are allowed",
            entities.len()
        )));
    }

    let mut row_keys = HashSet::with_capacity(entities.len());
    for entity in entities {
        if entity.partition_key != first.partition_key {
            return Err(RepositoryError::InvalidData(format!(
                "batch spans partitions '{}' and '{}'",
                first.partition_key, entity.partition_key
            )));
        }
        if !row_keys.insert(entity.row_key.as_str()) {
            return Err(RepositoryError::InvalidData(format!(
                "batch repeats RowKey '{}'",
                entity.row_key
            )));
        }
        validate_entity(entity)?;
    }
    Ok(())
}
