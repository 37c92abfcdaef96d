//! JSON representation of entities.
//!
//! One flat object per entity: `PartitionKey`, `RowKey`, optional `Timestamp` and
//! `odata.etag`, then one member per property. Types JSON cannot express on its own
//! carry a `<name>@odata.type` annotation, which is the same shape the table store
//! speaks on the wire with `odata=minimalmetadata`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use super::{DynamicEntity, EdmType, EntityProperty};
use crate::storage::{RepositoryError, Result};

pub const PARTITION_KEY: &str = "PartitionKey";
pub const ROW_KEY: &str = "RowKey";
pub const TIMESTAMP: &str = "Timestamp";
pub const ODATA_ETAG: &str = "odata.etag";

const ODATA_PREFIX: &str = "odata.";
const TYPE_SUFFIX: &str = "@odata.type";

/// Metadata members the store may add to a response; they carry no entity data.
const SERVER_METADATA: [&str; 4] = ["odata.metadata", "odata.type", "odata.id", "odata.editLink"];

/// Full record: keys, store metadata and properties.
pub fn entity_to_json(entity: &DynamicEntity) -> Map<String, Value> {
    let mut map = entity_to_write_json(entity);
    if let Some(timestamp) = entity.timestamp {
        map.insert(TIMESTAMP.to_string(), Value::String(format_datetime(&timestamp)));
    }
    if let Some(etag) = &entity.etag {
        map.insert(ODATA_ETAG.to_string(), Value::String(etag.clone()));
    }
    map
}

/// Keys and properties only, as sent to the store on insert or replace.
pub fn entity_to_write_json(entity: &DynamicEntity) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        PARTITION_KEY.to_string(),
        Value::String(entity.partition_key.clone()),
    );
    map.insert(ROW_KEY.to_string(), Value::String(entity.row_key.clone()));

    for (name, property) in &entity.properties {
        let (value, annotation) = property_to_json(property);
        if let Some(edm) = annotation {
            map.insert(
                format!("{name}{TYPE_SUFFIX}"),
                Value::String(edm.as_str().to_string()),
            );
        }
        map.insert(name.clone(), value);
    }
    map
}

/// Converts a property to its JSON value and the annotation it needs, if any.
pub fn property_to_json(property: &EntityProperty) -> (Value, Option<EdmType>) {
    match property {
        EntityProperty::String(s) => (Value::String(s.clone()), None),
        EntityProperty::Int32(v) => (Value::Number((*v).into()), None),
        EntityProperty::Boolean(v) => (Value::Bool(*v), None),
        EntityProperty::Int64(v) => (Value::String(v.to_string()), Some(EdmType::Int64)),
        EntityProperty::Double(v) => {
            let value = match Number::from_f64(*v) {
                Some(n) => Value::Number(n),
                None if v.is_nan() => Value::String("NaN".to_string()),
                None if *v > 0.0 => Value::String("Infinity".to_string()),
                None => Value::String("-Infinity".to_string()),
            };
            (value, Some(EdmType::Double))
        }
        EntityProperty::DateTime(v) => {
            (Value::String(format_datetime(v)), Some(EdmType::DateTime))
        }
        EntityProperty::Binary(v) => (Value::String(STANDARD.encode(v)), Some(EdmType::Binary)),
        EntityProperty::Guid(v) => (Value::String(v.to_string()), Some(EdmType::Guid)),
    }
}

/// Parses a JSON object into an entity.
///
/// `PartitionKey` and `RowKey` are required strings. Unannotated members are mapped
/// by their JSON type; `null` members are skipped; nested objects and arrays are
/// rejected.
pub fn entity_from_json(mut map: Map<String, Value>) -> Result<DynamicEntity> {
    let partition_key = take_key(&mut map, PARTITION_KEY)?;
    let row_key = take_key(&mut map, ROW_KEY)?;

    let timestamp = match map.remove(TIMESTAMP) {
        Some(Value::String(s)) => Some(parse_datetime(TIMESTAMP, &s)?),
        Some(Value::Null) | None => None,
        Some(other) => {
            return Err(RepositoryError::InvalidData(format!(
                "{TIMESTAMP} must be a string, got {other}"
            )))
        }
    };
    let etag = match map.remove(ODATA_ETAG) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    };

    let mut entity = DynamicEntity {
        partition_key,
        row_key,
        timestamp,
        etag,
        ..Default::default()
    };

    check_members(&map)?;

    let names: Vec<String> = map
        .keys()
        .filter(|k| !k.ends_with(TYPE_SUFFIX) && !k.starts_with(ODATA_PREFIX))
        .cloned()
        .collect();

    for name in names {
        let Some(value) = map.remove(&name) else {
            continue;
        };
        let annotation = match map.get(&format!("{name}{TYPE_SUFFIX}")) {
            Some(Value::String(t)) => Some(t.clone()),
            Some(other) => {
                return Err(RepositoryError::InvalidData(format!(
                    "type annotation of '{name}' must be a string, got {other}"
                )))
            }
            None => None,
        };
        if let Some(property) = property_from_json(&name, value, annotation.as_deref())? {
            entity.properties.insert(name, property);
        }
    }

    Ok(entity)
}

/// Converts one JSON member to a property. Returns `None` for `null`.
pub fn property_from_json(
    name: &str,
    value: Value,
    annotation: Option<&str>,
) -> Result<Option<EntityProperty>> {
    if value.is_null() {
        return Ok(None);
    }

    let Some(annotation) = annotation else {
        return infer_property(name, value).map(Some);
    };
    let edm = EdmType::parse(annotation).ok_or_else(|| {
        RepositoryError::InvalidData(format!("unknown type '{annotation}' for '{name}'"))
    })?;

    let mismatch = |value: &Value| {
        RepositoryError::InvalidData(format!(
            "value {value} of '{name}' is not a valid {annotation}"
        ))
    };

    let property = match (edm, value) {
        (EdmType::String, Value::String(s)) => EntityProperty::String(s),
        (EdmType::Boolean, Value::Bool(b)) => EntityProperty::Boolean(b),
        (EdmType::Int32, value) => {
            let parsed = match &value {
                Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
                Value::String(s) => s.parse().ok(),
                _ => None,
            };
            EntityProperty::Int32(parsed.ok_or_else(|| mismatch(&value))?)
        }
        (EdmType::Int64, value) => {
            let parsed = match &value {
                Value::String(s) => s.parse().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            EntityProperty::Int64(parsed.ok_or_else(|| mismatch(&value))?)
        }
        (EdmType::Double, value) => {
            let parsed = match &value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => match s.as_str() {
                    "NaN" => Some(f64::NAN),
                    "Infinity" => Some(f64::INFINITY),
                    "-Infinity" => Some(f64::NEG_INFINITY),
                    other => other.parse().ok(),
                },
                _ => None,
            };
            EntityProperty::Double(parsed.ok_or_else(|| mismatch(&value))?)
        }
        (EdmType::DateTime, Value::String(s)) => {
            EntityProperty::DateTime(parse_datetime(name, &s)?)
        }
        (EdmType::Binary, Value::String(s)) => EntityProperty::Binary(
            STANDARD
                .decode(s.as_bytes())
                .map_err(|_| mismatch(&Value::String(s.clone())))?,
        ),
        (EdmType::Guid, Value::String(s)) => EntityProperty::Guid(
            Uuid::parse_str(&s).map_err(|_| mismatch(&Value::String(s.clone())))?,
        ),
        (_, value) => return Err(mismatch(&value)),
    };
    Ok(Some(property))
}

fn infer_property(name: &str, value: Value) -> Result<EntityProperty> {
    match value {
        Value::String(s) => Ok(EntityProperty::String(s)),
        Value::Bool(b) => Ok(EntityProperty::Boolean(b)),
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(match i32::try_from(v) {
                    Ok(small) => EntityProperty::Int32(small),
                    Err(_) => EntityProperty::Int64(v),
                })
            } else {
                n.as_f64().map(EntityProperty::Double).ok_or_else(|| {
                    RepositoryError::InvalidData(format!("number {n} of '{name}' is out of range"))
                })
            }
        }
        Value::Array(_) | Value::Object(_) => Err(RepositoryError::InvalidData(format!(
            "property '{name}' must be a scalar value"
        ))),
        Value::Null => Err(RepositoryError::InvalidData(format!(
            "property '{name}' is null"
        ))),
    }
}

/// Rejects members that would otherwise be dropped without a trace: unknown
/// `odata.*` members and type annotations with no value beside them.
fn check_members(map: &Map<String, Value>) -> Result<()> {
    for key in map.keys() {
        if key.starts_with(ODATA_PREFIX) && !SERVER_METADATA.contains(&key.as_str()) {
            return Err(RepositoryError::InvalidData(format!(
                "unknown metadata member '{key}'"
            )));
        }
        if let Some(base) = key.strip_suffix(TYPE_SUFFIX) {
            let is_key = [PARTITION_KEY, ROW_KEY, TIMESTAMP].contains(&base);
            if !is_key && !map.contains_key(base) {
                return Err(RepositoryError::InvalidData(format!(
                    "type annotation '{key}' has no value '{base}'"
                )));
            }
        }
    }
    Ok(())
}

fn take_key(map: &mut Map<String, Value>, key: &str) -> Result<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(RepositoryError::InvalidData(format!(
            "{key} must be a string, got {other}"
        ))),
        None => Err(RepositoryError::InvalidData(format!("missing {key}"))),
    }
}

fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_datetime(name: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::InvalidData(format!("invalid {name} '{value}': {e}")))
}

impl Serialize for DynamicEntity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        entity_to_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DynamicEntity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        entity_from_json(map).map_err(de::Error::custom)
    }
}
