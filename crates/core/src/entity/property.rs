use chrono::{DateTime, Utc};
use uuid::Uuid;

/// EDM type names understood by the table store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdmType {
    String,
    Int32,
    Int64,
    Double,
    Boolean,
    DateTime,
    Binary,
    Guid,
}

impl EdmType {
    /// The `Edm.*` name used in `@odata.type` annotations.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdmType::String => "Edm.String",
            EdmType::Int32 => "Edm.Int32",
            EdmType::Int64 => "Edm.Int64",
            EdmType::Double => "Edm.Double",
            EdmType::Boolean => "Edm.Boolean",
            EdmType::DateTime => "Edm.DateTime",
            EdmType::Binary => "Edm.Binary",
            EdmType::Guid => "Edm.Guid",
        }
    }

    /// Parses an `Edm.*` name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Edm.String" => Some(EdmType::String),
            "Edm.Int32" => Some(EdmType::Int32),
            "Edm.Int64" => Some(EdmType::Int64),
            "Edm.Double" => Some(EdmType::Double),
            "Edm.Boolean" => Some(EdmType::Boolean),
            "Edm.DateTime" => Some(EdmType::DateTime),
            "Edm.Binary" => Some(EdmType::Binary),
            "Edm.Guid" => Some(EdmType::Guid),
            _ => None,
        }
    }
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityProperty {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Binary(Vec<u8>),
    Guid(Uuid),
}

impl EntityProperty {
    pub fn edm_type(&self) -> EdmType {
        match self {
            EntityProperty::String(_) => EdmType::String,
            EntityProperty::Int32(_) => EdmType::Int32,
            EntityProperty::Int64(_) => EdmType::Int64,
            EntityProperty::Double(_) => EdmType::Double,
            EntityProperty::Boolean(_) => EdmType::Boolean,
            EntityProperty::DateTime(_) => EdmType::DateTime,
            EntityProperty::Binary(_) => EdmType::Binary,
            EntityProperty::Guid(_) => EdmType::Guid,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EntityProperty::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            EntityProperty::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Int64 value, widening Int32.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EntityProperty::Int32(v) => Some(i64::from(*v)),
            EntityProperty::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Double value, widening Int32.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EntityProperty::Double(v) => Some(*v),
            EntityProperty::Int32(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EntityProperty::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            EntityProperty::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            EntityProperty::Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            EntityProperty::Guid(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for EntityProperty {
    fn from(value: &str) -> Self {
        EntityProperty::String(value.to_string())
    }
}

impl From<String> for EntityProperty {
    fn from(value: String) -> Self {
        EntityProperty::String(value)
    }
}

impl From<i32> for EntityProperty {
    fn from(value: i32) -> Self {
        EntityProperty::Int32(value)
    }
}

impl From<i64> for EntityProperty {
    fn from(value: i64) -> Self {
        EntityProperty::Int64(value)
    }
}

impl From<f64> for EntityProperty {
    fn from(value: f64) -> Self {
        EntityProperty::Double(value)
    }
}

impl From<bool> for EntityProperty {
    fn from(value: bool) -> Self {
        EntityProperty::Boolean(value)
    }
}

impl From<DateTime<Utc>> for EntityProperty {
    fn from(value: DateTime<Utc>) -> Self {
        EntityProperty::DateTime(value)
    }
}

impl From<Vec<u8>> for EntityProperty {
    fn from(value: Vec<u8>) -> Self {
        EntityProperty::Binary(value)
    }
}

impl From<Uuid> for EntityProperty {
    fn from(value: Uuid) -> Self {
        EntityProperty::Guid(value)
    }
}
