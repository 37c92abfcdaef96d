//! Core types for tablestore.
//!
//! - [`entity`]: the schema-less entity model and its JSON representation
//! - [`storage`]: the storage backend trait, query types and repository errors
//! - [`connector`]: the generic [`TableConnector`] facade used by the REST layer

pub mod connector;
pub mod entity;
pub mod storage;

pub use connector::TableConnector;
pub use entity::{DynamicEntity, EdmType, EntityProperty, TableEntity};
pub use storage::{RepositoryError, Result};
