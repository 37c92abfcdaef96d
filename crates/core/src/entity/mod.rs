//! The schema-less entity model.

mod dynamic;
pub mod json;
mod property;
mod traits;

pub use dynamic::DynamicEntity;
pub use property::{EdmType, EntityProperty};
pub use traits::TableEntity;
