use super::DynamicEntity;
use crate::storage::Result;

/// A record type that can be stored in a table.
///
/// Implementations must convert losslessly: `from_entity(to_entity(x)?)` rebuilds
/// `x` with every property at its original type.
pub trait TableEntity: Sized + Send + Sync {
    fn to_entity(&self) -> Result<DynamicEntity>;

    fn from_entity(entity: DynamicEntity) -> Result<Self>;
}

impl TableEntity for DynamicEntity {
    fn to_entity(&self) -> Result<DynamicEntity> {
        Ok(self.clone())
    }

    fn from_entity(entity: DynamicEntity) -> Result<Self> {
        Ok(entity)
    }
}
