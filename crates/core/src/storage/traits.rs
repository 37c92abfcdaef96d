use async_trait::async_trait;

use crate::entity::DynamicEntity;

use super::{ContinuationToken, QueryFilter, QuerySegment, Result};

/// A partition/row keyed table store.
///
/// Implementations perform no retries and no local recovery; every failure is
/// reported as a [`RepositoryError`](super::RepositoryError).
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Creates the table if it does not exist. Returns `true` when it was created.
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool>;

    /// Fetches one page of entities, starting at `continuation` when given.
    async fn query_segment(
        &self,
        table: &str,
        filter: &QueryFilter,
        continuation: Option<&ContinuationToken>,
    ) -> Result<QuerySegment>;

    /// Gets an entity by its key pair. Absent entities are `Ok(None)`.
    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<DynamicEntity>>;

    /// Inserts a new entity. Fails if the key pair already exists.
    async fn insert(&self, table: &str, entity: &DynamicEntity) -> Result<()>;

    /// Inserts all entities atomically. They must share one partition key.
    async fn insert_batch(&self, table: &str, entities: &[DynamicEntity]) -> Result<()>;

    /// Inserts the entity or replaces every property of the existing one.
    async fn insert_or_replace(&self, table: &str, entity: &DynamicEntity) -> Result<()>;

    /// Deletes an entity if its current version matches `etag` (`*` matches any).
    async fn delete(&self, table: &str, partition_key: &str, row_key: &str, etag: &str)
        -> Result<()>;
}
