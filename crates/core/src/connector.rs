//! Generic table connector.
//!
//! [`TableConnector`] is bound at construction to one record type `T` and one
//! [`TableStore`]. Every operation takes an optional table name that falls back to
//! the connector's default table when absent or blank.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::entity::{DynamicEntity, TableEntity};
use crate::storage::validation::{validate_batch, validate_entity, validate_key, validate_table_name};
use crate::storage::{ContinuationToken, QueryFilter, RepositoryError, Result, TableStore};

/// A resolved table: its name and the store that holds it.
///
/// Handles are only produced after the table is known to exist.
#[derive(Clone)]
pub struct TableHandle {
    name: Arc<str>,
    store: Arc<dyn TableStore>,
}

impl TableHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs a segmented query and follows continuation tokens until the store
    /// reports no more pages. Entities are returned in store order.
    ///
    /// There is no page bound: the whole result set is held in memory.
    pub async fn query_all(&self, filter: &QueryFilter) -> Result<Vec<DynamicEntity>> {
        let mut results = Vec::new();
        let mut continuation: Option<ContinuationToken> = None;
        let mut pages = 0_usize;

        loop {
            let segment = self
                .store
                .query_segment(&self.name, filter, continuation.as_ref())
                .await?;
            pages += 1;
            results.extend(segment.entities);

            match segment.continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        tracing::debug!(
            table = %self.name,
            filter = ?filter,
            pages,
            count = results.len(),
            "Drained segmented query"
        );
        Ok(results)
    }
}

/// Data-access facade over one record type.
pub struct TableConnector<T> {
    store: Arc<dyn TableStore>,
    default_table: String,
    tables: RwLock<HashMap<String, TableHandle>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: TableEntity> TableConnector<T> {
    /// Creates a connector over `store` using `default_table` when no table is given.
    pub fn new(store: Arc<dyn TableStore>, default_table: impl Into<String>) -> Self {
        Self {
            store,
            default_table: default_table.into(),
            tables: RwLock::new(HashMap::new()),
            _entity: PhantomData,
        }
    }

    pub fn default_table(&self) -> &str {
        &self.default_table
    }

    /// Every entity in the table.
    pub async fn get_full_list(&self, table_name: Option<&str>) -> Result<Vec<T>> {
        let table = self.resolve_table(table_name).await?;
        let entities = table.query_all(&QueryFilter::All).await?;
        entities.into_iter().map(T::from_entity).collect()
    }

    /// Every entity whose PartitionKey equals `partition_key`.
    pub async fn get_list(&self, partition_key: &str, table_name: Option<&str>) -> Result<Vec<T>> {
        validate_key("PartitionKey", partition_key)?;
        let table = self.resolve_table(table_name).await?;
        let filter = QueryFilter::PartitionKey(partition_key.to_string());
        let entities = table.query_all(&filter).await?;
        entities.into_iter().map(T::from_entity).collect()
    }

    /// Point lookup. `Ok(None)` when no such entity exists.
    pub async fn get_item(
        &self,
        partition_key: &str,
        row_key: &str,
        table_name: Option<&str>,
    ) -> Result<Option<T>> {
        let table = self.resolve_table(table_name).await?;
        let entity = self.retrieve(&table, partition_key, row_key).await?;
        entity.map(T::from_entity).transpose()
    }

    /// Inserts a new entity. Fails with `AlreadyExists` when the key pair is taken.
    pub async fn insert(&self, item: &T, table_name: Option<&str>) -> Result<()> {
        let entity = item.to_entity()?;
        validate_entity(&entity)?;
        let table = self.resolve_table(table_name).await?;

        self.store.insert(table.name(), &entity).await?;

        tracing::info!(
            table = table.name(),
            partition_key = %entity.partition_key,
            row_key = %entity.row_key,
            "Inserted entity"
        );
        Ok(())
    }

    /// Inserts all items in one atomic batch.
    ///
    /// The batch must be non-empty, hold at most
    /// [`MAX_BATCH_SIZE`](crate::storage::MAX_BATCH_SIZE) items, share one
    /// PartitionKey and never repeat a RowKey. Nothing is written when any check fails.
    pub async fn insert_batch(&self, items: &[T], table_name: Option<&str>) -> Result<()> {
        let entities = items
            .iter()
            .map(T::to_entity)
            .collect::<Result<Vec<_>>>()?;
        validate_batch(&entities)?;
        let table = self.resolve_table(table_name).await?;

        self.store.insert_batch(table.name(), &entities).await?;

        tracing::info!(
            table = table.name(),
            partition_key = %entities[0].partition_key,
            count = entities.len(),
            "Inserted entity batch"
        );
        Ok(())
    }

    /// Insert-or-replace. Replaces every property; the ETag is not checked.
    pub async fn update(&self, item: &T, table_name: Option<&str>) -> Result<()> {
        let entity = item.to_entity()?;
        validate_entity(&entity)?;
        let table = self.resolve_table(table_name).await?;

        self.store.insert_or_replace(table.name(), &entity).await?;

        tracing::info!(
            table = table.name(),
            partition_key = %entity.partition_key,
            row_key = %entity.row_key,
            "Upserted entity"
        );
        Ok(())
    }

    /// Looks the entity up, then deletes it conditioned on the version it read.
    ///
    /// Fails with `NotFound` when the entity does not exist and with
    /// `PreconditionFailed` when it changed between the lookup and the delete.
    pub async fn delete(
        &self,
        partition_key: &str,
        row_key: &str,
        table_name: Option<&str>,
    ) -> Result<()> {
        let table = self.resolve_table(table_name).await?;
        let entity = self
            .retrieve(&table, partition_key, row_key)
            .await?
            .ok_or_else(|| RepositoryError::entity_not_found(partition_key, row_key))?;

        let etag = entity.etag.as_deref().unwrap_or("*");
        self.store
            .delete(table.name(), partition_key, row_key, etag)
            .await?;

        tracing::info!(
            table = table.name(),
            partition_key,
            row_key,
            "Deleted entity"
        );
        Ok(())
    }

    async fn retrieve(
        &self,
        table: &TableHandle,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<DynamicEntity>> {
        validate_key("PartitionKey", partition_key)?;
        validate_key("RowKey", row_key)?;
        self.store
            .retrieve(table.name(), partition_key, row_key)
            .await
    }

    /// Name of the table an operation addresses.
    fn table_name<'a>(&'a self, table_name: Option<&'a str>) -> &'a str {
        match table_name.map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.default_table,
        }
    }

    /// Returns the cached handle for the table, creating the table on first use.
    async fn resolve_table(&self, table_name: Option<&str>) -> Result<TableHandle> {
        let name = self.table_name(table_name);

        if let Some(handle) = self.tables.read().await.get(name) {
            return Ok(handle.clone());
        }

        validate_table_name(name)?;
        let created = self.store.create_table_if_not_exists(name).await?;
        if created {
            tracing::info!(table = name, "Created table");
        }

        let handle = TableHandle {
            name: Arc::from(name),
            store: Arc::clone(&self.store),
        };
        self.tables
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(|| handle.clone());
        Ok(handle)
    }
}
