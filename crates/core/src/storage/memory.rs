//! In-memory table store.
//!
//! Tables are `BTreeMap`s ordered by (PartitionKey, RowKey) wrapped in
//! `Arc<RwLock<_>>`. Queries are paged with real continuation tokens so callers see
//! the same segmented behavior as the hosted store. Data is lost when the store is
//! dropped.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::validation::validate_batch;
use super::{
    entity_id, ContinuationToken, QueryFilter, QuerySegment, RepositoryError, Result, TableStore,
};
use crate::entity::DynamicEntity;

/// Default number of entities per query page, matching the hosted store.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

type Rows = BTreeMap<(String, String), DynamicEntity>;

#[derive(Debug, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, Rows>>>,
    page_size: usize,
    version: Arc<AtomicU64>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store with the default page size.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty store returning at most `page_size` entities per segment.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            page_size: page_size.max(1),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Names of the tables created so far, sorted.
    pub async fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Assigns a fresh timestamp and ETag, as the hosted store does on every write.
    fn stamp(&self, entity: &DynamicEntity) -> DynamicEntity {
        let version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        DynamicEntity {
            timestamp: Some(Utc::now()),
            etag: Some(format!("W/\"{version}\"")),
            ..entity.clone()
        }
    }
}

fn key_of(entity: &DynamicEntity) -> (String, String) {
    (entity.partition_key.clone(), entity.row_key.clone())
}

fn table_not_found(table: &str) -> RepositoryError {
    RepositoryError::QueryFailed(format!("Table not found: {table}"))
}

#[async_trait]
impl TableStore for InMemoryStore {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(table) {
            return Ok(false);
        }
        tables.insert(table.to_string(), Rows::new());
        Ok(true)
    }

    async fn query_segment(
        &self,
        table: &str,
        filter: &QueryFilter,
        continuation: Option<&ContinuationToken>,
    ) -> Result<QuerySegment> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).ok_or_else(|| table_not_found(table))?;

        let lower = match continuation {
            Some(token) => Bound::Included((
                token.next_partition_key.clone(),
                token.next_row_key.clone().unwrap_or_default(),
            )),
            None => Bound::Unbounded,
        };

        let mut matching = rows
            .range((lower, Bound::Unbounded))
            .filter(|(_, entity)| filter.matches(&entity.partition_key));

        let entities: Vec<DynamicEntity> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(_, entity)| entity.clone())
            .collect();
        let continuation = matching
            .next()
            .map(|((pk, rk), _)| ContinuationToken::new(pk.clone(), Some(rk.clone())));

        Ok(QuerySegment {
            entities,
            continuation,
        })
    }

    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<DynamicEntity>> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).ok_or_else(|| table_not_found(table))?;
        Ok(rows
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned())
    }

    async fn insert(&self, table: &str, entity: &DynamicEntity) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        let key = key_of(entity);
        if rows.contains_key(&key) {
            return Err(RepositoryError::entity_exists(
                &entity.partition_key,
                &entity.row_key,
            ));
        }
        rows.insert(key, self.stamp(entity));
        Ok(())
    }

    async fn insert_batch(&self, table: &str, entities: &[DynamicEntity]) -> Result<()> {
        validate_batch(entities)?;

        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        // All-or-nothing: check every key before writing any.
        if let Some(existing) = entities.iter().find(|e| rows.contains_key(&key_of(e))) {
            return Err(RepositoryError::entity_exists(
                &existing.partition_key,
                &existing.row_key,
            ));
        }
        for entity in entities {
            rows.insert(key_of(entity), self.stamp(entity));
        }
        Ok(())
    }

    async fn insert_or_replace(&self, table: &str, entity: &DynamicEntity) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        rows.insert(key_of(entity), self.stamp(entity));
        Ok(())
    }

    async fn delete(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        etag: &str,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        let key = (partition_key.to_string(), row_key.to_string());
        let current = rows
            .get(&key)
            .ok_or_else(|| RepositoryError::entity_not_found(partition_key, row_key))?;

        if etag != "*" && current.etag.as_deref() != Some(etag) {
            return Err(RepositoryError::PreconditionFailed {
                entity_type: "Entity",
                id: entity_id(partition_key, row_key),
            });
        }
        rows.remove(&key);
        Ok(())
    }
}
