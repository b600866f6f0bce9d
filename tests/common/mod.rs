//! Helpers shared by the integration tests.

use std::time::Duration;

use acorn::db::{DocumentStore, SqlDialect, SqliteBackend, StoreError};
use acorn::types::{Document, FindQuery};
use async_trait::async_trait;
use uuid::Uuid;

/// SQLite store whose reads stall before answering.
pub struct StalledStore {
  inner: SqliteBackend,
  delay: Duration,
}

#[async_trait]
impl DocumentStore for StalledStore {
  fn dialect(&self) -> SqlDialect {
    self.inner.dialect()
  }

  async fn init_schema(&self) -> Result<(), StoreError> {
    self.inner.init_schema().await
  }

  async fn drop_schema(&self) -> Result<(), StoreError> {
    self.inner.drop_schema().await
  }

  async fn ping(&self) -> Result<(), StoreError> {
    self.inner.ping().await
  }

  async fn close(&self) -> Result<(), StoreError> {
    self.inner.close().await
  }

  async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
    self.inner.ensure_unique_index(collection, field).await
  }

  async fn insert(
    &self,
    collection: &str,
    data: serde_json::Value,
  ) -> Result<Document, StoreError> {
    self.inner.insert(collection, data).await
  }

  async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
    tokio::time::sleep(self.delay).await;
    self.inner.get(collection, id).await
  }

  async fn update(
    &self,
    collection: &str,
    id: Uuid,
    patch: serde_json::Value,
  ) -> Result<Option<Document>, StoreError> {
    self.inner.update(collection, id, patch).await
  }

  async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
    self.inner.delete(collection, id).await
  }

  async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
    tokio::time::sleep(self.delay).await;
    self.inner.find(collection, query).await
  }
}

impl StalledStore {
  /// In-memory SQLite with the schema already created.
  pub async fn new(delay: Duration) -> Self {
    let inner = SqliteBackend::in_memory().await.unwrap();
    inner.init_schema().await.unwrap();
    Self { inner, delay }
  }
}
