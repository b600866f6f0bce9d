use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::sanitize::SqlSanitizeError;
use crate::types::{Document, FindQuery};

/// SQL dialect of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
  Postgres,
  Sqlite,
}

impl SqlDialect {
  /// SQL expression yielding a (possibly dotted) JSON field of `data` as text.
  /// The field must already be validated.
  pub fn json_text(&self, field: &str) -> String {
    match self {
      Self::Postgres => format!("(data #>> '{{{}}}')", field.replace('.', ",")),
      Self::Sqlite => format!("json_extract(data, '$.{}')", field),
    }
  }
}

/// Classified store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// A unique index rejected the write.
  #[error("unique constraint violated: {0}")]
  UniqueViolation(String),
  #[error("store call timed out after {0:?}")]
  Timeout(Duration),
  /// A stored record could not be decoded.
  #[error("corrupt record: {0}")]
  Corrupt(String),
  #[error(transparent)]
  InvalidName(#[from] SqlSanitizeError),
  #[error(transparent)]
  Backend(#[from] anyhow::Error),
}

/// A JSON document store holding named collections.
///
/// Every method is a single round trip; mutations that return a document do so
/// atomically with the mutation itself.
#[async_trait]
pub trait DocumentStore: Send + Sync {
  fn dialect(&self) -> SqlDialect;

  async fn init_schema(&self) -> Result<(), StoreError>;
  async fn drop_schema(&self) -> Result<(), StoreError>;

  /// Cheap liveness probe.
  async fn ping(&self) -> Result<(), StoreError>;

  /// Releases the underlying connection(s). Later calls fail.
  async fn close(&self) -> Result<(), StoreError>;

  /// Creates (idempotently) a unique index over a string field of `collection`.
  async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError>;

  /// Inserts a new document; the store assigns the id and both timestamps.
  async fn insert(&self, collection: &str, data: serde_json::Value)
    -> Result<Document, StoreError>;

  async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError>;

  /// Merges the top-level keys of `patch` into the document, refreshes
  /// `updated_at` and returns the post-update document.
  async fn update(
    &self,
    collection: &str,
    id: Uuid,
    patch: serde_json::Value,
  ) -> Result<Option<Document>, StoreError>;

  /// Removes the document and returns it as it was before deletion.
  async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError>;

  async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn json_text_per_dialect() {
    assert_eq!(
      SqlDialect::Sqlite.json_text("title"),
      "json_extract(data, '$.title')"
    );
    assert_eq!(SqlDialect::Postgres.json_text("title"), "(data #>> '{title}')");
    assert_eq!(
      SqlDialect::Postgres.json_text("meta.slug"),
      "(data #>> '{meta,slug}')"
    );
  }
}
