use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::ServiceError;
use crate::db::{DocumentStore, StoreError};
use crate::types::{
  CreateNote, Document, FindQuery, ListNoteResponse, Note, NoteFields, NoteId, NoteResponse,
  UpdateNote,
};

pub const DEFAULT_COLLECTION: &str = "notes";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const TITLE_FIELD: &str = "title";

/// Query parameters of the list operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListParams {
  #[serde(default = "default_limit")]
  pub limit: usize,
  #[serde(default = "default_page")]
  pub page: usize,
  #[serde(default)]
  pub search: String,
}

fn default_limit() -> usize {
  10
}

fn default_page() -> usize {
  1
}

impl Default for ListParams {
  fn default() -> Self {
    Self {
      limit: default_limit(),
      page: default_page(),
      search: String::new(),
    }
  }
}

impl ListParams {
  /// Offset of the first note on this page. Pages below 1 count as page 1.
  pub fn skip(&self) -> usize {
    (self.page.max(1) - 1).saturating_mul(self.limit)
  }
}

/// CRUD over the notes collection of a document store.
///
/// Holds no note state of its own: every call goes to the store, bounded by
/// the configured per-call timeout.
pub struct NoteService {
  store: Arc<dyn DocumentStore>,
  collection: String,
  timeout: Option<Duration>,
}

impl NoteService {
  pub fn new(store: Arc<dyn DocumentStore>) -> Self {
    Self {
      store,
      collection: DEFAULT_COLLECTION.into(),
      timeout: Some(DEFAULT_TIMEOUT),
    }
  }

  pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
    self.collection = collection.into();
    self
  }

  /// `None` disables the per-call timeout.
  ///
  /// Expiry only abandons the wait. A write the backend has already started
  /// (the SQLite worker thread, a query sent to PostgreSQL) still runs to
  /// completion, so a timed-out create or update may be persisted.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn collection(&self) -> &str {
    &self.collection
  }

  /// Creates the unique title index. Call once after the store schema exists.
  pub async fn init(&self) -> Result<(), ServiceError> {
    self
      .bounded(self.store.ensure_unique_index(&self.collection, TITLE_FIELD))
      .await?;
    Ok(())
  }

  pub async fn list(&self, params: &ListParams) -> Result<ListNoteResponse, ServiceError> {
    let query = FindQuery::new()
      .contains(TITLE_FIELD, params.search.as_str())
      .skip(params.skip())
      .limit(params.limit);
    let docs = self
      .bounded(self.store.find(&self.collection, &query))
      .await?;
    let notes = docs
      .into_iter()
      .map(to_note)
      .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(
      results = notes.len(),
      page = params.page,
      limit = params.limit,
      "Listed notes"
    );
    Ok(ListNoteResponse::success(notes))
  }

  pub async fn create(&self, payload: CreateNote) -> Result<NoteResponse, ServiceError> {
    validate_title(&payload.title)?;

    let title = payload.title.clone();
    let data = serde_json::to_value(NoteFields::from(payload))
      .map_err(anyhow::Error::from)
      .map_err(StoreError::from)?;

    let inserted = match self.bounded(self.store.insert(&self.collection, data)).await {
      Ok(doc) => doc,
      Err(StoreError::UniqueViolation(_)) => return Err(ServiceError::Conflict(title)),
      Err(e) => return Err(e.into()),
    };

    // Serve the persisted form, not the insert echo.
    let stored = self
      .bounded(self.store.get(&self.collection, inserted.id))
      .await?
      .ok_or_else(|| ServiceError::NotFound(inserted.id.to_string()))?;
    tracing::info!(id = %stored.id, "Note created");
    Ok(NoteResponse::success(to_note(stored)?))
  }

  pub async fn get_by_id(&self, id: &str) -> Result<NoteResponse, ServiceError> {
    let note_id = parse_id(id)?;
    let doc = self
      .bounded(self.store.get(&self.collection, note_id.as_uuid()))
      .await?
      .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
    Ok(NoteResponse::success(to_note(doc)?))
  }

  /// Sets only the fields present in `payload` and refreshes `updatedAt`.
  pub async fn update(&self, id: &str, payload: UpdateNote) -> Result<NoteResponse, ServiceError> {
    let note_id = parse_id(id)?;
    if let Some(title) = &payload.title {
      validate_title(title)?;
    }
    if payload.is_empty() {
      tracing::debug!(id, "Empty update, refreshing updatedAt only");
    }

    let patch = serde_json::to_value(&payload)
      .map_err(anyhow::Error::from)
      .map_err(StoreError::from)?;
    let updated = match self
      .bounded(self.store.update(&self.collection, note_id.as_uuid(), patch))
      .await
    {
      Ok(doc) => doc,
      Err(StoreError::UniqueViolation(_)) => {
        return Err(ServiceError::Conflict(payload.title.unwrap_or_default()))
      }
      Err(e) => return Err(e.into()),
    };

    let doc = updated.ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
    tracing::info!(id = %doc.id, "Note updated");
    Ok(NoteResponse::success(to_note(doc)?))
  }

  pub async fn delete_by_id(&self, id: &str) -> Result<(), ServiceError> {
    let note_id = parse_id(id)?;
    let removed = self
      .bounded(self.store.delete(&self.collection, note_id.as_uuid()))
      .await?;
    match removed {
      Some(doc) => {
        tracing::info!(id = %doc.id, "Note deleted");
        Ok(())
      }
      None => Err(ServiceError::NotFound(id.to_string())),
    }
  }

  async fn bounded<T>(
    &self,
    call: impl Future<Output = Result<T, StoreError>>,
  ) -> Result<T, StoreError> {
    match self.timeout {
      Some(limit) => tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?,
      None => call.await,
    }
  }
}

fn parse_id(raw: &str) -> Result<NoteId, ServiceError> {
  raw
    .parse()
    .map_err(|_| ServiceError::InvalidArgument(raw.to_string()))
}

fn validate_title(title: &str) -> Result<(), ServiceError> {
  if title.trim().is_empty() {
    return Err(ServiceError::Validation("title must not be empty".into()));
  }
  Ok(())
}

fn to_note(doc: Document) -> Result<Note, ServiceError> {
  Note::try_from(doc).map_err(|e| StoreError::Corrupt(e.to_string()).into())
}
