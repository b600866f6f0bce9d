use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;

/// Identifier of a note, as assigned by the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
  pub fn as_uuid(&self) -> Uuid {
    self.0
  }
}

impl From<Uuid> for NoteId {
  fn from(id: Uuid) -> Self {
    Self(id)
  }
}

impl FromStr for NoteId {
  type Err = uuid::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Uuid::parse_str(s).map(Self)
  }
}

impl fmt::Display for NoteId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// A note as exposed on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
  pub id: NoteId,
  pub title: String,
  pub content: String,
  pub category: String,
  pub published: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// The note fields stored in `Document::data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteFields {
  pub title: String,
  pub content: String,
  pub category: String,
  pub published: bool,
}

/// Creation payload. Server-managed fields (`id`, `createdAt`, `updatedAt`)
/// are rejected as unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateNote {
  pub title: String,
  pub content: String,
  #[serde(default)]
  pub category: String,
  #[serde(default)]
  pub published: bool,
}

/// Partial update payload. Omitted (or `null`) fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateNote {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub published: Option<bool>,
}

impl UpdateNote {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.content.is_none()
      && self.category.is_none()
      && self.published.is_none()
  }
}

impl From<CreateNote> for NoteFields {
  fn from(p: CreateNote) -> Self {
    Self {
      title: p.title,
      content: p.content,
      category: p.category,
      published: p.published,
    }
  }
}

/// A stored document that does not have the shape of a note.
#[derive(Debug, thiserror::Error)]
#[error("document {id} is not a valid note: {source}")]
pub struct NoteMappingError {
  pub id: Uuid,
  #[source]
  pub source: serde_json::Error,
}

impl TryFrom<Document> for Note {
  type Error = NoteMappingError;

  fn try_from(doc: Document) -> Result<Self, Self::Error> {
    let id = doc.id;
    let fields: NoteFields =
      serde_json::from_value(doc.data).map_err(|source| NoteMappingError { id, source })?;
    Ok(Self {
      id: NoteId(id),
      title: fields.title,
      content: fields.content,
      category: fields.category,
      published: fields.published,
      created_at: doc.created_at,
      updated_at: doc.updated_at,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteResponse {
  pub status: String,
  pub note: Note,
}

impl NoteResponse {
  pub fn success(note: Note) -> Self {
    Self {
      status: "success".into(),
      note,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListNoteResponse {
  pub status: String,
  pub results: usize,
  pub notes: Vec<Note>,
}

impl ListNoteResponse {
  pub fn success(notes: Vec<Note>) -> Self {
    Self {
      status: "success".into(),
      results: notes.len(),
      notes,
    }
  }
}
