mod document;
mod note;
mod query;

pub use document::Document;
pub use note::{
  CreateNote, ListNoteResponse, Note, NoteFields, NoteId, NoteMappingError, NoteResponse,
  UpdateNote,
};
pub use query::{ContainsFilter, FindQuery};
