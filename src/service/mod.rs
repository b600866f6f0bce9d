mod error;
mod notes;

pub use error::ServiceError;
pub use notes::{ListParams, NoteService, DEFAULT_COLLECTION, DEFAULT_TIMEOUT};
