use crate::db::StoreError;

/// Failure of a note operation, carrying the detail shown to clients.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
  /// Malformed note identifier.
  #[error("Invalid id: {0}")]
  InvalidArgument(String),
  #[error("No note with this id: {0} found")]
  NotFound(String),
  /// Another note already uses this title.
  #[error("Note with title: {0} already exists")]
  Conflict(String),
  /// Payload passed deserialization but breaks a field rule.
  #[error("{0}")]
  Validation(String),
  #[error(transparent)]
  Internal(#[from] StoreError),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn details_name_the_offender() {
    assert_eq!(
      ServiceError::InvalidArgument("abc".into()).to_string(),
      "Invalid id: abc"
    );
    assert_eq!(
      ServiceError::NotFound("abc".into()).to_string(),
      "No note with this id: abc found"
    );
    assert_eq!(
      ServiceError::Conflict("A".into()).to_string(),
      "Note with title: A already exists"
    );
  }
}
