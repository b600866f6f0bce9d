use serde::{Deserialize, Serialize};

/// Selection and window for `DocumentStore::find`.
///
/// Results always come back in the backend's natural order (insertion order).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindQuery {
  pub filter: Option<ContainsFilter>,
  pub skip: usize,
  /// `None` means unbounded.
  pub limit: Option<usize>,
}

/// Case-insensitive substring match against a string field of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainsFilter {
  pub field: String,
  pub needle: String,
}

impl FindQuery {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a substring filter. An empty needle matches everything and is dropped.
  pub fn contains(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
    let needle = needle.into();
    self.filter = if needle.is_empty() {
      None
    } else {
      Some(ContainsFilter {
        field: field.into(),
        needle,
      })
    };
    self
  }

  pub fn skip(mut self, skip: usize) -> Self {
    self.skip = skip;
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_needle_drops_filter() {
    let q = FindQuery::new().contains("title", "");
    assert!(q.filter.is_none());
  }

  #[test]
  fn builder_sets_window() {
    let q = FindQuery::new().contains("title", "foo").skip(5).limit(5);
    assert_eq!(q.skip, 5);
    assert_eq!(q.limit, Some(5));
    assert_eq!(q.filter.unwrap().needle, "foo");
  }
}
