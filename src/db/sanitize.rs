//! Checks for the few names that are spliced into SQL text.
//!
//! Values always travel as bound parameters. Collection names and indexed
//! field paths cannot, because they appear inside index definitions and JSON
//! path literals, so they are restricted to a safe alphabet here.

/// Maximum length for collection names and field paths
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validates a (possibly dotted) document field path such as `title` or
/// `meta.author`.
pub fn validate_identifier(s: &str) -> Result<(), SqlSanitizeError> {
  check_length(s)?;
  check_start(s)?;

  if let Some(c) = s
    .chars()
    .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '.')
  {
    return Err(SqlSanitizeError::InvalidIdentifierChar(c));
  }

  if s.starts_with('.') || s.ends_with('.') || s.contains("..") {
    return Err(SqlSanitizeError::InvalidFieldPath(s.to_string()));
  }

  check_keyword(s)
}

/// Validates a collection name: lowercase alphanumeric plus underscore.
pub fn validate_collection_name(s: &str) -> Result<(), SqlSanitizeError> {
  check_length(s)?;
  check_start(s)?;

  if let Some(c) = s
    .chars()
    .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '_')
  {
    return Err(SqlSanitizeError::InvalidCollectionChar(c));
  }

  check_keyword(s)
}

/// Deterministic name of the unique index over `field` in `collection`.
/// Both inputs must already be validated.
pub fn unique_index_name(collection: &str, field: &str) -> String {
  format!("uq_{}_{}", collection, field.replace('.', "_"))
}

fn check_length(s: &str) -> Result<(), SqlSanitizeError> {
  if s.is_empty() {
    return Err(SqlSanitizeError::EmptyIdentifier);
  }
  if s.len() > MAX_IDENTIFIER_LENGTH {
    return Err(SqlSanitizeError::IdentifierTooLong(s.len()));
  }
  Ok(())
}

fn check_start(s: &str) -> Result<(), SqlSanitizeError> {
  match s.chars().next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => Ok(()),
    Some(c) => Err(SqlSanitizeError::InvalidIdentifierStart(c)),
    None => Err(SqlSanitizeError::EmptyIdentifier),
  }
}

fn check_keyword(s: &str) -> Result<(), SqlSanitizeError> {
  let upper = s.to_ascii_uppercase();
  if SQL_KEYWORDS.contains(&upper.as_str()) {
    return Err(SqlSanitizeError::ReservedKeyword(s.to_string()));
  }
  Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlSanitizeError {
  EmptyIdentifier,
  IdentifierTooLong(usize),
  InvalidIdentifierStart(char),
  InvalidIdentifierChar(char),
  InvalidCollectionChar(char),
  InvalidFieldPath(String),
  ReservedKeyword(String),
}

impl std::fmt::Display for SqlSanitizeError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::EmptyIdentifier => write!(f, "Identifier cannot be empty"),
      Self::IdentifierTooLong(len) => {
        write!(f, "Identifier too long: {} > {}", len, MAX_IDENTIFIER_LENGTH)
      }
      Self::InvalidIdentifierStart(c) => {
        write!(f, "Identifier must start with letter or underscore, got '{}'", c)
      }
      Self::InvalidIdentifierChar(c) => write!(f, "Invalid character in identifier: '{}'", c),
      Self::InvalidCollectionChar(c) => {
        write!(f, "Collection names must be lowercase alphanumeric, got '{}'", c)
      }
      Self::InvalidFieldPath(s) => write!(f, "Invalid field path: {}", s),
      Self::ReservedKeyword(s) => write!(f, "'{}' is a reserved SQL keyword", s),
    }
  }
}

impl std::error::Error for SqlSanitizeError {}

const SQL_KEYWORDS: &[&str] = &[
  "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TABLE", "INDEX", "FROM",
  "WHERE", "AND", "OR", "NOT", "NULL", "TRUE", "FALSE", "ORDER", "BY", "LIMIT", "OFFSET", "JOIN",
  "UNION", "INTO", "VALUES", "SET", "PRIMARY", "KEY", "UNIQUE", "DEFAULT", "TRIGGER", "SCHEMA",
];
