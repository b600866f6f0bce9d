use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use super::backend::{DocumentStore, SqlDialect, StoreError};
use super::sanitize::{unique_index_name, validate_collection_name, validate_identifier};
use crate::types::{Document, FindQuery};

const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
"#;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    data TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
"#;

const COLUMNS: &str = "id, collection, data, created_at, updated_at";

/// Unicode-aware replacement for SQLite's ASCII-only `lower()`.
const UNICODE_LOWER: &str = "unicode_lower";

/// Embedded store on a single SQLite connection.
///
/// Every call runs on the connection's worker thread, so each statement is
/// atomic with respect to the others.
pub struct SqliteBackend {
  conn: Connection,
}

impl SqliteBackend {
  pub async fn new(path: &str) -> Result<Self, StoreError> {
    let opened = if path == ":memory:" {
      Connection::open_in_memory().await
    } else {
      Connection::open(path).await
    };
    let conn = opened.map_err(classify)?;

    conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        register_functions(conn)?;
        Ok(())
      })
      .await
      .map_err(classify)?;

    Ok(Self { conn })
  }

  pub async fn in_memory() -> Result<Self, StoreError> {
    Self::new(":memory:").await
  }
}

#[async_trait]
impl DocumentStore for SqliteBackend {
  fn dialect(&self) -> SqlDialect {
    SqlDialect::Sqlite
  }

  async fn init_schema(&self) -> Result<(), StoreError> {
    self
      .conn
      .call(|conn| conn.execute_batch(SCHEMA).map_err(|e| e.into()))
      .await
      .map_err(classify)?;
    tracing::info!("SQLite schema initialized");
    Ok(())
  }

  async fn drop_schema(&self) -> Result<(), StoreError> {
    self
      .conn
      .call(|conn| {
        conn
          .execute_batch("DROP TABLE IF EXISTS documents;")
          .map_err(|e| e.into())
      })
      .await
      .map_err(classify)
  }

  async fn ping(&self) -> Result<(), StoreError> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
      })
      .await
      .map_err(classify)
  }

  async fn close(&self) -> Result<(), StoreError> {
    self.conn.clone().close().await.map_err(classify)
  }

  async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
    validate_collection_name(collection)?;
    validate_identifier(field)?;

    // Partial index so the constraint is scoped to one collection.
    let sql = format!(
      "CREATE UNIQUE INDEX IF NOT EXISTS {} ON documents({}) WHERE collection = '{}'",
      unique_index_name(collection, field),
      self.dialect().json_text(field),
      collection
    );
    self
      .conn
      .call(move |conn| conn.execute_batch(&sql).map_err(|e| e.into()))
      .await
      .map_err(classify)?;
    tracing::info!(collection, field, "Unique index ensured");
    Ok(())
  }

  async fn insert(
    &self,
    collection: &str,
    data: serde_json::Value,
  ) -> Result<Document, StoreError> {
    validate_collection_name(collection)?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    let data_str = serde_json::to_string(&data).map_err(anyhow::Error::from)?;
    let now_str = now.to_rfc3339();
    let col = collection.to_string();
    let id_str = id.to_string();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (id, collection, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
          params![id_str, col, data_str, now_str],
        )?;
        Ok(())
      })
      .await
      .map_err(classify)?;

    Ok(Document {
      id,
      collection: collection.into(),
      data,
      created_at: now,
      updated_at: now,
    })
  }

  async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
    validate_collection_name(collection)?;

    let col = collection.to_string();
    let id_str = id.to_string();
    let sql = format!("SELECT {COLUMNS} FROM documents WHERE collection = ?1 AND id = ?2");

    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&sql)?;
        Ok(stmt.query_row(params![col, id_str], row_to_doc).optional()?)
      })
      .await
      .map_err(classify)
  }

  async fn update(
    &self,
    collection: &str,
    id: Uuid,
    patch: serde_json::Value,
  ) -> Result<Option<Document>, StoreError> {
    validate_collection_name(collection)?;
    if !patch.is_object() {
      return Err(anyhow::anyhow!("update patch must be a JSON object").into());
    }

    let col = collection.to_string();
    let id_str = id.to_string();
    let patch_str = serde_json::to_string(&patch).map_err(anyhow::Error::from)?;
    let now_str = Utc::now().to_rfc3339();
    let sql = format!(
      "UPDATE documents SET data = json_patch(data, ?1), updated_at = ?2 \
       WHERE collection = ?3 AND id = ?4 RETURNING {COLUMNS}"
    );

    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&sql)?;
        Ok(
          stmt
            .query_row(params![patch_str, now_str, col, id_str], row_to_doc)
            .optional()?,
        )
      })
      .await
      .map_err(classify)
  }

  async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
    validate_collection_name(collection)?;

    let col = collection.to_string();
    let id_str = id.to_string();
    let sql =
      format!("DELETE FROM documents WHERE collection = ?1 AND id = ?2 RETURNING {COLUMNS}");

    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&sql)?;
        Ok(stmt.query_row(params![col, id_str], row_to_doc).optional()?)
      })
      .await
      .map_err(classify)
  }

  async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
    validate_collection_name(collection)?;

    let mut sql = String::with_capacity(256);
    sql.push_str("SELECT ");
    sql.push_str(COLUMNS);
    sql.push_str(" FROM documents WHERE collection = ?");
    let mut values = vec![Value::Text(collection.to_string())];

    if let Some(f) = &query.filter {
      validate_identifier(&f.field)?;
      sql.push_str(&format!(
        " AND instr({UNICODE_LOWER}({}), {UNICODE_LOWER}(?)) > 0",
        self.dialect().json_text(&f.field)
      ));
      values.push(Value::Text(f.needle.clone()));
    }

    // Negative LIMIT means no limit in SQLite.
    sql.push_str(" ORDER BY rowid LIMIT ? OFFSET ?");
    values.push(Value::Integer(query.limit.map(to_i64).unwrap_or(-1)));
    values.push(Value::Integer(to_i64(query.skip)));

    let capacity = query.limit.unwrap_or(16).min(1024);
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut docs = Vec::with_capacity(capacity);
        while let Some(row) = rows.next()? {
          docs.push(row_to_doc(row)?);
        }
        Ok(docs)
      })
      .await
      .map_err(classify)
  }
}

fn register_functions(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
  conn.create_scalar_function(
    UNICODE_LOWER,
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| {
      let text: Option<String> = ctx.get(0)?;
      Ok(text.map(|t| t.to_lowercase()))
    },
  )
}

fn to_i64(n: usize) -> i64 {
  i64::try_from(n).unwrap_or(i64::MAX)
}

fn classify(err: tokio_rusqlite::Error) -> StoreError {
  match err {
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, msg))
      if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
    {
      StoreError::UniqueViolation(msg.unwrap_or_else(|| code.to_string()))
    }
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::FromSqlConversionFailure(col, _, e)) => {
      StoreError::Corrupt(format!("column {}: {}", col, e))
    }
    other => StoreError::Backend(anyhow::anyhow!("{}", other)),
  }
}

fn conversion_error(
  col: usize,
  e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
  DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc))
}

fn row_to_doc(row: &rusqlite::Row<'_>) -> Result<Document, rusqlite::Error> {
  let id_str: String = row.get(0)?;
  let data_str: String = row.get(2)?;
  let created_str: String = row.get(3)?;
  let updated_str: String = row.get(4)?;
  Ok(Document {
    id: Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?,
    collection: row.get(1)?,
    data: serde_json::from_str(&data_str).map_err(|e| conversion_error(2, e))?,
    created_at: parse_time(&created_str).map_err(|e| conversion_error(3, e))?,
    updated_at: parse_time(&updated_str).map_err(|e| conversion_error(4, e))?,
  })
}
