use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

use super::backend::{DocumentStore, SqlDialect, StoreError};
use super::sanitize::{unique_index_name, validate_collection_name, validate_identifier};
use crate::types::{Document, FindQuery};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id UUID PRIMARY KEY,
    collection VARCHAR(255) NOT NULL,
    data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
CREATE INDEX IF NOT EXISTS idx_documents_order ON documents(collection, created_at, id);
"#;

const COLUMNS: &str = "id, collection, data, created_at, updated_at";

/// JSONB store on a PostgreSQL connection pool.
pub struct PostgresBackend {
  pool: Pool,
}

impl PostgresBackend {
  pub fn new(url: &str, max_connections: usize) -> Result<Self, StoreError> {
    let mut cfg = Config::new();
    cfg.url = Some(url.into());
    cfg.manager = Some(ManagerConfig {
      recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(max_connections.max(1)));
    let pool = cfg
      .create_pool(Some(Runtime::Tokio1), NoTls)
      .map_err(anyhow::Error::from)?;
    Ok(Self { pool })
  }

  async fn client(&self) -> Result<deadpool_postgres::Client, StoreError> {
    Ok(self.pool.get().await.map_err(anyhow::Error::from)?)
  }
}

#[async_trait]
impl DocumentStore for PostgresBackend {
  fn dialect(&self) -> SqlDialect {
    SqlDialect::Postgres
  }

  async fn init_schema(&self) -> Result<(), StoreError> {
    self
      .client()
      .await?
      .batch_execute(SCHEMA)
      .await
      .map_err(classify)?;
    tracing::info!("PostgreSQL schema initialized");
    Ok(())
  }

  async fn drop_schema(&self) -> Result<(), StoreError> {
    self
      .client()
      .await?
      .batch_execute("DROP TABLE IF EXISTS documents;")
      .await
      .map_err(classify)
  }

  async fn ping(&self) -> Result<(), StoreError> {
    self
      .client()
      .await?
      .simple_query("SELECT 1")
      .await
      .map_err(classify)?;
    Ok(())
  }

  async fn close(&self) -> Result<(), StoreError> {
    self.pool.close();
    Ok(())
  }

  async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<(), StoreError> {
    validate_collection_name(collection)?;
    validate_identifier(field)?;

    let sql = format!(
      "CREATE UNIQUE INDEX IF NOT EXISTS {} ON documents ({}) WHERE collection = '{}'",
      unique_index_name(collection, field),
      self.dialect().json_text(field),
      collection
    );
    self
      .client()
      .await?
      .batch_execute(&sql)
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
    let sql = format!(
      "INSERT INTO documents (id, collection, data, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $4) RETURNING {COLUMNS}"
    );
    let row = self
      .client()
      .await?
      .query_one(&sql, &[&id, &collection, &data, &now])
      .await
      .map_err(classify)?;
    row_to_doc(&row)
  }

  async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
    validate_collection_name(collection)?;

    let sql = format!("SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = $2");
    let row = self
      .client()
      .await?
      .query_opt(&sql, &[&collection, &id])
      .await
      .map_err(classify)?;
    row.as_ref().map(row_to_doc).transpose()
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

    let now = Utc::now();
    let sql = format!(
      "UPDATE documents SET data = data || $1::jsonb, updated_at = $2 \
       WHERE collection = $3 AND id = $4 RETURNING {COLUMNS}"
    );
    let row = self
      .client()
      .await?
      .query_opt(&sql, &[&patch, &now, &collection, &id])
      .await
      .map_err(classify)?;
    row.as_ref().map(row_to_doc).transpose()
  }

  async fn delete(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
    validate_collection_name(collection)?;

    let sql =
      format!("DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING {COLUMNS}");
    let row = self
      .client()
      .await?
      .query_opt(&sql, &[&collection, &id])
      .await
      .map_err(classify)?;
    row.as_ref().map(row_to_doc).transpose()
  }

  async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
    validate_collection_name(collection)?;

    let limit: Option<i64> = query.limit.map(to_i64);
    let skip = to_i64(query.skip);
    let mut params: Vec<&(dyn ToSql + Sync)> = vec![&collection, &limit, &skip];

    let mut sql = format!("SELECT {COLUMNS} FROM documents WHERE collection = $1");
    if let Some(f) = &query.filter {
      validate_identifier(&f.field)?;
      sql.push_str(&format!(
        " AND strpos(lower({}), lower($4)) > 0",
        self.dialect().json_text(&f.field)
      ));
      params.push(&f.needle);
    }
    // NULL limit means no limit
    sql.push_str(" ORDER BY created_at, id LIMIT $2 OFFSET $3");

    let rows = self
      .client()
      .await?
      .query(&sql, &params)
      .await
      .map_err(classify)?;
    rows.iter().map(row_to_doc).collect()
  }
}

fn to_i64(n: usize) -> i64 {
  i64::try_from(n).unwrap_or(i64::MAX)
}

fn classify(err: tokio_postgres::Error) -> StoreError {
  if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
    let detail = err
      .as_db_error()
      .map(|db| db.message().to_string())
      .unwrap_or_else(|| err.to_string());
    return StoreError::UniqueViolation(detail);
  }
  StoreError::Backend(err.into())
}

fn row_to_doc(row: &Row) -> Result<Document, StoreError> {
  let decode = |e: tokio_postgres::Error| StoreError::Corrupt(e.to_string());
  Ok(Document {
    id: row.try_get(0).map_err(decode)?,
    collection: row.try_get(1).map_err(decode)?,
    data: row.try_get(2).map_err(decode)?,
    created_at: row.try_get(3).map_err(decode)?,
    updated_at: row.try_get(4).map_err(decode)?,
  })
}
