use std::io::Write;
use std::time::Duration;

use acorn::server::{BackendType, ServerConfig};

#[test]
fn test_config_defaults() {
  let config = ServerConfig::default();
  assert_eq!(config.server.host, "0.0.0.0");
  assert_eq!(config.server.port, 8000);
  assert_eq!(config.server.cors_origins, vec!["http://localhost:3000"]);
  assert_eq!(config.backend, BackendType::Sqlite);
  assert_eq!(config.sqlite.path, "acorn.db");
  assert_eq!(config.postgres.url, "postgres://localhost/acorn");
  assert_eq!(config.postgres.max_connections, 20);
  assert_eq!(config.database.collection, "notes");
  assert_eq!(config.limits.query_timeout_ms, 30000);
  assert_eq!(
    config.limits.query_timeout(),
    Some(Duration::from_secs(30))
  );
  assert_eq!(config.logging.level, "info");
  assert_eq!(config.address(), "0.0.0.0:8000");
}

#[test]
fn test_config_empty_yaml_uses_defaults() {
  let config: ServerConfig = serde_yaml::from_str("{}").unwrap();
  assert_eq!(config.server.port, 8000);
  assert_eq!(config.database.collection, "notes");
}

#[test]
fn test_config_partial_sections() {
  let yaml = r#"
server:
  port: 9000
backend: postgres
postgres:
  url: "postgres://db/notes"
limits:
  query_timeout_ms: 0
"#;
  let config = ServerConfig::from_yaml(yaml).unwrap();
  assert_eq!(config.server.port, 9000);
  assert_eq!(config.server.host, "0.0.0.0");
  assert_eq!(config.backend, BackendType::Postgres);
  assert_eq!(config.postgres.url, "postgres://db/notes");
  assert_eq!(config.postgres.max_connections, 20);
  assert_eq!(config.limits.query_timeout(), None);
}

#[test]
fn test_config_cors_origins() {
  let yaml = r#"
server:
  cors_origins: ["*"]
"#;
  let config = ServerConfig::from_yaml(yaml).unwrap();
  assert_eq!(config.server.cors_origins, vec!["*"]);
}

#[test]
fn test_config_unknown_backend_fails() {
  assert!(ServerConfig::from_yaml("backend: mongodb").is_err());
}

#[test]
fn test_config_env_expansion() {
  std::env::set_var("ACORN_CONFIG_TEST_URL", "postgres://env-host/acorn");
  let yaml = r#"
backend: postgres
postgres:
  url: "${ACORN_CONFIG_TEST_URL}"
"#;
  let config = ServerConfig::from_yaml(yaml).unwrap();
  assert_eq!(config.postgres.url, "postgres://env-host/acorn");
}

#[test]
fn test_config_from_file() {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  writeln!(
    file,
    "server:\n  host: 127.0.0.1\n  port: 8081\nsqlite:\n  path: \":memory:\"\ndatabase:\n  collection: journal"
  )
  .unwrap();

  let config = ServerConfig::from_file(file.path()).unwrap();
  assert_eq!(config.address(), "127.0.0.1:8081");
  assert_eq!(config.sqlite.path, ":memory:");
  assert_eq!(config.database.collection, "journal");
}

#[test]
fn test_config_missing_file_fails() {
  assert!(ServerConfig::from_file("/nonexistent/acorn.yaml").is_err());
}
