use std::sync::Arc;
use std::time::Duration;

use acorn::db::{DocumentStore, SqliteBackend};
use acorn::server::{Daemon, ServerConfig};

async fn daemon() -> Daemon {
  let mut config = ServerConfig::default();
  config.server.host = "127.0.0.1".into();
  config.server.port = 0;
  let store: Arc<dyn DocumentStore> = Arc::new(SqliteBackend::in_memory().await.unwrap());
  Daemon::new(config, store)
}

#[tokio::test]
async fn test_shutdown_before_run_is_honoured() {
  let daemon = daemon().await;
  daemon.shutdown();

  let finished = tokio::time::timeout(Duration::from_secs(5), daemon.run()).await;
  tokio_test::assert_ok!(finished.expect("run did not return after shutdown"));
}

#[tokio::test]
async fn test_shutdown_while_serving() {
  let daemon = Arc::new(daemon().await);

  let trigger = daemon.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(100)).await;
    trigger.shutdown();
  });

  let finished = tokio::time::timeout(Duration::from_secs(5), daemon.run()).await;
  tokio_test::assert_ok!(finished.expect("run did not return after shutdown"));
}

#[tokio::test]
async fn test_repeated_shutdown_is_harmless() {
  let daemon = daemon().await;
  daemon.shutdown();
  daemon.shutdown();
  let finished = tokio::time::timeout(Duration::from_secs(5), daemon.run()).await;
  assert!(matches!(finished, Ok(Ok(()))));
}
