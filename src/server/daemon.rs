use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use super::api::{cors_layer, router, AppState};
use super::ServerConfig;
use crate::db::DocumentStore;
use crate::service::NoteService;

pub struct Daemon {
  config: ServerConfig,
  store: Arc<dyn DocumentStore>,
  service: Arc<NoteService>,
  /// Latched: a request made before `run` subscribes is still seen.
  shutdown_tx: watch::Sender<bool>,
}

impl Daemon {
  pub fn new(config: ServerConfig, store: Arc<dyn DocumentStore>) -> Self {
    let (shutdown_tx, _) = watch::channel(false);
    let service = NoteService::new(store.clone())
      .with_collection(config.database.collection.clone())
      .with_timeout(config.limits.query_timeout());
    tracing::info!(
      "Note service on collection '{}', {}ms query timeout",
      config.database.collection,
      config.limits.query_timeout_ms
    );

    Self {
      config,
      store,
      service: Arc::new(service),
      shutdown_tx,
    }
  }

  /// Trigger graceful shutdown of the HTTP server
  pub fn shutdown(&self) {
    tracing::info!("Initiating graceful shutdown...");
    self.shutdown_tx.send_replace(true);
  }

  /// Resolves once `shutdown` has been called, before or after this point.
  fn shutdown_requested(&self) -> impl Future<Output = ()> + Send + 'static {
    let mut rx = self.shutdown_tx.subscribe();
    async move {
      // Err only if the sender is gone, and the daemon owns it
      let _ = rx.wait_for(|stop| *stop).await;
    }
  }

  pub async fn run(&self) -> Result<(), anyhow::Error> {
    let listener = tokio::select! {
      started = self.start() => started?,
      _ = self.shutdown_requested() => {
        tracing::info!("Shutdown requested during startup");
        self.store.close().await?;
        return Ok(());
      }
    };

    let app = router(AppState::new(self.service.clone(), self.store.clone()))
      .layer(cors_layer(&self.config.server.cors_origins))
      .layer(TraceLayer::new_for_http());

    let stop = self.shutdown_requested();
    axum::serve(listener, app.into_make_service())
      .with_graceful_shutdown(async move {
        stop.await;
        tracing::info!("HTTP server shutting down");
      })
      .await?;

    self.store.close().await?;
    tracing::info!("Store closed");
    Ok(())
  }

  /// Schema, unique index and listener.
  async fn start(&self) -> Result<tokio::net::TcpListener, anyhow::Error> {
    tracing::info!("Initializing database schema...");
    self.store.init_schema().await?;
    self.service.init().await?;

    let addr = self.config.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Acorn Notes API on http://{}", listener.local_addr()?);
    Ok(listener)
  }
}
