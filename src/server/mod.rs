pub mod api;
mod config;
mod daemon;

pub use api::{router, AppError, AppState};
pub use config::{
  BackendType, DatabaseSection, LimitsSection, LoggingSection, PostgresSection, ServerConfig,
  ServerSection, SqliteSection,
};
pub use daemon::Daemon;
