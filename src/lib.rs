pub mod db;
pub mod server;
pub mod service;
pub mod types;
