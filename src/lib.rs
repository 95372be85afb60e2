// Core modules
pub mod api;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod models;
pub mod watcher;

// Re-export commonly used types
pub use api::*;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
