// Article comments backend - threaded, moderatable comments for web articles

// HTTP routes and handlers
pub mod api;

// Shared application state
pub mod app_state;
pub mod config;

// Infrastructure - comment store, id generation, sessions, identity provider
pub mod infrastructure;

// Domain types and business rules
pub mod models;
pub mod services;

// Common utilities
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
