//! Axum HTTP API server.
//!
//! This crate provides:
//! - Batch upload endpoints that create a job and enqueue one task per file
//! - Status polling for the aggregate + per-item view
//! - Download endpoints for compiled highlight files

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
