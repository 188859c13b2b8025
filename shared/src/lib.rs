//! Shared types for the KB back office
//!
//! Domain models, the membership state machine, error types and the API
//! response envelope used by kb-server and its clients.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
