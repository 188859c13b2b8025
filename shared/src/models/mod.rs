//! Data models
//!
//! Shared between kb-server and the dashboard (via API).
//! Persistence row types live in kb-server; these are the domain shapes.

pub mod application;
pub mod identifier;
pub mod member;
pub mod membership;
pub mod notification;
pub mod payment;

// Re-exports
pub use application::*;
pub use identifier::*;
pub use member::*;
pub use membership::*;
pub use notification::*;
pub use payment::*;
