//! kb-server: gym membership back office
//!
//! # Module layout
//!
//! ```text
//! kb-server/src/
//! ├── api/          # HTTP routes and handlers
//! ├── auth/         # Admin JWT middleware
//! ├── db/           # Repository traits + PostgreSQL implementation
//! ├── email/        # Mailer trait, SES backend, templates
//! ├── scheduler/    # Cron loop, sweep jobs, pure sweep planners
//! ├── services/     # Members, applications, payments, notifications
//! ├── config.rs     # Environment configuration
//! ├── error.rs      # ServiceError
//! └── state.rs      # AppState
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod util;

pub use config::Config;
pub use error::{BoxError, ServiceError, ServiceResult};
pub use state::AppState;
