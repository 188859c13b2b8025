//! Authentication for admin routes

pub mod admin_auth;

pub use admin_auth::{AdminIdentity, admin_auth_middleware};
