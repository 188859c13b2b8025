//! Server configuration

use crate::error::BoxError;
use crate::scheduler::{DEFAULT_CRON_SCHEDULE, parse_schedule};

/// Where outbound email goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailBackend {
    Ses,
    /// Log instead of sending
    Log,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// JWT secret for admin authentication
    pub jwt_secret: String,
    /// Cron expression for the reminder sweeps (5, 6 or 7 fields)
    pub cron_schedule: String,
    pub mail_backend: MailBackend,
    /// Sender address for every outbound email
    pub mail_from: String,
    /// SES region override; the AWS default chain applies when unset
    pub ses_region: Option<String>,
    /// Bootstrap admin account, created or updated at start-up
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, BoxError> {
        let environment = var("ENVIRONMENT").unwrap_or_else(|| "development".into());
        let is_dev = environment == "development";

        let cron_schedule = var("CRON_SCHEDULE")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CRON_SCHEDULE.into());
        parse_schedule(&cron_schedule)
            .map_err(|e| format!("Invalid CRON_SCHEDULE '{cron_schedule}': {e}"))?;

        let mail_backend = match var("MAIL_BACKEND").as_deref() {
            Some("ses") => MailBackend::Ses,
            Some("log") => MailBackend::Log,
            Some(other) => return Err(format!("Unknown MAIL_BACKEND '{other}' (ses | log)").into()),
            None if is_dev => MailBackend::Log,
            None => MailBackend::Ses,
        };

        Ok(Self {
            database_url: var("DATABASE_URL").ok_or("DATABASE_URL must be set")?,
            http_port: var("HTTP_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            jwt_secret: require_secret(&var, "JWT_SECRET", &environment)?,
            cron_schedule,
            mail_backend,
            mail_from: var("MAIL_FROM").unwrap_or_else(|| "noreply@kbfitness.app".into()),
            ses_region: var("SES_REGION").filter(|s| !s.is_empty()),
            admin_email: var("ADMIN_EMAIL").filter(|s| !s.is_empty()),
            admin_password: var("ADMIN_PASSWORD").filter(|s| !s.is_empty()),
            environment,
        })
    }
}

/// Require a secret: must be set and non-empty outside development.
fn require_secret(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    environment: &str,
) -> Result<String, BoxError> {
    let val = match var(name) {
        Some(v) => v,
        None => {
            if environment != "development" {
                return Err(format!("{name} must be set in {environment} environment").into());
            }
            format!("dev-{name}-not-for-production")
        }
    };
    if val.is_empty() && environment != "development" {
        return Err(format!("{name} must not be empty in {environment} environment").into());
    }
    Ok(val)
}
