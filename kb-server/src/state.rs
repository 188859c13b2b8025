//! Application state for kb-server

use std::sync::Arc;

use crate::config::{Config, MailBackend};
use crate::db::{PgStore, Store};
use crate::email::{LogMailer, Mailer, SesMailer};
use crate::error::BoxError;
use crate::scheduler::{ReminderScheduler, SweepRunner, parse_schedule};
use crate::services::Services;
use crate::util::{Clock, SystemClock, hash_password};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub services: Services,
    /// Runs the sweeps on demand (admin endpoint); the cron loop owns its own copy
    pub sweeps: SweepRunner,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Connect to PostgreSQL, run migrations and pick the mail backend
    pub async fn new(config: Config) -> Result<Self, BoxError> {
        let store = PgStore::connect(&config.database_url).await?;
        tracing::info!("Connected to PostgreSQL, migrations applied");

        let mailer: Arc<dyn Mailer> = match config.mail_backend {
            MailBackend::Ses => {
                tracing::info!(from = %config.mail_from, "Email via Amazon SES");
                Arc::new(SesMailer::from_env(config.ses_region.as_deref(), &config.mail_from).await)
            }
            MailBackend::Log => {
                tracing::info!("Email via log backend (not delivered)");
                Arc::new(LogMailer)
            }
        };

        Ok(Self::from_parts(
            config,
            Arc::new(store),
            mailer,
            Arc::new(SystemClock),
        ))
    }

    /// Assemble the state from already-built parts
    pub fn from_parts(
        config: Config,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let services = Services::new(store.clone(), mailer.clone(), clock.clone());
        let sweeps = SweepRunner::new(
            store.clone(),
            mailer,
            services.members.clone(),
            services.notifications.clone(),
        );
        Self {
            config: Arc::new(config),
            store,
            services,
            sweeps,
            clock,
        }
    }

    /// Build the cron scheduler from the configured expression
    pub fn scheduler(&self) -> Result<ReminderScheduler, BoxError> {
        let schedule = parse_schedule(&self.config.cron_schedule)?;
        Ok(ReminderScheduler::new(
            self.sweeps.clone(),
            schedule,
            self.clock.clone(),
        ))
    }

    /// Create or refresh the bootstrap admin from `ADMIN_EMAIL` / `ADMIN_PASSWORD`
    pub async fn bootstrap_admin(&self) -> Result<(), BoxError> {
        let (Some(email), Some(password)) = (&self.config.admin_email, &self.config.admin_password)
        else {
            return Ok(());
        };
        let email = shared::util::normalize_email(email);
        let hashed = hash_password(password).map_err(|e| format!("Failed to hash password: {e}"))?;
        self.store.upsert_admin(&email, &hashed).await?;
        tracing::info!(email = %email, "Bootstrap admin ready");
        Ok(())
    }
}
