//! Transactional email
//!
//! Callers hand a pre-rendered [`EmailMessage`] to a [`Mailer`]. Delivery
//! failures never abort a business operation: services go through
//! [`deliver`], which logs and swallows the error.

pub mod templates;

use async_trait::async_trait;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};

use crate::error::BoxError;

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, name: &str, message: EmailMessage) -> Result<(), BoxError>;
}

/// Send and log; a failure is logged, never returned
pub async fn deliver(mailer: &dyn Mailer, to: &str, name: &str, message: EmailMessage) {
    let subject = message.subject.clone();
    if let Err(e) = mailer.send(to, name, message).await {
        tracing::warn!(to = %to, subject = %subject, error = %e, "Email delivery failed");
    }
}

/// Amazon SES v2 backend
pub struct SesMailer {
    client: SesClient,
    from: String,
}

impl SesMailer {
    pub fn new(client: SesClient, from: impl Into<String>) -> Self {
        Self {
            client,
            from: from.into(),
        }
    }

    /// Build a client from the default AWS config, optionally pinned to `region`
    pub async fn from_env(region: Option<&str>, from: impl Into<String>) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = match region {
            Some(region) => {
                let ses_config = aws_config
                    .to_builder()
                    .region(aws_config::Region::new(region.to_string()))
                    .build();
                SesClient::new(&ses_config)
            }
            None => SesClient::new(&aws_config),
        };
        Self::new(client, from)
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, to: &str, _name: &str, message: EmailMessage) -> Result<(), BoxError> {
        let subject = Content::builder().data(&message.subject).build()?;
        let body = Body::builder()
            .html(Content::builder().data(message.html).build()?)
            .build();
        let ses_message = Message::builder().subject(subject).body(body).build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(destination(to))
            .content(EmailContent::builder().simple(ses_message).build())
            .send()
            .await?;

        tracing::info!(to = %to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// The bare address; display names are only used in the greeting
fn destination(to: &str) -> Destination {
    Destination::builder().to_addresses(to).build()
}

/// Development backend: writes the email to the log instead of sending it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, name: &str, message: EmailMessage) -> Result<(), BoxError> {
        tracing::info!(
            to = %to,
            name = %name,
            subject = %message.subject,
            bytes = message.html.len(),
            "Email (log backend)"
        );
        Ok(())
    }
}
