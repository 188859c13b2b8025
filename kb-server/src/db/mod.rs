//! Database access layer
//!
//! Services talk to storage only through the repository traits below.
//! Methods that write more than one row (member + payment, application +
//! member + notification, ...) are atomic: an implementation either applies
//! every write or none of them.
//!
//! Member writes are versioned. A write carries the `version` it was read at
//! and fails with [`RepoError::Conflict`] when the stored row has moved on;
//! on success the caller's copy is bumped to the stored version.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::models::{
    Application, ApplicationHistory, ApplicationStatus, Member, MemberStatus, MembershipType,
    NewNotification, Notification, NotificationQuery, Payment, PaymentStatus,
};
use thiserror::Error;

pub use postgres::PgStore;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// The row changed since it was read
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back to its domain type
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound("row".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Duplicate(db.constraint().unwrap_or("unique constraint").to_string())
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Member list filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberQuery {
    pub status: Option<MemberStatus>,
    pub membership_type: Option<MembershipType>,
    /// Case-insensitive match on name, email or member id
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Application list filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationQuery {
    pub status: Option<ApplicationStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Payment list filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentQuery {
    pub member_id: Option<String>,
    pub status: Option<PaymentStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub const DEFAULT_PAGE_SIZE: i64 = 100;

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn find_member(&self, member_id: &str) -> RepoResult<Option<Member>>;

    /// `email` must already be normalized
    async fn find_member_by_email(&self, email: &str) -> RepoResult<Option<Member>>;

    async fn list_members(&self, query: &MemberQuery) -> RepoResult<Vec<Member>>;

    /// Sweep candidates, ordered by end date
    async fn members_with_status(&self, statuses: &[MemberStatus]) -> RepoResult<Vec<Member>>;

    async fn insert_member(&self, member: &Member) -> RepoResult<()>;

    /// Overwrite every mutable column of an existing member
    async fn update_member(&self, member: &mut Member) -> RepoResult<()>;

    /// Save the member and find-or-create a notification atomically
    async fn update_member_with_notification(
        &self,
        member: &mut Member,
        notification: NewNotification,
    ) -> RepoResult<Notification>;

    /// Hard delete; the member's payments go with it
    async fn delete_member(&self, member_id: &str) -> RepoResult<bool>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_application(&self, application_id: &str) -> RepoResult<Option<Application>>;

    async fn find_pending_application_by_email(&self, email: &str)
    -> RepoResult<Option<Application>>;

    async fn list_applications(&self, query: &ApplicationQuery) -> RepoResult<Vec<Application>>;

    /// Insert the application and its history copy atomically
    async fn insert_application(&self, application: &Application) -> RepoResult<()>;

    async fn update_application(&self, application: &Application) -> RepoResult<()>;

    /// Insert the converted member, store the accepted application and
    /// find-or-create the acceptance notification atomically
    async fn accept_application(
        &self,
        application: &Application,
        member: &Member,
        notification: NewNotification,
    ) -> RepoResult<Notification>;

    async fn delete_application(&self, application_id: &str) -> RepoResult<bool>;

    async fn application_history(&self, email: &str) -> RepoResult<Vec<ApplicationHistory>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_payment(&self, payment_id: &str) -> RepoResult<Option<Payment>>;

    async fn list_payments(&self, query: &PaymentQuery) -> RepoResult<Vec<Payment>>;

    /// Payments of one member created at or after `since`
    async fn recent_payments(
        &self,
        member_id: &str,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<Payment>>;

    /// Insert the payment and save the member carrying its entry atomically
    async fn record_payment(&self, payment: &Payment, member: &mut Member) -> RepoResult<()>;

    /// Update the payment and, when given, the member mirroring it
    async fn update_payment(&self, payment: &Payment, member: Option<&mut Member>)
    -> RepoResult<()>;

    /// Delete the payment and, when given, save the member without its entry
    async fn delete_payment(
        &self,
        payment_id: &str,
        member: Option<&mut Member>,
    ) -> RepoResult<bool>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Returns the stored notification and whether it was created by this call
    async fn find_or_create_notification(
        &self,
        notification: NewNotification,
    ) -> RepoResult<(Notification, bool)>;

    async fn list_notifications(&self, query: &NotificationQuery) -> RepoResult<Vec<Notification>>;

    async fn mark_notification_read(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Notification>>;

    async fn mark_all_notifications_read(&self, now: DateTime<Utc>) -> RepoResult<u64>;

    async fn unread_notification_count(&self) -> RepoResult<i64>;
}

#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Atomically increment the named counter and return the new value
    async fn next_value(&self, name: &str) -> RepoResult<i64>;
}

/// Back-office operator account
#[derive(Debug, Clone)]
pub struct Admin {
    pub id: i64,
    pub email: String,
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn find_admin_by_email(&self, email: &str) -> RepoResult<Option<Admin>>;

    /// Create the admin or replace its password hash
    async fn upsert_admin(&self, email: &str, hashed_password: &str) -> RepoResult<()>;
}

/// Everything the services need from storage
pub trait Store:
    MemberRepository
    + ApplicationRepository
    + PaymentRepository
    + NotificationRepository
    + CounterRepository
    + AdminRepository
{
}

impl<T> Store for T where
    T: MemberRepository
        + ApplicationRepository
        + PaymentRepository
        + NotificationRepository
        + CounterRepository
        + AdminRepository
{
}
