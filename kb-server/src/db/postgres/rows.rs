//! Row types and their mapping to domain models
//!
//! Enumerations are stored as TEXT and parsed back on read; a value the
//! domain does not know surfaces as `RepoError::Corrupt`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::models::{
    Application, ApplicationHistory, Member, MembershipType, Notification, NotificationTarget,
    Payment, PaymentEntry, RenewalRecord,
};
use sqlx::types::Json;
use std::str::FromStr;

use crate::db::{Admin, RepoError};

fn parse<T: FromStr>(column: &str, value: &str) -> Result<T, RepoError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| RepoError::Corrupt(format!("{column}: {e}")))
}

fn duration(column: &str, value: i32) -> Result<u32, RepoError> {
    u32::try_from(value).map_err(|_| RepoError::Corrupt(format!("{column}: {value}")))
}

#[derive(sqlx::FromRow)]
pub struct MemberRow {
    pub member_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub membership_type: String,
    pub membership_duration: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub member_status: String,
    pub payments: Json<Vec<PaymentEntry>>,
    pub renewal_history: Json<Vec<RenewalRecord>>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub payment_reminder_count: i32,
    pub payment_reminder_window: i32,
    pub expiry_reminder_count: i32,
    pub cancellation_reason: Option<String>,
    pub cancellation_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl TryFrom<MemberRow> for Member {
    type Error = RepoError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        Ok(Member {
            membership_type: parse::<MembershipType>("membership_type", &row.membership_type)?,
            membership_duration: duration("membership_duration", row.membership_duration)?,
            member_status: parse("member_status", &row.member_status)?,
            member_id: row.member_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            gender: row.gender,
            date_of_birth: row.date_of_birth,
            start_date: row.start_date,
            end_date: row.end_date,
            payments: row.payments.0,
            renewal_history: row.renewal_history.0,
            last_payment_date: row.last_payment_date,
            payment_reminder_count: row.payment_reminder_count,
            payment_reminder_window: row.payment_reminder_window,
            expiry_reminder_count: row.expiry_reminder_count,
            cancellation_reason: row.cancellation_reason,
            cancellation_date: row.cancellation_date,
            expiry_date: row.expiry_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct ApplicationRow {
    pub application_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub membership_type: String,
    pub membership_duration: i32,
    pub start_date: DateTime<Utc>,
    pub application_status: String,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = RepoError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Application {
            membership_type: parse::<MembershipType>("membership_type", &row.membership_type)?,
            membership_duration: duration("membership_duration", row.membership_duration)?,
            application_status: parse("application_status", &row.application_status)?,
            application_id: row.application_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            gender: row.gender,
            date_of_birth: row.date_of_birth,
            start_date: row.start_date,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct ApplicationHistoryRow {
    pub id: i64,
    pub application_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub membership_type: String,
    pub membership_duration: i32,
    pub start_date: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

impl TryFrom<ApplicationHistoryRow> for ApplicationHistory {
    type Error = RepoError;

    fn try_from(row: ApplicationHistoryRow) -> Result<Self, Self::Error> {
        Ok(ApplicationHistory {
            membership_type: parse::<MembershipType>("membership_type", &row.membership_type)?,
            membership_duration: duration("membership_duration", row.membership_duration)?,
            id: row.id,
            application_id: row.application_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            start_date: row.start_date,
            submitted_at: row.submitted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct PaymentRow {
    pub payment_id: String,
    pub member_id: String,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_type: String,
    pub status: String,
    pub payment_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = RepoError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            payment_method: parse("payment_method", &row.payment_method)?,
            payment_type: parse("payment_type", &row.payment_type)?,
            status: parse("status", &row.status)?,
            payment_id: row.payment_id,
            member_id: row.member_id,
            amount: row.amount,
            payment_date: row.payment_date,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub related_model: String,
    pub related_id: String,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub additional_context: Json<serde_json::Value>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = RepoError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            target: NotificationTarget::from_parts(&row.related_model, row.related_id)
                .map_err(RepoError::Corrupt)?,
            notification_type: parse("notification_type", &row.notification_type)?,
            status: parse("status", &row.status)?,
            id: row.id,
            title: row.title,
            message: row.message,
            additional_context: row.additional_context.0,
            created_at: row.created_at,
            read_at: row.read_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct AdminRow {
    pub id: i64,
    pub email: String,
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
}

impl From<AdminRow> for Admin {
    fn from(row: AdminRow) -> Self {
        Admin {
            id: row.id,
            email: row.email,
            hashed_password: row.hashed_password,
            created_at: row.created_at,
        }
    }
}

/// Map a batch of rows, failing on the first corrupt one
pub fn map_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, RepoError>
where
    T: TryFrom<R, Error = RepoError>,
{
    rows.into_iter().map(T::try_from).collect()
}
