//! Member Model
//!
//! The member status is an explicit state machine: every status change goes
//! through [`MemberStatus::apply`] with a [`LifecycleEvent`], so a path such
//! as `expired -> pending` cannot be expressed at all.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

use super::membership::{MembershipTerm, MembershipType};
use super::payment::PaymentEntry;
use crate::error::{AppError, ErrorCode};

/// Membership status (会员状态)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// Initial state: created or converted from an application, not yet paid
    Pending,
    Active,
    /// Terminal for the sweeps: lapsed without an explicit expiry record
    Inactive,
    Cancelled,
    /// End date is close; still usable
    Expiring,
    Expired,
}

/// Something that happened to a membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    PaymentRecorded,
    Renewed,
    ExpiryApproaching,
    Lapsed,
    Deactivated,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Membership is already cancelled")]
    AlreadyCancelled,
    #[error("Cannot apply {event:?} to a {from} membership")]
    NotAllowed {
        from: MemberStatus,
        event: LifecycleEvent,
    },
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::AlreadyCancelled => AppError::new(ErrorCode::MembershipAlreadyCancelled),
            TransitionError::NotAllowed { from, event } => {
                AppError::with_message(ErrorCode::InvalidStatusTransition, e.to_string())
                    .with_detail("from", from.as_str())
                    .with_detail("event", format!("{event:?}"))
            }
        }
    }
}

impl MemberStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            MemberStatus::Pending => "pending",
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
            MemberStatus::Cancelled => "cancelled",
            MemberStatus::Expiring => "expiring",
            MemberStatus::Expired => "expired",
        }
    }

    /// Transition table
    pub fn apply(self, event: LifecycleEvent) -> Result<MemberStatus, TransitionError> {
        use LifecycleEvent as E;
        use MemberStatus as S;

        let next = match (self, event) {
            // A payment always reactivates an unpaid or cancelled membership
            (S::Pending | S::Cancelled, E::PaymentRecorded) => S::Active,
            (s, E::PaymentRecorded) => s,

            // Renewal never looks at the previous status
            (_, E::Renewed) => S::Active,

            (S::Active | S::Expiring, E::ExpiryApproaching) => S::Expiring,
            (S::Active | S::Expiring, E::Lapsed) => S::Expired,
            (S::Active | S::Pending | S::Expiring, E::Deactivated) => S::Inactive,

            (S::Cancelled, E::Cancelled) => return Err(TransitionError::AlreadyCancelled),
            (_, E::Cancelled) => S::Cancelled,

            (from, event) => return Err(TransitionError::NotAllowed { from, event }),
        };
        Ok(next)
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MemberStatus::Pending),
            "active" => Ok(MemberStatus::Active),
            "inactive" => Ok(MemberStatus::Inactive),
            "cancelled" => Ok(MemberStatus::Cancelled),
            "expiring" => Ok(MemberStatus::Expiring),
            "expired" => Ok(MemberStatus::Expired),
            other => Err(format!("unknown member status: {other}")),
        }
    }
}

/// Membership term as it stood at some point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    pub membership_type: MembershipType,
    pub membership_duration: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// One renewal, appended to `Member::renewal_history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalRecord {
    pub previous: MembershipSnapshot,
    pub renewed: MembershipSnapshot,
    pub renewal_date: DateTime<Utc>,
    pub payment_id: Option<String>,
}

/// Member entity (会员)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub member_id: String,
    pub name: String,
    /// Always stored lowercase
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub membership_type: MembershipType,
    pub membership_duration: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub member_status: MemberStatus,
    /// Denormalized copies of this member's payments
    pub payments: Vec<PaymentEntry>,
    pub renewal_history: Vec<RenewalRecord>,
    pub last_payment_date: Option<DateTime<Utc>>,
    /// Pending-payment reminders sent so far
    pub payment_reminder_count: i32,
    /// Last reminder window that got a pending-payment reminder (0 = none)
    #[serde(default)]
    pub payment_reminder_window: i32,
    pub expiry_reminder_count: i32,
    pub cancellation_reason: Option<String>,
    pub cancellation_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Row version; a write based on an older version is rejected
    #[serde(default)]
    pub version: i64,
}

impl Member {
    pub fn term(&self) -> MembershipTerm {
        MembershipTerm {
            membership_type: self.membership_type,
            duration_months: self.membership_duration,
        }
    }

    pub fn snapshot(&self) -> MembershipSnapshot {
        MembershipSnapshot {
            membership_type: self.membership_type,
            membership_duration: self.membership_duration,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    /// Apply a lifecycle event to the status, returning the new status
    pub fn transition(&mut self, event: LifecycleEvent) -> Result<MemberStatus, TransitionError> {
        let next = self.member_status.apply(event)?;
        self.member_status = next;
        Ok(next)
    }

    /// Append a denormalized payment entry and run the payment transition
    pub fn record_payment_entry(&mut self, entry: PaymentEntry) -> Result<(), TransitionError> {
        self.transition(LifecycleEvent::PaymentRecorded)?;
        self.last_payment_date = Some(
            self.last_payment_date
                .map_or(entry.date, |last| last.max(entry.date)),
        );
        self.payments.push(entry);
        Ok(())
    }

    /// Remove the entry mirroring `payment_id`; returns whether one was found
    pub fn remove_payment_entry(&mut self, payment_id: &str) -> bool {
        let before = self.payments.len();
        self.payments.retain(|p| p.payment_id != payment_id);
        let removed = self.payments.len() != before;
        if removed {
            self.recompute_last_payment_date();
        }
        removed
    }

    pub fn recompute_last_payment_date(&mut self) {
        self.last_payment_date = self.payments.iter().map(|p| p.date).max();
    }

    /// Whole UTC calendar days from `now` until the start date (negative once started)
    pub fn days_until_start(&self, now: DateTime<Utc>) -> i64 {
        calendar_days_between(now, self.start_date)
    }

    /// Whole UTC calendar days from `now` until the end date (negative once ended)
    pub fn days_until_end(&self, now: DateTime<Utc>) -> i64 {
        calendar_days_between(now, self.end_date)
    }
}

/// Difference in UTC calendar dates, ignoring the time of day
pub fn calendar_days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to.date_naive() - from.date_naive()).num_days()
}

/// Create member payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MemberCreate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub membership_type: Option<MembershipType>,
    pub membership_duration: Option<u32>,
    /// Defaults to now
    pub start_date: Option<DateTime<Utc>>,
}

/// Update member payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct MemberUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub membership_type: Option<MembershipType>,
    pub membership_duration: Option<u32>,
    pub start_date: Option<DateTime<Utc>>,
}

/// Renewal payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipRenewal {
    pub membership_type: Option<MembershipType>,
    pub membership_duration: Option<u32>,
    pub amount: rust_decimal::Decimal,
    pub payment_method: super::payment::PaymentMethod,
    pub notes: Option<String>,
}
