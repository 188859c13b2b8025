//! Membership Application Model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use super::member::{Member, MemberStatus};
use super::membership::{MembershipTerm, MembershipType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Rejected,
    Accepted,
}

impl ApplicationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Accepted => "accepted",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "accepted" => Ok(ApplicationStatus::Accepted),
            other => Err(format!("unknown application status: {other}")),
        }
    }
}

/// Application entity (入会申请)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub application_id: String,
    pub name: String,
    /// Always stored lowercase
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub membership_type: MembershipType,
    pub membership_duration: u32,
    /// Preferred start date
    pub start_date: DateTime<Utc>,
    pub application_status: ApplicationStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn term(&self) -> MembershipTerm {
        MembershipTerm {
            membership_type: self.membership_type,
            duration_months: self.membership_duration,
        }
    }

    /// Build the member an accepted application turns into.
    ///
    /// New members always start `pending`; acceptance does not activate.
    pub fn to_member(&self, member_id: String, now: DateTime<Utc>) -> Member {
        let term = self.term();
        Member {
            member_id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            gender: self.gender.clone(),
            date_of_birth: self.date_of_birth,
            membership_type: term.membership_type,
            membership_duration: term.duration_months,
            start_date: self.start_date,
            end_date: term.end_date_from(self.start_date),
            member_status: MemberStatus::Pending,
            payments: Vec::new(),
            renewal_history: Vec::new(),
            last_payment_date: None,
            payment_reminder_count: 0,
            payment_reminder_window: 0,
            expiry_reminder_count: 0,
            cancellation_reason: None,
            cancellation_date: None,
            expiry_date: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Audit copy written alongside every submission
    pub fn history_entry(&self) -> ApplicationHistory {
        ApplicationHistory {
            id: 0,
            application_id: self.application_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            membership_type: self.membership_type,
            membership_duration: self.membership_duration,
            start_date: self.start_date,
            submitted_at: self.created_at,
        }
    }
}

/// Append-only audit record of a submitted application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationHistory {
    /// Assigned by the store
    pub id: i64,
    pub application_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub membership_type: MembershipType,
    pub membership_duration: u32,
    pub start_date: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

/// Submit application payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApplicationCreate {
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
    /// Defaults to the submission time
    pub start_date: Option<DateTime<Utc>>,
}

/// Reject application payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationReject {
    pub reason: Option<String>,
}
