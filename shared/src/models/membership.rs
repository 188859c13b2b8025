//! Membership tiers and term arithmetic
//!
//! A tier fixes the membership length: silver 1 month, gold 3, diamond 6,
//! platinum 12. `end_date = start_date + months(tier)` is the invariant every
//! write path goes through.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::{AppError, ErrorCode};

/// Membership tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipType {
    Silver,
    Gold,
    Diamond,
    Platinum,
}

impl MembershipType {
    pub const ALL: [MembershipType; 4] = [
        MembershipType::Silver,
        MembershipType::Gold,
        MembershipType::Diamond,
        MembershipType::Platinum,
    ];

    /// Length of the tier in calendar months
    pub const fn months(self) -> u32 {
        match self {
            MembershipType::Silver => 1,
            MembershipType::Gold => 3,
            MembershipType::Diamond => 6,
            MembershipType::Platinum => 12,
        }
    }

    /// Infer the tier from a duration in months
    pub fn from_months(months: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.months() == months)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MembershipType::Silver => "silver",
            MembershipType::Gold => "gold",
            MembershipType::Diamond => "diamond",
            MembershipType::Platinum => "platinum",
        }
    }

    /// Resolve a (type, duration) pair where either side may be missing.
    ///
    /// The duration is derived from the type when absent and the type is
    /// inferred from the duration when only the duration is supplied.
    pub fn resolve(
        membership_type: Option<MembershipType>,
        duration: Option<u32>,
    ) -> Result<MembershipTerm, MembershipError> {
        match (membership_type, duration) {
            (Some(t), None) => Ok(MembershipTerm::of(t)),
            (None, Some(months)) => Self::from_months(months)
                .map(MembershipTerm::of)
                .ok_or(MembershipError::UnsupportedDuration(months)),
            (Some(t), Some(months)) if t.months() == months => Ok(MembershipTerm::of(t)),
            (Some(t), Some(months)) => Err(MembershipError::DurationMismatch {
                membership_type: t,
                months,
            }),
            (None, None) => Err(MembershipError::Missing),
        }
    }
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipType {
    type Err = MembershipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silver" => Ok(MembershipType::Silver),
            "gold" => Ok(MembershipType::Gold),
            "diamond" => Ok(MembershipType::Diamond),
            "platinum" => Ok(MembershipType::Platinum),
            other => Err(MembershipError::UnknownType(other.to_string())),
        }
    }
}

/// A resolved tier together with its duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipTerm {
    pub membership_type: MembershipType,
    pub duration_months: u32,
}

impl MembershipTerm {
    pub const fn of(membership_type: MembershipType) -> Self {
        Self {
            membership_type,
            duration_months: membership_type.months(),
        }
    }

    /// End of a term that starts at `start`
    pub fn end_date_from(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        add_months(start, self.duration_months)
    }
}

/// Calendar-month addition. Day-of-month overflow clamps to the last day
/// of the target month (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(date: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    date.checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    #[error("Membership type or duration is required")]
    Missing,
    #[error("Unknown membership type: {0}")]
    UnknownType(String),
    #[error("No membership type lasts {0} months")]
    UnsupportedDuration(u32),
    #[error("A {membership_type} membership lasts {} months, not {months}", .membership_type.months())]
    DurationMismatch {
        membership_type: MembershipType,
        months: u32,
    },
}

impl From<MembershipError> for AppError {
    fn from(e: MembershipError) -> Self {
        AppError::with_message(ErrorCode::InvalidMembershipType, e.to_string())
    }
}
