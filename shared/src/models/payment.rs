//! Payment Model
//!
//! A [`Payment`] is the canonical record. Every payment also lives on its
//! member as a compact [`PaymentEntry`]; the two are written together.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Two payments for the same member, amount and type inside this window
/// are treated as a double submission.
pub const DUPLICATE_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    #[default]
    Membership,
    Product,
    Other,
}

impl PaymentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            PaymentType::Membership => "membership",
            PaymentType::Product => "product",
            PaymentType::Other => "other",
        }
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "membership" => Ok(PaymentType::Membership),
            "product" => Ok(PaymentType::Product),
            "other" => Ok(PaymentType::Other),
            other => Err(format!("unknown payment type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Online,
    Other,
}

impl PaymentMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Online => "online",
            PaymentMethod::Other => "other",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "online" => Ok(PaymentMethod::Online),
            "other" => Ok(PaymentMethod::Other),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    #[default]
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// Payment summary stored on the member (denormalized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub payment_id: String,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub date: DateTime<Utc>,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
}

/// Payment entity (支付记录)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: String,
    pub member_id: String,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub payment_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn entry(&self) -> PaymentEntry {
        PaymentEntry {
            payment_id: self.payment_id.clone(),
            amount: self.amount,
            payment_method: self.payment_method,
            date: self.payment_date,
            status: self.status,
            payment_type: self.payment_type,
        }
    }

    /// Whether `self` and a new request look like the same payment submitted twice.
    ///
    /// The window is inclusive: a request exactly 60 seconds later still counts.
    pub fn is_duplicate_of(
        &self,
        member_id: &str,
        amount: Decimal,
        payment_type: PaymentType,
        now: DateTime<Utc>,
    ) -> bool {
        let age = now - self.created_at;
        self.member_id == member_id
            && self.amount == amount
            && self.payment_type == payment_type
            && age >= Duration::zero()
            && age <= Duration::seconds(DUPLICATE_WINDOW_SECS)
    }
}

/// Create payment payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCreate {
    /// Optional in the payload so a missing amount gets its own error code
    pub amount: Option<Decimal>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub status: PaymentStatus,
    /// Defaults to now
    pub payment_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Update payment status payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusUpdate {
    pub status: PaymentStatus,
}
