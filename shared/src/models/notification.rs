//! In-app Notification Model
//!
//! At most one notification exists per `(target, notification_type)`.
//! Creation is find-or-create; see `NotificationRepository::find_or_create`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// What a notification is about.
///
/// Persisted as `related_model` + `related_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "related_model", content = "related_id")]
pub enum NotificationTarget {
    Application(String),
    Member(String),
}

impl NotificationTarget {
    pub fn related_model(&self) -> &'static str {
        match self {
            NotificationTarget::Application(_) => "Application",
            NotificationTarget::Member(_) => "Member",
        }
    }

    pub fn related_id(&self) -> &str {
        match self {
            NotificationTarget::Application(id) | NotificationTarget::Member(id) => id,
        }
    }

    pub fn from_parts(related_model: &str, related_id: String) -> Result<Self, String> {
        match related_model {
            "Application" => Ok(NotificationTarget::Application(related_id)),
            "Member" => Ok(NotificationTarget::Member(related_id)),
            other => Err(format!("unknown related model: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    NewApplication,
    ApplicationAccepted,
    ApplicationRejected,
    PaymentReceived,
    PaymentPending,
    MembershipExpiring,
    MembershipExpired,
    MembershipCancelled,
    MembershipRenewed,
}

impl NotificationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            NotificationType::NewApplication => "NEW_APPLICATION",
            NotificationType::ApplicationAccepted => "APPLICATION_ACCEPTED",
            NotificationType::ApplicationRejected => "APPLICATION_REJECTED",
            NotificationType::PaymentReceived => "PAYMENT_RECEIVED",
            NotificationType::PaymentPending => "PAYMENT_PENDING",
            NotificationType::MembershipExpiring => "MEMBERSHIP_EXPIRING",
            NotificationType::MembershipExpired => "MEMBERSHIP_EXPIRED",
            NotificationType::MembershipCancelled => "MEMBERSHIP_CANCELLED",
            NotificationType::MembershipRenewed => "MEMBERSHIP_RENEWED",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW_APPLICATION" => Ok(NotificationType::NewApplication),
            "APPLICATION_ACCEPTED" => Ok(NotificationType::ApplicationAccepted),
            "APPLICATION_REJECTED" => Ok(NotificationType::ApplicationRejected),
            "PAYMENT_RECEIVED" => Ok(NotificationType::PaymentReceived),
            "PAYMENT_PENDING" => Ok(NotificationType::PaymentPending),
            "MEMBERSHIP_EXPIRING" => Ok(NotificationType::MembershipExpiring),
            "MEMBERSHIP_EXPIRED" => Ok(NotificationType::MembershipExpired),
            "MEMBERSHIP_CANCELLED" => Ok(NotificationType::MembershipCancelled),
            "MEMBERSHIP_RENEWED" => Ok(NotificationType::MembershipRenewed),
            other => Err(format!("unknown notification type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    #[default]
    Unread,
    Read,
}

impl NotificationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            NotificationStatus::Unread => "unread",
            NotificationStatus::Read => "read",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unread" => Ok(NotificationStatus::Unread),
            "read" => Ok(NotificationStatus::Read),
            other => Err(format!("unknown notification status: {other}")),
        }
    }
}

/// Notification entity (站内通知)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(flatten)]
    pub target: NotificationTarget,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub additional_context: Value,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Create notification payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub target: NotificationTarget,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub additional_context: Value,
}

impl NewNotification {
    pub fn new(
        target: NotificationTarget,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            target,
            notification_type,
            title: title.into(),
            message: message.into(),
            additional_context: Value::Object(Default::default()),
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.additional_context = context;
        self
    }

    /// Materialize as a stored row with the given id
    pub fn into_notification(self, id: i64, now: DateTime<Utc>) -> Notification {
        Notification {
            id,
            target: self.target,
            notification_type: self.notification_type,
            title: self.title,
            message: self.message,
            additional_context: self.additional_context,
            status: NotificationStatus::Unread,
            created_at: now,
            read_at: None,
        }
    }
}

/// Notification list filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationQuery {
    pub status: Option<NotificationStatus>,
    pub notification_type: Option<NotificationType>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_target_parts() {
        let target = NotificationTarget::Member("KB-M02".to_string());
        assert_eq!(target.related_model(), "Member");
        assert_eq!(target.related_id(), "KB-M02");
        assert_eq!(
            NotificationTarget::from_parts("Application", "KB-APP01".to_string()),
            Ok(NotificationTarget::Application("KB-APP01".to_string()))
        );
        assert!(NotificationTarget::from_parts("Trainer", "KB-TR01".to_string()).is_err());
    }

    #[test]
    fn test_notification_json_is_flat() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let n = NewNotification::new(
            NotificationTarget::Member("KB-M02".to_string()),
            NotificationType::MembershipExpired,
            "Membership expired",
            "Dana's membership has expired",
        )
        .with_context(serde_json::json!({ "end_date": "2026-03-01" }))
        .into_notification(7, now);

        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["related_model"], "Member");
        assert_eq!(json["related_id"], "KB-M02");
        assert_eq!(json["notification_type"], "MEMBERSHIP_EXPIRED");
        assert_eq!(json["status"], "unread");
        assert_eq!(json["additional_context"]["end_date"], "2026-03-01");
    }

    #[test]
    fn test_type_names_roundtrip() {
        for name in ["NEW_APPLICATION", "PAYMENT_PENDING", "MEMBERSHIP_RENEWED"] {
            let t: NotificationType = name.parse().unwrap();
            assert_eq!(t.as_str(), name);
        }
    }
}
