//! Sweep decisions
//!
//! Pure functions of a member and "now". The jobs load candidates, ask the
//! planner what to do, and perform the side effects.

use chrono::{DateTime, Utc};
use shared::models::{Member, MemberStatus};

/// Pending members starting within this many days get a `PAYMENT_PENDING` notification
pub const PAYMENT_NOTICE_DAYS: i64 = 3;
/// Active members ending within this many days move to `expiring`
pub const EXPIRING_WINDOW_DAYS: i64 = 14;
/// Payment reminders start this many days before the start date
pub const PAYMENT_REMINDER_DAYS: i64 = 7;
/// Expiry reminders start this many days before the end date
pub const EXPIRY_REMINDER_DAYS: i64 = 10;

pub const NON_PAYMENT_REASON: &str = "Payment not received before membership start date";

/// Pending-payment reminders sent before an unpaid membership is cancelled
pub const PAYMENT_REMINDER_LIMIT: i32 = 3;

pub fn starts_soon(member: &Member, now: DateTime<Utc>) -> bool {
    member.member_status == MemberStatus::Pending
        && (0..=PAYMENT_NOTICE_DAYS).contains(&member.days_until_start(now))
}

/// Ends tomorrow or up to two weeks out, counted in calendar days
pub fn expiring_due(member: &Member, now: DateTime<Utc>) -> bool {
    member.member_status == MemberStatus::Active
        && (1..=EXPIRING_WINDOW_DAYS).contains(&member.days_until_end(now))
}

/// Only `active` members lapse; an `expired` member is never picked up twice
pub fn expired_due(member: &Member, now: DateTime<Utc>) -> bool {
    member.member_status == MemberStatus::Active && member.end_date <= now
}

pub fn inactive_due(member: &Member, now: DateTime<Utc>) -> bool {
    matches!(
        member.member_status,
        MemberStatus::Active | MemberStatus::Pending
    ) && member.end_date < now
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentReminderPlan {
    Skip,
    /// Send reminder number `reminder` and mark `window` as reminded
    Remind {
        window: i32,
        reminder: i32,
        days_until_start: i64,
    },
    /// Start date reached with every reminder already sent
    Cancel,
}

/// Reminder window for days-until-start: 7..=6 → 1, 5..=4 → 2, 3..=0 → 3.
/// Each day past the start date is a window of its own so a member who
/// joined late still works through the remaining reminders.
fn payment_window(days_until_start: i64) -> Option<i32> {
    match days_until_start {
        d if d > PAYMENT_REMINDER_DAYS => None,
        6..=7 => Some(1),
        4..=5 => Some(2),
        0..=3 => Some(3),
        d => Some(i32::try_from(3 - d).unwrap_or(i32::MAX)),
    }
}

pub fn plan_payment_reminder(member: &Member, now: DateTime<Utc>) -> PaymentReminderPlan {
    if member.member_status != MemberStatus::Pending {
        return PaymentReminderPlan::Skip;
    }
    let days = member.days_until_start(now);
    let Some(window) = payment_window(days) else {
        return PaymentReminderPlan::Skip;
    };
    if member.payment_reminder_count >= PAYMENT_REMINDER_LIMIT {
        return if days <= 0 {
            PaymentReminderPlan::Cancel
        } else {
            PaymentReminderPlan::Skip
        };
    }
    if member.payment_reminder_window < window {
        PaymentReminderPlan::Remind {
            window,
            reminder: member.payment_reminder_count + 1,
            days_until_start: days,
        }
    } else {
        PaymentReminderPlan::Skip
    }
}

/// Expiry reminder grade; the discriminant is the counter value after sending
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExpiryGrade {
    First = 1,
    Second = 2,
    LastChance = 3,
    /// Membership ended; the member also goes inactive
    Final = 4,
}

impl ExpiryGrade {
    pub const fn level(self) -> i32 {
        self as i32
    }

    pub fn for_days(days_left: i64) -> Option<Self> {
        match days_left {
            6..=10 => Some(ExpiryGrade::First),
            2..=5 => Some(ExpiryGrade::Second),
            1 => Some(ExpiryGrade::LastChance),
            d if d <= 0 => Some(ExpiryGrade::Final),
            _ => None,
        }
    }
}

/// The grade to send now, if any has not been sent yet
pub fn plan_expiry_reminder(member: &Member, now: DateTime<Utc>) -> Option<ExpiryGrade> {
    if !matches!(
        member.member_status,
        MemberStatus::Active | MemberStatus::Expiring
    ) {
        return None;
    }
    ExpiryGrade::for_days(member.days_until_end(now))
        .filter(|grade| member.expiry_reminder_count < grade.level())
}
