//! Email bodies for the membership lifecycle

use chrono::{DateTime, Utc};
use shared::models::{Application, Member, Payment, RenewalRecord};

use super::EmailMessage;
use crate::scheduler::plan::{ExpiryGrade, PAYMENT_REMINDER_LIMIT};

const GYM_NAME: &str = "KB Fitness";

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn date(d: DateTime<Utc>) -> String {
    d.format("%B %-d, %Y").to_string()
}

fn days(n: i64) -> String {
    match n {
        1 => "1 day".to_string(),
        n => format!("{n} days"),
    }
}

fn render(subject: impl Into<String>, name: &str, paragraphs: &[String]) -> EmailMessage {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<p>{p}</p>"))
        .collect::<Vec<_>>()
        .join("\n");
    EmailMessage {
        subject: subject.into(),
        html: format!(
            "<html><body>\n<p>Hi {},</p>\n{}\n<p>See you at the gym,<br>{GYM_NAME}</p>\n</body></html>",
            escape(name),
            body
        ),
    }
}

fn membership_line(m: &Member) -> String {
    format!(
        "Membership: <b>{}</b> ({} months), {} to {}.",
        m.membership_type,
        m.membership_duration,
        date(m.start_date),
        date(m.end_date)
    )
}

/// Member created directly by staff
pub fn welcome(m: &Member) -> EmailMessage {
    render(
        format!("Welcome to {GYM_NAME}"),
        &m.name,
        &[
            format!("Your member ID is <b>{}</b>.", escape(&m.member_id)),
            membership_line(m),
            "Your membership becomes active once the first payment is received.".to_string(),
        ],
    )
}

pub fn application_received(a: &Application) -> EmailMessage {
    render(
        "We received your membership application",
        &a.name,
        &[
            format!(
                "Thanks for applying for a <b>{}</b> membership. Your reference is <b>{}</b>.",
                a.membership_type,
                escape(&a.application_id)
            ),
            "Our team will review it and get back to you shortly.".to_string(),
        ],
    )
}

pub fn application_accepted(m: &Member) -> EmailMessage {
    render(
        "Your membership application was accepted",
        &m.name,
        &[
            format!("Welcome aboard! Your member ID is <b>{}</b>.", escape(&m.member_id)),
            membership_line(m),
            "Please complete your payment before the start date to activate the membership."
                .to_string(),
        ],
    )
}

pub fn application_rejected(a: &Application) -> EmailMessage {
    let mut paragraphs = vec![
        "Unfortunately we are unable to accept your membership application at this time."
            .to_string(),
    ];
    if let Some(reason) = a.rejection_reason.as_deref().filter(|r| !r.is_empty()) {
        paragraphs.push(format!("Reason: {}", escape(reason)));
    }
    render("Your membership application", &a.name, &paragraphs)
}

pub fn payment_received(m: &Member, p: &Payment) -> EmailMessage {
    render(
        "Payment received",
        &m.name,
        &[
            format!(
                "We received your payment of <b>{}</b> by {} on {}.",
                p.amount,
                p.payment_method,
                date(p.payment_date)
            ),
            format!("Receipt number: <b>{}</b>.", escape(&p.payment_id)),
        ],
    )
}

/// Pending-payment reminder; `reminder` counts from 1, the last one is final
pub fn payment_reminder(m: &Member, reminder: i32, days_until_start: i64) -> EmailMessage {
    let when = match days_until_start {
        d if d > 0 => format!("starts in {}", days(d)),
        0 => "starts today".to_string(),
        d => format!("was due to start {} ago", days(-d)),
    };
    let subject = if reminder >= PAYMENT_REMINDER_LIMIT {
        "Final reminder: payment required to start your membership"
    } else {
        "Reminder: payment required to start your membership"
    };
    render(
        subject,
        &m.name,
        &[
            format!("Your <b>{}</b> membership {when}.", m.membership_type),
            "We have not received your payment yet. Memberships without payment on the start date are cancelled."
                .to_string(),
        ],
    )
}

pub fn membership_cancelled(m: &Member) -> EmailMessage {
    let mut paragraphs = vec![format!(
        "Your membership <b>{}</b> has been cancelled.",
        escape(&m.member_id)
    )];
    if let Some(reason) = m.cancellation_reason.as_deref().filter(|r| !r.is_empty()) {
        paragraphs.push(format!("Reason: {}", escape(reason)));
    }
    paragraphs.push("A new payment reactivates it at any time.".to_string());
    render("Your membership was cancelled", &m.name, &paragraphs)
}

pub fn membership_expiring(m: &Member, days_left: i64) -> EmailMessage {
    render(
        "Your membership is expiring soon",
        &m.name,
        &[
            format!(
                "Your <b>{}</b> membership ends on {} ({} from now).",
                m.membership_type,
                date(m.end_date),
                days(days_left)
            ),
            "Renew now to keep training without interruption.".to_string(),
        ],
    )
}

pub fn membership_expired(m: &Member) -> EmailMessage {
    render(
        "Your membership has expired",
        &m.name,
        &[
            format!(
                "Your <b>{}</b> membership ended on {}.",
                m.membership_type,
                date(m.end_date)
            ),
            "Renew at the front desk or online to pick up where you left off.".to_string(),
        ],
    )
}

pub fn expiry_reminder(m: &Member, grade: ExpiryGrade, days_left: i64) -> EmailMessage {
    let (subject, lead) = match grade {
        ExpiryGrade::First => (
            "Membership renewal reminder",
            format!("Your membership ends in {}.", days(days_left)),
        ),
        ExpiryGrade::Second => (
            "Second reminder: renew your membership",
            format!("Only {} left on your membership.", days(days_left)),
        ),
        ExpiryGrade::LastChance => (
            "Last chance to renew your membership",
            "Your membership ends tomorrow.".to_string(),
        ),
        ExpiryGrade::Final => (
            "Your membership has ended",
            "Your membership has ended and is now inactive.".to_string(),
        ),
    };
    render(
        subject,
        &m.name,
        &[
            lead,
            format!(
                "Current plan: <b>{}</b>, ending {}.",
                m.membership_type,
                date(m.end_date)
            ),
        ],
    )
}

pub fn membership_renewed(m: &Member, renewal: &RenewalRecord) -> EmailMessage {
    render(
        "Your membership was renewed",
        &m.name,
        &[
            format!(
                "Your membership is renewed as <b>{}</b> ({} months).",
                renewal.renewed.membership_type, renewal.renewed.membership_duration
            ),
            format!(
                "New end date: {} (previously {}).",
                date(renewal.renewed.end_date),
                date(renewal.previous.end_date)
            ),
        ],
    )
}
