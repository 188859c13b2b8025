//! Member lifecycle operations
//!
//! Every status change goes through [`Member::transition`]; this module only
//! adds the side effects (ids, persistence, notifications, email).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    IdKind, LifecycleEvent, Member, MemberCreate, MemberStatus, MemberUpdate, MembershipRenewal,
    MembershipTerm, MembershipType, NewNotification, NotificationTarget, NotificationType,
    Payment, PaymentStatus, PaymentType, RenewalRecord,
};
use shared::util::normalize_email;
use validator::Validate;

use super::identifiers::Identifiers;
use super::notifications::NotificationService;
use crate::db::{MemberQuery, Store};
use crate::email::{Mailer, deliver, templates};
use crate::error::ServiceResult;
use crate::util::Clock;

#[derive(Clone)]
pub struct MemberService {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    ids: Identifiers,
    notifications: NotificationService,
}

impl MemberService {
    pub fn new(
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        ids: Identifiers,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            mailer,
            clock,
            ids,
            notifications,
        }
    }

    /// Create a member directly (staff entry); the member starts `pending`
    pub async fn create_member(&self, mut payload: MemberCreate) -> ServiceResult<Member> {
        payload.email = normalize_email(&payload.email);
        payload.validate()?;
        let email = std::mem::take(&mut payload.email);
        self.ensure_email_free(&email, None).await?;

        let term = MembershipType::resolve(payload.membership_type, payload.membership_duration)?;
        let now = self.clock.now();
        let start_date = payload.start_date.unwrap_or(now);
        let member_id = self.ids.next(IdKind::Member).await?;

        let member = Member {
            member_id,
            name: payload.name.trim().to_string(),
            email,
            phone: payload.phone,
            address: payload.address,
            gender: payload.gender,
            date_of_birth: payload.date_of_birth,
            membership_type: term.membership_type,
            membership_duration: term.duration_months,
            start_date,
            end_date: term.end_date_from(start_date),
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
        };
        self.store.insert_member(&member).await?;
        tracing::info!(
            member_id = %member.member_id,
            membership_type = %member.membership_type,
            "Member created"
        );

        deliver(
            self.mailer.as_ref(),
            &member.email,
            &member.name,
            templates::welcome(&member),
        )
        .await;
        Ok(member)
    }

    pub async fn get(&self, member_id: &str) -> ServiceResult<Member> {
        self.store
            .find_member(member_id)
            .await?
            .ok_or_else(|| AppError::member_not_found(member_id).into())
    }

    pub async fn list(&self, query: &MemberQuery) -> ServiceResult<Vec<Member>> {
        Ok(self.store.list_members(query).await?)
    }

    /// Partial update; the end date follows any change of type, duration or start date
    pub async fn update(&self, member_id: &str, mut payload: MemberUpdate) -> ServiceResult<Member> {
        payload.email = payload.email.as_deref().map(normalize_email);
        payload.validate()?;
        let mut member = self.get(member_id).await?;

        if let Some(email) = payload.email.take()
            && email != member.email
        {
            self.ensure_email_free(&email, Some(member_id)).await?;
            member.email = email;
        }
        if let Some(name) = payload.name {
            member.name = name.trim().to_string();
        }
        if payload.phone.is_some() {
            member.phone = payload.phone;
        }
        if payload.address.is_some() {
            member.address = payload.address;
        }
        if payload.gender.is_some() {
            member.gender = payload.gender;
        }
        if payload.date_of_birth.is_some() {
            member.date_of_birth = payload.date_of_birth;
        }

        let term_changed =
            payload.membership_type.is_some() || payload.membership_duration.is_some();
        if term_changed {
            let term =
                MembershipType::resolve(payload.membership_type, payload.membership_duration)?;
            member.membership_type = term.membership_type;
            member.membership_duration = term.duration_months;
        }
        if let Some(start_date) = payload.start_date {
            member.start_date = start_date;
        }
        if term_changed || payload.start_date.is_some() {
            member.end_date = member.term().end_date_from(member.start_date);
        }

        member.updated_at = self.clock.now();
        self.store.update_member(&mut member).await?;
        tracing::info!(member_id = %member.member_id, "Member updated");
        Ok(member)
    }

    /// Hard delete, payments included
    pub async fn delete(&self, member_id: &str) -> ServiceResult<()> {
        if !self.store.delete_member(member_id).await? {
            return Err(AppError::member_not_found(member_id).into());
        }
        tracing::info!(member_id = %member_id, "Member deleted");
        Ok(())
    }

    /// Extend the membership from its current end date and record the payment.
    ///
    /// The previous status is not checked: an expired or cancelled membership
    /// renews the same way as an active one.
    pub async fn renew(
        &self,
        member_id: &str,
        payload: MembershipRenewal,
    ) -> ServiceResult<Member> {
        if payload.amount <= rust_decimal::Decimal::ZERO {
            return Err(AppError::new(ErrorCode::PaymentAmountRequired).into());
        }
        let mut member = self.get(member_id).await?;
        let term = match (payload.membership_type, payload.membership_duration) {
            (None, None) => member.term(),
            (t, d) => MembershipType::resolve(t, d)?,
        };

        let now = self.clock.now();
        let payment_id = self.ids.next(IdKind::Payment).await?;
        let renewal = apply_renewal(&mut member, term, now, Some(payment_id.clone()))?;

        let payment = Payment {
            payment_id,
            member_id: member.member_id.clone(),
            amount: payload.amount,
            payment_method: payload.payment_method,
            payment_type: PaymentType::Membership,
            status: PaymentStatus::Completed,
            payment_date: now,
            notes: payload.notes,
            created_at: now,
            updated_at: now,
        };
        member.record_payment_entry(payment.entry())?;
        self.store.record_payment(&payment, &mut member).await?;
        tracing::info!(
            member_id = %member.member_id,
            payment_id = %payment.payment_id,
            end_date = %member.end_date,
            "Membership renewed"
        );

        self.notifications
            .notify(
                NewNotification::new(
                    NotificationTarget::Member(member.member_id.clone()),
                    NotificationType::MembershipRenewed,
                    "Membership renewed",
                    format!(
                        "{} renewed a {} membership until {}",
                        member.name,
                        member.membership_type,
                        member.end_date.format("%Y-%m-%d")
                    ),
                )
                .with_context(json!({
                    "payment_id": payment.payment_id,
                    "amount": payment.amount,
                })),
            )
            .await;
        deliver(
            self.mailer.as_ref(),
            &member.email,
            &member.name,
            templates::membership_renewed(&member, &renewal),
        )
        .await;
        Ok(member)
    }

    /// Already-cancelled members are rejected untouched
    pub async fn cancel(&self, member_id: &str, reason: Option<String>) -> ServiceResult<Member> {
        let member = self.get(member_id).await?;
        self.cancel_member(member, reason, self.clock.now()).await
    }

    /// Cancel the member as read; fails with a conflict if it changed since
    pub(crate) async fn cancel_member(
        &self,
        mut member: Member,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Member> {
        member.transition(LifecycleEvent::Cancelled)?;
        member.cancellation_reason = reason;
        member.cancellation_date = Some(now);
        member.updated_at = now;

        let mut context = json!({});
        if let Some(reason) = &member.cancellation_reason {
            context["reason"] = json!(reason);
        }
        let notification = NewNotification::new(
            NotificationTarget::Member(member.member_id.clone()),
            NotificationType::MembershipCancelled,
            "Membership cancelled",
            format!("{}'s membership was cancelled", member.name),
        )
        .with_context(context);
        self.store
            .update_member_with_notification(&mut member, notification)
            .await?;
        tracing::info!(
            member_id = %member.member_id,
            reason = member.cancellation_reason.as_deref().unwrap_or(""),
            "Membership cancelled"
        );

        deliver(
            self.mailer.as_ref(),
            &member.email,
            &member.name,
            templates::membership_cancelled(&member),
        )
        .await;
        Ok(member)
    }

    /// Reject an email already used by another member or a pending application
    async fn ensure_email_free(&self, email: &str, except: Option<&str>) -> ServiceResult<()> {
        if let Some(existing) = self.store.find_member_by_email(email).await?
            && Some(existing.member_id.as_str()) != except
        {
            return Err(AppError::new(ErrorCode::MemberEmailExists)
                .with_detail("email", email)
                .into());
        }
        if self
            .store
            .find_pending_application_by_email(email)
            .await?
            .is_some()
        {
            return Err(AppError::new(ErrorCode::ApplicationPending)
                .with_detail("email", email)
                .into());
        }
        Ok(())
    }
}

/// Move the member onto `term`, starting where the current term ends.
///
/// Resets both reminder counters and forces the status to `active`.
fn apply_renewal(
    member: &mut Member,
    term: MembershipTerm,
    now: DateTime<Utc>,
    payment_id: Option<String>,
) -> ServiceResult<RenewalRecord> {
    let previous = member.snapshot();
    member.transition(LifecycleEvent::Renewed)?;
    member.membership_type = term.membership_type;
    member.membership_duration = term.duration_months;
    member.start_date = previous.end_date;
    member.end_date = term.end_date_from(previous.end_date);
    member.payment_reminder_count = 0;
    member.payment_reminder_window = 0;
    member.expiry_reminder_count = 0;
    member.updated_at = now;

    let record = RenewalRecord {
        previous,
        renewed: member.snapshot(),
        renewal_date: now,
        payment_id,
    };
    member.renewal_history.push(record.clone());
    Ok(record)
}
