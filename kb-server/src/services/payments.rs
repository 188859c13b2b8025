//! Payment recording and bookkeeping

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    DUPLICATE_WINDOW_SECS, IdKind, Member, NewNotification, NotificationTarget, NotificationType,
    Payment, PaymentCreate, PaymentStatus,
};

use super::identifiers::Identifiers;
use super::notifications::NotificationService;
use crate::db::{PaymentQuery, RepoError, Store};
use crate::email::{Mailer, deliver, templates};
use crate::error::ServiceResult;
use crate::util::Clock;

/// Attempts at writing a payment's member entry before giving up on conflicts
const MEMBER_WRITE_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    ids: Identifiers,
    notifications: NotificationService,
}

impl PaymentService {
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

    /// Record a payment against a member.
    ///
    /// The payment row and the member's denormalized entry are written in one
    /// transaction; a pending or cancelled member becomes active. When the
    /// member changes underneath (a sweep, another payment) the entry is
    /// re-applied to a fresh read.
    pub async fn record(&self, member_id: &str, payload: PaymentCreate) -> ServiceResult<Payment> {
        let amount = payload
            .amount
            .filter(|a| *a > Decimal::ZERO)
            .ok_or_else(|| AppError::new(ErrorCode::PaymentAmountRequired))?;
        let mut member = self.member(member_id).await?;

        let now = self.clock.now();
        let since = now - Duration::seconds(DUPLICATE_WINDOW_SECS);
        let recent = self.store.recent_payments(member_id, since).await?;
        if let Some(previous) = recent
            .iter()
            .find(|p| p.is_duplicate_of(member_id, amount, payload.payment_type, now))
        {
            return Err(AppError::new(ErrorCode::DuplicatePayment)
                .with_detail("payment_id", previous.payment_id.clone())
                .into());
        }

        let payment = Payment {
            payment_id: self.ids.next(IdKind::Payment).await?,
            member_id: member.member_id.clone(),
            amount,
            payment_method: payload.payment_method,
            payment_type: payload.payment_type,
            status: payload.status,
            payment_date: payload.payment_date.unwrap_or(now),
            notes: payload.notes,
            created_at: now,
            updated_at: now,
        };
        let mut attempt = 1;
        let previous_status = loop {
            let previous_status = member.member_status;
            member.record_payment_entry(payment.entry())?;
            member.updated_at = now;
            match self.store.record_payment(&payment, &mut member).await {
                Ok(()) => break previous_status,
                Err(RepoError::Conflict(reason)) if attempt < MEMBER_WRITE_ATTEMPTS => {
                    tracing::warn!(
                        member_id = %member_id,
                        attempt,
                        reason = %reason,
                        "Member changed while recording payment, retrying"
                    );
                    attempt += 1;
                    member = self.member(member_id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        };
        tracing::info!(
            member_id = %member.member_id,
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            from = %previous_status,
            to = %member.member_status,
            "Payment recorded"
        );

        self.notifications
            .notify(
                NewNotification::new(
                    NotificationTarget::Member(member.member_id.clone()),
                    NotificationType::PaymentReceived,
                    "Payment received",
                    format!("{} paid {}", member.name, payment.amount),
                )
                .with_context(json!({
                    "payment_id": payment.payment_id,
                    "amount": payment.amount,
                    "payment_method": payment.payment_method,
                })),
            )
            .await;
        deliver(
            self.mailer.as_ref(),
            &member.email,
            &member.name,
            templates::payment_received(&member, &payment),
        )
        .await;
        Ok(payment)
    }

    pub async fn get(&self, payment_id: &str) -> ServiceResult<Payment> {
        self.store
            .find_payment(payment_id)
            .await?
            .ok_or_else(|| payment_not_found(payment_id).into())
    }

    pub async fn list(&self, query: &PaymentQuery) -> ServiceResult<Vec<Payment>> {
        Ok(self.store.list_payments(query).await?)
    }

    pub async fn list_for_member(&self, member_id: &str) -> ServiceResult<Vec<Payment>> {
        self.member(member_id).await?;
        let query = PaymentQuery {
            member_id: Some(member_id.to_string()),
            ..Default::default()
        };
        Ok(self.store.list_payments(&query).await?)
    }

    /// Change the status; the member's denormalized entry follows
    pub async fn update_status(
        &self,
        payment_id: &str,
        status: PaymentStatus,
    ) -> ServiceResult<Payment> {
        let mut payment = self.get(payment_id).await?;
        let now = self.clock.now();
        payment.status = status;
        payment.updated_at = now;

        let mut member = self
            .store
            .find_member(&payment.member_id)
            .await?
            .map(|m| mirror_status(m, payment_id, status, now));
        self.store.update_payment(&payment, member.as_mut()).await?;
        tracing::info!(payment_id = %payment_id, status = status.as_str(), "Payment status updated");
        Ok(payment)
    }

    /// Delete the payment and its entry; `last_payment_date` is recomputed
    pub async fn delete(&self, payment_id: &str) -> ServiceResult<()> {
        let payment = self.get(payment_id).await?;
        let now = self.clock.now();
        let mut member = self
            .store
            .find_member(&payment.member_id)
            .await?
            .map(|mut m| {
                if m.remove_payment_entry(payment_id) {
                    m.updated_at = now;
                }
                m
            });
        if !self.store.delete_payment(payment_id, member.as_mut()).await? {
            return Err(payment_not_found(payment_id).into());
        }
        tracing::info!(payment_id = %payment_id, member_id = %payment.member_id, "Payment deleted");
        Ok(())
    }

    async fn member(&self, member_id: &str) -> ServiceResult<Member> {
        self.store
            .find_member(member_id)
            .await?
            .ok_or_else(|| AppError::member_not_found(member_id).into())
    }
}

fn payment_not_found(payment_id: &str) -> AppError {
    AppError::new(ErrorCode::PaymentNotFound).with_detail("payment_id", payment_id)
}

fn mirror_status(
    mut member: Member,
    payment_id: &str,
    status: PaymentStatus,
    now: DateTime<Utc>,
) -> Member {
    if let Some(entry) = member
        .payments
        .iter_mut()
        .find(|e| e.payment_id == payment_id)
    {
        entry.status = status;
        member.updated_at = now;
    }
    member
}
