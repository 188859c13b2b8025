//! Scheduled membership sweeps
//!
//! Each job scans its own candidates and treats every member as a separate
//! unit of work: one failing member is logged and counted, the rest carry on.
//! A candidate is re-read right before it is processed, and every write is
//! versioned, so a member changed by a request mid-sweep is never overwritten.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    LifecycleEvent, Member, MemberStatus, NewNotification, NotificationTarget, NotificationType,
};

use super::plan::{self, ExpiryGrade, PaymentReminderPlan};
use crate::db::Store;
use crate::email::{EmailMessage, Mailer, deliver, templates};
use crate::error::ServiceResult;
use crate::services::{MemberService, NotificationService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepJob {
    PendingStart,
    MembershipExpiring,
    MembershipExpired,
    PaymentReminders,
    ExpiryReminders,
    InactiveSweep,
}

impl SweepJob {
    /// Execution order of a scheduled run
    pub const ALL: [SweepJob; 6] = [
        SweepJob::PendingStart,
        SweepJob::MembershipExpiring,
        SweepJob::MembershipExpired,
        SweepJob::PaymentReminders,
        SweepJob::ExpiryReminders,
        SweepJob::InactiveSweep,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            SweepJob::PendingStart => "pending_start",
            SweepJob::MembershipExpiring => "membership_expiring",
            SweepJob::MembershipExpired => "membership_expired",
            SweepJob::PaymentReminders => "payment_reminders",
            SweepJob::ExpiryReminders => "expiry_reminders",
            SweepJob::InactiveSweep => "inactive_sweep",
        }
    }

    const fn statuses(self) -> &'static [MemberStatus] {
        match self {
            SweepJob::PendingStart | SweepJob::PaymentReminders => &[MemberStatus::Pending],
            SweepJob::MembershipExpiring | SweepJob::MembershipExpired => &[MemberStatus::Active],
            SweepJob::ExpiryReminders => &[MemberStatus::Active, MemberStatus::Expiring],
            SweepJob::InactiveSweep => &[MemberStatus::Active, MemberStatus::Pending],
        }
    }
}

/// Outcome of one job run
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub job: SweepJob,
    /// Members matching the job's predicate
    pub candidates: usize,
    pub processed: usize,
    /// Candidates that changed before their turn and no longer qualify
    pub skipped: usize,
    pub failed: usize,
    /// Set when the candidate scan itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SweepReport {
    fn new(job: SweepJob) -> Self {
        Self {
            job,
            candidates: 0,
            processed: 0,
            skipped: 0,
            failed: 0,
            error: None,
        }
    }
}

#[derive(Clone)]
pub struct SweepRunner {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    members: MemberService,
    notifications: NotificationService,
}

impl SweepRunner {
    pub fn new(
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        members: MemberService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            mailer,
            members,
            notifications,
        }
    }

    /// Run every job in order; a job that cannot even load its candidates
    /// does not stop the ones after it
    pub async fn run_all(&self, now: DateTime<Utc>) -> Vec<SweepReport> {
        let mut reports = Vec::with_capacity(SweepJob::ALL.len());
        for job in SweepJob::ALL {
            let report = match self.run(job, now).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(job = job.name(), error = %e, "Sweep aborted");
                    SweepReport {
                        error: Some(e.to_string()),
                        ..SweepReport::new(job)
                    }
                }
            };
            reports.push(report);
        }
        reports
    }

    pub async fn run(&self, job: SweepJob, now: DateTime<Utc>) -> ServiceResult<SweepReport> {
        let candidates: Vec<String> = self
            .store
            .members_with_status(job.statuses())
            .await?
            .into_iter()
            .filter(|m| is_candidate(job, m, now))
            .map(|m| m.member_id)
            .collect();

        let mut report = SweepReport::new(job);
        report.candidates = candidates.len();
        for member_id in candidates {
            match self.process_current(job, &member_id, now).await {
                Ok(true) => report.processed += 1,
                Ok(false) => {
                    report.skipped += 1;
                    tracing::debug!(
                        job = job.name(),
                        member_id = %member_id,
                        "Member changed before its turn, skipped"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        job = job.name(),
                        member_id = %member_id,
                        error = %e,
                        "Sweep failed for member"
                    );
                }
            }
        }

        if report.candidates > 0 {
            tracing::info!(
                job = job.name(),
                candidates = report.candidates,
                processed = report.processed,
                skipped = report.skipped,
                failed = report.failed,
                "Sweep finished"
            );
        } else {
            tracing::debug!(job = job.name(), "Sweep found no candidates");
        }
        Ok(report)
    }

    /// Process the member as it is now; `false` when it no longer qualifies
    async fn process_current(
        &self,
        job: SweepJob,
        member_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let Some(member) = self.store.find_member(member_id).await? else {
            return Ok(false);
        };
        if !is_candidate(job, &member, now) {
            return Ok(false);
        }
        self.process(job, member, now).await?;
        Ok(true)
    }

    async fn process(&self, job: SweepJob, member: Member, now: DateTime<Utc>) -> ServiceResult<()> {
        match job {
            SweepJob::PendingStart => self.flag_pending_payment(member, now).await,
            SweepJob::MembershipExpiring => self.mark_expiring(member, now).await,
            SweepJob::MembershipExpired => self.mark_expired(member, now).await,
            SweepJob::PaymentReminders => self.payment_reminder(member, now).await,
            SweepJob::ExpiryReminders => self.expiry_reminder(member, now).await,
            SweepJob::InactiveSweep => self.deactivate(member, now).await,
        }
    }

    async fn flag_pending_payment(&self, member: Member, now: DateTime<Utc>) -> ServiceResult<()> {
        let days = member.days_until_start(now);
        self.notifications
            .find_or_create(
                NewNotification::new(
                    NotificationTarget::Member(member.member_id.clone()),
                    NotificationType::PaymentPending,
                    "Payment pending",
                    format!(
                        "{}'s membership starts on {} and has not been paid",
                        member.name,
                        member.start_date.format("%Y-%m-%d")
                    ),
                )
                .with_context(json!({
                    "start_date": member.start_date,
                    "days_until_start": days,
                })),
            )
            .await?;
        Ok(())
    }

    async fn mark_expiring(&self, mut member: Member, now: DateTime<Utc>) -> ServiceResult<()> {
        let days_left = member.days_until_end(now);
        member.transition(LifecycleEvent::ExpiryApproaching)?;
        member.updated_at = now;
        let notification = expiring_notification(&member, days_left);
        self.store
            .update_member_with_notification(&mut member, notification)
            .await?;
        tracing::info!(member_id = %member.member_id, days_left, "Membership expiring");

        deliver(
            self.mailer.as_ref(),
            &member.email,
            &member.name,
            templates::membership_expiring(&member, days_left),
        )
        .await;
        Ok(())
    }

    async fn mark_expired(&self, mut member: Member, now: DateTime<Utc>) -> ServiceResult<()> {
        member.transition(LifecycleEvent::Lapsed)?;
        member.expiry_date = Some(now);
        member.updated_at = now;
        let notification = NewNotification::new(
            NotificationTarget::Member(member.member_id.clone()),
            NotificationType::MembershipExpired,
            "Membership expired",
            format!(
                "{}'s {} membership ended on {}",
                member.name,
                member.membership_type,
                member.end_date.format("%Y-%m-%d")
            ),
        )
        .with_context(json!({ "end_date": member.end_date }));
        self.store
            .update_member_with_notification(&mut member, notification)
            .await?;
        tracing::info!(member_id = %member.member_id, "Membership expired");

        deliver(
            self.mailer.as_ref(),
            &member.email,
            &member.name,
            templates::membership_expired(&member),
        )
        .await;
        Ok(())
    }

    /// The counter only advances once the email went out
    async fn payment_reminder(&self, mut member: Member, now: DateTime<Utc>) -> ServiceResult<()> {
        match plan::plan_payment_reminder(&member, now) {
            PaymentReminderPlan::Skip => Ok(()),
            PaymentReminderPlan::Cancel => {
                self.members
                    .cancel_member(member, Some(plan::NON_PAYMENT_REASON.to_string()), now)
                    .await?;
                Ok(())
            }
            PaymentReminderPlan::Remind {
                window,
                reminder,
                days_until_start,
            } => {
                self.send(
                    &member,
                    templates::payment_reminder(&member, reminder, days_until_start),
                )
                .await?;
                member.payment_reminder_count = reminder;
                member.payment_reminder_window = window;
                member.updated_at = now;
                self.store.update_member(&mut member).await?;
                tracing::info!(
                    member_id = %member.member_id,
                    reminder,
                    window,
                    days_until_start,
                    "Payment reminder sent"
                );
                Ok(())
            }
        }
    }

    async fn expiry_reminder(&self, mut member: Member, now: DateTime<Utc>) -> ServiceResult<()> {
        let Some(grade) = plan::plan_expiry_reminder(&member, now) else {
            return Ok(());
        };
        let days_left = member.days_until_end(now);
        self.send(&member, templates::expiry_reminder(&member, grade, days_left))
            .await?;

        member.expiry_reminder_count = grade.level();
        match grade {
            ExpiryGrade::Final => {
                member.transition(LifecycleEvent::Deactivated)?;
            }
            _ if member.member_status == MemberStatus::Active => {
                member.transition(LifecycleEvent::ExpiryApproaching)?;
            }
            _ => {}
        }
        member.updated_at = now;
        let notification = expiring_notification(&member, days_left);
        self.store
            .update_member_with_notification(&mut member, notification)
            .await?;
        tracing::info!(
            member_id = %member.member_id,
            grade = ?grade,
            status = %member.member_status,
            "Expiry reminder sent"
        );
        Ok(())
    }

    async fn deactivate(&self, mut member: Member, now: DateTime<Utc>) -> ServiceResult<()> {
        let from = member.member_status;
        member.transition(LifecycleEvent::Deactivated)?;
        member.updated_at = now;
        self.store.update_member(&mut member).await?;
        tracing::info!(member_id = %member.member_id, from = %from, "Membership deactivated");
        Ok(())
    }

    async fn send(&self, member: &Member, message: EmailMessage) -> ServiceResult<()> {
        self.mailer
            .send(&member.email, &member.name, message)
            .await
            .map_err(|e| AppError::with_message(ErrorCode::EmailDeliveryFailed, e.to_string()))?;
        Ok(())
    }
}

fn is_candidate(job: SweepJob, member: &Member, now: DateTime<Utc>) -> bool {
    match job {
        SweepJob::PendingStart => plan::starts_soon(member, now),
        SweepJob::MembershipExpiring => plan::expiring_due(member, now),
        SweepJob::MembershipExpired => plan::expired_due(member, now),
        SweepJob::PaymentReminders => {
            plan::plan_payment_reminder(member, now) != PaymentReminderPlan::Skip
        }
        SweepJob::ExpiryReminders => plan::plan_expiry_reminder(member, now).is_some(),
        SweepJob::InactiveSweep => plan::inactive_due(member, now),
    }
}

fn expiring_notification(member: &Member, days_left: i64) -> NewNotification {
    NewNotification::new(
        NotificationTarget::Member(member.member_id.clone()),
        NotificationType::MembershipExpiring,
        "Membership expiring",
        format!(
            "{}'s membership ends on {}",
            member.name,
            member.end_date.format("%Y-%m-%d")
        ),
    )
    .with_context(json!({
        "end_date": member.end_date,
        "days_left": days_left,
    }))
}
