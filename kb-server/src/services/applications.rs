//! Membership applications: submit, review, convert

use std::sync::Arc;

use serde_json::json;
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Application, ApplicationCreate, ApplicationHistory, ApplicationStatus, IdKind, Member,
    MembershipType, NewNotification, NotificationTarget, NotificationType,
};
use shared::util::normalize_email;
use validator::Validate;

use super::identifiers::Identifiers;
use super::notifications::NotificationService;
use crate::db::{ApplicationQuery, Store};
use crate::email::{Mailer, deliver, templates};
use crate::error::ServiceResult;
use crate::util::Clock;

#[derive(Clone)]
pub struct ApplicationService {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    ids: Identifiers,
    notifications: NotificationService,
}

impl ApplicationService {
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

    pub async fn submit(&self, mut payload: ApplicationCreate) -> ServiceResult<Application> {
        payload.email = normalize_email(&payload.email);
        payload.validate()?;
        let email = std::mem::take(&mut payload.email);

        if self
            .store
            .find_pending_application_by_email(&email)
            .await?
            .is_some()
        {
            return Err(AppError::new(ErrorCode::ApplicationPending)
                .with_detail("email", email)
                .into());
        }
        if self.store.find_member_by_email(&email).await?.is_some() {
            return Err(AppError::new(ErrorCode::MemberEmailExists)
                .with_detail("email", email)
                .into());
        }

        let term = MembershipType::resolve(payload.membership_type, payload.membership_duration)?;
        let now = self.clock.now();
        let application = Application {
            application_id: self.ids.next(IdKind::Application).await?,
            name: payload.name.trim().to_string(),
            email,
            phone: payload.phone,
            address: payload.address,
            gender: payload.gender,
            date_of_birth: payload.date_of_birth,
            membership_type: term.membership_type,
            membership_duration: term.duration_months,
            start_date: payload.start_date.unwrap_or(now),
            application_status: ApplicationStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_application(&application).await?;
        tracing::info!(
            application_id = %application.application_id,
            membership_type = %application.membership_type,
            "Application submitted"
        );

        self.notifications
            .notify(
                NewNotification::new(
                    NotificationTarget::Application(application.application_id.clone()),
                    NotificationType::NewApplication,
                    "New membership application",
                    format!(
                        "{} applied for a {} membership",
                        application.name, application.membership_type
                    ),
                )
                .with_context(json!({ "email": application.email })),
            )
            .await;
        deliver(
            self.mailer.as_ref(),
            &application.email,
            &application.name,
            templates::application_received(&application),
        )
        .await;
        Ok(application)
    }

    /// Convert a pending application into a `pending` member.
    ///
    /// The application row is removed once the conversion has committed;
    /// its history copy stays.
    pub async fn accept(&self, application_id: &str) -> ServiceResult<Member> {
        let mut application = self.get_pending(application_id).await?;
        if self
            .store
            .find_member_by_email(&application.email)
            .await?
            .is_some()
        {
            return Err(AppError::new(ErrorCode::MemberEmailExists)
                .with_detail("email", application.email)
                .into());
        }

        let now = self.clock.now();
        let member = application.to_member(self.ids.next(IdKind::Member).await?, now);
        application.application_status = ApplicationStatus::Accepted;
        application.updated_at = now;

        let notification = NewNotification::new(
            NotificationTarget::Member(member.member_id.clone()),
            NotificationType::ApplicationAccepted,
            "Application accepted",
            format!("{} is now member {}", member.name, member.member_id),
        )
        .with_context(json!({ "application_id": application.application_id }));
        self.store
            .accept_application(&application, &member, notification)
            .await?;
        tracing::info!(
            application_id = %application.application_id,
            member_id = %member.member_id,
            "Application accepted"
        );

        if let Err(e) = self
            .store
            .delete_application(&application.application_id)
            .await
        {
            tracing::warn!(
                application_id = %application.application_id,
                error = %e,
                "Failed to remove accepted application"
            );
        }

        deliver(
            self.mailer.as_ref(),
            &member.email,
            &member.name,
            templates::application_accepted(&member),
        )
        .await;
        Ok(member)
    }

    pub async fn reject(
        &self,
        application_id: &str,
        reason: Option<String>,
    ) -> ServiceResult<Application> {
        let mut application = self.get_pending(application_id).await?;
        application.application_status = ApplicationStatus::Rejected;
        application.rejection_reason = reason;
        application.updated_at = self.clock.now();
        self.store.update_application(&application).await?;
        tracing::info!(application_id = %application.application_id, "Application rejected");

        let mut context = json!({ "email": application.email });
        if let Some(reason) = &application.rejection_reason {
            context["reason"] = json!(reason);
        }
        self.notifications
            .notify(
                NewNotification::new(
                    NotificationTarget::Application(application.application_id.clone()),
                    NotificationType::ApplicationRejected,
                    "Application rejected",
                    format!("{}'s application was rejected", application.name),
                )
                .with_context(context),
            )
            .await;
        deliver(
            self.mailer.as_ref(),
            &application.email,
            &application.name,
            templates::application_rejected(&application),
        )
        .await;
        Ok(application)
    }

    pub async fn get(&self, application_id: &str) -> ServiceResult<Application> {
        self.store
            .find_application(application_id)
            .await?
            .ok_or_else(|| AppError::application_not_found(application_id).into())
    }

    pub async fn list(&self, query: &ApplicationQuery) -> ServiceResult<Vec<Application>> {
        Ok(self.store.list_applications(query).await?)
    }

    pub async fn delete(&self, application_id: &str) -> ServiceResult<()> {
        if !self.store.delete_application(application_id).await? {
            return Err(AppError::application_not_found(application_id).into());
        }
        tracing::info!(application_id = %application_id, "Application deleted");
        Ok(())
    }

    /// Every submission ever made with this email, newest first
    pub async fn history(&self, email: &str) -> ServiceResult<Vec<ApplicationHistory>> {
        Ok(self
            .store
            .application_history(&normalize_email(email))
            .await?)
    }

    async fn get_pending(&self, application_id: &str) -> ServiceResult<Application> {
        let application = self.get(application_id).await?;
        if application.application_status != ApplicationStatus::Pending {
            return Err(AppError::new(ErrorCode::ApplicationAlreadyProcessed)
                .with_detail("status", application.application_status.as_str())
                .into());
        }
        Ok(application)
    }
}
