//! Notification store operations

use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::{NewNotification, Notification, NotificationQuery};

use crate::db::Store;
use crate::error::ServiceResult;
use crate::util::Clock;

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the existing notification when one already matches
    /// `(related_id, related_model, notification_type)`
    pub async fn find_or_create(&self, notification: NewNotification) -> ServiceResult<Notification> {
        let (stored, created) = self.store.find_or_create_notification(notification).await?;
        if created {
            tracing::debug!(
                id = stored.id,
                notification_type = %stored.notification_type,
                related_id = %stored.target.related_id(),
                "Notification created"
            );
        }
        Ok(stored)
    }

    /// Best-effort variant for side effects: failures are logged, not returned
    pub async fn notify(&self, notification: NewNotification) -> Option<Notification> {
        let notification_type = notification.notification_type;
        let related_id = notification.target.related_id().to_string();
        match self.find_or_create(notification).await {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(
                    notification_type = %notification_type,
                    related_id = %related_id,
                    error = %e,
                    "Failed to create notification"
                );
                None
            }
        }
    }

    pub async fn list(&self, query: &NotificationQuery) -> ServiceResult<Vec<Notification>> {
        Ok(self.store.list_notifications(query).await?)
    }

    pub async fn mark_read(&self, id: i64) -> ServiceResult<Notification> {
        self.store
            .mark_notification_read(id, self.clock.now())
            .await?
            .ok_or_else(|| {
                AppError::new(ErrorCode::NotificationNotFound)
                    .with_detail("id", id)
                    .into()
            })
    }

    pub async fn mark_all_read(&self) -> ServiceResult<u64> {
        Ok(self.store.mark_all_notifications_read(self.clock.now()).await?)
    }

    pub async fn unread_count(&self) -> ServiceResult<i64> {
        Ok(self.store.unread_notification_count().await?)
    }
}
