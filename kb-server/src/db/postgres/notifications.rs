use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{NewNotification, Notification, NotificationQuery};
use sqlx::PgConnection;
use sqlx::types::Json;

use super::PgStore;
use super::rows::{NotificationRow, map_rows};
use crate::db::{DEFAULT_PAGE_SIZE, NotificationRepository, RepoResult};

/// Insert unless `(related_id, related_model, notification_type)` exists,
/// then read back whichever row won.
pub(super) async fn find_or_create_in(
    conn: &mut PgConnection,
    n: NewNotification,
    now: DateTime<Utc>,
) -> RepoResult<(Notification, bool)> {
    let inserted: Option<NotificationRow> = sqlx::query_as(
        "INSERT INTO notifications
            (related_model, related_id, notification_type, title, message,
             additional_context, status, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, 'unread', $7)
         ON CONFLICT (related_id, related_model, notification_type) DO NOTHING
         RETURNING *",
    )
    .bind(n.target.related_model())
    .bind(n.target.related_id())
    .bind(n.notification_type.as_str())
    .bind(&n.title)
    .bind(&n.message)
    .bind(Json(&n.additional_context))
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = inserted {
        return Ok((row.try_into()?, true));
    }

    let existing: NotificationRow = sqlx::query_as(
        "SELECT * FROM notifications
         WHERE related_id = $1 AND related_model = $2 AND notification_type = $3",
    )
    .bind(n.target.related_id())
    .bind(n.target.related_model())
    .bind(n.notification_type.as_str())
    .fetch_one(&mut *conn)
    .await?;
    Ok((existing.try_into()?, false))
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn find_or_create_notification(
        &self,
        notification: NewNotification,
    ) -> RepoResult<(Notification, bool)> {
        let mut conn = self.pool.acquire().await?;
        find_or_create_in(&mut conn, notification, Utc::now()).await
    }

    async fn list_notifications(&self, query: &NotificationQuery) -> RepoResult<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notifications
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::text IS NULL OR notification_type = $2)
             ORDER BY created_at DESC
             LIMIT $3",
        )
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.notification_type.map(|t| t.as_str()))
        .bind(query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .fetch_all(&self.pool)
        .await?;
        map_rows(rows)
    }

    async fn mark_notification_read(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Notification>> {
        let row: Option<NotificationRow> = sqlx::query_as(
            "UPDATE notifications
             SET status = 'read', read_at = COALESCE(read_at, $2)
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Notification::try_from).transpose()
    }

    async fn mark_all_notifications_read(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'read', read_at = $1 WHERE status = 'unread'",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn unread_notification_count(&self) -> RepoResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE status = 'unread'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
