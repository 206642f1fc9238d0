//! Notifications repository

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgConnection;

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{NotificationType, Priority},
        notification::{
            Notification, NotificationDraft, NotificationQuery, RecentNotification,
            RetentionOutcome,
        },
    },
};

impl Repository {
    /// Insert one notification.
    ///
    /// Returns None when a rule notification for the same user, equipment and
    /// rule already exists for `day`.
    pub(crate) async fn notifications_insert(
        conn: &mut PgConnection,
        draft: &NotificationDraft,
        day: NaiveDate,
    ) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications
                (user_id, equipment_id, title, message, notification_type, priority, rule_key, day_bucket)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(draft.user_id)
        .bind(draft.equipment_id)
        .bind(&draft.title)
        .bind(&draft.message)
        .bind(draft.notification_type)
        .bind(draft.priority)
        .bind(draft.rule_key)
        .bind(day)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    /// Persist a batch of drafts in one transaction
    pub async fn notifications_create_many(
        &self,
        drafts: &[NotificationDraft],
        day: NaiveDate,
    ) -> AppResult<Vec<Notification>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            if let Some(n) = Self::notifications_insert(&mut tx, draft, day).await? {
                created.push(n);
            }
        }
        tx.commit().await?;
        Ok(created)
    }

    pub async fn notifications_create(&self, draft: &NotificationDraft) -> AppResult<Notification> {
        let mut conn = self.pool.acquire().await?;
        Self::notifications_insert(&mut conn, draft, Utc::now().date_naive())
            .await?
            .ok_or_else(|| AppError::Conflict("Notification already exists".to_string()))
    }

    /// Rule notifications created since `since`
    pub async fn notifications_recent(&self, since: DateTime<Utc>) -> AppResult<Vec<RecentNotification>> {
        let rows = sqlx::query_as::<_, RecentNotification>(
            r#"
            SELECT user_id, equipment_id, rule_key, title, created_at
            FROM notifications
            WHERE rule_key IS NOT NULL AND created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Notifications of one user, newest first
    pub async fn notifications_list(
        &self,
        user_id: i32,
        query: &NotificationQuery,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 200);
        let offset = (page - 1) * per_page;
        let unread_only = query.unread.unwrap_or(false);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT is_read)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Mark one of the user's notifications as read
    pub async fn notifications_mark_read(&self, user_id: i32, id: i32) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
    }

    /// Mark the given notifications (or all of them) as read
    pub async fn notifications_mark_read_bulk(&self, user_id: i32, ids: Option<&[i32]>) -> AppResult<u64> {
        let result = match ids {
            Some(ids) => {
                sqlx::query(
                    "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND id = ANY($2) AND NOT is_read",
                )
                .bind(user_id)
                .bind(ids)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }

    pub async fn notifications_unread_count(&self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn notifications_unread_by_priority(&self, user_id: i32) -> AppResult<Vec<(Priority, i64)>> {
        let rows: Vec<(Priority, i64)> = sqlx::query_as(
            r#"
            SELECT priority, COUNT(*) FROM notifications
            WHERE user_id = $1 AND NOT is_read
            GROUP BY priority
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn notifications_unread_by_type(&self, user_id: i32) -> AppResult<Vec<(NotificationType, i64)>> {
        let rows: Vec<(NotificationType, i64)> = sqlx::query_as(
            r#"
            SELECT notification_type, COUNT(*) FROM notifications
            WHERE user_id = $1 AND NOT is_read
            GROUP BY notification_type
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Delete read notifications older than `read_before` and unread ones
    /// older than `unread_before`
    pub async fn notifications_delete_older(
        &self,
        read_before: DateTime<Utc>,
        unread_before: DateTime<Utc>,
    ) -> AppResult<RetentionOutcome> {
        let mut tx = self.pool.begin().await?;

        let read_deleted = sqlx::query("DELETE FROM notifications WHERE is_read AND created_at < $1")
            .bind(read_before)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let unread_deleted =
            sqlx::query("DELETE FROM notifications WHERE NOT is_read AND created_at < $1")
                .bind(unread_before)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        tx.commit().await?;

        Ok(RetentionOutcome {
            read_deleted,
            unread_deleted,
        })
    }
}
