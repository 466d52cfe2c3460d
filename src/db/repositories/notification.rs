//! Notification repository
//!
//! Every per-row operation is scoped by owner, so a foreign id behaves the
//! same as a missing one.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, NewNotification, Notification, NotificationType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> Result<Notification>;

    /// Newest first
    async fn list(&self, user_id: i64, unread_only: bool, params: &ListParams) -> Result<(Vec<Notification>, i64)>;

    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool>;

    async fn mark_all_read(&self, user_id: i64) -> Result<u64>;

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool>;
}

pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, message, notification_type, link, is_read, created_at";

const INSERT_NOTIFICATION: &str = r#"
    INSERT INTO notifications (user_id, message, notification_type, link, is_read, created_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

/// Binds: user id, unread-only flag, false. A zero flag skips the read filter.
const LIST_FILTER: &str = "user_id = ? AND (? = 0 OR is_read = ?)";

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_NOTIFICATION)
                .bind(notification.user_id)
                .bind(&notification.message)
                .bind(notification.notification_type.to_string())
                .bind(&notification.link)
                .bind(false)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create notification")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_NOTIFICATION)
                .bind(notification.user_id)
                .bind(&notification.message)
                .bind(notification.notification_type.to_string())
                .bind(&notification.link)
                .bind(false)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create notification")?
                .last_insert_id() as i64,
        };

        Ok(Notification {
            id,
            user_id: notification.user_id,
            message: notification.message.clone(),
            notification_type: notification.notification_type,
            link: notification.link.clone(),
            is_read: false,
            created_at: now,
        })
    }

    async fn list(&self, user_id: i64, unread_only: bool, params: &ListParams) -> Result<(Vec<Notification>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_notifications_sqlite(self.pool.sqlite()?, user_id, unread_only, params).await
            }
            DatabaseDriver::Mysql => {
                list_notifications_mysql(self.pool.mysql()?, user_id, unread_only, params).await
            }
        }
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .bind(user_id)
                .bind(false)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count unread notifications")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .bind(user_id)
                .bind(false)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count unread notifications")?,
        };
        Ok(count)
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool> {
        // Matching rows count even if already read, so a second call still succeeds.
        let sql = "SELECT COUNT(*) FROM notifications WHERE id = ? AND user_id = ?";
        let update = "UPDATE notifications SET is_read = ? WHERE id = ? AND user_id = ?";
        let found: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                sqlx::query(update)
                    .bind(true)
                    .bind(id)
                    .bind(user_id)
                    .execute(pool)
                    .await
                    .context("Failed to mark notification read")?;
                sqlx::query_scalar(sql)
                    .bind(id)
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to look up notification")?
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                sqlx::query(update)
                    .bind(true)
                    .bind(id)
                    .bind(user_id)
                    .execute(pool)
                    .await
                    .context("Failed to mark notification read")?;
                sqlx::query_scalar(sql)
                    .bind(id)
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to look up notification")?
            }
        };
        Ok(found > 0)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64> {
        let sql = "UPDATE notifications SET is_read = ? WHERE user_id = ? AND is_read = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(true)
                .bind(user_id)
                .bind(false)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(true)
                .bind(user_id)
                .bind(false)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
        };
        Ok(affected)
    }

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool> {
        let sql = "DELETE FROM notifications WHERE id = ? AND user_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete notification")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete notification")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

fn parse_notification_type(raw: &str) -> Result<NotificationType> {
    NotificationType::from_str(raw).with_context(|| format!("Invalid notification type in database: {}", raw))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_notifications_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    unread_only: bool,
    params: &ListParams,
) -> Result<(Vec<Notification>, i64)> {
    let sql = format!(
        "SELECT {} FROM notifications WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        NOTIFICATION_COLUMNS, LIST_FILTER
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(unread_only)
        .bind(false)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list notifications")?;

    let count_sql = format!("SELECT COUNT(*) FROM notifications WHERE {}", LIST_FILTER);
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(user_id)
        .bind(unread_only)
        .bind(false)
        .fetch_one(pool)
        .await
        .context("Failed to count notifications")?;

    let items = rows.iter().map(row_to_notification_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

fn row_to_notification_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Notification> {
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        message: row.get("message"),
        notification_type: parse_notification_type(row.get("notification_type"))?,
        link: row.get("link"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_notifications_mysql(
    pool: &MySqlPool,
    user_id: i64,
    unread_only: bool,
    params: &ListParams,
) -> Result<(Vec<Notification>, i64)> {
    let sql = format!(
        "SELECT {} FROM notifications WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        NOTIFICATION_COLUMNS, LIST_FILTER
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(unread_only)
        .bind(false)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list notifications")?;

    let count_sql = format!("SELECT COUNT(*) FROM notifications WHERE {}", LIST_FILTER);
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(user_id)
        .bind(unread_only)
        .bind(false)
        .fetch_one(pool)
        .await
        .context("Failed to count notifications")?;

    let items = rows.iter().map(row_to_notification_mysql).collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

fn row_to_notification_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Notification> {
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        message: row.get("message"),
        notification_type: parse_notification_type(row.get("notification_type"))?,
        link: row.get("link"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_user, setup_pool};

    fn note(user_id: i64, message: &str) -> NewNotification {
        NewNotification {
            user_id,
            notification_type: NotificationType::System,
            message: message.to_string(),
            link: Some("/somewhere".to_string()),
        }
    }

    async fn setup() -> (SqlxNotificationRepository, i64, i64) {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        (SqlxNotificationRepository::new(pool), alice, bob)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (repo, alice, bob) = setup().await;
        repo.create(&note(alice, "first")).await.expect("Failed to create notification");
        repo.create(&note(alice, "second")).await.unwrap();
        repo.create(&note(bob, "bob's")).await.unwrap();

        let (items, total) = repo.list(alice, false, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].message, "second");
        assert_eq!(items[0].link.as_deref(), Some("/somewhere"));
        assert!(!items[0].is_read);
    }

    #[tokio::test]
    async fn test_mark_read_is_owner_scoped() {
        let (repo, alice, bob) = setup().await;
        let n = repo.create(&note(alice, "hello")).await.unwrap();

        assert!(!repo.mark_read(n.id, bob).await.unwrap());
        assert_eq!(repo.unread_count(alice).await.unwrap(), 1);

        assert!(repo.mark_read(n.id, alice).await.unwrap());
        assert!(repo.mark_read(n.id, alice).await.unwrap());
        assert_eq!(repo.unread_count(alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unread_only_filter_and_mark_all() {
        let (repo, alice, _) = setup().await;
        let n1 = repo.create(&note(alice, "one")).await.unwrap();
        repo.create(&note(alice, "two")).await.unwrap();
        repo.create(&note(alice, "three")).await.unwrap();
        repo.mark_read(n1.id, alice).await.unwrap();

        let (unread, total) = repo.list(alice, true, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert!(unread.iter().all(|n| !n.is_read));

        assert_eq!(repo.mark_all_read(alice).await.unwrap(), 2);
        assert_eq!(repo.unread_count(alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped() {
        let (repo, alice, bob) = setup().await;
        let n = repo.create(&note(alice, "mine")).await.unwrap();

        assert!(!repo.delete(n.id, bob).await.unwrap());
        assert!(repo.delete(n.id, alice).await.unwrap());
        assert!(!repo.delete(n.id, alice).await.unwrap());
    }
}
