//! Notification service
//!
//! Owns the per-user feed. Other services call [`NotificationService::notify`]
//! and [`NotificationService::notify_many`] after their own write has
//! committed; a failed notification never undoes that write.
//!
//! The unread count is cached per user and dropped whenever that user's feed
//! changes.

use crate::cache::{keys, CacheLayer, MemoryCache};
use crate::db::repositories::{NotificationRepository, UserRepository};
use crate::models::{ListParams, NewNotification, Notification, NotificationType, PagedResult};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Maximum notification text length, in characters
pub const MAX_NOTIFICATION_LENGTH: usize = 500;

const UNREAD_COUNT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum NotificationServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    user_repo: Arc<dyn UserRepository>,
    cache: Arc<MemoryCache>,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        user_repo: Arc<dyn UserRepository>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            repo,
            user_repo,
            cache,
        }
    }

    /// Store one notification
    pub async fn notify(
        &self,
        user_id: i64,
        notification_type: NotificationType,
        message: impl Into<String>,
        link: Option<String>,
    ) -> Result<Notification, NotificationServiceError> {
        let notification = NewNotification {
            user_id,
            notification_type,
            message: message.into(),
            link,
        };

        let created = self
            .repo
            .create(&notification)
            .await
            .context("Failed to create notification")?;

        self.invalidate_unread(user_id).await;
        Ok(created)
    }

    /// Best-effort fan-out.
    ///
    /// A failure for one recipient is logged and skipped. Returns how many
    /// notifications were stored.
    pub async fn notify_many(
        &self,
        user_ids: &[i64],
        notification_type: NotificationType,
        message: &str,
        link: Option<&str>,
    ) -> usize {
        let mut delivered = 0;
        for &user_id in user_ids {
            match self
                .notify(user_id, notification_type, message, link.map(str::to_string))
                .await
            {
                Ok(_) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        "Failed to deliver {} notification to user {}: {:#}",
                        notification_type,
                        user_id,
                        e
                    );
                }
            }
        }
        tracing::debug!(
            "Delivered {}/{} {} notifications",
            delivered,
            user_ids.len(),
            notification_type
        );
        delivered
    }

    /// Admin broadcast to a single user
    pub async fn send(
        &self,
        user_id: i64,
        message: &str,
        notification_type: Option<NotificationType>,
        link: Option<String>,
    ) -> Result<Notification, NotificationServiceError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(NotificationServiceError::ValidationError(
                "Message cannot be empty".to_string(),
            ));
        }
        if message.chars().count() > MAX_NOTIFICATION_LENGTH {
            return Err(NotificationServiceError::ValidationError(format!(
                "Message must be at most {} characters",
                MAX_NOTIFICATION_LENGTH
            )));
        }

        if self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .is_none()
        {
            return Err(NotificationServiceError::NotFound(format!(
                "User {} not found",
                user_id
            )));
        }

        self.notify(
            user_id,
            notification_type.unwrap_or(NotificationType::System),
            message,
            link,
        )
        .await
    }

    /// The caller's feed, newest first
    pub async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        params: &ListParams,
    ) -> Result<PagedResult<Notification>, NotificationServiceError> {
        let (items, total) = self
            .repo
            .list(user_id, unread_only, params)
            .await
            .context("Failed to list notifications")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, NotificationServiceError> {
        let key = keys::unread_notifications(user_id);
        match self.cache.get::<i64>(&key).await {
            Ok(Some(count)) => return Ok(count),
            Ok(None) => {}
            Err(e) => tracing::warn!("Unread count cache read failed: {:#}", e),
        }

        let count = self
            .repo
            .unread_count(user_id)
            .await
            .context("Failed to count unread notifications")?;

        if let Err(e) = self.cache.set(&key, &count, UNREAD_COUNT_TTL).await {
            tracing::warn!("Unread count cache write failed: {:#}", e);
        }
        Ok(count)
    }

    /// Mark one notification read. Another user's id is `NotFound`.
    pub async fn mark_read(&self, id: i64, user_id: i64) -> Result<(), NotificationServiceError> {
        let found = self
            .repo
            .mark_read(id, user_id)
            .await
            .context("Failed to mark notification read")?;
        if !found {
            return Err(not_found(id));
        }
        self.invalidate_unread(user_id).await;
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: i64) -> Result<u64, NotificationServiceError> {
        let updated = self
            .repo
            .mark_all_read(user_id)
            .await
            .context("Failed to mark notifications read")?;
        self.invalidate_unread(user_id).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64, user_id: i64) -> Result<(), NotificationServiceError> {
        let deleted = self
            .repo
            .delete(id, user_id)
            .await
            .context("Failed to delete notification")?;
        if !deleted {
            return Err(not_found(id));
        }
        self.invalidate_unread(user_id).await;
        Ok(())
    }

    async fn invalidate_unread(&self, user_id: i64) {
        if let Err(e) = self.cache.delete(&keys::unread_notifications(user_id)).await {
            tracing::warn!("Failed to invalidate unread count for user {}: {:#}", user_id, e);
        }
    }
}

fn not_found(id: i64) -> NotificationServiceError {
    NotificationServiceError::NotFound(format!("Notification {} not found", id))
}
