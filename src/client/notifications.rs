use reqwest::Method;

use super::{ApiClient, ClientError};
use crate::api::common::NotificationListQuery;
use crate::api::responses::{CountResponse, UpdatedResponse};
use crate::models::{Notification, PagedResult};

impl ApiClient {
    pub async fn list_notifications(
        &self,
        query: &NotificationListQuery,
    ) -> Result<PagedResult<Notification>, ClientError> {
        self.get_query("/notifications", query).await
    }

    pub async fn unread_notifications(&self) -> Result<i64, ClientError> {
        let count: CountResponse = self.get("/notifications/unread-count").await?;
        Ok(count.count)
    }

    pub async fn mark_all_notifications_read(&self) -> Result<u64, ClientError> {
        let request = self.authed(Method::PUT, "/notifications/read-all").await?;
        let updated: UpdatedResponse = self.send(request).await?;
        Ok(updated.updated)
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<(), ClientError> {
        let request = self
            .authed(Method::PUT, &format!("/notifications/{}/read", id))
            .await?;
        self.send_empty(request).await
    }

    pub async fn delete_notification(&self, id: i64) -> Result<(), ClientError> {
        self.delete(&format!("/notifications/{}", id)).await
    }
}
