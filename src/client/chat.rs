use reqwest::Method;

use super::{ApiClient, ClientError};
use crate::api::common::PageQuery;
use crate::api::responses::{
    ContentRequest, CountResponse, StartConversationRequest, UpdatedResponse,
};
use crate::models::{ConversationSummary, Message, PagedResult};

impl ApiClient {
    pub async fn list_conversations(
        &self,
        page: &PageQuery,
    ) -> Result<PagedResult<ConversationSummary>, ClientError> {
        self.get_query("/conversations", page).await
    }

    /// Open (or reopen) the conversation with another user
    pub async fn start_conversation(
        &self,
        recipient_id: i64,
    ) -> Result<ConversationSummary, ClientError> {
        self.post("/conversations", &StartConversationRequest { recipient_id })
            .await
    }

    /// Unread messages across all conversations
    pub async fn unread_messages(&self) -> Result<i64, ClientError> {
        let count: CountResponse = self.get("/conversations/unread-count").await?;
        Ok(count.count)
    }

    pub async fn list_messages(
        &self,
        conversation_id: i64,
        page: &PageQuery,
    ) -> Result<PagedResult<Message>, ClientError> {
        self.get_query(&format!("/conversations/{}/messages", conversation_id), page)
            .await
    }

    pub async fn send_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<Message, ClientError> {
        let body = ContentRequest {
            content: content.to_string(),
        };
        self.post(&format!("/conversations/{}/messages", conversation_id), &body)
            .await
    }

    /// Returns how many messages were marked read
    pub async fn mark_conversation_read(&self, conversation_id: i64) -> Result<u64, ClientError> {
        let request = self
            .authed(Method::PUT, &format!("/conversations/{}/read", conversation_id))
            .await?;
        let updated: UpdatedResponse = self.send(request).await?;
        Ok(updated.updated)
    }

    pub async fn delete_message(&self, id: i64) -> Result<(), ClientError> {
        self.delete(&format!("/messages/{}", id)).await
    }
}
