//! Direct messaging service

use crate::db::repositories::{ChatRepository, UserRepository};
use crate::models::{
    Conversation, ConversationSummary, ListParams, Message, NotificationType, PagedResult, User,
    MAX_MESSAGE_LENGTH,
};
use crate::services::notification::NotificationService;
use crate::services::{summary_for, user_summaries};
use anyhow::Context;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// Length of the message excerpt put in a notification, in characters
const PREVIEW_LENGTH: usize = 80;

#[derive(Debug, thiserror::Error)]
pub enum ChatServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ChatService {
    chat_repo: Arc<dyn ChatRepository>,
    user_repo: Arc<dyn UserRepository>,
    notifications: Arc<NotificationService>,
}

impl ChatService {
    pub fn new(
        chat_repo: Arc<dyn ChatRepository>,
        user_repo: Arc<dyn UserRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            chat_repo,
            user_repo,
            notifications,
        }
    }

    /// Open (or reopen) the conversation with `recipient_id`
    pub async fn start_conversation(
        &self,
        user: &User,
        recipient_id: i64,
    ) -> Result<ConversationSummary, ChatServiceError> {
        if recipient_id == user.id {
            return Err(ChatServiceError::ValidationError(
                "Cannot start a conversation with yourself".to_string(),
            ));
        }
        if self
            .user_repo
            .get_by_id(recipient_id)
            .await
            .context("Failed to get recipient")?
            .is_none()
        {
            return Err(ChatServiceError::NotFound(format!(
                "User {} not found",
                recipient_id
            )));
        }

        let conversation = self
            .chat_repo
            .get_or_create(user.id, recipient_id)
            .await
            .context("Failed to open conversation")?;

        let summaries = user_summaries(self.user_repo.as_ref(), &[recipient_id])
            .await
            .context("Failed to load recipient")?;
        self.summarize(conversation, user.id, &summaries).await
    }

    /// The caller's conversations, most recently active first
    pub async fn list_conversations(
        &self,
        user: &User,
        params: &ListParams,
    ) -> Result<PagedResult<ConversationSummary>, ChatServiceError> {
        let (conversations, total) = self
            .chat_repo
            .list_for_user(user.id, params)
            .await
            .context("Failed to list conversations")?;

        let others: Vec<i64> = conversations
            .iter()
            .map(|c| c.other_participant(user.id))
            .collect();
        let summaries = user_summaries(self.user_repo.as_ref(), &others)
            .await
            .context("Failed to load participants")?;

        let items = try_join_all(
            conversations
                .into_iter()
                .map(|c| self.summarize(c, user.id, &summaries)),
        )
        .await?;

        Ok(PagedResult::new(items, total, params))
    }

    /// Messages newest first
    pub async fn list_messages(
        &self,
        user: &User,
        conversation_id: i64,
        params: &ListParams,
    ) -> Result<PagedResult<Message>, ChatServiceError> {
        self.participant_conversation(user, conversation_id).await?;

        let (messages, total) = self
            .chat_repo
            .list_messages(conversation_id, params)
            .await
            .context("Failed to list messages")?;
        Ok(PagedResult::new(messages, total, params))
    }

    pub async fn send_message(
        &self,
        user: &User,
        conversation_id: i64,
        content: &str,
    ) -> Result<Message, ChatServiceError> {
        let conversation = self.participant_conversation(user, conversation_id).await?;

        if content.trim().is_empty() {
            return Err(ChatServiceError::ValidationError(
                "Message cannot be empty".to_string(),
            ));
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatServiceError::ValidationError(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let message = self
            .chat_repo
            .create_message(conversation_id, user.id, content)
            .await
            .context("Failed to send message")?;

        let recipient = conversation.other_participant(user.id);
        let text = format!("{}: {}", user.name(), preview(content));
        if let Err(e) = self
            .notifications
            .notify(
                recipient,
                NotificationType::Message,
                text,
                Some(format!("/conversations/{}", conversation_id)),
            )
            .await
        {
            tracing::warn!("Failed to notify user {} of new message: {}", recipient, e);
        }

        Ok(message)
    }

    /// Mark the other participant's messages read. Returns how many changed.
    pub async fn mark_read(&self, user: &User, conversation_id: i64) -> Result<u64, ChatServiceError> {
        self.participant_conversation(user, conversation_id).await?;

        let updated = self
            .chat_repo
            .mark_read(conversation_id, user.id)
            .await
            .context("Failed to mark messages read")?;
        Ok(updated)
    }

    /// Only the sender may delete a message
    pub async fn delete_message(&self, user: &User, message_id: i64) -> Result<(), ChatServiceError> {
        let message = self
            .chat_repo
            .get_message(message_id)
            .await
            .context("Failed to get message")?
            .ok_or_else(|| message_not_found(message_id))?;

        if message.sender_id != user.id {
            return Err(ChatServiceError::Forbidden(
                "Only the sender may delete this message".to_string(),
            ));
        }

        if !self
            .chat_repo
            .delete_message(message_id)
            .await
            .context("Failed to delete message")?
        {
            return Err(message_not_found(message_id));
        }
        Ok(())
    }

    pub async fn unread_count(&self, user: &User) -> Result<i64, ChatServiceError> {
        let count = self
            .chat_repo
            .unread_total(user.id)
            .await
            .context("Failed to count unread messages")?;
        Ok(count)
    }

    /// Load a conversation the caller takes part in.
    ///
    /// Someone else's conversation is `Forbidden`; a missing one is `NotFound`.
    async fn participant_conversation(
        &self,
        user: &User,
        conversation_id: i64,
    ) -> Result<Conversation, ChatServiceError> {
        let conversation = self
            .chat_repo
            .get(conversation_id)
            .await
            .context("Failed to get conversation")?
            .ok_or_else(|| {
                ChatServiceError::NotFound(format!("Conversation {} not found", conversation_id))
            })?;

        if !conversation.has_participant(user.id) {
            return Err(ChatServiceError::Forbidden(
                "You are not part of this conversation".to_string(),
            ));
        }
        Ok(conversation)
    }

    async fn summarize(
        &self,
        conversation: Conversation,
        user_id: i64,
        summaries: &HashMap<i64, crate::models::UserSummary>,
    ) -> Result<ConversationSummary, ChatServiceError> {
        let last_message = self
            .chat_repo
            .last_message(conversation.id)
            .await
            .context("Failed to get last message")?;
        let unread_count = self
            .chat_repo
            .unread_in_conversation(conversation.id, user_id)
            .await
            .context("Failed to count unread messages")?;

        Ok(ConversationSummary {
            id: conversation.id,
            other_user: summary_for(summaries, conversation.other_participant(user_id)),
            last_message,
            unread_count,
            updated_at: conversation.updated_at,
        })
    }
}

fn message_not_found(id: i64) -> ChatServiceError {
    ChatServiceError::NotFound(format!("Message {} not found", id))
}

fn preview(content: &str) -> String {
    let content = content.trim();
    if content.chars().count() <= PREVIEW_LENGTH {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(PREVIEW_LENGTH).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{SqlxChatRepository, SqlxNotificationRepository, SqlxUserRepository};
    use crate::db::test_support::{insert_user, setup_pool};

    struct Fixture {
        chat: ChatService,
        notifications: Arc<NotificationService>,
        alice: User,
        bob: User,
        carol: User,
    }

    async fn setup() -> Fixture {
        let pool = setup_pool().await;
        let users = SqlxUserRepository::new(pool.clone());
        let mut loaded = Vec::new();
        for name in ["alice", "bob", "carol"] {
            let id = insert_user(&pool, name).await;
            loaded.push(users.get_by_id(id).await.unwrap().unwrap());
        }
        let carol = loaded.pop().unwrap();
        let bob = loaded.pop().unwrap();
        let alice = loaded.pop().unwrap();

        let notifications = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
        ));
        let chat = ChatService::new(
            SqlxChatRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            notifications.clone(),
        );

        Fixture {
            chat,
            notifications,
            alice,
            bob,
            carol,
        }
    }

    #[tokio::test]
    async fn test_start_conversation_is_idempotent_per_pair() {
        let f = setup().await;

        let first = f.chat.start_conversation(&f.alice, f.bob.id).await.unwrap();
        let again = f.chat.start_conversation(&f.bob, f.alice.id).await.unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(first.other_user.username, "bob");
        assert_eq!(again.other_user.username, "alice");
        assert!(first.last_message.is_none());
    }

    #[tokio::test]
    async fn test_start_conversation_validation() {
        let f = setup().await;

        let with_self = f.chat.start_conversation(&f.alice, f.alice.id).await;
        assert!(matches!(with_self, Err(ChatServiceError::ValidationError(_))));

        let missing = f.chat.start_conversation(&f.alice, 9999).await;
        assert!(matches!(missing, Err(ChatServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_send_and_read_messages() {
        let f = setup().await;
        let conv = f.chat.start_conversation(&f.alice, f.bob.id).await.unwrap();

        f.chat.send_message(&f.alice, conv.id, "hi bob").await.unwrap();
        f.chat.send_message(&f.alice, conv.id, "are you there?").await.unwrap();
        f.chat.send_message(&f.bob, conv.id, "yes").await.unwrap();

        let page = f.chat.list_messages(&f.bob, conv.id, &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items[0].content, "yes");
        assert_eq!(page.items[2].content, "hi bob");

        assert_eq!(f.chat.unread_count(&f.bob).await.unwrap(), 2);
        assert_eq!(f.chat.unread_count(&f.alice).await.unwrap(), 1);

        let bob_feed = f.notifications.list(f.bob.id, false, &ListParams::default()).await.unwrap();
        assert_eq!(bob_feed.total, 2);
        assert_eq!(bob_feed.items[0].notification_type, NotificationType::Message);
        assert_eq!(
            bob_feed.items[0].link.as_deref(),
            Some(format!("/conversations/{}", conv.id).as_str())
        );

        assert_eq!(f.chat.mark_read(&f.bob, conv.id).await.unwrap(), 2);
        assert_eq!(f.chat.mark_read(&f.bob, conv.id).await.unwrap(), 0);
        assert_eq!(f.chat.unread_count(&f.bob).await.unwrap(), 0);
        assert_eq!(f.chat.unread_count(&f.alice).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_message_validation() {
        let f = setup().await;
        let conv = f.chat.start_conversation(&f.alice, f.bob.id).await.unwrap();

        let empty = f.chat.send_message(&f.alice, conv.id, "  \n").await;
        assert!(matches!(empty, Err(ChatServiceError::ValidationError(_))));

        let long = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        let too_long = f.chat.send_message(&f.alice, conv.id, &long).await;
        assert!(matches!(too_long, Err(ChatServiceError::ValidationError(_))));

        let max = "x".repeat(MAX_MESSAGE_LENGTH);
        assert!(f.chat.send_message(&f.alice, conv.id, &max).await.is_ok());
    }

    #[tokio::test]
    async fn test_outsiders_are_forbidden() {
        let f = setup().await;
        let conv = f.chat.start_conversation(&f.alice, f.bob.id).await.unwrap();

        let read = f.chat.list_messages(&f.carol, conv.id, &ListParams::default()).await;
        assert!(matches!(read, Err(ChatServiceError::Forbidden(_))));

        let send = f.chat.send_message(&f.carol, conv.id, "hello").await;
        assert!(matches!(send, Err(ChatServiceError::Forbidden(_))));

        let mark = f.chat.mark_read(&f.carol, conv.id).await;
        assert!(matches!(mark, Err(ChatServiceError::Forbidden(_))));

        let missing = f.chat.list_messages(&f.alice, 9999, &ListParams::default()).await;
        assert!(matches!(missing, Err(ChatServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_message_sender_only() {
        let f = setup().await;
        let conv = f.chat.start_conversation(&f.alice, f.bob.id).await.unwrap();
        let msg = f.chat.send_message(&f.alice, conv.id, "oops").await.unwrap();

        let by_bob = f.chat.delete_message(&f.bob, msg.id).await;
        assert!(matches!(by_bob, Err(ChatServiceError::Forbidden(_))));

        f.chat.delete_message(&f.alice, msg.id).await.unwrap();
        let again = f.chat.delete_message(&f.alice, msg.id).await;
        assert!(matches!(again, Err(ChatServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_conversations_summaries() {
        let f = setup().await;
        let with_bob = f.chat.start_conversation(&f.alice, f.bob.id).await.unwrap();
        let with_carol = f.chat.start_conversation(&f.alice, f.carol.id).await.unwrap();

        f.chat.send_message(&f.bob, with_bob.id, "first").await.unwrap();
        f.chat.send_message(&f.bob, with_bob.id, "second").await.unwrap();

        let page = f.chat.list_conversations(&f.alice, &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 2);

        let bob_entry = page.items.iter().find(|c| c.id == with_bob.id).unwrap();
        assert_eq!(bob_entry.other_user.username, "bob");
        assert_eq!(bob_entry.unread_count, 2);
        assert_eq!(bob_entry.last_message.as_ref().unwrap().content, "second");

        let carol_entry = page.items.iter().find(|c| c.id == with_carol.id).unwrap();
        assert_eq!(carol_entry.unread_count, 0);
        assert!(carol_entry.last_message.is_none());

        let carol_page = f.chat.list_conversations(&f.carol, &ListParams::default()).await.unwrap();
        assert_eq!(carol_page.total, 1);
        assert_eq!(carol_page.items[0].other_user.username, "alice");
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("  short  "), "short");
        let long = "a".repeat(PREVIEW_LENGTH + 10);
        let cut = preview(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), PREVIEW_LENGTH + 3);
    }
}
