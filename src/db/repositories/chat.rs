//! Direct messaging repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Conversation, ListParams, Message};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Existing conversation between two users, in either order
    async fn find_between(&self, a: i64, b: i64) -> Result<Option<Conversation>>;

    /// Get or create the conversation between two users
    async fn get_or_create(&self, a: i64, b: i64) -> Result<Conversation>;

    async fn get(&self, id: i64) -> Result<Option<Conversation>>;

    /// Conversations the user takes part in, most recently active first
    async fn list_for_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<Conversation>, i64)>;

    /// Store a message and bump the conversation's `updated_at`
    async fn create_message(&self, conversation_id: i64, sender_id: i64, content: &str) -> Result<Message>;

    async fn get_message(&self, id: i64) -> Result<Option<Message>>;

    async fn delete_message(&self, id: i64) -> Result<bool>;

    /// Messages newest first
    async fn list_messages(&self, conversation_id: i64, params: &ListParams) -> Result<(Vec<Message>, i64)>;

    async fn last_message(&self, conversation_id: i64) -> Result<Option<Message>>;

    /// Unread messages in one conversation addressed to `user_id`
    async fn unread_in_conversation(&self, conversation_id: i64, user_id: i64) -> Result<i64>;

    /// Mark messages from the other participant as read
    async fn mark_read(&self, conversation_id: i64, user_id: i64) -> Result<u64>;

    /// Unread messages addressed to `user_id` across all conversations
    async fn unread_total(&self, user_id: i64) -> Result<i64>;
}

pub struct SqlxChatRepository {
    pool: DynDatabasePool,
}

impl SqlxChatRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ChatRepository> {
        Arc::new(Self::new(pool))
    }
}

const CONVERSATION_COLUMNS: &str = "id, user_low_id, user_high_id, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, is_read, created_at";

const UNREAD_IN_CONVERSATION: &str =
    "SELECT COUNT(*) FROM messages WHERE conversation_id = ? AND sender_id <> ? AND is_read = ?";

const MARK_READ: &str =
    "UPDATE messages SET is_read = ? WHERE conversation_id = ? AND sender_id <> ? AND is_read = ?";

const UNREAD_TOTAL: &str = r#"
    SELECT COUNT(*) FROM messages m
    JOIN conversations c ON c.id = m.conversation_id
    WHERE (c.user_low_id = ? OR c.user_high_id = ?) AND m.sender_id <> ? AND m.is_read = ?
"#;

#[async_trait]
impl ChatRepository for SqlxChatRepository {
    async fn find_between(&self, a: i64, b: i64) -> Result<Option<Conversation>> {
        let (low, high) = Conversation::ordered_pair(a, b);
        let sql = format!(
            "SELECT {} FROM conversations WHERE user_low_id = ? AND user_high_id = ?",
            CONVERSATION_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(low)
                .bind(high)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to find conversation")?
                .as_ref()
                .map(row_to_conversation_sqlite)),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(low)
                .bind(high)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to find conversation")?
                .as_ref()
                .map(row_to_conversation_mysql)),
        }
    }

    async fn get_or_create(&self, a: i64, b: i64) -> Result<Conversation> {
        let (low, high) = Conversation::ordered_pair(a, b);
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    "INSERT OR IGNORE INTO conversations (user_low_id, user_high_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
                )
                .bind(low)
                .bind(high)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create conversation")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(
                    "INSERT IGNORE INTO conversations (user_low_id, user_high_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
                )
                .bind(low)
                .bind(high)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create conversation")?;
            }
        }

        self.find_between(low, high)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Conversation not found after insert"))
    }

    async fn get(&self, id: i64) -> Result<Option<Conversation>> {
        let sql = format!("SELECT {} FROM conversations WHERE id = ?", CONVERSATION_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get conversation")?
                .as_ref()
                .map(row_to_conversation_sqlite)),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get conversation")?
                .as_ref()
                .map(row_to_conversation_mysql)),
        }
    }

    async fn list_for_user(&self, user_id: i64, params: &ListParams) -> Result<(Vec<Conversation>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_conversations_sqlite(self.pool.sqlite()?, user_id, params).await,
            DatabaseDriver::Mysql => list_conversations_mysql(self.pool.mysql()?, user_id, params).await,
        }
    }

    async fn create_message(&self, conversation_id: i64, sender_id: i64, content: &str) -> Result<Message> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_message_sqlite(self.pool.sqlite()?, conversation_id, sender_id, content).await
            }
            DatabaseDriver::Mysql => {
                create_message_mysql(self.pool.mysql()?, conversation_id, sender_id, content).await
            }
        }
    }

    async fn get_message(&self, id: i64) -> Result<Option<Message>> {
        let sql = format!("SELECT {} FROM messages WHERE id = ?", MESSAGE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get message")?
                .as_ref()
                .map(row_to_message_sqlite)),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get message")?
                .as_ref()
                .map(row_to_message_mysql)),
        }
    }

    async fn delete_message(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM messages WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete message")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete message")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_messages(&self, conversation_id: i64, params: &ListParams) -> Result<(Vec<Message>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_messages_sqlite(self.pool.sqlite()?, conversation_id, params).await
            }
            DatabaseDriver::Mysql => {
                list_messages_mysql(self.pool.mysql()?, conversation_id, params).await
            }
        }
    }

    async fn last_message(&self, conversation_id: i64) -> Result<Option<Message>> {
        let sql = format!(
            "SELECT {} FROM messages WHERE conversation_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
            MESSAGE_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(conversation_id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get last message")?
                .as_ref()
                .map(row_to_message_sqlite)),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(conversation_id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get last message")?
                .as_ref()
                .map(row_to_message_mysql)),
        }
    }

    async fn unread_in_conversation(&self, conversation_id: i64, user_id: i64) -> Result<i64> {
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(UNREAD_IN_CONVERSATION)
                .bind(conversation_id)
                .bind(user_id)
                .bind(false)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count unread messages")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(UNREAD_IN_CONVERSATION)
                .bind(conversation_id)
                .bind(user_id)
                .bind(false)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count unread messages")?,
        };
        Ok(count)
    }

    async fn mark_read(&self, conversation_id: i64, user_id: i64) -> Result<u64> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(MARK_READ)
                .bind(true)
                .bind(conversation_id)
                .bind(user_id)
                .bind(false)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to mark messages read")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(MARK_READ)
                .bind(true)
                .bind(conversation_id)
                .bind(user_id)
                .bind(false)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to mark messages read")?
                .rows_affected(),
        };
        Ok(affected)
    }

    async fn unread_total(&self, user_id: i64) -> Result<i64> {
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(UNREAD_TOTAL)
                .bind(user_id)
                .bind(user_id)
                .bind(user_id)
                .bind(false)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count unread messages")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(UNREAD_TOTAL)
                .bind(user_id)
                .bind(user_id)
                .bind(user_id)
                .bind(false)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count unread messages")?,
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_conversations_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    params: &ListParams,
) -> Result<(Vec<Conversation>, i64)> {
    let sql = format!(
        "SELECT {} FROM conversations WHERE user_low_id = ? OR user_high_id = ? ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?",
        CONVERSATION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list conversations")?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM conversations WHERE user_low_id = ? OR user_high_id = ?",
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to count conversations")?;

    Ok((rows.iter().map(row_to_conversation_sqlite).collect(), total))
}

async fn create_message_sqlite(
    pool: &SqlitePool,
    conversation_id: i64,
    sender_id: i64,
    content: &str,
) -> Result<Message> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO messages (conversation_id, sender_id, content, is_read, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(conversation_id)
    .bind(sender_id)
    .bind(content)
    .bind(false)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create message")?;

    touch_conversation_sqlite(pool, conversation_id, now).await?;

    Ok(Message {
        id: result.last_insert_rowid(),
        conversation_id,
        sender_id,
        content: content.to_string(),
        is_read: false,
        created_at: now,
    })
}

async fn touch_conversation_sqlite(pool: &SqlitePool, id: i64, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to touch conversation")?;
    Ok(())
}

async fn list_messages_sqlite(
    pool: &SqlitePool,
    conversation_id: i64,
    params: &ListParams,
) -> Result<(Vec<Message>, i64)> {
    let sql = format!(
        "SELECT {} FROM messages WHERE conversation_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        MESSAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(conversation_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list messages")?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
        .bind(conversation_id)
        .fetch_one(pool)
        .await
        .context("Failed to count messages")?;

    Ok((rows.iter().map(row_to_message_sqlite).collect(), total))
}

fn row_to_conversation_sqlite(row: &sqlx::sqlite::SqliteRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        user_low_id: row.get("user_low_id"),
        user_high_id: row.get("user_high_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_message_sqlite(row: &sqlx::sqlite::SqliteRow) -> Message {
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_conversations_mysql(
    pool: &MySqlPool,
    user_id: i64,
    params: &ListParams,
) -> Result<(Vec<Conversation>, i64)> {
    let sql = format!(
        "SELECT {} FROM conversations WHERE user_low_id = ? OR user_high_id = ? ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?",
        CONVERSATION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list conversations")?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM conversations WHERE user_low_id = ? OR user_high_id = ?",
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to count conversations")?;

    Ok((rows.iter().map(row_to_conversation_mysql).collect(), total))
}

async fn create_message_mysql(
    pool: &MySqlPool,
    conversation_id: i64,
    sender_id: i64,
    content: &str,
) -> Result<Message> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO messages (conversation_id, sender_id, content, is_read, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(conversation_id)
    .bind(sender_id)
    .bind(content)
    .bind(false)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create message")?;

    touch_conversation_mysql(pool, conversation_id, now).await?;

    Ok(Message {
        id: result.last_insert_id() as i64,
        conversation_id,
        sender_id,
        content: content.to_string(),
        is_read: false,
        created_at: now,
    })
}

async fn touch_conversation_mysql(pool: &MySqlPool, id: i64, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to touch conversation")?;
    Ok(())
}

async fn list_messages_mysql(
    pool: &MySqlPool,
    conversation_id: i64,
    params: &ListParams,
) -> Result<(Vec<Message>, i64)> {
    let sql = format!(
        "SELECT {} FROM messages WHERE conversation_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        MESSAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(conversation_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list messages")?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
        .bind(conversation_id)
        .fetch_one(pool)
        .await
        .context("Failed to count messages")?;

    Ok((rows.iter().map(row_to_message_mysql).collect(), total))
}

fn row_to_conversation_mysql(row: &sqlx::mysql::MySqlRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        user_low_id: row.get("user_low_id"),
        user_high_id: row.get("user_high_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_message_mysql(row: &sqlx::mysql::MySqlRow) -> Message {
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_user, setup_pool};

    async fn setup() -> (SqlxChatRepository, i64, i64, i64) {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let carol = insert_user(&pool, "carol").await;
        (SqlxChatRepository::new(pool), alice, bob, carol)
    }

    #[tokio::test]
    async fn test_get_or_create_is_order_independent() {
        let (repo, alice, bob, _) = setup().await;

        let first = repo.get_or_create(bob, alice).await.expect("Failed to create conversation");
        let second = repo.get_or_create(alice, bob).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.user_low_id, alice.min(bob));
        assert!(repo.find_between(alice, bob).await.unwrap().is_some());
        assert!(repo.get(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_messages_and_unread_counts() {
        let (repo, alice, bob, carol) = setup().await;
        let ab = repo.get_or_create(alice, bob).await.unwrap();
        let ac = repo.get_or_create(alice, carol).await.unwrap();

        repo.create_message(ab.id, bob, "hi").await.unwrap();
        repo.create_message(ab.id, bob, "are you there?").await.unwrap();
        repo.create_message(ab.id, alice, "yes").await.unwrap();
        repo.create_message(ac.id, carol, "hello").await.unwrap();

        assert_eq!(repo.unread_in_conversation(ab.id, alice).await.unwrap(), 2);
        assert_eq!(repo.unread_in_conversation(ab.id, bob).await.unwrap(), 1);
        assert_eq!(repo.unread_total(alice).await.unwrap(), 3);

        let (messages, total) = repo.list_messages(ab.id, &ListParams::default()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(messages[0].content, "yes");

        let last = repo.last_message(ab.id).await.unwrap().expect("last message");
        assert_eq!(last.content, "yes");

        assert_eq!(repo.mark_read(ab.id, alice).await.unwrap(), 2);
        assert_eq!(repo.mark_read(ab.id, alice).await.unwrap(), 0);
        assert_eq!(repo.unread_total(alice).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_for_user_orders_by_activity() {
        let (repo, alice, bob, carol) = setup().await;
        let ab = repo.get_or_create(alice, bob).await.unwrap();
        let ac = repo.get_or_create(alice, carol).await.unwrap();

        repo.create_message(ab.id, bob, "latest").await.unwrap();

        let (conversations, total) = repo.list_for_user(alice, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(conversations[0].id, ab.id);
        assert_eq!(conversations[1].id, ac.id);

        let (for_carol, _) = repo.list_for_user(carol, &ListParams::default()).await.unwrap();
        assert_eq!(for_carol.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_message() {
        let (repo, alice, bob, _) = setup().await;
        let ab = repo.get_or_create(alice, bob).await.unwrap();
        let message = repo.create_message(ab.id, alice, "oops").await.unwrap();

        assert!(repo.get_message(message.id).await.unwrap().is_some());
        assert!(repo.delete_message(message.id).await.unwrap());
        assert!(!repo.delete_message(message.id).await.unwrap());
        assert!(repo.get_message(message.id).await.unwrap().is_none());
    }
}
