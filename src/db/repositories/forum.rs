//! Forum repository
//!
//! Posts, their tags, replies, and likes. Like counters on posts and
//! replies are denormalised and kept in step with `forum_likes` by
//! `like`/`unlike`; the `forum_likes` table itself is polymorphic and is
//! cleaned up explicitly when a post or reply is deleted.

use super::{like_pattern, placeholders};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    Attachment, ForumCategory, ForumPost, ForumReply, LikeTarget, ListParams, NewPost, PostFilter,
    PostPatch,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait ForumRepository: Send + Sync {
    async fn create_post(&self, post: &NewPost) -> Result<ForumPost>;

    async fn get_post(&self, id: i64) -> Result<Option<ForumPost>>;

    /// Apply a patch; tags are replaced when `patch.tags` is set
    async fn update_post(&self, id: i64, patch: &PostPatch) -> Result<ForumPost>;

    /// Delete a post, its replies, its tags, and every like on any of them
    async fn delete_post(&self, id: i64) -> Result<bool>;

    async fn set_pinned(&self, id: i64, pinned: bool) -> Result<bool>;

    /// Pinned first, then newest first
    async fn list_posts(
        &self,
        course_id: i64,
        filter: &PostFilter,
        params: &ListParams,
    ) -> Result<(Vec<ForumPost>, i64)>;

    /// Tags per post id, alphabetical
    async fn tags_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, Vec<String>>>;

    /// Insert a reply and bump the post's reply counter
    async fn create_reply(&self, post_id: i64, author_id: i64, content: &str) -> Result<ForumReply>;

    async fn get_reply(&self, id: i64) -> Result<Option<ForumReply>>;

    async fn update_reply(&self, id: i64, content: &str) -> Result<ForumReply>;

    /// Delete a reply and its likes, decrementing the post's reply counter
    async fn delete_reply(&self, id: i64) -> Result<bool>;

    /// Replies to a post, oldest first
    async fn list_replies(&self, post_id: i64) -> Result<Vec<ForumReply>>;

    /// Returns false if the like already existed
    async fn like(&self, target: LikeTarget, target_id: i64, user_id: i64) -> Result<bool>;

    /// Returns false if there was no like to remove
    async fn unlike(&self, target: LikeTarget, target_id: i64, user_id: i64) -> Result<bool>;

    /// Current denormalised like counter
    async fn like_count(&self, target: LikeTarget, target_id: i64) -> Result<i64>;

    /// User ids that liked each target, in like order
    async fn likers(&self, target: LikeTarget, target_ids: &[i64]) -> Result<HashMap<i64, Vec<i64>>>;

    /// The subset of `target_ids` that `user_id` has liked
    async fn liked_by(&self, target: LikeTarget, target_ids: &[i64], user_id: i64) -> Result<HashSet<i64>>;
}

pub struct SqlxForumRepository {
    pool: DynDatabasePool,
}

impl SqlxForumRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ForumRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ForumRepository for SqlxForumRepository {
    async fn create_post(&self, post: &NewPost) -> Result<ForumPost> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn get_post(&self, id: i64) -> Result<Option<ForumPost>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_post_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn update_post(&self, id: i64, patch: &PostPatch) -> Result<ForumPost> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.sqlite()?, id, patch).await,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.mysql()?, id, patch).await,
        }
    }

    async fn delete_post(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_post_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_post_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn set_pinned(&self, id: i64, pinned: bool) -> Result<bool> {
        let sql = "UPDATE forum_posts SET is_pinned = ?, updated_at = ? WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(pinned)
                .bind(Utc::now())
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to set pinned")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(pinned)
                .bind(Utc::now())
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to set pinned")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_posts(
        &self,
        course_id: i64,
        filter: &PostFilter,
        params: &ListParams,
    ) -> Result<(Vec<ForumPost>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_posts_sqlite(self.pool.sqlite()?, course_id, filter, params).await
            }
            DatabaseDriver::Mysql => {
                list_posts_mysql(self.pool.mysql()?, course_id, filter, params).await
            }
        }
    }

    async fn tags_for_posts(&self, post_ids: &[i64]) -> Result<HashMap<i64, Vec<String>>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT post_id, tag FROM forum_post_tags WHERE post_id IN ({}) ORDER BY tag",
            placeholders(post_ids.len())
        );
        let pairs: Vec<(i64, String)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query_as(&sql);
                for id in post_ids {
                    query = query.bind(id);
                }
                query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to get post tags")?
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query_as(&sql);
                for id in post_ids {
                    query = query.bind(id);
                }
                query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to get post tags")?
            }
        };

        let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
        for (post_id, tag) in pairs {
            tags.entry(post_id).or_default().push(tag);
        }
        Ok(tags)
    }

    async fn create_reply(&self, post_id: i64, author_id: i64, content: &str) -> Result<ForumReply> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_reply_sqlite(self.pool.sqlite()?, post_id, author_id, content).await
            }
            DatabaseDriver::Mysql => {
                create_reply_mysql(self.pool.mysql()?, post_id, author_id, content).await
            }
        }
    }

    async fn get_reply(&self, id: i64) -> Result<Option<ForumReply>> {
        let sql = format!("SELECT {} FROM forum_replies WHERE id = ?", REPLY_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get reply")?
                .as_ref()
                .map(row_to_reply_sqlite)),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get reply")?
                .as_ref()
                .map(row_to_reply_mysql)),
        }
    }

    async fn update_reply(&self, id: i64, content: &str) -> Result<ForumReply> {
        let sql = "UPDATE forum_replies SET content = ?, updated_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(content)
                    .bind(Utc::now())
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update reply")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(content)
                    .bind(Utc::now())
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update reply")?;
            }
        }
        self.get_reply(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Reply not found after update"))
    }

    async fn delete_reply(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_reply_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_reply_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_replies(&self, post_id: i64) -> Result<Vec<ForumReply>> {
        let sql = format!(
            "SELECT {} FROM forum_replies WHERE post_id = ? ORDER BY created_at ASC, id ASC",
            REPLY_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => Ok(sqlx::query(&sql)
                .bind(post_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list replies")?
                .iter()
                .map(row_to_reply_sqlite)
                .collect()),
            DatabaseDriver::Mysql => Ok(sqlx::query(&sql)
                .bind(post_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list replies")?
                .iter()
                .map(row_to_reply_mysql)
                .collect()),
        }
    }

    async fn like(&self, target: LikeTarget, target_id: i64, user_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => like_sqlite(self.pool.sqlite()?, target, target_id, user_id).await,
            DatabaseDriver::Mysql => like_mysql(self.pool.mysql()?, target, target_id, user_id).await,
        }
    }

    async fn unlike(&self, target: LikeTarget, target_id: i64, user_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => unlike_sqlite(self.pool.sqlite()?, target, target_id, user_id).await,
            DatabaseDriver::Mysql => unlike_mysql(self.pool.mysql()?, target, target_id, user_id).await,
        }
    }

    async fn like_count(&self, target: LikeTarget, target_id: i64) -> Result<i64> {
        let sql = format!("SELECT like_count FROM {} WHERE id = ?", counter_table(target));
        let count: Option<i64> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(&sql)
                .bind(target_id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get like count")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(&sql)
                .bind(target_id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get like count")?,
        };
        Ok(count.unwrap_or(0))
    }

    async fn likers(&self, target: LikeTarget, target_ids: &[i64]) -> Result<HashMap<i64, Vec<i64>>> {
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT target_id, user_id FROM forum_likes WHERE target_type = ? AND target_id IN ({}) ORDER BY created_at ASC, id ASC",
            placeholders(target_ids.len())
        );
        let pairs: Vec<(i64, i64)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query_as(&sql).bind(target.to_string());
                for id in target_ids {
                    query = query.bind(id);
                }
                query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list likes")?
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query_as(&sql).bind(target.to_string());
                for id in target_ids {
                    query = query.bind(id);
                }
                query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list likes")?
            }
        };

        let mut likers: HashMap<i64, Vec<i64>> = HashMap::new();
        for (target_id, user_id) in pairs {
            likers.entry(target_id).or_default().push(user_id);
        }
        Ok(likers)
    }

    async fn liked_by(&self, target: LikeTarget, target_ids: &[i64], user_id: i64) -> Result<HashSet<i64>> {
        if target_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let sql = format!(
            "SELECT target_id FROM forum_likes WHERE target_type = ? AND user_id = ? AND target_id IN ({})",
            placeholders(target_ids.len())
        );
        let ids: Vec<i64> = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query_scalar(&sql).bind(target.to_string()).bind(user_id);
                for id in target_ids {
                    query = query.bind(id);
                }
                query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list liked targets")?
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query_scalar(&sql).bind(target.to_string()).bind(user_id);
                for id in target_ids {
                    query = query.bind(id);
                }
                query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list liked targets")?
            }
        };
        Ok(ids.into_iter().collect())
    }
}

const POST_COLUMNS: &str = "id, course_id, author_id, title, content, category, attachments, \
    is_pinned, is_announcement, like_count, reply_count, created_at, updated_at";

const REPLY_COLUMNS: &str = "id, post_id, author_id, content, like_count, created_at, updated_at";

const INSERT_POST: &str = r#"
    INSERT INTO forum_posts
        (course_id, author_id, title, content, category, attachments, is_pinned, is_announcement,
         like_count, reply_count, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
"#;

const UPDATE_POST: &str = r#"
    UPDATE forum_posts SET title = ?, content = ?, category = ?, attachments = ?, updated_at = ?
    WHERE id = ?
"#;

const POST_ORDER: &str = "ORDER BY is_pinned DESC, created_at DESC, id DESC";

/// Likes on the replies of a post, then on the post itself
const DELETE_POST_LIKES: [&str; 2] = [
    "DELETE FROM forum_likes WHERE target_type = 'reply' AND target_id IN (SELECT id FROM forum_replies WHERE post_id = ?)",
    "DELETE FROM forum_likes WHERE target_type = 'post' AND target_id = ?",
];

fn counter_table(target: LikeTarget) -> &'static str {
    match target {
        LikeTarget::Post => "forum_posts",
        LikeTarget::Reply => "forum_replies",
    }
}

/// A value bound into a dynamically assembled WHERE clause
enum FilterValue {
    Int(i64),
    Text(String),
}

/// WHERE clause and bind values for a post listing
fn post_filter_clause(course_id: i64, filter: &PostFilter) -> (String, Vec<FilterValue>) {
    let mut clause = String::from("course_id = ?");
    let mut values = vec![FilterValue::Int(course_id)];

    if let Some(category) = filter.category {
        clause.push_str(" AND category = ?");
        values.push(FilterValue::Text(category.to_string()));
    }
    if let Some(author_id) = filter.author_id {
        clause.push_str(" AND author_id = ?");
        values.push(FilterValue::Int(author_id));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search.trim());
        clause.push_str(" AND (title LIKE ? ESCAPE '!' OR content LIKE ? ESCAPE '!')");
        values.push(FilterValue::Text(pattern.clone()));
        values.push(FilterValue::Text(pattern));
    }
    if let Some(tag) = filter.tag.as_deref().filter(|t| !t.trim().is_empty()) {
        clause.push_str(" AND id IN (SELECT post_id FROM forum_post_tags WHERE tag = ?)");
        values.push(FilterValue::Text(tag.trim().to_lowercase()));
    }

    (clause, values)
}

fn parse_attachments(raw: &str) -> Vec<Attachment> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn encode_attachments(attachments: &[Attachment]) -> Result<String> {
    serde_json::to_string(attachments).context("Failed to encode attachments")
}

/// Merge a patch into the stored post
fn apply_patch(mut post: ForumPost, patch: &PostPatch) -> ForumPost {
    if let Some(title) = &patch.title {
        post.title = title.clone();
    }
    if let Some(content) = &patch.content {
        post.content = content.clone();
    }
    if let Some(category) = patch.category {
        post.category = category;
    }
    if let Some(attachments) = &patch.attachments {
        post.attachments = attachments.clone();
    }
    post
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &NewPost) -> Result<ForumPost> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_POST)
        .bind(post.course_id)
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.category.to_string())
        .bind(encode_attachments(&post.attachments)?)
        .bind(post.is_pinned)
        .bind(post.is_announcement)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create post")?;

    let id = result.last_insert_rowid();
    replace_tags_sqlite(pool, id, &post.tags).await?;

    get_post_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after insert"))
}

async fn get_post_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<ForumPost>> {
    let sql = format!("SELECT {} FROM forum_posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;

    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn update_post_sqlite(pool: &SqlitePool, id: i64, patch: &PostPatch) -> Result<ForumPost> {
    let current = get_post_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post {} not found", id))?;
    let post = apply_patch(current, patch);

    sqlx::query(UPDATE_POST)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.category.to_string())
        .bind(encode_attachments(&post.attachments)?)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update post")?;

    if let Some(tags) = &patch.tags {
        replace_tags_sqlite(pool, id, tags).await?;
    }

    get_post_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

async fn replace_tags_sqlite(pool: &SqlitePool, post_id: i64, tags: &[String]) -> Result<()> {
    sqlx::query("DELETE FROM forum_post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(pool)
        .await
        .context("Failed to clear post tags")?;

    for tag in tags {
        sqlx::query("INSERT OR IGNORE INTO forum_post_tags (post_id, tag) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag)
            .execute(pool)
            .await
            .context("Failed to add post tag")?;
    }
    Ok(())
}

async fn delete_post_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    for sql in DELETE_POST_LIKES {
        sqlx::query(sql)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete post likes")?;
    }
    let result = sqlx::query("DELETE FROM forum_posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;

    Ok(result.rows_affected() > 0)
}

async fn list_posts_sqlite(
    pool: &SqlitePool,
    course_id: i64,
    filter: &PostFilter,
    params: &ListParams,
) -> Result<(Vec<ForumPost>, i64)> {
    let (clause, values) = post_filter_clause(course_id, filter);

    let sql = format!(
        "SELECT {} FROM forum_posts WHERE {} {} LIMIT ? OFFSET ?",
        POST_COLUMNS, clause, POST_ORDER
    );
    let mut query = sqlx::query(&sql);
    for value in &values {
        query = match value {
            FilterValue::Int(v) => query.bind(*v),
            FilterValue::Text(v) => query.bind(v.clone()),
        };
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let count_sql = format!("SELECT COUNT(*) FROM forum_posts WHERE {}", clause);
    let mut count_query = sqlx::query_scalar(&count_sql);
    for value in &values {
        count_query = match value {
            FilterValue::Int(v) => count_query.bind(*v),
            FilterValue::Text(v) => count_query.bind(v.clone()),
        };
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    let posts = rows.iter().map(row_to_post_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((posts, total))
}

async fn create_reply_sqlite(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
    content: &str,
) -> Result<ForumReply> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO forum_replies (post_id, author_id, content, like_count, created_at, updated_at) VALUES (?, ?, ?, 0, ?, ?)",
    )
    .bind(post_id)
    .bind(author_id)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create reply")?;

    sqlx::query("UPDATE forum_posts SET reply_count = reply_count + 1 WHERE id = ?")
        .bind(post_id)
        .execute(pool)
        .await
        .context("Failed to bump reply count")?;

    Ok(ForumReply {
        id: result.last_insert_rowid(),
        post_id,
        author_id,
        content: content.to_string(),
        like_count: 0,
        created_at: now,
        updated_at: now,
    })
}

async fn delete_reply_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let post_id: Option<i64> = sqlx::query_scalar("SELECT post_id FROM forum_replies WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to look up reply")?;
    let Some(post_id) = post_id else {
        return Ok(false);
    };

    sqlx::query("DELETE FROM forum_likes WHERE target_type = 'reply' AND target_id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete reply likes")?;
    let result = sqlx::query("DELETE FROM forum_replies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete reply")?;

    if result.rows_affected() > 0 {
        sqlx::query("UPDATE forum_posts SET reply_count = MAX(0, reply_count - 1) WHERE id = ?")
            .bind(post_id)
            .execute(pool)
            .await
            .context("Failed to decrement reply count")?;
        return Ok(true);
    }
    Ok(false)
}

async fn like_sqlite(pool: &SqlitePool, target: LikeTarget, target_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO forum_likes (target_type, target_id, user_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(target.to_string())
    .bind(target_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to add like")?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    let sql = format!("UPDATE {} SET like_count = like_count + 1 WHERE id = ?", counter_table(target));
    sqlx::query(&sql)
        .bind(target_id)
        .execute(pool)
        .await
        .context("Failed to bump like count")?;
    Ok(true)
}

async fn unlike_sqlite(pool: &SqlitePool, target: LikeTarget, target_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM forum_likes WHERE target_type = ? AND target_id = ? AND user_id = ?")
        .bind(target.to_string())
        .bind(target_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to remove like")?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    let sql = format!(
        "UPDATE {} SET like_count = MAX(0, like_count - 1) WHERE id = ?",
        counter_table(target)
    );
    sqlx::query(&sql)
        .bind(target_id)
        .execute(pool)
        .await
        .context("Failed to decrement like count")?;
    Ok(true)
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ForumPost> {
    let category: String = row.get("category");
    let attachments: String = row.get("attachments");

    Ok(ForumPost {
        id: row.get("id"),
        course_id: row.get("course_id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        content: row.get("content"),
        category: ForumCategory::from_str(&category)
            .with_context(|| format!("Invalid category in database: {}", category))?,
        attachments: parse_attachments(&attachments),
        is_pinned: row.get("is_pinned"),
        is_announcement: row.get("is_announcement"),
        like_count: row.get("like_count"),
        reply_count: row.get("reply_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_reply_sqlite(row: &sqlx::sqlite::SqliteRow) -> ForumReply {
    ForumReply {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        content: row.get("content"),
        like_count: row.get("like_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &NewPost) -> Result<ForumPost> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_POST)
        .bind(post.course_id)
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.category.to_string())
        .bind(encode_attachments(&post.attachments)?)
        .bind(post.is_pinned)
        .bind(post.is_announcement)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create post")?;

    let id = result.last_insert_id() as i64;
    replace_tags_mysql(pool, id, &post.tags).await?;

    get_post_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after insert"))
}

async fn get_post_mysql(pool: &MySqlPool, id: i64) -> Result<Option<ForumPost>> {
    let sql = format!("SELECT {} FROM forum_posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;

    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn update_post_mysql(pool: &MySqlPool, id: i64, patch: &PostPatch) -> Result<ForumPost> {
    let current = get_post_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post {} not found", id))?;
    let post = apply_patch(current, patch);

    sqlx::query(UPDATE_POST)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.category.to_string())
        .bind(encode_attachments(&post.attachments)?)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update post")?;

    if let Some(tags) = &patch.tags {
        replace_tags_mysql(pool, id, tags).await?;
    }

    get_post_mysql(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

async fn replace_tags_mysql(pool: &MySqlPool, post_id: i64, tags: &[String]) -> Result<()> {
    sqlx::query("DELETE FROM forum_post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(pool)
        .await
        .context("Failed to clear post tags")?;

    for tag in tags {
        sqlx::query("INSERT IGNORE INTO forum_post_tags (post_id, tag) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag)
            .execute(pool)
            .await
            .context("Failed to add post tag")?;
    }
    Ok(())
}

async fn delete_post_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    for sql in DELETE_POST_LIKES {
        sqlx::query(sql)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete post likes")?;
    }
    let result = sqlx::query("DELETE FROM forum_posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;

    Ok(result.rows_affected() > 0)
}

async fn list_posts_mysql(
    pool: &MySqlPool,
    course_id: i64,
    filter: &PostFilter,
    params: &ListParams,
) -> Result<(Vec<ForumPost>, i64)> {
    let (clause, values) = post_filter_clause(course_id, filter);

    let sql = format!(
        "SELECT {} FROM forum_posts WHERE {} {} LIMIT ? OFFSET ?",
        POST_COLUMNS, clause, POST_ORDER
    );
    let mut query = sqlx::query(&sql);
    for value in &values {
        query = match value {
            FilterValue::Int(v) => query.bind(*v),
            FilterValue::Text(v) => query.bind(v.clone()),
        };
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let count_sql = format!("SELECT COUNT(*) FROM forum_posts WHERE {}", clause);
    let mut count_query = sqlx::query_scalar(&count_sql);
    for value in &values {
        count_query = match value {
            FilterValue::Int(v) => count_query.bind(*v),
            FilterValue::Text(v) => count_query.bind(v.clone()),
        };
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    let posts = rows.iter().map(row_to_post_mysql).collect::<Result<Vec<_>>>()?;
    Ok((posts, total))
}

async fn create_reply_mysql(
    pool: &MySqlPool,
    post_id: i64,
    author_id: i64,
    content: &str,
) -> Result<ForumReply> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO forum_replies (post_id, author_id, content, like_count, created_at, updated_at) VALUES (?, ?, ?, 0, ?, ?)",
    )
    .bind(post_id)
    .bind(author_id)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create reply")?;

    sqlx::query("UPDATE forum_posts SET reply_count = reply_count + 1 WHERE id = ?")
        .bind(post_id)
        .execute(pool)
        .await
        .context("Failed to bump reply count")?;

    Ok(ForumReply {
        id: result.last_insert_id() as i64,
        post_id,
        author_id,
        content: content.to_string(),
        like_count: 0,
        created_at: now,
        updated_at: now,
    })
}

async fn delete_reply_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let post_id: Option<i64> = sqlx::query_scalar("SELECT post_id FROM forum_replies WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to look up reply")?;
    let Some(post_id) = post_id else {
        return Ok(false);
    };

    sqlx::query("DELETE FROM forum_likes WHERE target_type = 'reply' AND target_id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete reply likes")?;
    let result = sqlx::query("DELETE FROM forum_replies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete reply")?;

    if result.rows_affected() > 0 {
        sqlx::query("UPDATE forum_posts SET reply_count = GREATEST(0, reply_count - 1) WHERE id = ?")
            .bind(post_id)
            .execute(pool)
            .await
            .context("Failed to decrement reply count")?;
        return Ok(true);
    }
    Ok(false)
}

async fn like_mysql(pool: &MySqlPool, target: LikeTarget, target_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "INSERT IGNORE INTO forum_likes (target_type, target_id, user_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(target.to_string())
    .bind(target_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to add like")?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    let sql = format!("UPDATE {} SET like_count = like_count + 1 WHERE id = ?", counter_table(target));
    sqlx::query(&sql)
        .bind(target_id)
        .execute(pool)
        .await
        .context("Failed to bump like count")?;
    Ok(true)
}

async fn unlike_mysql(pool: &MySqlPool, target: LikeTarget, target_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM forum_likes WHERE target_type = ? AND target_id = ? AND user_id = ?")
        .bind(target.to_string())
        .bind(target_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to remove like")?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    let sql = format!(
        "UPDATE {} SET like_count = GREATEST(0, like_count - 1) WHERE id = ?",
        counter_table(target)
    );
    sqlx::query(&sql)
        .bind(target_id)
        .execute(pool)
        .await
        .context("Failed to decrement like count")?;
    Ok(true)
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<ForumPost> {
    let category: String = row.get("category");
    let attachments: String = row.get("attachments");

    Ok(ForumPost {
        id: row.get("id"),
        course_id: row.get("course_id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        content: row.get("content"),
        category: ForumCategory::from_str(&category)
            .with_context(|| format!("Invalid category in database: {}", category))?,
        attachments: parse_attachments(&attachments),
        is_pinned: row.get("is_pinned"),
        is_announcement: row.get("is_announcement"),
        like_count: row.get("like_count"),
        reply_count: row.get("reply_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_reply_mysql(row: &sqlx::mysql::MySqlRow) -> ForumReply {
    ForumReply {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        content: row.get("content"),
        like_count: row.get("like_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
