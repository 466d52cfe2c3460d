//! Forum service
//!
//! Posts, announcements, replies, likes and pins inside a course.
//!
//! Only course members and admins may read or write a course's forum. A
//! "moderator" is a member enrolled as instructor, or a global admin:
//! - editing a post or reply is reserved to its author
//! - deleting is allowed to the author or a moderator
//! - pinning and announcements are moderator-only
//!
//! Notifications go out after the write has committed and are best-effort.

use crate::config::ForumConfig;
use crate::db::repositories::{ForumRepository, UserRepository};
use crate::models::{
    normalize_tags, Attachment, CreatePostInput, EnrollmentRole, ForumCategory, ForumPost,
    ForumReply, LikeTarget, LikeToggle, ListParams, NewPost, NotificationType, PagedResult,
    PostDetail, PostFilter, PostPatch, PostView, ReplyView, UpdatePostInput, User,
    MAX_TITLE_LENGTH,
};
use crate::services::course::{CourseAccess, CourseService, CourseServiceError};
use crate::services::notification::NotificationService;
use crate::services::{summary_for, user_summaries};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ForumServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<CourseServiceError> for ForumServiceError {
    fn from(err: CourseServiceError) -> Self {
        match err {
            CourseServiceError::NotFound(msg) => Self::NotFound(msg),
            CourseServiceError::Forbidden(msg) => Self::Forbidden(msg),
            CourseServiceError::ValidationError(msg) | CourseServiceError::Conflict(msg) => {
                Self::ValidationError(msg)
            }
            CourseServiceError::InternalError(e) => Self::InternalError(e),
        }
    }
}

pub struct ForumService {
    forum_repo: Arc<dyn ForumRepository>,
    user_repo: Arc<dyn UserRepository>,
    courses: Arc<CourseService>,
    notifications: Arc<NotificationService>,
    limits: ForumConfig,
}

impl ForumService {
    pub fn new(
        forum_repo: Arc<dyn ForumRepository>,
        user_repo: Arc<dyn UserRepository>,
        courses: Arc<CourseService>,
        notifications: Arc<NotificationService>,
        limits: ForumConfig,
    ) -> Self {
        Self {
            forum_repo,
            user_repo,
            courses,
            notifications,
            limits,
        }
    }

    // ========================================================================
    // Posts
    // ========================================================================

    /// Pinned posts first, then newest first
    pub async fn list_posts(
        &self,
        user: &User,
        course_id: i64,
        filter: &PostFilter,
        params: &ListParams,
    ) -> Result<PagedResult<PostView>, ForumServiceError> {
        self.courses.access(user, course_id).await?;

        let mut filter = filter.clone();
        if let Some(tag) = filter.tag.take().filter(|t| !t.trim().is_empty()) {
            match normalize_tags(&[tag.as_str()]).into_iter().next() {
                Some(normalized) => filter.tag = Some(normalized),
                // no stored tag can match
                None => return Ok(PagedResult::new(Vec::new(), 0, params)),
            }
        }

        let (posts, total) = self
            .forum_repo
            .list_posts(course_id, &filter, params)
            .await
            .context("Failed to list posts")?;

        let views = self.post_views(posts, user.id).await?;
        Ok(PagedResult::new(views, total, params))
    }

    /// A post with its likes and every reply, oldest reply first
    pub async fn get_post(&self, user: &User, id: i64) -> Result<PostDetail, ForumServiceError> {
        let post = self.load_post(id).await?;
        self.courses.access(user, post.course_id).await?;

        let likes = self
            .forum_repo
            .likers(LikeTarget::Post, &[id])
            .await
            .context("Failed to load post likes")?
            .remove(&id)
            .unwrap_or_default();

        let replies = self
            .forum_repo
            .list_replies(id)
            .await
            .context("Failed to list replies")?;
        let replies = self.reply_views(replies, user.id).await?;

        let view = self.post_view(post, user.id).await?;
        Ok(PostDetail {
            post: view,
            likes,
            replies,
        })
    }

    /// Create a regular post and tell the course instructors about it
    pub async fn create_post(
        &self,
        user: &User,
        course_id: i64,
        input: CreatePostInput,
    ) -> Result<PostView, ForumServiceError> {
        let access = self.courses.access(user, course_id).await?;

        let category = input.category.unwrap_or_default();
        if category == ForumCategory::Announcement && !access.is_moderator() {
            return Err(ForumServiceError::Forbidden(
                "Only moderators can post in the announcement category".to_string(),
            ));
        }

        let new_post = NewPost {
            course_id,
            author_id: user.id,
            title: validate_title(&input.title)?,
            content: validate_content(&input.content)?,
            category,
            tags: self.prepare_tags(&input.tags)?,
            attachments: self.prepare_attachments(input.attachments)?,
            is_pinned: false,
            is_announcement: false,
        };

        let post = self
            .forum_repo
            .create_post(&new_post)
            .await
            .context("Failed to create post")?;

        let instructors = self.fan_out_targets(&access, Some(EnrollmentRole::Instructor), user.id).await;
        let message = format!(
            "{} posted \"{}\" in {}",
            user.name(),
            post.title,
            access.course.code
        );
        self.notifications
            .notify_many(&instructors, NotificationType::ForumPost, &message, Some(&post_link(post.id)))
            .await;

        self.post_view(post, user.id).await
    }

    /// Create a pinned announcement and tell every other member
    pub async fn create_announcement(
        &self,
        user: &User,
        course_id: i64,
        input: CreatePostInput,
    ) -> Result<PostView, ForumServiceError> {
        let access = self.courses.access(user, course_id).await?;
        if !access.is_moderator() {
            return Err(ForumServiceError::Forbidden(
                "Only moderators can make announcements".to_string(),
            ));
        }

        let new_post = NewPost {
            course_id,
            author_id: user.id,
            title: validate_title(&input.title)?,
            content: validate_content(&input.content)?,
            category: ForumCategory::Announcement,
            tags: self.prepare_tags(&input.tags)?,
            attachments: self.prepare_attachments(input.attachments)?,
            is_pinned: true,
            is_announcement: true,
        };

        let post = self
            .forum_repo
            .create_post(&new_post)
            .await
            .context("Failed to create announcement")?;

        let members = self.fan_out_targets(&access, None, user.id).await;
        let message = format!("New announcement in {}: {}", access.course.code, post.title);
        let delivered = self
            .notifications
            .notify_many(&members, NotificationType::Announcement, &message, Some(&post_link(post.id)))
            .await;
        tracing::info!(
            "Announcement {} in course {} sent to {} members",
            post.id,
            course_id,
            delivered
        );

        self.post_view(post, user.id).await
    }

    /// Only the author may edit. Tags and attachments are replaced when given.
    pub async fn update_post(
        &self,
        user: &User,
        id: i64,
        input: UpdatePostInput,
    ) -> Result<PostView, ForumServiceError> {
        let post = self.load_post(id).await?;
        let access = self.courses.access(user, post.course_id).await?;

        if post.author_id != user.id {
            return Err(ForumServiceError::Forbidden(
                "Only the author may edit this post".to_string(),
            ));
        }
        if input.category == Some(ForumCategory::Announcement)
            && post.category != ForumCategory::Announcement
            && !access.is_moderator()
        {
            return Err(ForumServiceError::Forbidden(
                "Only moderators can post in the announcement category".to_string(),
            ));
        }

        let patch = PostPatch {
            title: input.title.as_deref().map(validate_title).transpose()?,
            content: input.content.as_deref().map(validate_content).transpose()?,
            category: input.category,
            tags: input.tags.as_deref().map(|t| self.prepare_tags(t)).transpose()?,
            attachments: input
                .attachments
                .map(|a| self.prepare_attachments(a))
                .transpose()?,
        };

        let updated = self
            .forum_repo
            .update_post(id, &patch)
            .await
            .context("Failed to update post")?;

        self.post_view(updated, user.id).await
    }

    /// Author or moderator. Replies, tags and likes go with the post.
    pub async fn delete_post(&self, user: &User, id: i64) -> Result<(), ForumServiceError> {
        let post = self.load_post(id).await?;
        let access = self.courses.access(user, post.course_id).await?;

        if post.author_id != user.id && !access.is_moderator() {
            return Err(ForumServiceError::Forbidden(
                "Only the author or a moderator may delete this post".to_string(),
            ));
        }

        let deleted = self
            .forum_repo
            .delete_post(id)
            .await
            .context("Failed to delete post")?;
        if !deleted {
            return Err(post_not_found(id));
        }
        Ok(())
    }

    pub async fn toggle_post_like(&self, user: &User, id: i64) -> Result<LikeToggle, ForumServiceError> {
        let post = self.load_post(id).await?;
        self.courses.access(user, post.course_id).await?;

        let toggle = self.toggle_like(LikeTarget::Post, id, user.id).await?;
        if toggle.liked && post.author_id != user.id {
            self.notify_author(
                post.author_id,
                NotificationType::ForumLike,
                format!("{} liked your post \"{}\"", user.name(), post.title),
                post.id,
            )
            .await;
        }
        Ok(toggle)
    }

    pub async fn set_pinned(
        &self,
        user: &User,
        id: i64,
        pinned: bool,
    ) -> Result<PostView, ForumServiceError> {
        let post = self.load_post(id).await?;
        let access = self.courses.access(user, post.course_id).await?;
        if !access.is_moderator() {
            return Err(ForumServiceError::Forbidden(
                "Only moderators can pin posts".to_string(),
            ));
        }

        self.forum_repo
            .set_pinned(id, pinned)
            .await
            .context("Failed to pin post")?;

        let post = self.load_post(id).await?;
        self.post_view(post, user.id).await
    }

    // ========================================================================
    // Replies
    // ========================================================================

    pub async fn create_reply(
        &self,
        user: &User,
        post_id: i64,
        content: &str,
    ) -> Result<ReplyView, ForumServiceError> {
        let post = self.load_post(post_id).await?;
        self.courses.access(user, post.course_id).await?;
        let content = validate_content(content)?;

        let reply = self
            .forum_repo
            .create_reply(post_id, user.id, &content)
            .await
            .context("Failed to create reply")?;

        if post.author_id != user.id {
            self.notify_author(
                post.author_id,
                NotificationType::ForumReply,
                format!("{} replied to your post \"{}\"", user.name(), post.title),
                post.id,
            )
            .await;
        }

        self.reply_view(reply, user.id).await
    }

    /// Only the reply's author may edit it
    pub async fn update_reply(
        &self,
        user: &User,
        id: i64,
        content: &str,
    ) -> Result<ReplyView, ForumServiceError> {
        let (reply, _access) = self.load_reply_with_access(user, id).await?;
        if reply.author_id != user.id {
            return Err(ForumServiceError::Forbidden(
                "Only the author may edit this reply".to_string(),
            ));
        }
        let content = validate_content(content)?;

        let updated = self
            .forum_repo
            .update_reply(id, &content)
            .await
            .context("Failed to update reply")?;
        self.reply_view(updated, user.id).await
    }

    /// Author or moderator. The post's reply count never drops below zero.
    pub async fn delete_reply(&self, user: &User, id: i64) -> Result<(), ForumServiceError> {
        let (reply, access) = self.load_reply_with_access(user, id).await?;
        if reply.author_id != user.id && !access.is_moderator() {
            return Err(ForumServiceError::Forbidden(
                "Only the author or a moderator may delete this reply".to_string(),
            ));
        }

        let deleted = self
            .forum_repo
            .delete_reply(id)
            .await
            .context("Failed to delete reply")?;
        if !deleted {
            return Err(reply_not_found(id));
        }
        Ok(())
    }

    pub async fn toggle_reply_like(&self, user: &User, id: i64) -> Result<LikeToggle, ForumServiceError> {
        let (reply, _access) = self.load_reply_with_access(user, id).await?;

        let toggle = self.toggle_like(LikeTarget::Reply, id, user.id).await?;
        if toggle.liked && reply.author_id != user.id {
            self.notify_author(
                reply.author_id,
                NotificationType::ForumLike,
                format!("{} liked your reply", user.name()),
                reply.post_id,
            )
            .await;
        }
        Ok(toggle)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn load_post(&self, id: i64) -> Result<ForumPost, ForumServiceError> {
        self.forum_repo
            .get_post(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| post_not_found(id))
    }

    async fn load_reply_with_access(
        &self,
        user: &User,
        id: i64,
    ) -> Result<(ForumReply, CourseAccess), ForumServiceError> {
        let reply = self
            .forum_repo
            .get_reply(id)
            .await
            .context("Failed to get reply")?
            .ok_or_else(|| reply_not_found(id))?;
        let post = self.load_post(reply.post_id).await?;
        let access = self.courses.access(user, post.course_id).await?;
        Ok((reply, access))
    }

    /// Like if not yet liked, otherwise unlike
    async fn toggle_like(
        &self,
        target: LikeTarget,
        target_id: i64,
        user_id: i64,
    ) -> Result<LikeToggle, ForumServiceError> {
        let liked = self
            .forum_repo
            .like(target, target_id, user_id)
            .await
            .context("Failed to like")?;
        if !liked {
            self.forum_repo
                .unlike(target, target_id, user_id)
                .await
                .context("Failed to unlike")?;
        }

        let like_count = self
            .forum_repo
            .like_count(target, target_id)
            .await
            .context("Failed to count likes")?;
        Ok(LikeToggle { liked, like_count })
    }

    /// Course members to notify, minus the acting user. Lookup failures are
    /// logged and yield nobody.
    async fn fan_out_targets(
        &self,
        access: &CourseAccess,
        role: Option<EnrollmentRole>,
        actor_id: i64,
    ) -> Vec<i64> {
        match self.courses.member_ids(access.course.id, role).await {
            Ok(ids) => ids.into_iter().filter(|&id| id != actor_id).collect(),
            Err(e) => {
                tracing::warn!("Failed to load recipients for course {}: {}", access.course.id, e);
                Vec::new()
            }
        }
    }

    async fn notify_author(
        &self,
        author_id: i64,
        notification_type: NotificationType,
        message: String,
        post_id: i64,
    ) {
        if let Err(e) = self
            .notifications
            .notify(author_id, notification_type, message, Some(post_link(post_id)))
            .await
        {
            tracing::warn!("Failed to notify user {} ({}): {}", author_id, notification_type, e);
        }
    }

    fn prepare_tags(&self, tags: &[String]) -> Result<Vec<String>, ForumServiceError> {
        let tags = normalize_tags(tags);
        if tags.len() > self.limits.max_tags {
            return Err(ForumServiceError::ValidationError(format!(
                "At most {} tags are allowed",
                self.limits.max_tags
            )));
        }
        Ok(tags)
    }

    fn prepare_attachments(
        &self,
        attachments: Vec<Attachment>,
    ) -> Result<Vec<Attachment>, ForumServiceError> {
        if attachments.len() > self.limits.max_attachments {
            return Err(ForumServiceError::ValidationError(format!(
                "At most {} attachments are allowed",
                self.limits.max_attachments
            )));
        }
        if let Some(bad) = attachments.iter().find(|a| !a.is_valid()) {
            return Err(ForumServiceError::ValidationError(format!(
                "Attachment '{}' needs a name and an http(s) url",
                bad.name
            )));
        }
        Ok(attachments
            .into_iter()
            .map(|a| Attachment {
                name: a.name.trim().to_string(),
                url: a.url,
            })
            .collect())
    }

    async fn post_view(&self, post: ForumPost, viewer_id: i64) -> Result<PostView, ForumServiceError> {
        self.post_views(vec![post], viewer_id)
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Post view missing").into())
    }

    /// Attach authors, tags and the viewer's likes in three batched queries
    async fn post_views(
        &self,
        posts: Vec<ForumPost>,
        viewer_id: i64,
    ) -> Result<Vec<PostView>, ForumServiceError> {
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let author_ids: Vec<i64> = posts.iter().map(|p| p.author_id).collect();

        let authors = user_summaries(self.user_repo.as_ref(), &author_ids)
            .await
            .context("Failed to load post authors")?;
        let mut tags = self
            .forum_repo
            .tags_for_posts(&ids)
            .await
            .context("Failed to load post tags")?;
        let liked = self
            .forum_repo
            .liked_by(LikeTarget::Post, &ids, viewer_id)
            .await
            .context("Failed to load liked posts")?;

        Ok(posts
            .into_iter()
            .map(|p| PostView {
                id: p.id,
                course_id: p.course_id,
                author: summary_for(&authors, p.author_id),
                title: p.title,
                content: p.content,
                category: p.category,
                tags: tags.remove(&p.id).unwrap_or_default(),
                attachments: p.attachments,
                is_pinned: p.is_pinned,
                is_announcement: p.is_announcement,
                like_count: p.like_count,
                reply_count: p.reply_count,
                liked_by_me: liked.contains(&p.id),
                created_at: p.created_at,
                updated_at: p.updated_at,
            })
            .collect())
    }

    async fn reply_view(&self, reply: ForumReply, viewer_id: i64) -> Result<ReplyView, ForumServiceError> {
        self.reply_views(vec![reply], viewer_id)
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Reply view missing").into())
    }

    async fn reply_views(
        &self,
        replies: Vec<ForumReply>,
        viewer_id: i64,
    ) -> Result<Vec<ReplyView>, ForumServiceError> {
        let ids: Vec<i64> = replies.iter().map(|r| r.id).collect();
        let author_ids: Vec<i64> = replies.iter().map(|r| r.author_id).collect();

        let authors = user_summaries(self.user_repo.as_ref(), &author_ids)
            .await
            .context("Failed to load reply authors")?;
        let mut likers = self
            .forum_repo
            .likers(LikeTarget::Reply, &ids)
            .await
            .context("Failed to load reply likes")?;

        Ok(replies
            .into_iter()
            .map(|r| {
                let likes = likers.remove(&r.id).unwrap_or_default();
                ReplyView {
                    id: r.id,
                    post_id: r.post_id,
                    author: summary_for(&authors, r.author_id),
                    content: r.content,
                    like_count: r.like_count,
                    liked_by_me: likes.contains(&viewer_id),
                    likes,
                    created_at: r.created_at,
                    updated_at: r.updated_at,
                }
            })
            .collect())
    }
}

fn post_link(post_id: i64) -> String {
    format!("/posts/{}", post_id)
}

fn post_not_found(id: i64) -> ForumServiceError {
    ForumServiceError::NotFound(format!("Post {} not found", id))
}

fn reply_not_found(id: i64) -> ForumServiceError {
    ForumServiceError::NotFound(format!("Reply {} not found", id))
}

fn validate_title(title: &str) -> Result<String, ForumServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ForumServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ForumServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> Result<String, ForumServiceError> {
    if content.trim().is_empty() {
        return Err(ForumServiceError::ValidationError(
            "Content cannot be empty".to_string(),
        ));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxCourseRepository, SqlxForumRepository, SqlxNotificationRepository, SqlxUserRepository,
    };
    use crate::db::test_support::{enroll, insert_course, insert_user, insert_user_with_role, setup_pool};
    use crate::db::DynDatabasePool;

    struct Fixture {
        forum: ForumService,
        notifications: Arc<NotificationService>,
        course_id: i64,
        admin: User,
        prof: User,
        ta: User,
        alice: User,
        bob: User,
        outsider: User,
    }

    async fn load(pool: &DynDatabasePool, id: i64) -> User {
        SqlxUserRepository::new(pool.clone()).get_by_id(id).await.unwrap().unwrap()
    }

    async fn setup_with_limits(limits: ForumConfig) -> Fixture {
        let pool = setup_pool().await;
        let admin = insert_user_with_role(&pool, "root", "admin").await;
        let prof = insert_user_with_role(&pool, "prof", "instructor").await;
        let ta = insert_user(&pool, "ta").await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let outsider = insert_user(&pool, "outsider").await;

        let course_id = insert_course(&pool, "CS101", prof).await;
        enroll(&pool, course_id, ta, "instructor").await;
        enroll(&pool, course_id, alice, "student").await;
        enroll(&pool, course_id, bob, "student").await;

        let cache = Arc::new(MemoryCache::new());
        let notifications = Arc::new(NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let courses = Arc::new(CourseService::new(
            SqlxCourseRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            notifications.clone(),
            cache,
        ));
        let forum = ForumService::new(
            SqlxForumRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            courses,
            notifications.clone(),
            limits,
        );

        Fixture {
            forum,
            notifications,
            course_id,
            admin: load(&pool, admin).await,
            prof: load(&pool, prof).await,
            ta: load(&pool, ta).await,
            alice: load(&pool, alice).await,
            bob: load(&pool, bob).await,
            outsider: load(&pool, outsider).await,
        }
    }

    async fn setup() -> Fixture {
        setup_with_limits(ForumConfig::default()).await
    }

    fn post(title: &str) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            content: "How do lifetimes work?".to_string(),
            category: Some(ForumCategory::Question),
            tags: vec!["Rust".to_string(), " rust ".to_string(), "Week 1".to_string()],
            attachments: vec![Attachment {
                name: "notes".to_string(),
                url: "https://example.edu/notes.pdf".to_string(),
            }],
        }
    }

    async fn notification_count(f: &Fixture, user: &User, kind: NotificationType) -> usize {
        f.notifications
            .list(user.id, false, &ListParams::default())
            .await
            .unwrap()
            .items
            .iter()
            .filter(|n| n.notification_type == kind)
            .count()
    }

    // ========================================================================
    // Posts
    // ========================================================================

    #[tokio::test]
    async fn test_create_post_normalizes_and_notifies_instructors() {
        let f = setup().await;
        let view = f.forum.create_post(&f.alice, f.course_id, post("Lifetimes")).await.unwrap();

        assert_eq!(view.author.username, "alice");
        assert_eq!(view.tags, vec!["rust", "week 1"]);
        assert_eq!(view.attachments.len(), 1);
        assert!(!view.is_pinned);

        assert_eq!(notification_count(&f, &f.prof, NotificationType::ForumPost).await, 1);
        assert_eq!(notification_count(&f, &f.ta, NotificationType::ForumPost).await, 1);
        assert_eq!(notification_count(&f, &f.bob, NotificationType::ForumPost).await, 0);
        assert_eq!(notification_count(&f, &f.alice, NotificationType::ForumPost).await, 0);
    }

    #[tokio::test]
    async fn test_instructor_post_does_not_notify_self() {
        let f = setup().await;
        f.forum.create_post(&f.prof, f.course_id, post("Office hours")).await.unwrap();

        assert_eq!(notification_count(&f, &f.prof, NotificationType::ForumPost).await, 0);
        assert_eq!(notification_count(&f, &f.ta, NotificationType::ForumPost).await, 1);
    }

    #[tokio::test]
    async fn test_create_post_validation() {
        let f = setup_with_limits(ForumConfig {
            max_tags: 2,
            max_attachments: 1,
        })
        .await;

        let mut empty_title = post("  ");
        empty_title.title = "  ".to_string();
        let mut empty_content = post("ok");
        empty_content.content = "   ".to_string();
        let mut long_title = post("x");
        long_title.title = "x".repeat(MAX_TITLE_LENGTH + 1);
        let mut too_many_tags = post("tags");
        too_many_tags.tags = vec!["a".into(), "b".into(), "c".into()];
        let mut bad_attachment = post("attachment");
        bad_attachment.attachments = vec![Attachment {
            name: "x".into(),
            url: "javascript:alert(1)".into(),
        }];
        let mut too_many_attachments = post("attachments");
        too_many_attachments.attachments.push(too_many_attachments.attachments[0].clone());

        for input in [
            empty_title,
            empty_content,
            long_title,
            too_many_tags,
            bad_attachment,
            too_many_attachments,
        ] {
            let result = f.forum.create_post(&f.alice, f.course_id, input).await;
            assert!(matches!(result, Err(ForumServiceError::ValidationError(_))));
        }
    }

    #[tokio::test]
    async fn test_non_members_are_rejected() {
        let f = setup().await;

        let create = f.forum.create_post(&f.outsider, f.course_id, post("hi")).await;
        assert!(matches!(create, Err(ForumServiceError::Forbidden(_))));

        let list = f
            .forum
            .list_posts(&f.outsider, f.course_id, &PostFilter::default(), &ListParams::default())
            .await;
        assert!(matches!(list, Err(ForumServiceError::Forbidden(_))));

        let missing_course = f.forum.create_post(&f.alice, 9999, post("hi")).await;
        assert!(matches!(missing_course, Err(ForumServiceError::NotFound(_))));

        // admins read every course
        assert!(f
            .forum
            .list_posts(&f.admin, f.course_id, &PostFilter::default(), &ListParams::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_announcement_category_is_moderator_only() {
        let f = setup().await;
        let mut input = post("Exam");
        input.category = Some(ForumCategory::Announcement);

        let by_student = f.forum.create_post(&f.alice, f.course_id, input.clone()).await;
        assert!(matches!(by_student, Err(ForumServiceError::Forbidden(_))));

        let by_ta = f.forum.create_post(&f.ta, f.course_id, input).await.unwrap();
        assert_eq!(by_ta.category, ForumCategory::Announcement);
        assert!(!by_ta.is_announcement);
    }

    #[tokio::test]
    async fn test_create_announcement_pins_and_notifies_members() {
        let f = setup().await;

        let denied = f.forum.create_announcement(&f.alice, f.course_id, post("Nope")).await;
        assert!(matches!(denied, Err(ForumServiceError::Forbidden(_))));

        let view = f
            .forum
            .create_announcement(&f.prof, f.course_id, post("Midterm moved"))
            .await
            .unwrap();
        assert!(view.is_announcement);
        assert!(view.is_pinned);
        assert_eq!(view.category, ForumCategory::Announcement);

        for user in [&f.ta, &f.alice, &f.bob] {
            assert_eq!(notification_count(&f, user, NotificationType::Announcement).await, 1);
        }
        assert_eq!(notification_count(&f, &f.prof, NotificationType::Announcement).await, 0);
        assert_eq!(notification_count(&f, &f.outsider, NotificationType::Announcement).await, 0);
    }

    #[tokio::test]
    async fn test_list_posts_pinned_first_with_filters() {
        let f = setup().await;
        let first = f.forum.create_post(&f.alice, f.course_id, post("Borrow checker")).await.unwrap();
        let mut general = post("Study group");
        general.category = Some(ForumCategory::General);
        general.tags = vec!["social".to_string()];
        let second = f.forum.create_post(&f.bob, f.course_id, general).await.unwrap();
        f.forum.set_pinned(&f.prof, first.id, true).await.unwrap();

        let all = f
            .forum
            .list_posts(&f.alice, f.course_id, &PostFilter::default(), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.items[0].id, first.id);
        assert_eq!(all.items[1].id, second.id);

        let by_tag = f
            .forum
            .list_posts(
                &f.alice,
                f.course_id,
                &PostFilter {
                    tag: Some("SOCIAL".to_string()),
                    ..Default::default()
                },
                &ListParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_tag.total, 1);
        assert_eq!(by_tag.items[0].id, second.id);

        let by_search = f
            .forum
            .list_posts(
                &f.alice,
                f.course_id,
                &PostFilter {
                    search: Some("borrow".to_string()),
                    ..Default::default()
                },
                &ListParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_search.total, 1);
        assert_eq!(by_search.items[0].title, "Borrow checker");

        let paged = f
            .forum
            .list_posts(&f.alice, f.course_id, &PostFilter::default(), &ListParams::new(2, 1))
            .await
            .unwrap();
        assert_eq!(paged.total_pages, 2);
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.items[0].id, second.id);
    }

    #[tokio::test]
    async fn test_list_posts_unmatchable_tag_returns_nothing() {
        let f = setup().await;
        f.forum.create_post(&f.alice, f.course_id, post("First")).await.unwrap();
        f.forum.create_post(&f.bob, f.course_id, post("Second")).await.unwrap();

        let tagged = |tag: &str| PostFilter {
            tag: Some(tag.to_string()),
            ..Default::default()
        };

        for tag in ["!!!", "++"] {
            let page = f
                .forum
                .list_posts(&f.alice, f.course_id, &tagged(tag), &ListParams::default())
                .await
                .unwrap();
            assert_eq!(page.total, 0, "tag {:?}", tag);
            assert!(page.items.is_empty());
        }

        // a blank tag is no filter at all
        let blank = f
            .forum
            .list_posts(&f.alice, f.course_id, &tagged("  "), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(blank.total, 2);

        let outsider = f
            .forum
            .list_posts(&f.outsider, f.course_id, &tagged("!!!"), &ListParams::default())
            .await;
        assert!(matches!(outsider, Err(ForumServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_post_author_only() {
        let f = setup().await;
        let view = f.forum.create_post(&f.alice, f.course_id, post("Draft")).await.unwrap();

        let patch = UpdatePostInput {
            title: Some("Final".to_string()),
            tags: Some(vec!["Ownership".to_string()]),
            attachments: Some(vec![]),
            ..Default::default()
        };

        let by_prof = f.forum.update_post(&f.prof, view.id, patch.clone()).await;
        assert!(matches!(by_prof, Err(ForumServiceError::Forbidden(_))));

        let updated = f.forum.update_post(&f.alice, view.id, patch).await.unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.tags, vec!["ownership"]);
        assert!(updated.attachments.is_empty());
        assert_eq!(updated.content, view.content);

        let blank = UpdatePostInput {
            content: Some(" ".to_string()),
            ..Default::default()
        };
        let result = f.forum.update_post(&f.alice, view.id, blank).await;
        assert!(matches!(result, Err(ForumServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_delete_post_author_or_moderator() {
        let f = setup().await;
        let mine = f.forum.create_post(&f.alice, f.course_id, post("Mine")).await.unwrap();
        let other = f.forum.create_post(&f.alice, f.course_id, post("Other")).await.unwrap();

        let by_bob = f.forum.delete_post(&f.bob, mine.id).await;
        assert!(matches!(by_bob, Err(ForumServiceError::Forbidden(_))));

        f.forum.delete_post(&f.alice, mine.id).await.unwrap();
        f.forum.delete_post(&f.ta, other.id).await.unwrap();

        let gone = f.forum.get_post(&f.alice, mine.id).await;
        assert!(matches!(gone, Err(ForumServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_pin_is_moderator_only() {
        let f = setup().await;
        let view = f.forum.create_post(&f.alice, f.course_id, post("Pin me")).await.unwrap();

        let denied = f.forum.set_pinned(&f.alice, view.id, true).await;
        assert!(matches!(denied, Err(ForumServiceError::Forbidden(_))));

        assert!(f.forum.set_pinned(&f.ta, view.id, true).await.unwrap().is_pinned);
        assert!(!f.forum.set_pinned(&f.admin, view.id, false).await.unwrap().is_pinned);
    }

    // ========================================================================
    // Likes
    // ========================================================================

    #[tokio::test]
    async fn test_toggle_post_like() {
        let f = setup().await;
        let view = f.forum.create_post(&f.alice, f.course_id, post("Like me")).await.unwrap();

        let liked = f.forum.toggle_post_like(&f.bob, view.id).await.unwrap();
        assert_eq!(liked, LikeToggle { liked: true, like_count: 1 });
        assert_eq!(notification_count(&f, &f.alice, NotificationType::ForumLike).await, 1);

        let detail = f.forum.get_post(&f.bob, view.id).await.unwrap();
        assert_eq!(detail.likes, vec![f.bob.id]);
        assert!(detail.post.liked_by_me);

        let unliked = f.forum.toggle_post_like(&f.bob, view.id).await.unwrap();
        assert_eq!(unliked, LikeToggle { liked: false, like_count: 0 });

        // own like does not notify
        f.forum.toggle_post_like(&f.alice, view.id).await.unwrap();
        assert_eq!(notification_count(&f, &f.alice, NotificationType::ForumLike).await, 1);

        let outsider = f.forum.toggle_post_like(&f.outsider, view.id).await;
        assert!(matches!(outsider, Err(ForumServiceError::Forbidden(_))));
    }

    // ========================================================================
    // Replies
    // ========================================================================

    #[tokio::test]
    async fn test_reply_flow() {
        let f = setup().await;
        let view = f.forum.create_post(&f.alice, f.course_id, post("Question")).await.unwrap();

        let first = f.forum.create_reply(&f.bob, view.id, "Try this").await.unwrap();
        let second = f.forum.create_reply(&f.alice, view.id, "Thanks!").await.unwrap();
        assert_eq!(first.author.username, "bob");

        // only bob's reply notifies the post author
        assert_eq!(notification_count(&f, &f.alice, NotificationType::ForumReply).await, 1);

        let liked = f.forum.toggle_reply_like(&f.alice, first.id).await.unwrap();
        assert!(liked.liked);
        assert_eq!(notification_count(&f, &f.bob, NotificationType::ForumLike).await, 1);

        let detail = f.forum.get_post(&f.alice, view.id).await.unwrap();
        assert_eq!(detail.post.reply_count, 2);
        assert_eq!(detail.replies.len(), 2);
        assert_eq!(detail.replies[0].id, first.id);
        assert_eq!(detail.replies[1].id, second.id);
        assert_eq!(detail.replies[0].likes, vec![f.alice.id]);
        assert!(detail.replies[0].liked_by_me);
        assert!(!detail.replies[1].liked_by_me);

        let empty = f.forum.create_reply(&f.bob, view.id, "   ").await;
        assert!(matches!(empty, Err(ForumServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_reply_edit_and_delete_permissions() {
        let f = setup().await;
        let view = f.forum.create_post(&f.alice, f.course_id, post("Question")).await.unwrap();
        let reply = f.forum.create_reply(&f.bob, view.id, "Answer").await.unwrap();

        let by_alice = f.forum.update_reply(&f.alice, reply.id, "Edited").await;
        assert!(matches!(by_alice, Err(ForumServiceError::Forbidden(_))));

        let edited = f.forum.update_reply(&f.bob, reply.id, "Better answer").await.unwrap();
        assert_eq!(edited.content, "Better answer");

        let delete_by_alice = f.forum.delete_reply(&f.alice, reply.id).await;
        assert!(matches!(delete_by_alice, Err(ForumServiceError::Forbidden(_))));

        f.forum.delete_reply(&f.prof, reply.id).await.unwrap();
        let detail = f.forum.get_post(&f.alice, view.id).await.unwrap();
        assert_eq!(detail.post.reply_count, 0);
        assert!(detail.replies.is_empty());

        let missing = f.forum.delete_reply(&f.bob, reply.id).await;
        assert!(matches!(missing, Err(ForumServiceError::NotFound(_))));
    }
}
