//! Forum models: posts, replies, likes
//!
//! A post belongs to a course and carries tags, attachments and
//! denormalised like/reply counters. Likes are stored per (target, user)
//! and surfaced as a list of user ids on the read side.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::UserSummary;

/// Maximum length of a post title, in characters
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length of a single tag, in characters
pub const MAX_TAG_LENGTH: usize = 50;

static TAG_INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\-_ ]").expect("valid tag regex"));
static TAG_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForumCategory {
    General,
    Question,
    Discussion,
    Resource,
    Announcement,
}

impl Default for ForumCategory {
    fn default() -> Self {
        Self::General
    }
}

impl fmt::Display for ForumCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::General => "general",
            Self::Question => "question",
            Self::Discussion => "discussion",
            Self::Resource => "resource",
            Self::Announcement => "announcement",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ForumCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(Self::General),
            "question" => Ok(Self::Question),
            "discussion" => Ok(Self::Discussion),
            "resource" => Ok(Self::Resource),
            "announcement" => Ok(Self::Announcement),
            _ => Err(anyhow::anyhow!("Invalid forum category: {}", s)),
        }
    }
}

/// File or link attached to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

impl Attachment {
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
            && (self.url.starts_with("http://") || self.url.starts_with("https://"))
    }
}

/// Stored forum post (row shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumPost {
    pub id: i64,
    pub course_id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub category: ForumCategory,
    pub attachments: Vec<Attachment>,
    pub is_pinned: bool,
    pub is_announcement: bool,
    pub like_count: i64,
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored reply (row shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumReply {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a like points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTarget {
    Post,
    Reply,
}

impl fmt::Display for LikeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => write!(f, "post"),
            Self::Reply => write!(f, "reply"),
        }
    }
}

/// Result of a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub like_count: i64,
}

/// Post as shown in a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: i64,
    pub course_id: i64,
    pub author: UserSummary,
    pub title: String,
    pub content: String,
    pub category: ForumCategory,
    pub tags: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub is_pinned: bool,
    pub is_announcement: bool,
    pub like_count: i64,
    pub reply_count: i64,
    pub liked_by_me: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyView {
    pub id: i64,
    pub post_id: i64,
    pub author: UserSummary,
    pub content: String,
    pub like_count: i64,
    /// Ids of users who liked this reply
    pub likes: Vec<i64>,
    pub liked_by_me: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full post with likes and replies, oldest reply first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostView,
    /// Ids of users who liked this post
    pub likes: Vec<i64>,
    pub replies: Vec<ReplyView>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<ForumCategory>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<ForumCategory>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<Attachment>>,
}

/// Already validated data handed to the repository
#[derive(Debug, Clone)]
pub struct NewPost {
    pub course_id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub category: ForumCategory,
    pub tags: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub is_pinned: bool,
    pub is_announcement: bool,
}

/// Already validated patch handed to the repository
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<ForumCategory>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<Attachment>>,
}

/// Filter for post listings within one course
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostFilter {
    /// Substring match on title or content
    pub search: Option<String>,
    pub category: Option<ForumCategory>,
    pub tag: Option<String>,
    pub author_id: Option<i64>,
}

/// Normalise a tag list: trim, lowercase, strip disallowed characters,
/// collapse whitespace, drop empties and duplicates (first occurrence wins).
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for raw in tags {
        let lower = raw.as_ref().trim().to_lowercase();
        let cleaned = TAG_INVALID_CHARS.replace_all(&lower, "");
        let collapsed = TAG_WHITESPACE.replace_all(cleaned.trim(), " ");
        let tag: String = collapsed.chars().take(MAX_TAG_LENGTH).collect();
        let tag = tag.trim().to_string();

        if !tag.is_empty() && seen.insert(tag.clone()) {
            out.push(tag);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(&["  Rust ", "rust", "Async/Await", "", "week 1", "WEEK   1"]);
        assert_eq!(tags, vec!["rust", "asyncawait", "week 1"]);
    }

    #[test]
    fn test_normalize_tags_truncates() {
        let long = "a".repeat(80);
        let tags = normalize_tags(&[long]);
        assert_eq!(tags[0].len(), MAX_TAG_LENGTH);
    }

    #[test]
    fn test_attachment_validation() {
        let ok = Attachment { name: "slides".into(), url: "https://example.edu/s.pdf".into() };
        let no_name = Attachment { name: " ".into(), url: "https://example.edu".into() };
        let bad_scheme = Attachment { name: "x".into(), url: "ftp://example.edu".into() };

        assert!(ok.is_valid());
        assert!(!no_name.is_valid());
        assert!(!bad_scheme.is_valid());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(ForumCategory::from_str("Question").unwrap(), ForumCategory::Question);
        assert!(ForumCategory::from_str("random").is_err());
        assert_eq!(ForumCategory::default(), ForumCategory::General);
    }

    #[test]
    fn test_post_detail_flattens_post() {
        let now = Utc::now();
        let detail = PostDetail {
            post: PostView {
                id: 1,
                course_id: 2,
                author: UserSummary::deleted(3),
                title: "t".into(),
                content: "c".into(),
                category: ForumCategory::General,
                tags: vec![],
                attachments: vec![],
                is_pinned: false,
                is_announcement: false,
                like_count: 1,
                reply_count: 0,
                liked_by_me: true,
                created_at: now,
                updated_at: now,
            },
            likes: vec![3],
            replies: vec![],
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["likes"][0], 3);
        assert_eq!(json["liked_by_me"], true);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_normalized_tags_are_clean(tags in prop::collection::vec(".{0,60}", 0..15)) {
            let normalized = normalize_tags(&tags);
            let unique: HashSet<_> = normalized.iter().collect();

            prop_assert_eq!(unique.len(), normalized.len());
            for tag in &normalized {
                prop_assert!(!tag.is_empty());
                prop_assert!(tag.chars().count() <= MAX_TAG_LENGTH);
                prop_assert!(tag.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "-_ ".contains(c)));
                prop_assert_eq!(tag.trim(), tag.as_str());
            }
        }

        #[test]
        fn prop_normalize_is_idempotent(tags in prop::collection::vec("[A-Za-z0-9 _-]{0,20}", 0..10)) {
            let once = normalize_tags(&tags);
            let twice = normalize_tags(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
