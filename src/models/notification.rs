//! Notification feed model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ForumPost,
    ForumReply,
    ForumLike,
    Announcement,
    Message,
    Course,
    System,
}

impl Default for NotificationType {
    fn default() -> Self {
        Self::System
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ForumPost => "forum_post",
            Self::ForumReply => "forum_reply",
            Self::ForumLike => "forum_like",
            Self::Announcement => "announcement",
            Self::Message => "message",
            Self::Course => "course",
            Self::System => "system",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for NotificationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "forum_post" => Ok(Self::ForumPost),
            "forum_reply" => Ok(Self::ForumReply),
            "forum_like" => Ok(Self::ForumLike),
            "announcement" => Ok(Self::Announcement),
            "message" => Ok(Self::Message),
            "course" => Ok(Self::Course),
            "system" => Ok(Self::System),
            _ => Err(anyhow::anyhow!("Invalid notification type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub notification_type: NotificationType,
    /// Client-side route to the thing being notified about
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification about to be stored
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub notification_type: NotificationType,
    pub message: String,
    pub link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&NotificationType::ForumReply).unwrap();
        assert_eq!(json, "\"forum_reply\"");
    }

    proptest! {
        #[test]
        fn prop_type_display_roundtrip(t in prop_oneof![
            Just(NotificationType::ForumPost),
            Just(NotificationType::ForumReply),
            Just(NotificationType::ForumLike),
            Just(NotificationType::Announcement),
            Just(NotificationType::Message),
            Just(NotificationType::Course),
            Just(NotificationType::System),
        ]) {
            prop_assert_eq!(NotificationType::from_str(&t.to_string()).unwrap(), t);
        }
    }
}
