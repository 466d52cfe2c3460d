//! Direct messaging models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserSummary;

/// Maximum message length, in characters
pub const MAX_MESSAGE_LENGTH: usize = 5000;

/// A 1:1 conversation. Participants are stored ordered so each pair maps to
/// exactly one row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub user_low_id: i64,
    pub user_high_id: i64,
    pub created_at: DateTime<Utc>,
    /// Bumped on every new message
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Order two participant ids the way they are stored
    pub fn ordered_pair(a: i64, b: i64) -> (i64, i64) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn has_participant(&self, user_id: i64) -> bool {
        self.user_low_id == user_id || self.user_high_id == user_id
    }

    /// The participant who is not `user_id`
    pub fn other_participant(&self, user_id: i64) -> i64 {
        if self.user_low_id == user_id {
            self.user_high_id
        } else {
            self.user_low_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Conversation list entry, from the caller's point of view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub other_user: UserSummary,
    pub last_message: Option<Message>,
    pub unread_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(low: i64, high: i64) -> Conversation {
        let now = Utc::now();
        Conversation {
            id: 1,
            user_low_id: low,
            user_high_id: high,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_ordered_pair() {
        assert_eq!(Conversation::ordered_pair(9, 3), (3, 9));
        assert_eq!(Conversation::ordered_pair(3, 9), (3, 9));
    }

    #[test]
    fn test_participants() {
        let c = conversation(3, 9);
        assert!(c.has_participant(3));
        assert!(c.has_participant(9));
        assert!(!c.has_participant(4));
        assert_eq!(c.other_participant(3), 9);
        assert_eq!(c.other_participant(9), 3);
    }
}
