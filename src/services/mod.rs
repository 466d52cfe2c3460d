//! Services layer - business logic
//!
//! Services check authorization, validate input and coordinate the
//! repositories, the cache and notification fan-out. Each one exposes its own
//! error enum which the API layer maps onto HTTP responses.

pub mod chat;
pub mod course;
pub mod forum;
pub mod notification;
pub mod password;
pub mod rate_limiter;
pub mod user;

pub use chat::{ChatService, ChatServiceError};
pub use course::{CourseAccess, CourseService, CourseServiceError};
pub use forum::{ForumService, ForumServiceError};
pub use notification::{NotificationService, NotificationServiceError};
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};

use crate::db::repositories::UserRepository;
use crate::models::UserSummary;
use anyhow::Result;
use std::collections::HashMap;

/// Resolve user ids to public summaries in one query.
///
/// Ids with no matching account map to [`UserSummary::deleted`].
pub(crate) async fn user_summaries(
    users: &dyn UserRepository,
    ids: &[i64],
) -> Result<HashMap<i64, UserSummary>> {
    let mut unique: Vec<i64> = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let mut summaries: HashMap<i64, UserSummary> = users
        .get_by_ids(&unique)
        .await?
        .into_iter()
        .map(|u| (u.id, u.summary()))
        .collect();

    for id in unique {
        summaries.entry(id).or_insert_with(|| UserSummary::deleted(id));
    }
    Ok(summaries)
}

/// Look up a summary produced by [`user_summaries`]
pub(crate) fn summary_for(summaries: &HashMap<i64, UserSummary>, id: i64) -> UserSummary {
    summaries
        .get(&id)
        .cloned()
        .unwrap_or_else(|| UserSummary::deleted(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::test_support::{insert_user, setup_pool};

    #[tokio::test]
    async fn test_user_summaries_fills_missing_ids() {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "alice").await;
        let repo = SqlxUserRepository::new(pool.clone());

        let summaries = user_summaries(&repo, &[alice, alice, 404]).await.unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[&alice].username, "alice");
        assert_eq!(summaries[&404].username, "[deleted]");
        assert_eq!(summary_for(&summaries, 500).id, 500);
    }
}
