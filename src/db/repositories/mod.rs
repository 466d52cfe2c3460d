//! Database repositories
//!
//! One repository per aggregate. Each trait has a single SQLx
//! implementation that dispatches on the configured driver.

pub mod chat;
pub mod course;
pub mod forum;
pub mod notification;
pub mod session;
pub mod user;

pub use chat::{ChatRepository, SqlxChatRepository};
pub use course::{CourseRepository, SqlxCourseRepository};
pub use forum::{ForumRepository, SqlxForumRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Escape character used in every `LIKE ... ESCAPE '!'` clause
const LIKE_ESCAPE: char = '!';

/// Wrap `query` in `%` for substring matching, escaping LIKE wildcards
pub(crate) fn like_pattern(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    out.push('%');
    for c in query.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// `?, ?, ?` for an IN clause of `n` values
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
