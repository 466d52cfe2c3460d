//! Data models
//!
//! Database entities, the read-side views built from them, and the input
//! types accepted by the services.

mod chat;
mod course;
mod forum;
mod notification;
mod pagination;
mod session;
mod user;

pub use chat::{Conversation, ConversationSummary, Message, MAX_MESSAGE_LENGTH};
pub use course::{
    Course, CourseFilter, CourseMember, CreateCourseInput, Enrollment, EnrollmentRole,
    UpdateCourseInput,
};
pub use forum::{
    normalize_tags, Attachment, CreatePostInput, ForumCategory, ForumPost, ForumReply, LikeTarget,
    LikeToggle, NewPost, PostDetail, PostFilter, PostPatch, PostView, ReplyView, UpdatePostInput,
    MAX_TAG_LENGTH, MAX_TITLE_LENGTH,
};
pub use notification::{NewNotification, Notification, NotificationType};
pub use pagination::{ListParams, PagedResult, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use session::Session;
pub use user::{gravatar_url, CreateUserInput, User, UserRole, UserStatus, UserSummary};
