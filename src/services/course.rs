//! Course service
//!
//! Courses, enrollments and the membership checks every forum operation
//! goes through. Membership lookups are cached per (course, user); all of a
//! course's entries are dropped when its enrollments change.

use crate::cache::{keys, CacheLayer, MemoryCache};
use crate::db::repositories::{CourseRepository, UserRepository};
use crate::models::{
    Course, CourseFilter, CourseMember, CreateCourseInput, Enrollment, EnrollmentRole, ListParams,
    NotificationType, PagedResult, UpdateCourseInput, User,
};
use crate::services::notification::NotificationService;
use crate::services::{summary_for, user_summaries};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub const MAX_CODE_LENGTH: usize = 32;
pub const MAX_COURSE_TITLE_LENGTH: usize = 200;

const MEMBERSHIP_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum CourseServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// What a user may do inside one course
#[derive(Debug, Clone)]
pub struct CourseAccess {
    pub course: Course,
    /// `None` when the user is not enrolled (only possible for admins)
    pub role: Option<EnrollmentRole>,
    pub is_admin: bool,
}

impl CourseAccess {
    /// Course instructors and global admins
    pub fn is_moderator(&self) -> bool {
        self.is_admin || self.role == Some(EnrollmentRole::Instructor)
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.course.instructor_id == user_id
    }
}

pub struct CourseService {
    course_repo: Arc<dyn CourseRepository>,
    user_repo: Arc<dyn UserRepository>,
    notifications: Arc<NotificationService>,
    cache: Arc<MemoryCache>,
}

impl CourseService {
    pub fn new(
        course_repo: Arc<dyn CourseRepository>,
        user_repo: Arc<dyn UserRepository>,
        notifications: Arc<NotificationService>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            course_repo,
            user_repo,
            notifications,
            cache,
        }
    }

    /// Create a course and enroll the creator as its instructor.
    ///
    /// Only instructors and admins may create courses. Codes are unique.
    pub async fn create_course(
        &self,
        user: &User,
        input: CreateCourseInput,
    ) -> Result<Course, CourseServiceError> {
        if !user.can_create_courses() {
            return Err(CourseServiceError::Forbidden(
                "Only instructors can create courses".to_string(),
            ));
        }

        let code = input.code.trim().to_string();
        let title = input.title.trim().to_string();
        validate_code(&code)?;
        validate_title(&title)?;

        if self
            .course_repo
            .get_by_code(&code)
            .await
            .context("Failed to check course code")?
            .is_some()
        {
            return Err(CourseServiceError::Conflict(format!(
                "Course code '{}' is already in use",
                code
            )));
        }

        let now = Utc::now();
        let course = Course {
            id: 0,
            code,
            title,
            description: normalize_description(input.description),
            instructor_id: user.id,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .course_repo
            .create(&course)
            .await
            .context("Failed to create course")?;
        self.course_repo
            .enroll(created.id, user.id, EnrollmentRole::Instructor)
            .await
            .context("Failed to enroll course owner")?;

        tracing::info!("Course {} ({}) created by user {}", created.code, created.id, user.id);
        Ok(created)
    }

    /// List courses, optionally only those the caller is enrolled in
    pub async fn list_courses(
        &self,
        user: &User,
        search: Option<String>,
        mine: bool,
        params: &ListParams,
    ) -> Result<PagedResult<Course>, CourseServiceError> {
        let filter = CourseFilter {
            search: search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            member_id: mine.then_some(user.id),
        };

        let (items, total) = self
            .course_repo
            .list(&filter, params)
            .await
            .context("Failed to list courses")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get_course(&self, id: i64) -> Result<Course, CourseServiceError> {
        self.course_repo
            .get_by_id(id)
            .await
            .context("Failed to get course")?
            .ok_or_else(|| course_not_found(id))
    }

    /// Update title or description. Course owner or admin only.
    pub async fn update_course(
        &self,
        user: &User,
        id: i64,
        input: UpdateCourseInput,
    ) -> Result<Course, CourseServiceError> {
        let mut course = self.get_course(id).await?;
        ensure_owner_or_admin(user, &course)?;

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            validate_title(&title)?;
            course.title = title;
        }
        if input.description.is_some() {
            course.description = normalize_description(input.description);
        }
        course.updated_at = Utc::now();

        let saved = self
            .course_repo
            .update(&course)
            .await
            .context("Failed to update course")?;
        Ok(saved)
    }

    /// Delete a course with its enrollments and forum. Owner or admin only.
    pub async fn delete_course(&self, user: &User, id: i64) -> Result<(), CourseServiceError> {
        let course = self.get_course(id).await?;
        ensure_owner_or_admin(user, &course)?;

        self.course_repo
            .delete(id)
            .await
            .context("Failed to delete course")?;
        self.invalidate_course(id).await;

        tracing::info!("Course {} ({}) deleted by user {}", course.code, id, user.id);
        Ok(())
    }

    /// Self-enroll as a student. Enrolling twice keeps the first enrollment.
    pub async fn enroll(&self, user: &User, course_id: i64) -> Result<Enrollment, CourseServiceError> {
        self.get_course(course_id).await?;

        let inserted = self
            .course_repo
            .enroll(course_id, user.id, EnrollmentRole::Student)
            .await
            .context("Failed to enroll")?;
        if inserted {
            self.invalidate_course(course_id).await;
        }

        self.course_repo
            .get_enrollment(course_id, user.id)
            .await
            .context("Failed to get enrollment")?
            .ok_or_else(|| anyhow::anyhow!("Enrollment missing after insert").into())
    }

    /// Leave a course. The owner cannot leave their own course.
    pub async fn leave(&self, user: &User, course_id: i64) -> Result<(), CourseServiceError> {
        let course = self.get_course(course_id).await?;
        if course.instructor_id == user.id {
            return Err(CourseServiceError::ValidationError(
                "The course owner cannot leave the course".to_string(),
            ));
        }

        let removed = self
            .course_repo
            .unenroll(course_id, user.id)
            .await
            .context("Failed to leave course")?;
        if !removed {
            return Err(CourseServiceError::NotFound(
                "You are not enrolled in this course".to_string(),
            ));
        }

        self.invalidate_course(course_id).await;
        Ok(())
    }

    /// Add a user to the course or change their role, then notify them.
    ///
    /// Requires a course instructor or an admin.
    pub async fn add_member(
        &self,
        user: &User,
        course_id: i64,
        member_id: i64,
        role: EnrollmentRole,
    ) -> Result<CourseMember, CourseServiceError> {
        let access = self.access(user, course_id).await?;
        if !access.is_moderator() {
            return Err(CourseServiceError::Forbidden(
                "Only course instructors can add members".to_string(),
            ));
        }
        if access.is_owner(member_id) && role != EnrollmentRole::Instructor {
            return Err(CourseServiceError::ValidationError(
                "The course owner must remain an instructor".to_string(),
            ));
        }

        let member = self
            .user_repo
            .get_by_id(member_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| CourseServiceError::NotFound(format!("User {} not found", member_id)))?;

        self.course_repo
            .upsert_enrollment(course_id, member_id, role)
            .await
            .context("Failed to add member")?;
        self.invalidate_course(course_id).await;

        let enrollment = self
            .course_repo
            .get_enrollment(course_id, member_id)
            .await
            .context("Failed to get enrollment")?
            .ok_or_else(|| anyhow::anyhow!("Enrollment missing after upsert"))?;

        if member_id != user.id {
            let message = format!(
                "You were added to {} ({}) as {}",
                access.course.title, access.course.code, role
            );
            if let Err(e) = self
                .notifications
                .notify(
                    member_id,
                    NotificationType::Course,
                    message,
                    Some(format!("/courses/{}", course_id)),
                )
                .await
            {
                tracing::warn!("Failed to notify new member {}: {:#}", member_id, e);
            }
        }

        Ok(CourseMember {
            user: member.summary(),
            role: enrollment.role,
            enrolled_at: enrollment.enrolled_at,
        })
    }

    /// Instructors first, then by enrollment date. Members and admins only.
    pub async fn list_members(
        &self,
        user: &User,
        course_id: i64,
        params: &ListParams,
    ) -> Result<PagedResult<CourseMember>, CourseServiceError> {
        self.access(user, course_id).await?;

        let (enrollments, total) = self
            .course_repo
            .list_members(course_id, params)
            .await
            .context("Failed to list members")?;

        let ids: Vec<i64> = enrollments.iter().map(|e| e.user_id).collect();
        let summaries = user_summaries(self.user_repo.as_ref(), &ids)
            .await
            .context("Failed to load member profiles")?;

        Ok(PagedResult::new(enrollments, total, params).map(|e| CourseMember {
            user: summary_for(&summaries, e.user_id),
            role: e.role,
            enrolled_at: e.enrolled_at,
        }))
    }

    /// Ids of course members, optionally restricted to one role
    pub async fn member_ids(
        &self,
        course_id: i64,
        role: Option<EnrollmentRole>,
    ) -> Result<Vec<i64>, CourseServiceError> {
        let ids = self
            .course_repo
            .member_ids(course_id, role)
            .await
            .context("Failed to list course members")?;
        Ok(ids)
    }

    /// Cached enrollment role of `user_id` in `course_id`
    pub async fn membership(
        &self,
        course_id: i64,
        user_id: i64,
    ) -> Result<Option<EnrollmentRole>, CourseServiceError> {
        let key = keys::course_member(course_id, user_id);
        match self.cache.get::<Option<EnrollmentRole>>(&key).await {
            Ok(Some(role)) => return Ok(role),
            Ok(None) => {}
            Err(e) => tracing::warn!("Membership cache read failed: {:#}", e),
        }

        let role = self
            .course_repo
            .get_enrollment(course_id, user_id)
            .await
            .context("Failed to get enrollment")?
            .map(|e| e.role);

        if let Err(e) = self.cache.set(&key, &role, MEMBERSHIP_TTL).await {
            tracing::warn!("Membership cache write failed: {:#}", e);
        }
        Ok(role)
    }

    /// Resolve the caller's access to a course.
    ///
    /// Missing course is `NotFound`; a non-member who is not an admin is
    /// `Forbidden`.
    pub async fn access(&self, user: &User, course_id: i64) -> Result<CourseAccess, CourseServiceError> {
        let course = self.get_course(course_id).await?;
        let role = self.membership(course_id, user.id).await?;

        if role.is_none() && !user.is_admin() {
            return Err(CourseServiceError::Forbidden(
                "You are not a member of this course".to_string(),
            ));
        }

        Ok(CourseAccess {
            course,
            role,
            is_admin: user.is_admin(),
        })
    }

    async fn invalidate_course(&self, course_id: i64) {
        if let Err(e) = self.cache.delete_pattern(&keys::course_pattern(course_id)).await {
            tracing::warn!("Failed to invalidate cache for course {}: {:#}", course_id, e);
        }
    }
}

fn course_not_found(id: i64) -> CourseServiceError {
    CourseServiceError::NotFound(format!("Course {} not found", id))
}

fn ensure_owner_or_admin(user: &User, course: &Course) -> Result<(), CourseServiceError> {
    if user.is_admin() || course.instructor_id == user.id {
        Ok(())
    } else {
        Err(CourseServiceError::Forbidden(
            "Only the course owner can change this course".to_string(),
        ))
    }
}

fn validate_code(code: &str) -> Result<(), CourseServiceError> {
    if code.is_empty() {
        return Err(CourseServiceError::ValidationError(
            "Course code cannot be empty".to_string(),
        ));
    }
    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(CourseServiceError::ValidationError(format!(
            "Course code must be at most {} characters",
            MAX_CODE_LENGTH
        )));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), CourseServiceError> {
    if title.is_empty() {
        return Err(CourseServiceError::ValidationError(
            "Course title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_COURSE_TITLE_LENGTH {
        return Err(CourseServiceError::ValidationError(format!(
            "Course title must be at most {} characters",
            MAX_COURSE_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
