use reqwest::Method;

use super::{ApiClient, ClientError};
use crate::api::common::{CourseListQuery, PageQuery};
use crate::api::responses::AddMemberRequest;
use crate::models::{
    Course, CourseMember, CreateCourseInput, Enrollment, EnrollmentRole, PagedResult,
    UpdateCourseInput,
};

impl ApiClient {
    pub async fn list_courses(
        &self,
        query: &CourseListQuery,
    ) -> Result<PagedResult<Course>, ClientError> {
        self.get_query("/courses", query).await
    }

    pub async fn create_course(&self, input: &CreateCourseInput) -> Result<Course, ClientError> {
        self.post("/courses", input).await
    }

    pub async fn get_course(&self, id: i64) -> Result<Course, ClientError> {
        self.get(&format!("/courses/{}", id)).await
    }

    pub async fn update_course(
        &self,
        id: i64,
        input: &UpdateCourseInput,
    ) -> Result<Course, ClientError> {
        self.put(&format!("/courses/{}", id), input).await
    }

    pub async fn delete_course(&self, id: i64) -> Result<(), ClientError> {
        self.delete(&format!("/courses/{}", id)).await
    }

    /// Self-enroll as a student
    pub async fn enroll(&self, course_id: i64) -> Result<Enrollment, ClientError> {
        let request = self
            .authed(Method::POST, &format!("/courses/{}/enrollment", course_id))
            .await?;
        self.send(request).await
    }

    pub async fn leave_course(&self, course_id: i64) -> Result<(), ClientError> {
        self.delete(&format!("/courses/{}/enrollment", course_id))
            .await
    }

    pub async fn list_members(
        &self,
        course_id: i64,
        page: &PageQuery,
    ) -> Result<PagedResult<CourseMember>, ClientError> {
        self.get_query(&format!("/courses/{}/members", course_id), page)
            .await
    }

    /// Add or re-role a member (course moderators)
    pub async fn add_member(
        &self,
        course_id: i64,
        user_id: i64,
        role: EnrollmentRole,
    ) -> Result<CourseMember, ClientError> {
        self.post(
            &format!("/courses/{}/members", course_id),
            &AddMemberRequest { user_id, role },
        )
        .await
    }
}
