use reqwest::Method;

use super::{ApiClient, ClientError};
use crate::api::common::PostListQuery;
use crate::api::responses::{ContentRequest, PinRequest};
use crate::models::{
    CreatePostInput, LikeToggle, PagedResult, PostDetail, PostView, ReplyView, UpdatePostInput,
};

impl ApiClient {
    pub async fn list_posts(
        &self,
        course_id: i64,
        query: &PostListQuery,
    ) -> Result<PagedResult<PostView>, ClientError> {
        self.get_query(&format!("/courses/{}/posts", course_id), query)
            .await
    }

    pub async fn create_post(
        &self,
        course_id: i64,
        input: &CreatePostInput,
    ) -> Result<PostView, ClientError> {
        self.post(&format!("/courses/{}/posts", course_id), input)
            .await
    }

    /// Pinned announcement, sent to every member's feed
    pub async fn create_announcement(
        &self,
        course_id: i64,
        input: &CreatePostInput,
    ) -> Result<PostView, ClientError> {
        self.post(&format!("/courses/{}/announcements", course_id), input)
            .await
    }

    pub async fn get_post(&self, id: i64) -> Result<PostDetail, ClientError> {
        self.get(&format!("/posts/{}", id)).await
    }

    pub async fn update_post(
        &self,
        id: i64,
        input: &UpdatePostInput,
    ) -> Result<PostView, ClientError> {
        self.put(&format!("/posts/{}", id), input).await
    }

    pub async fn delete_post(&self, id: i64) -> Result<(), ClientError> {
        self.delete(&format!("/posts/{}", id)).await
    }

    pub async fn like_post(&self, id: i64) -> Result<LikeToggle, ClientError> {
        self.toggle_like(&format!("/posts/{}/like", id)).await
    }

    pub async fn set_pinned(&self, id: i64, pinned: bool) -> Result<PostView, ClientError> {
        self.put(&format!("/posts/{}/pin", id), &PinRequest { pinned })
            .await
    }

    pub async fn reply(&self, post_id: i64, content: &str) -> Result<ReplyView, ClientError> {
        let body = ContentRequest {
            content: content.to_string(),
        };
        self.post(&format!("/posts/{}/replies", post_id), &body)
            .await
    }

    pub async fn update_reply(&self, id: i64, content: &str) -> Result<ReplyView, ClientError> {
        let body = ContentRequest {
            content: content.to_string(),
        };
        self.put(&format!("/replies/{}", id), &body).await
    }

    pub async fn delete_reply(&self, id: i64) -> Result<(), ClientError> {
        self.delete(&format!("/replies/{}", id)).await
    }

    pub async fn like_reply(&self, id: i64) -> Result<LikeToggle, ClientError> {
        self.toggle_like(&format!("/replies/{}/like", id)).await
    }

    async fn toggle_like(&self, path: &str) -> Result<LikeToggle, ClientError> {
        self.send(self.authed(Method::POST, path).await?).await
    }
}
