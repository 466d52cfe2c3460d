//! Common API utilities and shared query types

use serde::{Deserialize, Serialize};

use crate::models::{ForumCategory, ListParams, PostFilter};

/// `?page=&per_page=` on every list endpoint
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl From<PageQuery> for ListParams {
    fn from(q: PageQuery) -> Self {
        ListParams::from_query(q.page, q.per_page)
    }
}

/// `GET /users?q=`
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UserSearchQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// `GET /courses?search=&mine=`
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CourseListQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub mine: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// `GET /courses/{id}/posts`
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PostListQuery {
    pub search: Option<String>,
    pub category: Option<ForumCategory>,
    pub tag: Option<String>,
    pub author_id: Option<i64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PostListQuery {
    pub fn filter(&self) -> PostFilter {
        PostFilter {
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            category: self.category,
            tag: self.tag.clone(),
            author_id: self.author_id,
        }
    }

    pub fn params(&self) -> ListParams {
        ListParams::from_query(self.page, self.per_page)
    }
}

/// `GET /notifications?unread_only=`
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_PER_PAGE, MAX_PER_PAGE};

    #[test]
    fn test_page_query_defaults_and_clamping() {
        let params: ListParams = PageQuery::default().into();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, DEFAULT_PER_PAGE);

        let params: ListParams = PageQuery {
            page: Some(0),
            per_page: Some(1000),
        }
        .into();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, MAX_PER_PAGE);
    }

    #[test]
    fn test_post_list_query_blank_search_is_ignored() {
        let query = PostListQuery {
            search: Some("   ".to_string()),
            category: Some(ForumCategory::Question),
            ..Default::default()
        };
        let filter = query.filter();
        assert!(filter.search.is_none());
        assert_eq!(filter.category, Some(ForumCategory::Question));
    }
}
