use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::subpost::{NewSubPost, SubPost, SubPostFragment, SubPostResponse};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub author_id: i64,
    pub views_count: i64,
    pub likes: Vec<i64>,
    pub subposts: Vec<SubPost>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub subposts: Vec<SubPostFragment>,
}

/// Partial update: a field left out of the payload keeps its current value.
/// `subposts: None` leaves the children untouched; `subposts: Some(...)` makes
/// the children match the submitted list exactly.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub subposts: Option<Vec<SubPostFragment>>,
}

/// A validated post payload ready for insertion, children included.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub subposts: Vec<crate::domain::subpost::NewSubPost>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub author_id: i64,
    pub views_count: i64,
    pub likes: Vec<i64>,
    pub subposts: Vec<SubPostResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            body: post.body,
            author_id: post.author_id,
            views_count: post.views_count,
            likes: post.likes,
            subposts: post.subposts.into_iter().map(SubPostResponse::from).collect(),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub status: String,
    pub likes: i64,
}

#[derive(Debug, Serialize)]
pub struct ViewsResponse {
    pub views_count: i64,
}
