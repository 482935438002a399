use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubPost {
    pub id: i64,
    pub post_id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One element of a `subposts` list nested inside a post write. The id decides
/// how the fragment is reconciled against the post's current children.
#[derive(Debug, Clone, Deserialize)]
pub struct SubPostFragment {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub body: Option<String>,
}

/// A fully validated new child, ready to be inserted under a post.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubPost {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubPostRequest {
    pub post_id: i64,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubPostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubPostResponse {
    pub id: i64,
    pub post_id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubPost> for SubPostResponse {
    fn from(subpost: SubPost) -> Self {
        Self {
            id: subpost.id,
            post_id: subpost.post_id,
            title: subpost.title,
            body: subpost.body,
            created_at: subpost.created_at,
            updated_at: subpost.updated_at,
        }
    }
}
