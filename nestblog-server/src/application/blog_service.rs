use std::sync::Arc;

use crate::data::post_repository::PostRepository;
use crate::data::subpost_repository::SubPostRepository;
use crate::domain::post::{
    CreatePostRequest, LikeResponse, NewPost, PostResponse, UpdatePostRequest, ViewsResponse,
};
use crate::domain::reconcile::plan_initial_subposts;
use crate::domain::subpost::{CreateSubPostRequest, SubPostResponse, UpdateSubPostRequest};
use crate::domain::DomainError;

pub struct BlogService {
    post_repo: Arc<dyn PostRepository + Send + Sync>,
    subpost_repo: Arc<dyn SubPostRepository + Send + Sync>,
}

impl BlogService {
    pub fn new(
        post_repo: Arc<dyn PostRepository + Send + Sync>,
        subpost_repo: Arc<dyn SubPostRepository + Send + Sync>,
    ) -> Self {
        Self {
            post_repo,
            subpost_repo,
        }
    }

    /// Validates a creation payload in full before anything touches storage.
    fn validate_new_post(req: &CreatePostRequest) -> Result<NewPost, DomainError> {
        if req.title.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }
        if req.body.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Body cannot be empty".to_string(),
            ));
        }
        Ok(NewPost {
            title: req.title.clone(),
            body: req.body.clone(),
            subposts: plan_initial_subposts(&req.subposts)?,
        })
    }

    pub async fn create_post(
        &self,
        author_id: i64,
        req: CreatePostRequest,
    ) -> Result<PostResponse, DomainError> {
        let new_post = Self::validate_new_post(&req)?;
        let post = self.post_repo.create(author_id, new_post).await?;

        tracing::info!(
            "Post created: id={}, author_id={}, subposts={}",
            post.id,
            author_id,
            post.subposts.len()
        );

        Ok(PostResponse::from(post))
    }

    pub async fn bulk_create_posts(
        &self,
        author_id: i64,
        reqs: Vec<CreatePostRequest>,
    ) -> Result<Vec<PostResponse>, DomainError> {
        let new_posts = reqs
            .iter()
            .map(Self::validate_new_post)
            .collect::<Result<Vec<NewPost>, DomainError>>()?;

        let posts = self.post_repo.create_many(author_id, new_posts).await?;

        tracing::info!(
            "Bulk created {} posts for author_id={}",
            posts.len(),
            author_id
        );

        Ok(posts.into_iter().map(PostResponse::from).collect())
    }

    pub async fn get_post(&self, id: i64) -> Result<PostResponse, DomainError> {
        let post = self.post_repo.find_by_id(id).await?;
        Ok(PostResponse::from(post))
    }

    pub async fn update_post(
        &self,
        id: i64,
        req: UpdatePostRequest,
    ) -> Result<PostResponse, DomainError> {
        if let Some(title) = &req.title {
            if title.trim().is_empty() {
                return Err(DomainError::ValidationError(
                    "Title cannot be empty".to_string(),
                ));
            }
        }
        if let Some(body) = &req.body {
            if body.trim().is_empty() {
                return Err(DomainError::ValidationError(
                    "Body cannot be empty".to_string(),
                ));
            }
        }

        let post = self.post_repo.update(id, req).await?;

        tracing::info!("Post updated: id={}", id);

        Ok(PostResponse::from(post))
    }

    pub async fn delete_post(&self, id: i64) -> Result<(), DomainError> {
        self.post_repo.delete(id).await?;

        tracing::info!("Post deleted: id={}", id);

        Ok(())
    }

    pub async fn list_posts(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<PostResponse>, i64), DomainError> {
        // Out-of-range paging is corrected, not rejected: the page size tops
        // out at 100 and a negative offset reads from the start.
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);

        let (posts, total) = self.post_repo.list(limit, offset).await?;

        Ok((posts.into_iter().map(PostResponse::from).collect(), total))
    }

    /// Toggle semantics, deliberately not idempotent: repeated calls alternate
    /// membership, two calls in a row restore the original state.
    pub async fn toggle_like(
        &self,
        post_id: i64,
        user_id: i64,
    ) -> Result<LikeResponse, DomainError> {
        let (liked, likes) = self.post_repo.toggle_like(post_id, user_id).await?;

        let status = if liked { "liked" } else { "unliked" };
        tracing::info!(
            "Post {} {} by user_id={}, likes={}",
            post_id,
            status,
            user_id,
            likes
        );

        Ok(LikeResponse {
            status: status.to_string(),
            likes,
        })
    }

    pub async fn record_view(&self, post_id: i64) -> Result<ViewsResponse, DomainError> {
        let views_count = self.post_repo.increment_views(post_id).await?;
        Ok(ViewsResponse { views_count })
    }

    pub async fn create_subpost(
        &self,
        req: CreateSubPostRequest,
    ) -> Result<SubPostResponse, DomainError> {
        if req.title.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }
        if req.body.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Body cannot be empty".to_string(),
            ));
        }

        let subpost = self.subpost_repo.create(req).await?;

        tracing::info!(
            "Subpost created: id={}, post_id={}",
            subpost.id,
            subpost.post_id
        );

        Ok(SubPostResponse::from(subpost))
    }

    pub async fn get_subpost(&self, id: i64) -> Result<SubPostResponse, DomainError> {
        let subpost = self.subpost_repo.find_by_id(id).await?;
        Ok(SubPostResponse::from(subpost))
    }

    pub async fn update_subpost(
        &self,
        id: i64,
        req: UpdateSubPostRequest,
    ) -> Result<SubPostResponse, DomainError> {
        if let Some(title) = &req.title {
            if title.trim().is_empty() {
                return Err(DomainError::ValidationError(
                    "Title cannot be empty".to_string(),
                ));
            }
        }
        if let Some(body) = &req.body {
            if body.trim().is_empty() {
                return Err(DomainError::ValidationError(
                    "Body cannot be empty".to_string(),
                ));
            }
        }

        let subpost = self.subpost_repo.update(id, req).await?;

        tracing::info!("Subpost updated: id={}", id);

        Ok(SubPostResponse::from(subpost))
    }

    pub async fn delete_subpost(&self, id: i64) -> Result<(), DomainError> {
        self.subpost_repo.delete(id).await?;

        tracing::info!("Subpost deleted: id={}", id);

        Ok(())
    }

    pub async fn list_subposts(&self) -> Result<Vec<SubPostResponse>, DomainError> {
        let subposts = self.subpost_repo.list().await?;
        Ok(subposts.into_iter().map(SubPostResponse::from).collect())
    }
}
