use crate::domain::subpost::{CreateSubPostRequest, SubPost, UpdateSubPostRequest};
use crate::domain::DomainError;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

#[async_trait]
pub trait SubPostRepository: Send + Sync {
    async fn create(&self, req: CreateSubPostRequest) -> Result<SubPost, DomainError>;
    async fn find_by_id(&self, id: i64) -> Result<SubPost, DomainError>;
    async fn update(&self, id: i64, req: UpdateSubPostRequest) -> Result<SubPost, DomainError>;
    async fn delete(&self, id: i64) -> Result<(), DomainError>;
    async fn list(&self) -> Result<Vec<SubPost>, DomainError>;
}

pub struct PostgresSubPostRepository {
    pool: PgPool,
}

impl PostgresSubPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn subpost_from_row(row: &sqlx::postgres::PgRow) -> Result<SubPost, DomainError> {
    Ok(SubPost {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl SubPostRepository for PostgresSubPostRepository {
    async fn create(&self, req: CreateSubPostRequest) -> Result<SubPost, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        // A bad owning-post id in the body is a validation problem, not a 404;
        // the path-level 404 is reserved for /subposts/{id}/. The key-share
        // lock keeps the post row alive until the insert commits.
        let owner = sqlx::query("SELECT 1 FROM posts WHERE id = $1 FOR KEY SHARE")
            .bind(req.post_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        if owner.is_none() {
            return Err(DomainError::ValidationError(format!(
                "Unknown post: {}",
                req.post_id
            )));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO subposts (post_id, title, body, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, post_id, title, body, created_at, updated_at
            "#,
        )
        .bind(req.post_id)
        .bind(&req.title)
        .bind(&req.body)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create subpost: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;

        tx.commit()
            .await
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        subpost_from_row(&row)
    }

    async fn find_by_id(&self, id: i64) -> Result<SubPost, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, post_id, title, body, created_at, updated_at
            FROM subposts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        match row {
            Some(row) => subpost_from_row(&row),
            None => Err(DomainError::SubPostNotFound(id)),
        }
    }

    async fn update(&self, id: i64, req: UpdateSubPostRequest) -> Result<SubPost, DomainError> {
        let row = sqlx::query(
            r#"
            UPDATE subposts
            SET
                title = COALESCE($1, title),
                body = COALESCE($2, body),
                updated_at = NOW()
            WHERE id = $3
            RETURNING id, post_id, title, body, created_at, updated_at
            "#,
        )
        .bind(req.title)
        .bind(req.body)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        match row {
            Some(row) => subpost_from_row(&row),
            None => Err(DomainError::SubPostNotFound(id)),
        }
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        let result = sqlx::query("DELETE FROM subposts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            Err(DomainError::SubPostNotFound(id))
        } else {
            Ok(())
        }
    }

    async fn list(&self) -> Result<Vec<SubPost>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, title, body, created_at, updated_at
            FROM subposts
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        rows.iter().map(subpost_from_row).collect()
    }
}
