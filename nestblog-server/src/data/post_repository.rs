use std::collections::HashMap;

use crate::domain::post::{NewPost, Post, UpdatePostRequest};
use crate::domain::reconcile::{plan_nested_writes, SubPostWrite};
use crate::domain::subpost::SubPost;
use crate::domain::DomainError;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, author_id: i64, post: NewPost) -> Result<Post, DomainError>;
    async fn create_many(&self, author_id: i64, posts: Vec<NewPost>)
        -> Result<Vec<Post>, DomainError>;
    async fn find_by_id(&self, id: i64) -> Result<Post, DomainError>;
    async fn update(&self, id: i64, req: UpdatePostRequest) -> Result<Post, DomainError>;
    async fn delete(&self, id: i64) -> Result<(), DomainError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Post>, i64), DomainError>;
    /// Returns whether the user now likes the post, and the like count.
    async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<(bool, i64), DomainError>;
    /// Atomic single-statement increment; never a read-modify-write.
    async fn increment_views(&self, post_id: i64) -> Result<i64, DomainError>;
}

pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn subpost_from_row(row: &PgRow) -> Result<SubPost, DomainError> {
    Ok(SubPost {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Assembles the full post aggregate (scalar fields, children, like-set) on one
/// connection, so it can run inside a transaction as well as against the pool.
async fn load_post(conn: &mut PgConnection, id: i64) -> Result<Post, DomainError> {
    let row = sqlx::query(
        r#"
        SELECT id, title, body, author_id, views_count, created_at, updated_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| DomainError::DatabaseError(e.to_string()))?
    .ok_or(DomainError::PostNotFound)?;

    let subposts = sqlx::query(
        r#"
        SELECT id, post_id, title, body, created_at, updated_at
        FROM subposts
        WHERE post_id = $1
        ORDER BY created_at, id
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| DomainError::DatabaseError(e.to_string()))?
    .iter()
    .map(subpost_from_row)
    .collect::<Result<Vec<SubPost>, DomainError>>()?;

    let likes = sqlx::query("SELECT user_id FROM post_likes WHERE post_id = $1 ORDER BY user_id")
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?
        .iter()
        .map(|row| row.try_get("user_id"))
        .collect::<Result<Vec<i64>, sqlx::Error>>()?;

    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        author_id: row.try_get("author_id")?,
        views_count: row.try_get("views_count")?,
        likes,
        subposts,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn insert_post(
    conn: &mut PgConnection,
    author_id: i64,
    post: &NewPost,
) -> Result<Post, DomainError> {
    let row = sqlx::query(
        r#"
        INSERT INTO posts (title, body, author_id, views_count, created_at, updated_at)
        VALUES ($1, $2, $3, 0, NOW(), NOW())
        RETURNING id, title, body, author_id, views_count, created_at, updated_at
        "#,
    )
    .bind(&post.title)
    .bind(&post.body)
    .bind(author_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {}", e);
        DomainError::DatabaseError(e.to_string())
    })?;

    let post_id: i64 = row.try_get("id")?;

    let mut subposts = Vec::with_capacity(post.subposts.len());
    for subpost in &post.subposts {
        let sub_row = sqlx::query(
            r#"
            INSERT INTO subposts (post_id, title, body, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, post_id, title, body, created_at, updated_at
            "#,
        )
        .bind(post_id)
        .bind(&subpost.title)
        .bind(&subpost.body)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        subposts.push(subpost_from_row(&sub_row)?);
    }

    Ok(Post {
        id: post_id,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        author_id: row.try_get("author_id")?,
        views_count: row.try_get("views_count")?,
        likes: Vec::new(),
        subposts,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, author_id: i64, post: NewPost) -> Result<Post, DomainError> {
        let mut tx = self.pool.begin().await?;
        let created = insert_post(&mut tx, author_id, &post).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn create_many(
        &self,
        author_id: i64,
        posts: Vec<NewPost>,
    ) -> Result<Vec<Post>, DomainError> {
        // All-or-nothing: one failed insert rolls back the whole batch.
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(posts.len());
        for post in &posts {
            created.push(insert_post(&mut tx, author_id, post).await?);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Post, DomainError> {
        let mut conn = self.pool.acquire().await?;
        load_post(&mut conn, id).await
    }

    async fn update(&self, id: i64, req: UpdatePostRequest) -> Result<Post, DomainError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE posts
            SET
                title = COALESCE($1, title),
                body = COALESCE($2, body),
                updated_at = NOW()
            WHERE id = $3
            RETURNING id
            "#,
        )
        .bind(&req.title)
        .bind(&req.body)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        if updated.is_none() {
            return Err(DomainError::PostNotFound);
        }

        if let Some(fragments) = &req.subposts {
            // Lock the current children so the diff cannot race a concurrent
            // writer on the same post.
            let existing = sqlx::query(
                "SELECT id FROM subposts WHERE post_id = $1 ORDER BY id FOR UPDATE",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?
            .iter()
            .map(|row| row.try_get("id"))
            .collect::<Result<Vec<i64>, sqlx::Error>>()?;

            let plan = plan_nested_writes(&existing, fragments)?;

            if !plan.deletes.is_empty() {
                sqlx::query("DELETE FROM subposts WHERE post_id = $1 AND id = ANY($2)")
                    .bind(id)
                    .bind(&plan.deletes)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
            }

            for write in plan.writes {
                match write {
                    SubPostWrite::Update {
                        id: subpost_id,
                        title,
                        body,
                    } => {
                        sqlx::query(
                            r#"
                            UPDATE subposts
                            SET
                                title = COALESCE($1, title),
                                body = COALESCE($2, body),
                                updated_at = NOW()
                            WHERE id = $3
                            "#,
                        )
                        .bind(title)
                        .bind(body)
                        .bind(subpost_id)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
                    }
                    SubPostWrite::Create(new) => {
                        sqlx::query(
                            r#"
                            INSERT INTO subposts (post_id, title, body, created_at, updated_at)
                            VALUES ($1, $2, $3, NOW(), NOW())
                            "#,
                        )
                        .bind(id)
                        .bind(&new.title)
                        .bind(&new.body)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
                    }
                }
            }
        }

        let post = load_post(&mut tx, id).await?;
        tx.commit().await?;
        Ok(post)
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        // Subposts and likes go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            Err(DomainError::PostNotFound)
        } else {
            Ok(())
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Post>, i64), DomainError> {
        let count_row = sqlx::query("SELECT COUNT(*) as count FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        let total: i64 = count_row.try_get("count")?;

        let rows = sqlx::query(
            r#"
            SELECT id, title, body, author_id, views_count, created_at, updated_at
            FROM posts
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        let ids = rows
            .iter()
            .map(|row| row.try_get("id"))
            .collect::<Result<Vec<i64>, sqlx::Error>>()?;

        // Children and like-sets for the whole page in two queries.
        let mut subposts_by_post: HashMap<i64, Vec<SubPost>> = HashMap::new();
        let sub_rows = sqlx::query(
            r#"
            SELECT id, post_id, title, body, created_at, updated_at
            FROM subposts
            WHERE post_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        for row in &sub_rows {
            let subpost = subpost_from_row(row)?;
            subposts_by_post.entry(subpost.post_id).or_default().push(subpost);
        }

        let mut likes_by_post: HashMap<i64, Vec<i64>> = HashMap::new();
        let like_rows = sqlx::query(
            "SELECT post_id, user_id FROM post_likes WHERE post_id = ANY($1) ORDER BY user_id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        for row in &like_rows {
            let post_id: i64 = row.try_get("post_id")?;
            let user_id: i64 = row.try_get("user_id")?;
            likes_by_post.entry(post_id).or_default().push(user_id);
        }

        let posts = rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                Ok(Post {
                    id,
                    title: row.try_get("title")?,
                    body: row.try_get("body")?,
                    author_id: row.try_get("author_id")?,
                    views_count: row.try_get("views_count")?,
                    likes: likes_by_post.remove(&id).unwrap_or_default(),
                    subposts: subposts_by_post.remove(&id).unwrap_or_default(),
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect::<Result<Vec<Post>, DomainError>>()?;

        Ok((posts, total))
    }

    async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<(bool, i64), DomainError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT 1 FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?
            .ok_or(DomainError::PostNotFound)?;

        // Membership flip without a read-modify-write: the conflict-free insert
        // tells us whether the user was already in the set.
        let inserted = sqlx::query(
            r#"
            INSERT INTO post_likes (post_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (post_id, user_id) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        let liked = inserted.rows_affected() == 1;
        if !liked {
            sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
                .bind(post_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        }

        let count_row = sqlx::query("SELECT COUNT(*) as count FROM post_likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        let count: i64 = count_row.try_get("count")?;

        tx.commit().await?;
        Ok((liked, count))
    }

    async fn increment_views(&self, post_id: i64) -> Result<i64, DomainError> {
        let row = sqlx::query(
            r#"
            UPDATE posts
            SET views_count = views_count + 1
            WHERE id = $1
            RETURNING views_count
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;

        match row {
            Some(row) => Ok(row.try_get("views_count")?),
            None => Err(DomainError::PostNotFound),
        }
    }
}
