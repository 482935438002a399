//! In-memory repositories mirroring the Postgres semantics, for tests that
//! don't need a live database. One store implements all three repository
//! traits so nested and standalone subpost writes see the same data.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::data::post_repository::PostRepository;
use crate::data::subpost_repository::SubPostRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::post::{NewPost, Post, UpdatePostRequest};
use crate::domain::reconcile::{plan_nested_writes, SubPostWrite};
use crate::domain::subpost::{CreateSubPostRequest, SubPost, UpdateSubPostRequest};
use crate::domain::user::RegisterUserRequest;
use crate::domain::{DomainError, User};

#[derive(Debug, Clone)]
struct PostRow {
    id: i64,
    title: String,
    body: String,
    author_id: i64,
    views_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    posts: HashMap<i64, PostRow>,
    subposts: HashMap<i64, SubPost>,
    likes: HashMap<i64, BTreeSet<i64>>,
    users: HashMap<i64, User>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn subposts_of(&self, post_id: i64) -> Vec<SubPost> {
        let mut subposts: Vec<SubPost> = self
            .subposts
            .values()
            .filter(|s| s.post_id == post_id)
            .cloned()
            .collect();
        subposts.sort_by_key(|s| s.id);
        subposts
    }

    fn assemble(&self, post_id: i64) -> Result<Post, DomainError> {
        let row = self.posts.get(&post_id).ok_or(DomainError::PostNotFound)?;
        Ok(Post {
            id: row.id,
            title: row.title.clone(),
            body: row.body.clone(),
            author_id: row.author_id,
            views_count: row.views_count,
            likes: self
                .likes
                .get(&post_id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default(),
            subposts: self.subposts_of(post_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn insert_post(&mut self, author_id: i64, post: &NewPost) -> i64 {
        let id = self.next_id();
        let now = Utc::now();
        self.posts.insert(
            id,
            PostRow {
                id,
                title: post.title.clone(),
                body: post.body.clone(),
                author_id,
                views_count: 0,
                created_at: now,
                updated_at: now,
            },
        );
        for subpost in &post.subposts {
            let subpost_id = self.next_id();
            self.subposts.insert(
                subpost_id,
                SubPost {
                    id: subpost_id,
                    post_id: id,
                    title: subpost.title.clone(),
                    body: subpost.body.clone(),
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        id
    }
}

#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostRepository for InMemoryRepository {
    async fn create(&self, author_id: i64, post: NewPost) -> Result<Post, DomainError> {
        let mut state = self.state.lock().unwrap();
        let id = state.insert_post(author_id, &post);
        state.assemble(id)
    }

    async fn create_many(
        &self,
        author_id: i64,
        posts: Vec<NewPost>,
    ) -> Result<Vec<Post>, DomainError> {
        let mut state = self.state.lock().unwrap();
        let ids: Vec<i64> = posts
            .iter()
            .map(|post| state.insert_post(author_id, post))
            .collect();
        ids.into_iter().map(|id| state.assemble(id)).collect()
    }

    async fn find_by_id(&self, id: i64) -> Result<Post, DomainError> {
        self.state.lock().unwrap().assemble(id)
    }

    async fn update(&self, id: i64, req: UpdatePostRequest) -> Result<Post, DomainError> {
        let mut state = self.state.lock().unwrap();
        if !state.posts.contains_key(&id) {
            return Err(DomainError::PostNotFound);
        }

        // Plan first: a planning error must leave the store untouched, same as
        // the rolled-back transaction in the Postgres repository.
        let plan = match &req.subposts {
            Some(fragments) => {
                let existing: Vec<i64> = state.subposts_of(id).iter().map(|s| s.id).collect();
                Some(plan_nested_writes(&existing, fragments)?)
            }
            None => None,
        };

        let now = Utc::now();
        let row = state.posts.get_mut(&id).expect("checked above");
        if let Some(title) = &req.title {
            row.title = title.clone();
        }
        if let Some(body) = &req.body {
            row.body = body.clone();
        }
        row.updated_at = now;

        if let Some(plan) = plan {
            for subpost_id in &plan.deletes {
                state.subposts.remove(subpost_id);
            }
            for write in plan.writes {
                match write {
                    SubPostWrite::Update {
                        id: subpost_id,
                        title,
                        body,
                    } => {
                        let subpost = state
                            .subposts
                            .get_mut(&subpost_id)
                            .expect("planned against existing ids");
                        if let Some(title) = title {
                            subpost.title = title;
                        }
                        if let Some(body) = body {
                            subpost.body = body;
                        }
                        subpost.updated_at = now;
                    }
                    SubPostWrite::Create(new) => {
                        let subpost_id = state.next_id();
                        state.subposts.insert(
                            subpost_id,
                            SubPost {
                                id: subpost_id,
                                post_id: id,
                                title: new.title,
                                body: new.body,
                                created_at: now,
                                updated_at: now,
                            },
                        );
                    }
                }
            }
        }

        state.assemble(id)
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        if state.posts.remove(&id).is_none() {
            return Err(DomainError::PostNotFound);
        }
        state.subposts.retain(|_, s| s.post_id != id);
        state.likes.remove(&id);
        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Post>, i64), DomainError> {
        let state = self.state.lock().unwrap();
        let total = state.posts.len() as i64;
        let mut ids: Vec<i64> = state.posts.keys().copied().collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        let posts = ids
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|id| state.assemble(id))
            .collect::<Result<Vec<Post>, DomainError>>()?;
        Ok((posts, total))
    }

    async fn toggle_like(&self, post_id: i64, user_id: i64) -> Result<(bool, i64), DomainError> {
        let mut state = self.state.lock().unwrap();
        if !state.posts.contains_key(&post_id) {
            return Err(DomainError::PostNotFound);
        }
        let set = state.likes.entry(post_id).or_default();
        let liked = set.insert(user_id);
        if !liked {
            set.remove(&user_id);
        }
        Ok((liked, set.len() as i64))
    }

    async fn increment_views(&self, post_id: i64) -> Result<i64, DomainError> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .posts
            .get_mut(&post_id)
            .ok_or(DomainError::PostNotFound)?;
        row.views_count += 1;
        Ok(row.views_count)
    }
}

#[async_trait]
impl SubPostRepository for InMemoryRepository {
    async fn create(&self, req: CreateSubPostRequest) -> Result<SubPost, DomainError> {
        let mut state = self.state.lock().unwrap();
        if !state.posts.contains_key(&req.post_id) {
            return Err(DomainError::ValidationError(format!(
                "Unknown post: {}",
                req.post_id
            )));
        }
        let id = state.next_id();
        let now = Utc::now();
        let subpost = SubPost {
            id,
            post_id: req.post_id,
            title: req.title,
            body: req.body,
            created_at: now,
            updated_at: now,
        };
        state.subposts.insert(id, subpost.clone());
        Ok(subpost)
    }

    async fn find_by_id(&self, id: i64) -> Result<SubPost, DomainError> {
        self.state
            .lock()
            .unwrap()
            .subposts
            .get(&id)
            .cloned()
            .ok_or(DomainError::SubPostNotFound(id))
    }

    async fn update(&self, id: i64, req: UpdateSubPostRequest) -> Result<SubPost, DomainError> {
        let mut state = self.state.lock().unwrap();
        let subpost = state
            .subposts
            .get_mut(&id)
            .ok_or(DomainError::SubPostNotFound(id))?;
        if let Some(title) = req.title {
            subpost.title = title;
        }
        if let Some(body) = req.body {
            subpost.body = body;
        }
        subpost.updated_at = Utc::now();
        Ok(subpost.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        state
            .subposts
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::SubPostNotFound(id))
    }

    async fn list(&self) -> Result<Vec<SubPost>, DomainError> {
        let state = self.state.lock().unwrap();
        let mut subposts: Vec<SubPost> = state.subposts.values().cloned().collect();
        subposts.sort_by_key(|s| s.id);
        Ok(subposts)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create(
        &self,
        req: RegisterUserRequest,
        password_hash: String,
    ) -> Result<User, DomainError> {
        let mut state = self.state.lock().unwrap();
        if state
            .users
            .values()
            .any(|u| u.username == req.username || u.email == req.email)
        {
            return Err(DomainError::UserAlreadyExists);
        }
        let id = state.next_id();
        let user = User {
            id,
            username: req.username,
            email: req.email,
            password_hash,
            created_at: Utc::now(),
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<User, DomainError> {
        self.state
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(DomainError::UserNotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, DomainError> {
        self.state
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DomainError::UserNotFound)
    }
}
