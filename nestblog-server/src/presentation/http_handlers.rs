use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};

use crate::application::{AuthService, BlogService};
use crate::domain::post::{CreatePostRequest, PostResponse, UpdatePostRequest};
use crate::domain::subpost::{CreateSubPostRequest, UpdateSubPostRequest};
use crate::domain::user::{LoginUserRequest, RegisterUserRequest, UserResponse};
use crate::domain::DomainError;
use crate::presentation::auth::AuthenticatedUser;

#[derive(serde::Serialize)]
struct AuthResponse {
    token: String,
    user: UserResponse,
}

#[derive(serde::Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(serde::Serialize)]
struct PostsResponse {
    posts: Vec<PostResponse>,
    total: i64,
    limit: i64,
    offset: i64,
}

// Преобразование DomainError в HttpResponse
fn error_to_response(err: DomainError) -> HttpResponse {
    let status_code = err.to_status_code();
    let message = err.to_string();

    match status_code {
        400 => HttpResponse::BadRequest().json(serde_json::json!({ "error": message })),
        401 => HttpResponse::Unauthorized().json(serde_json::json!({ "error": message })),
        404 => HttpResponse::NotFound().json(serde_json::json!({ "error": message })),
        409 => HttpResponse::Conflict().json(serde_json::json!({ "error": message })),
        _ => HttpResponse::InternalServerError()
            .json(serde_json::json!({ "error": "Internal server error" })),
    }
}

/// The whole HTTP surface, shared between `main` and the handler tests.
/// `/posts/bulk_create/` must stay registered before `/posts/{id}/`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login)),
    )
    .service(
        web::scope("/posts")
            .route("/", web::get().to(list_posts))
            .route("/", web::post().to(create_post))
            .route("/bulk_create/", web::post().to(bulk_create_posts))
            .route("/{id}/", web::get().to(get_post))
            .route("/{id}/", web::patch().to(update_post))
            .route("/{id}/", web::delete().to(delete_post))
            .route("/{id}/like/", web::post().to(like_post))
            .route("/{id}/view/", web::get().to(view_post)),
    )
    .service(
        web::scope("/subposts")
            .route("/", web::get().to(list_subposts))
            .route("/", web::post().to(create_subpost))
            .route("/{id}/", web::get().to(get_subpost))
            .route("/{id}/", web::patch().to(update_subpost))
            .route("/{id}/", web::delete().to(delete_subpost)),
    );
}

// ============== Auth Handlers ==============

pub async fn register(
    auth_service: web::Data<Arc<AuthService>>,
    req: web::Json<RegisterUserRequest>,
) -> impl Responder {
    match auth_service.register(req.into_inner()).await {
        Ok((token, user)) => HttpResponse::Created().json(AuthResponse { token, user }),
        Err(err) => error_to_response(err),
    }
}

pub async fn login(
    auth_service: web::Data<Arc<AuthService>>,
    req: web::Json<LoginUserRequest>,
) -> impl Responder {
    match auth_service.login(req.into_inner()).await {
        Ok((token, user)) => HttpResponse::Ok().json(AuthResponse { token, user }),
        Err(err) => error_to_response(err),
    }
}

// ============== Post Handlers ==============

pub async fn list_posts(
    blog_service: web::Data<Arc<BlogService>>,
    query: web::Query<PaginationQuery>,
) -> impl Responder {
    // Mirror the service's paging bounds so the echoed limit/offset match
    // the page actually returned.
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    match blog_service.list_posts(limit, offset).await {
        Ok((posts, total)) => HttpResponse::Ok().json(PostsResponse {
            posts,
            total,
            limit,
            offset,
        }),
        Err(err) => error_to_response(err),
    }
}

pub async fn get_post(
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
) -> impl Responder {
    match blog_service.get_post(path.into_inner()).await {
        Ok(post) => HttpResponse::Ok().json(post),
        Err(err) => error_to_response(err),
    }
}

pub async fn create_post(
    user: AuthenticatedUser,
    blog_service: web::Data<Arc<BlogService>>,
    post_data: web::Json<CreatePostRequest>,
) -> impl Responder {
    tracing::info!("Creating post for user_id={}", user.user_id);

    match blog_service
        .create_post(user.user_id, post_data.into_inner())
        .await
    {
        Ok(post) => HttpResponse::Created().json(post),
        Err(err) => error_to_response(err),
    }
}

pub async fn bulk_create_posts(
    user: AuthenticatedUser,
    blog_service: web::Data<Arc<BlogService>>,
    post_data: web::Json<Vec<CreatePostRequest>>,
) -> impl Responder {
    tracing::info!("Bulk creating posts for user_id={}", user.user_id);

    match blog_service
        .bulk_create_posts(user.user_id, post_data.into_inner())
        .await
    {
        Ok(posts) => HttpResponse::Created().json(posts),
        Err(err) => error_to_response(err),
    }
}

pub async fn update_post(
    user: AuthenticatedUser,
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
    post_data: web::Json<UpdatePostRequest>,
) -> impl Responder {
    let post_id = path.into_inner();

    tracing::info!("Updating post id={} for user_id={}", post_id, user.user_id);

    match blog_service.update_post(post_id, post_data.into_inner()).await {
        Ok(post) => HttpResponse::Ok().json(post),
        Err(err) => error_to_response(err),
    }
}

pub async fn delete_post(
    user: AuthenticatedUser,
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
) -> impl Responder {
    let post_id = path.into_inner();

    tracing::info!("Deleting post id={} for user_id={}", post_id, user.user_id);

    match blog_service.delete_post(post_id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => error_to_response(err),
    }
}

pub async fn like_post(
    user: AuthenticatedUser,
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
) -> impl Responder {
    match blog_service
        .toggle_like(path.into_inner(), user.user_id)
        .await
    {
        Ok(like) => HttpResponse::Ok().json(like),
        Err(err) => error_to_response(err),
    }
}

pub async fn view_post(
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
) -> impl Responder {
    match blog_service.record_view(path.into_inner()).await {
        Ok(views) => HttpResponse::Ok().json(views),
        Err(err) => error_to_response(err),
    }
}

// ============== SubPost Handlers ==============

pub async fn list_subposts(blog_service: web::Data<Arc<BlogService>>) -> impl Responder {
    match blog_service.list_subposts().await {
        Ok(subposts) => HttpResponse::Ok().json(subposts),
        Err(err) => error_to_response(err),
    }
}

pub async fn create_subpost(
    blog_service: web::Data<Arc<BlogService>>,
    subpost_data: web::Json<CreateSubPostRequest>,
) -> impl Responder {
    match blog_service.create_subpost(subpost_data.into_inner()).await {
        Ok(subpost) => HttpResponse::Created().json(subpost),
        Err(err) => error_to_response(err),
    }
}

pub async fn get_subpost(
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
) -> impl Responder {
    match blog_service.get_subpost(path.into_inner()).await {
        Ok(subpost) => HttpResponse::Ok().json(subpost),
        Err(err) => error_to_response(err),
    }
}

pub async fn update_subpost(
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
    subpost_data: web::Json<UpdateSubPostRequest>,
) -> impl Responder {
    match blog_service
        .update_subpost(path.into_inner(), subpost_data.into_inner())
        .await
    {
        Ok(subpost) => HttpResponse::Ok().json(subpost),
        Err(err) => error_to_response(err),
    }
}

pub async fn delete_subpost(
    blog_service: web::Data<Arc<BlogService>>,
    path: web::Path<i64>,
) -> impl Responder {
    match blog_service.delete_subpost(path.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => error_to_response(err),
    }
}
