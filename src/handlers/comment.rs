use crate::config::BoardConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::CommentModel;
use crate::response::ApiResponse;
use crate::services::comment::CommentService;
use crate::services::comment_tree::{walk, CommentNode};
use crate::store::SharedStore;
use crate::utils::format_relative;
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    pub parent_id: Option<Uuid>,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub upvotes: i32,
    pub downvotes: i32,
    pub age: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CommentModel> for CommentResponse {
    fn from(c: CommentModel) -> Self {
        Self {
            id: c.id,
            event_id: c.event_id,
            author_id: c.author_id,
            parent_id: c.parent_id,
            content: c.content,
            upvotes: c.upvotes_count,
            downvotes: c.downvotes_count,
            age: format_relative(c.created_at, chrono::Utc::now()),
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

/// A comment flattened for indented rendering.
#[derive(Debug, Serialize, ToSchema)]
pub struct CommentRowResponse {
    pub depth: usize,
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub content: String,
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i64,
    pub age: String,
    pub reply_count: usize,
}

impl CommentRowResponse {
    fn new(depth: usize, node: &CommentNode) -> Self {
        Self {
            depth,
            id: node.id,
            parent_id: node.parent_id,
            author_id: node.author_id,
            content: node.content.clone(),
            upvotes: node.upvotes,
            downvotes: node.downvotes,
            score: node.score,
            age: node.age.clone(),
            reply_count: node.replies.len(),
        }
    }
}

fn comment_service(store: SharedStore, config: &BoardConfig) -> CommentService {
    CommentService::new(store, config.counter_mode)
        .with_depth_limits(config.max_reply_depth, config.max_render_depth)
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/comments",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Comment tree", body = Vec<CommentNode>),
        (status = 404, description = "Event not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn list_comments(
    Extension(store): Extension<SharedStore>,
    Extension(config): Extension<BoardConfig>,
    Path(event_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = comment_service(store, &config);
    let tree = service.list_tree(event_id).await?;
    Ok(ApiResponse::ok(tree))
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/comments/flat",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Comments in display order with indentation depth", body = Vec<CommentRowResponse>),
        (status = 404, description = "Event not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn list_comment_rows(
    Extension(store): Extension<SharedStore>,
    Extension(config): Extension<BoardConfig>,
    Path(event_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = comment_service(store, &config);
    let tree = service.list_tree(event_id).await?;
    let rows: Vec<CommentRowResponse> = walk(&tree, config.max_render_depth)
        .into_iter()
        .map(|row| CommentRowResponse::new(row.depth, row.node))
        .collect();
    Ok(ApiResponse::ok(rows))
}

#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/comments",
    security(("jwt_token" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Event not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn create_comment(
    Extension(store): Extension<SharedStore>,
    Extension(config): Extension<BoardConfig>,
    auth_user: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = comment_service(store, &config);
    let comment = service
        .create(
            event_id,
            auth_user.user_id,
            payload.parent_id,
            &payload.content,
        )
        .await?;

    Ok(ApiResponse::ok(CommentResponse::from(comment)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    security(("jwt_token" = [])),
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted"),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Comment not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn delete_comment(
    Extension(store): Extension<SharedStore>,
    Extension(config): Extension<BoardConfig>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = comment_service(store, &config);
    service.delete(id, auth_user.user_id).await?;
    Ok(ApiResponse::ok(()).with_message("Comment deleted"))
}
