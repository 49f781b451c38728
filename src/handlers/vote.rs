use crate::config::BoardConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{RsvpStatus, ToggleOutcome, Transition, VoteDelta, VoteKind};
use crate::response::ApiResponse;
use crate::services::reaction::ReactionEngine;
use crate::store::SharedStore;
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    pub reaction: VoteKind,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RsvpRequest {
    pub status: RsvpStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResponse {
    pub target_id: Uuid,
    pub transition: Transition,
    pub previous: Option<VoteKind>,
    pub current: Option<VoteKind>,
    /// Counter change to apply to displayed counts
    pub delta: VoteDelta,
}

impl VoteResponse {
    fn new(target_id: Uuid, outcome: ToggleOutcome<VoteKind>) -> Self {
        Self {
            target_id,
            delta: VoteDelta::of(&outcome),
            transition: outcome.transition,
            previous: outcome.previous,
            current: outcome.current,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RsvpResponse {
    pub target_id: Uuid,
    pub transition: Transition,
    pub previous: Option<RsvpStatus>,
    pub current: Option<RsvpStatus>,
}

fn engine(store: SharedStore, config: &BoardConfig) -> ReactionEngine {
    ReactionEngine::new(store, config.counter_mode)
}

#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/vote",
    security(("jwt_token" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote toggled", body = VoteResponse),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Event not found", body = AppError),
    ),
    tag = "votes"
)]
pub async fn vote_event(
    Extension(store): Extension<SharedStore>,
    Extension(config): Extension<BoardConfig>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<VoteRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = engine(store, &config)
        .toggle_event_vote(id, Some(auth_user.user_id), payload.reaction)
        .await?;
    Ok(ApiResponse::ok(VoteResponse::new(id, outcome)))
}

#[utoipa::path(
    post,
    path = "/api/v1/comments/{id}/vote",
    security(("jwt_token" = [])),
    params(("id" = Uuid, Path, description = "Comment ID")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote toggled", body = VoteResponse),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Comment not found", body = AppError),
    ),
    tag = "votes"
)]
pub async fn vote_comment(
    Extension(store): Extension<SharedStore>,
    Extension(config): Extension<BoardConfig>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<VoteRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = engine(store, &config)
        .toggle_comment_vote(id, Some(auth_user.user_id), payload.reaction)
        .await?;
    Ok(ApiResponse::ok(VoteResponse::new(id, outcome)))
}

#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/rsvp",
    security(("jwt_token" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = RsvpRequest,
    responses(
        (status = 200, description = "RSVP toggled", body = RsvpResponse),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Event not found", body = AppError),
    ),
    tag = "rsvps"
)]
pub async fn rsvp_event(
    Extension(store): Extension<SharedStore>,
    Extension(config): Extension<BoardConfig>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RsvpRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = engine(store, &config)
        .toggle_rsvp(id, Some(auth_user.user_id), payload.status)
        .await?;
    Ok(ApiResponse::ok(RsvpResponse {
        target_id: id,
        transition: outcome.transition,
        previous: outcome.previous,
        current: outcome.current,
    }))
}
