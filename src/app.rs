use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::env;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::BoardConfig;
use crate::routes;
use crate::store::{EventFilter, EventStore, SharedStore};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        // Event routes
        crate::handlers::event::list_events,
        crate::handlers::event::get_event,
        crate::handlers::event::create_event,
        crate::handlers::event::update_event,
        crate::handlers::event::delete_event,
        crate::handlers::event::list_event_rsvps,
        crate::handlers::event::list_my_rsvps,
        // Comment routes
        crate::handlers::comment::list_comments,
        crate::handlers::comment::list_comment_rows,
        crate::handlers::comment::create_comment,
        crate::handlers::comment::delete_comment,
        // Vote and RSVP routes
        crate::handlers::vote::vote_event,
        crate::handlers::vote::vote_comment,
        crate::handlers::vote::rsvp_event,
    ),
    components(
        schemas(
            crate::response::ApiResponse<serde_json::Value>,
            crate::response::PaginatedResponse<serde_json::Value>,
            crate::response::PaginationQuery,
            crate::error::AppError,
            crate::models::VoteKind,
            crate::models::RsvpStatus,
            crate::models::Transition,
            crate::models::VoteDelta,
            // Event
            crate::handlers::event::EventResponse,
            crate::handlers::event::EventRequest,
            crate::handlers::event::EventFeedQuery,
            crate::handlers::event::RsvpEntry,
            crate::handlers::event::UserRsvpResponse,
            // Comment
            crate::handlers::comment::CommentResponse,
            crate::handlers::comment::CommentRowResponse,
            crate::handlers::comment::CreateCommentRequest,
            crate::services::comment_tree::CommentNode,
            // Vote
            crate::handlers::vote::VoteRequest,
            crate::handlers::vote::VoteResponse,
            crate::handlers::vote::RsvpRequest,
            crate::handlers::vote::RsvpResponse,
        )
    ),
    tags(
        (name = "events", description = "Event feed and hosting"),
        (name = "comments", description = "Comment threads"),
        (name = "votes", description = "Upvote/downvote toggles"),
        (name = "rsvps", description = "RSVP toggles and listings"),
    )
)]
pub struct ApiDoc;

/// Full application router with the store and board settings attached.
pub fn create_app(store: SharedStore, board: BoardConfig) -> Router {
    Router::new()
        .route("/", get(health_check))
        .merge(routes::create_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
        .layer(Extension(store))
        .layer(Extension(board))
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Health check successful", body = serde_json::Value)
    )
)]
async fn health_check(
    Extension(store): Extension<SharedStore>,
    Extension(board): Extension<BoardConfig>,
) -> impl IntoResponse {
    let store_ok = store
        .list_events(&EventFilter::default(), 1, 1)
        .await
        .is_ok();
    let status = if store_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "Slug Board API",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": format!("{:?}", board.backend).to_lowercase(),
        "store": store_ok,
    }))
}
