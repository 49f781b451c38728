use crate::config::rate_limit::{RateLimitConfig, RateLimitRule, RouteGroup};
use crate::handlers;
use crate::middleware::auth::auth_middleware;
use axum::{middleware, routing, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

pub fn create_routes() -> Router {
    Router::new().nest("/api/v1", api_routes())
}

fn api_routes() -> Router {
    let rate_limit_config = RateLimitConfig::from_env();

    let read = read_routes(&rate_limit_config);
    let write =
        write_routes(&rate_limit_config).layer(middleware::from_fn(auth_middleware));

    read.merge(write)
}

/// Public read routes: event feed, RSVP lists and comment threads.
fn read_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/events", routing::get(handlers::event::list_events))
        .route("/events/{id}", routing::get(handlers::event::get_event))
        .route(
            "/events/{id}/rsvps",
            routing::get(handlers::event::list_event_rsvps),
        )
        .route(
            "/events/{id}/comments",
            routing::get(handlers::comment::list_comments),
        )
        .route(
            "/events/{id}/comments/flat",
            routing::get(handlers::comment::list_comment_rows),
        );

    with_optional_rate_limit(router, config.enabled, config.rule(RouteGroup::Read))
}

/// Protected routes: event and comment writes, votes and RSVPs.
fn write_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/events", routing::post(handlers::event::create_event))
        .route(
            "/events/{id}",
            routing::put(handlers::event::update_event).delete(handlers::event::delete_event),
        )
        .route("/me/rsvps", routing::get(handlers::event::list_my_rsvps))
        .route("/events/{id}/vote", routing::post(handlers::vote::vote_event))
        .route("/events/{id}/rsvp", routing::post(handlers::vote::rsvp_event))
        .route(
            "/events/{id}/comments",
            routing::post(handlers::comment::create_comment),
        )
        .route(
            "/comments/{id}/vote",
            routing::post(handlers::vote::vote_comment),
        )
        .route(
            "/comments/{id}",
            routing::delete(handlers::comment::delete_comment),
        );

    with_optional_rate_limit(router, config.enabled, config.rule(RouteGroup::Write))
}

fn with_optional_rate_limit(router: Router, enabled: bool, rule: RateLimitRule) -> Router {
    if !enabled {
        return router;
    }

    match GovernorConfigBuilder::default()
        .per_second(rule.per_second)
        .burst_size(rule.burst_size)
        .finish()
    {
        Some(governor_conf) => router.layer(GovernorLayer::new(governor_conf)),
        None => {
            tracing::warn!("Invalid rate limit rule {:?}, serving without limit", rule);
            router
        }
    }
}
