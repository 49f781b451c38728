use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{EventModel, ReactionKind, ReactionRecord, RsvpStatus};
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::event::{EventDraft, EventService, MAX_PER_PAGE};
use crate::store::{EventFilter, SharedStore};
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Body for creating or replacing an event.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EventRequest {
    /// Event title (1-200 characters)
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 50))]
    pub category: Option<String>,
    /// RFC 3339 start time
    pub start_time: Option<DateTime<Utc>>,
}

impl From<EventRequest> for EventDraft {
    fn from(req: EventRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            location: req.location,
            category: req.category,
            start_time: req.start_time,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EventFeedQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub host_id: Option<Uuid>,
    /// Only events that have not started yet, soonest first
    #[serde(default)]
    pub upcoming: bool,
}

impl EventFeedQuery {
    fn filter(&self) -> EventFilter {
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        EventFilter {
            category: non_empty(&self.category),
            search: non_empty(&self.search),
            host_id: self.host_id,
            starts_after: self.upcoming.then(Utc::now),
        }
    }

    fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub category: Option<String>,
    pub start_time: Option<String>,
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i64,
    pub rsvp_count: i32,
    pub comments_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<EventModel> for EventResponse {
    fn from(e: EventModel) -> Self {
        Self {
            id: e.id,
            host_id: e.host_id,
            score: i64::from(e.upvotes_count) - i64::from(e.downvotes_count),
            title: e.title,
            description: e.description,
            location: e.location,
            category: e.category,
            start_time: e.start_time.map(|t| t.to_rfc3339()),
            upvotes: e.upvotes_count,
            downvotes: e.downvotes_count,
            rsvp_count: e.rsvp_count,
            comments_count: e.comments_count,
            created_at: e.created_at.to_rfc3339(),
            updated_at: e.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RsvpEntry {
    pub user_id: Uuid,
    pub status: RsvpStatus,
    pub created_at: String,
}

impl RsvpEntry {
    fn from_record(record: &ReactionRecord) -> Option<Self> {
        Some(Self {
            user_id: record.voter_id,
            status: RsvpStatus::parse(&record.kind)?,
            created_at: record.created_at.to_rfc3339(),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserRsvpResponse {
    pub status: RsvpStatus,
    pub rsvped_at: String,
    pub event: EventResponse,
}

#[utoipa::path(
    get,
    path = "/api/v1/events",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
        ("category" = Option<String>, Query, description = "Exact category"),
        ("search" = Option<String>, Query, description = "Substring of title or description"),
        ("host_id" = Option<Uuid>, Query, description = "Events hosted by this user"),
        ("upcoming" = Option<bool>, Query, description = "Only events not yet started, soonest first"),
    ),
    responses(
        (status = 200, description = "Event feed, newest first", body = PaginatedResponse<EventResponse>),
    ),
    tag = "events"
)]
pub async fn list_events(
    Extension(store): Extension<SharedStore>,
    Query(params): Query<EventFeedQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = params.pagination().resolve(MAX_PER_PAGE);

    let service = EventService::new(store);
    let (events, total) = service.feed(&params.filter(), page, per_page).await?;

    let items: Vec<EventResponse> = events.into_iter().map(EventResponse::from).collect();
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event details", body = EventResponse),
        (status = 404, description = "Event not found", body = AppError),
    ),
    tag = "events"
)]
pub async fn get_event(
    Extension(store): Extension<SharedStore>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = EventService::new(store);
    let event = service.get(id).await?;
    Ok(ApiResponse::ok(EventResponse::from(event)))
}

#[utoipa::path(
    post,
    path = "/api/v1/events",
    security(("jwt_token" = [])),
    request_body = EventRequest,
    responses(
        (status = 200, description = "Event created", body = EventResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "events"
)]
pub async fn create_event(
    Extension(store): Extension<SharedStore>,
    auth_user: AuthUser,
    Json(payload): Json<EventRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = EventService::new(store);
    let event = service.create(auth_user.user_id, payload.into()).await?;
    Ok(ApiResponse::ok(EventResponse::from(event)))
}

#[utoipa::path(
    put,
    path = "/api/v1/events/{id}",
    security(("jwt_token" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = EventRequest,
    responses(
        (status = 200, description = "Event updated", body = EventResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Not the host", body = AppError),
        (status = 404, description = "Event not found", body = AppError),
    ),
    tag = "events"
)]
pub async fn update_event(
    Extension(store): Extension<SharedStore>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<EventRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = EventService::new(store);
    let event = service.update(id, auth_user.user_id, payload.into()).await?;
    Ok(ApiResponse::ok(EventResponse::from(event)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    security(("jwt_token" = [])),
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event deleted"),
        (status = 403, description = "Not the host", body = AppError),
        (status = 404, description = "Event not found", body = AppError),
    ),
    tag = "events"
)]
pub async fn delete_event(
    Extension(store): Extension<SharedStore>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = EventService::new(store);
    service.delete(id, auth_user.user_id).await?;
    Ok(ApiResponse::ok(()).with_message("Event deleted"))
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/rsvps",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "RSVPs on the event, oldest first", body = Vec<RsvpEntry>),
        (status = 404, description = "Event not found", body = AppError),
    ),
    tag = "rsvps"
)]
pub async fn list_event_rsvps(
    Extension(store): Extension<SharedStore>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = EventService::new(store);
    let entries: Vec<RsvpEntry> = service
        .rsvps(id)
        .await?
        .iter()
        .filter_map(RsvpEntry::from_record)
        .collect();
    Ok(ApiResponse::ok(entries))
}

#[utoipa::path(
    get,
    path = "/api/v1/me/rsvps",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Caller's RSVPs with their events", body = Vec<UserRsvpResponse>),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "rsvps"
)]
pub async fn list_my_rsvps(
    Extension(store): Extension<SharedStore>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let service = EventService::new(store);
    let items: Vec<UserRsvpResponse> = service
        .user_rsvps(auth_user.user_id)
        .await?
        .into_iter()
        .filter_map(|(record, event)| {
            Some(UserRsvpResponse {
                status: RsvpStatus::parse(&record.kind)?,
                rsvped_at: record.created_at.to_rfc3339(),
                event: EventResponse::from(event),
            })
        })
        .collect();
    Ok(ApiResponse::ok(items))
}
