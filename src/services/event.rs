use crate::{
    error::{AppError, AppResult},
    models::{EventModel, ReactionRecord, EVENT_RSVPS},
    store::{EventFilter, EventStore, ReactionStore, SharedStore},
};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

pub const MAX_PER_PAGE: u64 = 100;

/// Host-supplied event fields, used for both create and update.
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub category: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}

impl EventDraft {
    /// Trim text fields; blank optional fields become `None`.
    fn normalized(self) -> AppResult<Self> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Event title cannot be empty".to_string()));
        }
        Ok(Self {
            title,
            description: self.description.trim().to_string(),
            location: non_blank(self.location),
            category: non_blank(self.category),
            start_time: self.start_time,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct EventService {
    store: SharedStore,
}

impl EventService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Filtered feed. `page` is 1-based; `per_page` is clamped to `1..=MAX_PER_PAGE`.
    pub async fn feed(
        &self,
        filter: &EventFilter,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<EventModel>, u64)> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        self.store
            .list_events(filter, page, per_page)
            .await
            .map_err(AppError::from_store)
    }

    /// Events starting from now on, soonest first.
    pub async fn upcoming(&self, page: u64, per_page: u64) -> AppResult<(Vec<EventModel>, u64)> {
        let filter = EventFilter {
            starts_after: Some(Utc::now()),
            ..EventFilter::default()
        };
        self.feed(&filter, page, per_page).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<EventModel> {
        self.store
            .find_event(id)
            .await
            .map_err(AppError::from_store)?
            .ok_or(AppError::NotFound)
    }

    pub async fn create(&self, host_id: Uuid, draft: EventDraft) -> AppResult<EventModel> {
        let draft = draft.normalized()?;
        let now = Utc::now();
        let event = self
            .store
            .insert_event(EventModel {
                id: Uuid::new_v4(),
                host_id,
                title: draft.title,
                description: draft.description,
                location: draft.location,
                category: draft.category,
                start_time: draft.start_time,
                upvotes_count: 0,
                downvotes_count: 0,
                rsvp_count: 0,
                comments_count: 0,
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(AppError::from_store)?;

        info!(event_id = %event.id, host_id = %host_id, "Event created");
        Ok(event)
    }

    /// Replace the editable fields. Only the host may edit.
    pub async fn update(&self, id: Uuid, user_id: Uuid, draft: EventDraft) -> AppResult<EventModel> {
        let draft = draft.normalized()?;
        let existing = self.get(id).await?;
        if existing.host_id != user_id {
            return Err(AppError::Forbidden);
        }

        let edited = EventModel {
            title: draft.title,
            description: draft.description,
            location: draft.location,
            category: draft.category,
            start_time: draft.start_time,
            updated_at: Utc::now(),
            ..existing
        };
        self.store
            .update_event(&edited)
            .await
            .map_err(AppError::from_store)
    }

    /// Delete an event with everything attached to it. Only the host may delete.
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        let existing = self.get(id).await?;
        if existing.host_id != user_id {
            return Err(AppError::Forbidden);
        }

        self.store
            .delete_event(id)
            .await
            .map_err(AppError::from_store)?;

        info!(event_id = %id, host_id = %user_id, "Event deleted");
        Ok(())
    }

    /// RSVP records on one event, oldest first.
    pub async fn rsvps(&self, event_id: Uuid) -> AppResult<Vec<ReactionRecord>> {
        self.get(event_id).await?;
        self.store
            .list_reactions(&EVENT_RSVPS, event_id)
            .await
            .map_err(AppError::from_store)
    }

    /// A user's RSVPs with their events, newest RSVP first. RSVPs whose event
    /// has gone are skipped.
    pub async fn user_rsvps(&self, user_id: Uuid) -> AppResult<Vec<(ReactionRecord, EventModel)>> {
        let records = self
            .store
            .list_reactions_by_voter(&EVENT_RSVPS, user_id)
            .await
            .map_err(AppError::from_store)?;

        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let event = self
                .store
                .find_event(record.target_id)
                .await
                .map_err(AppError::from_store)?;
            if let Some(event) = event {
                out.push((record, event));
            }
        }
        Ok(out)
    }
}
