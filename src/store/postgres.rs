//! PostgreSQL implementation of the store traits.
//!
//! Events and comments go through their sea-orm entities. Reaction records
//! and counters are addressed through [`ReactionTable`] descriptors, so they
//! use raw statements with table and column names taken from those static
//! descriptors and every value bound as a parameter.

use async_trait::async_trait;
use sea_orm::{
    sea_query::{extension::postgres::PgExpr, Expr},
    ActiveModelTrait,
    ActiveValue::{Set, Unchanged},
    ColumnTrait, Condition, ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QueryResult, Select, Statement,
};
use tracing::instrument;
use uuid::Uuid;

use super::{CommentStore, EventFilter, EventStore, ReactionStore, StoreError, StoreResult};
use crate::models::{
    comment, event, Comment, CommentModel, CounterColumn, Event, EventModel, NewReaction,
    ReactionRecord, ReactionTable,
};

#[derive(Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn statement(sql: &str, values: Vec<sea_orm::Value>) -> Statement {
        Statement::from_sql_and_values(DatabaseBackend::Postgres, sql, values)
    }
}

fn record_columns(table: &ReactionTable) -> String {
    format!(
        "id, {target} AS target_id, user_id, {kind} AS kind, created_at, updated_at",
        target = table.record_target_column,
        kind = table.record_kind_column,
    )
}

fn record_from_row(row: &QueryResult) -> StoreResult<ReactionRecord> {
    Ok(ReactionRecord {
        id: row.try_get("", "id")?,
        target_id: row.try_get("", "target_id")?,
        voter_id: row.try_get("", "user_id")?,
        kind: row.try_get("", "kind")?,
        created_at: row.try_get("", "created_at")?,
        updated_at: row.try_get("", "updated_at")?,
    })
}

fn filtered_events(filter: &EventFilter) -> Select<Event> {
    let mut query = Event::find();
    if let Some(category) = &filter.category {
        query = query.filter(event::Column::Category.eq(category.as_str()));
    }
    if let Some(host_id) = filter.host_id {
        query = query.filter(event::Column::HostId.eq(host_id));
    }
    if let Some(term) = &filter.search {
        let pattern = format!("%{}%", escape_like(term));
        query = query.filter(
            Condition::any()
                .add(Expr::col(event::Column::Title).ilike(pattern.as_str()))
                .add(Expr::col(event::Column::Description).ilike(pattern.as_str())),
        );
    }
    match filter.starts_after {
        Some(after) => query
            .filter(event::Column::StartTime.gte(after))
            .order_by_asc(event::Column::StartTime),
        None => query.order_by_desc(event::Column::CreatedAt),
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn counter_value(row: Option<QueryResult>) -> StoreResult<i64> {
    let row = row.ok_or(StoreError::NotFound)?;
    let value: i32 = row.try_get("", "value")?;
    Ok(i64::from(value))
}

fn to_column_value(value: i64) -> i32 {
    value.clamp(0, i64::from(i32::MAX)) as i32
}

#[async_trait]
impl ReactionStore for PgStore {
    #[instrument(skip(self, table), fields(table = table.target_table))]
    async fn target_exists(&self, table: &ReactionTable, target_id: Uuid) -> StoreResult<bool> {
        let sql = format!(
            "SELECT 1 AS present FROM {} WHERE {} = $1",
            table.target_table, table.target_key
        );
        let row = self
            .db
            .query_one(Self::statement(&sql, vec![target_id.into()]))
            .await?;
        Ok(row.is_some())
    }

    #[instrument(skip(self, table), fields(table = table.record_table))]
    async fn find_reaction(
        &self,
        table: &ReactionTable,
        target_id: Uuid,
        voter_id: Uuid,
    ) -> StoreResult<Option<ReactionRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 AND user_id = $2 LIMIT 1",
            record_columns(table),
            table.record_table,
            table.record_target_column
        );
        let row = self
            .db
            .query_one(Self::statement(&sql, vec![target_id.into(), voter_id.into()]))
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    #[instrument(skip(self, table), fields(table = table.record_table))]
    async fn insert_reaction(
        &self,
        table: &ReactionTable,
        reaction: &NewReaction,
    ) -> StoreResult<ReactionRecord> {
        let sql = format!(
            "INSERT INTO {} (id, {}, user_id, {}, created_at)
             VALUES ($1, $2, $3, $4, NOW())
             RETURNING {}",
            table.record_table,
            table.record_target_column,
            table.record_kind_column,
            record_columns(table)
        );
        let row = self
            .db
            .query_one(Self::statement(
                &sql,
                vec![
                    Uuid::new_v4().into(),
                    reaction.target_id.into(),
                    reaction.voter_id.into(),
                    reaction.kind.clone().into(),
                ],
            ))
            .await?
            .ok_or_else(|| StoreError::Backend("insert returned no row".to_string()))?;
        record_from_row(&row)
    }

    #[instrument(skip(self, table), fields(table = table.record_table))]
    async fn update_reaction_kind(
        &self,
        table: &ReactionTable,
        record_id: Uuid,
        kind: &str,
    ) -> StoreResult<ReactionRecord> {
        let sql = format!(
            "UPDATE {} SET {} = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            table.record_table,
            table.record_kind_column,
            record_columns(table)
        );
        let row = self
            .db
            .query_one(Self::statement(&sql, vec![kind.into(), record_id.into()]))
            .await?
            .ok_or(StoreError::NotFound)?;
        record_from_row(&row)
    }

    #[instrument(skip(self, table), fields(table = table.record_table))]
    async fn delete_reaction(&self, table: &ReactionTable, record_id: Uuid) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", table.record_table);
        self.db
            .execute(Self::statement(&sql, vec![record_id.into()]))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, table), fields(table = table.record_table))]
    async fn delete_reactions_for_target(
        &self,
        table: &ReactionTable,
        target_id: Uuid,
    ) -> StoreResult<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            table.record_table, table.record_target_column
        );
        let result = self
            .db
            .execute(Self::statement(&sql, vec![target_id.into()]))
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, table))]
    async fn recount_counter(
        &self,
        table: &ReactionTable,
        counter: &CounterColumn,
        target_id: Uuid,
        kind: &str,
    ) -> StoreResult<(i64, i64)> {
        let sql = format!(
            "WITH prev AS (
                 SELECT {col} AS cached FROM {target} WHERE {key} = $1 FOR UPDATE
             ), live AS (
                 SELECT COUNT(*) AS actual FROM {records} WHERE {record_target} = $1 AND {kind_col} = $2
             )
             UPDATE {target} SET {col} = LEAST(live.actual, 2147483647)::int
             FROM prev, live
             WHERE {target}.{key} = $1
             RETURNING prev.cached AS cached, live.actual AS actual",
            col = counter.column,
            target = counter.table,
            key = counter.key,
            records = table.record_table,
            record_target = table.record_target_column,
            kind_col = table.record_kind_column,
        );
        let row = self
            .db
            .query_one(Self::statement(&sql, vec![target_id.into(), kind.into()]))
            .await?
            .ok_or(StoreError::NotFound)?;
        let cached: i32 = row.try_get("", "cached")?;
        let actual: i64 = row.try_get("", "actual")?;
        Ok((i64::from(cached), actual))
    }

    #[instrument(skip(self, table), fields(table = table.record_table))]
    async fn list_reactions(
        &self,
        table: &ReactionTable,
        target_id: Uuid,
    ) -> StoreResult<Vec<ReactionRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY created_at ASC",
            record_columns(table),
            table.record_table,
            table.record_target_column
        );
        let rows = self
            .db
            .query_all(Self::statement(&sql, vec![target_id.into()]))
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    #[instrument(skip(self, table), fields(table = table.record_table))]
    async fn list_reactions_by_voter(
        &self,
        table: &ReactionTable,
        voter_id: Uuid,
    ) -> StoreResult<Vec<ReactionRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = $1 ORDER BY created_at DESC",
            record_columns(table),
            table.record_table
        );
        let rows = self
            .db
            .query_all(Self::statement(&sql, vec![voter_id.into()]))
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn target_ids(&self, table: &ReactionTable) -> StoreResult<Vec<Uuid>> {
        let sql = format!(
            "SELECT {key} AS id FROM {table} ORDER BY {key}",
            key = table.target_key,
            table = table.target_table
        );
        let rows = self.db.query_all(Self::statement(&sql, vec![])).await?;
        rows.iter()
            .map(|row| row.try_get("", "id").map_err(StoreError::from))
            .collect()
    }

    #[instrument(skip(self))]
    async fn increment_counter(
        &self,
        counter: &CounterColumn,
        target_id: Uuid,
        delta: i64,
    ) -> StoreResult<i64> {
        let sql = format!(
            "UPDATE {table} SET {col} = GREATEST({col} + $1, 0) WHERE {key} = $2 RETURNING {col} AS value",
            table = counter.table,
            col = counter.column,
            key = counter.key
        );
        let delta = delta.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        let row = self
            .db
            .query_one(Self::statement(&sql, vec![delta.into(), target_id.into()]))
            .await?;
        counter_value(row)
    }

    #[instrument(skip(self))]
    async fn read_counter(&self, counter: &CounterColumn, target_id: Uuid) -> StoreResult<i64> {
        let sql = format!(
            "SELECT {col} AS value FROM {table} WHERE {key} = $1",
            table = counter.table,
            col = counter.column,
            key = counter.key
        );
        let row = self
            .db
            .query_one(Self::statement(&sql, vec![target_id.into()]))
            .await?;
        counter_value(row)
    }

    #[instrument(skip(self))]
    async fn write_counter(
        &self,
        counter: &CounterColumn,
        target_id: Uuid,
        value: i64,
    ) -> StoreResult<()> {
        let sql = format!(
            "UPDATE {table} SET {col} = $1 WHERE {key} = $2",
            table = counter.table,
            col = counter.column,
            key = counter.key
        );
        let result = self
            .db
            .execute(Self::statement(
                &sql,
                vec![to_column_value(value).into(), target_id.into()],
            ))
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn list_events(
        &self,
        filter: &EventFilter,
        page: u64,
        per_page: u64,
    ) -> StoreResult<(Vec<EventModel>, u64)> {
        let paginator = filtered_events(filter).paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    async fn find_event(&self, id: Uuid) -> StoreResult<Option<EventModel>> {
        Ok(Event::find_by_id(id).one(&self.db).await?)
    }

    async fn insert_event(&self, model: EventModel) -> StoreResult<EventModel> {
        let active = event::ActiveModel {
            id: Set(model.id),
            host_id: Set(model.host_id),
            title: Set(model.title),
            description: Set(model.description),
            location: Set(model.location),
            category: Set(model.category),
            start_time: Set(model.start_time),
            upvotes_count: Set(model.upvotes_count),
            downvotes_count: Set(model.downvotes_count),
            rsvp_count: Set(model.rsvp_count),
            comments_count: Set(model.comments_count),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        };
        Ok(active.insert(&self.db).await?)
    }

    async fn update_event(&self, model: &EventModel) -> StoreResult<EventModel> {
        let active = event::ActiveModel {
            id: Unchanged(model.id),
            title: Set(model.title.clone()),
            description: Set(model.description.clone()),
            location: Set(model.location.clone()),
            category: Set(model.category.clone()),
            start_time: Set(model.start_time),
            updated_at: Set(model.updated_at),
            ..Default::default()
        };
        Ok(active.update(&self.db).await?)
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<()> {
        // Comments, votes and RSVPs go with it through ON DELETE CASCADE.
        let result = Event::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn list_comments(&self, event_id: Uuid) -> StoreResult<Vec<CommentModel>> {
        let comments = Comment::find()
            .filter(comment::Column::EventId.eq(event_id))
            .order_by_asc(comment::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(comments)
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<CommentModel>> {
        Ok(Comment::find_by_id(id).one(&self.db).await?)
    }

    async fn insert_comment(&self, model: CommentModel) -> StoreResult<CommentModel> {
        let active = comment::ActiveModel {
            id: Set(model.id),
            event_id: Set(model.event_id),
            author_id: Set(model.author_id),
            parent_id: Set(model.parent_id),
            content: Set(model.content),
            upvotes_count: Set(model.upvotes_count),
            downvotes_count: Set(model.downvotes_count),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        };
        Ok(active.insert(&self.db).await?)
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<()> {
        let result = Comment::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
