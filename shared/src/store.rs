//! Read access to calendar events.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::{Event, Result};

/// Source of candidate events for the reminder checks.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events whose calendar date equals `date`, soft-deleted rows excluded.
    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<Event>>;
}

/// Postgres-backed event store.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<Event>> {
        let events: Vec<Event> = sqlx::query_as(
            r#"
            SELECT
                id,
                title,
                COALESCE(description, '') AS description,
                date::date AS date,
                COALESCE(time, '') AS time,
                COALESCE(location, '') AS location,
                email,
                phone,
                reminder_day,
                reminder_day_before,
                is_all_day
            FROM events
            WHERE date::date = $1
            AND deleted_at IS NULL
            ORDER BY time ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
