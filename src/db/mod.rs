pub mod models;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::StoreBackend;

use self::{
    models::{AccidentEvent, NewReading, SensorReading},
    postgres::PgStore,
    sqlite::SqliteStore,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

// ---------------------------------------------------------------------------
// Query shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFilter {
    #[default]
    All,
    /// Only records where both `lat` and `lng` are non-null.
    WithCoordinates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Insertion,
    NewestFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListQuery {
    pub filter: RecordFilter,
    pub order: SortOrder,
    pub limit: Option<u32>,
}

impl ListQuery {
    pub fn newest_first() -> Self {
        Self {
            order: SortOrder::NewestFirst,
            ..Self::default()
        }
    }

    pub fn with_coordinates(mut self) -> Self {
        self.filter = RecordFilter::WithCoordinates;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Persistence gateway for sensor readings and accident events.
///
/// Each method is one independent statement against the backing store.
/// Nothing is cached.
#[async_trait]
pub trait Store: Send + Sync {
    /// Creates any missing tables and indexes. Never drops data.
    async fn migrate(&self) -> Result<(), StoreError>;

    /// Closes the underlying pool. Every later operation fails.
    async fn close(&self);

    async fn insert_sensor_reading(&self, reading: &NewReading)
        -> Result<SensorReading, StoreError>;

    async fn insert_accident_event(
        &self,
        id: &str,
        reading: &NewReading,
    ) -> Result<AccidentEvent, StoreError>;

    /// Most recently inserted reading matching `filter`.
    async fn latest_sensor_reading(
        &self,
        filter: RecordFilter,
    ) -> Result<Option<SensorReading>, StoreError>;

    async fn sensor_readings(&self, query: ListQuery) -> Result<Vec<SensorReading>, StoreError>;

    async fn accident_events(&self, query: ListQuery) -> Result<Vec<AccidentEvent>, StoreError>;

    async fn accident_event(&self, id: &str) -> Result<Option<AccidentEvent>, StoreError>;
}

/// Builds the configured store. Pools connect lazily, so an unreachable
/// database surfaces on first use rather than here.
pub fn connect(backend: &StoreBackend, max_connections: u32) -> Result<Arc<dyn Store>, StoreError> {
    let store: Arc<dyn Store> = match backend {
        StoreBackend::Postgres { url } => Arc::new(PgStore::connect_lazy(url, max_connections)?),
        StoreBackend::Sqlite { path } => Arc::new(SqliteStore::connect_lazy(path, max_connections)),
    };
    Ok(store)
}

// ---------------------------------------------------------------------------
// SQL shared by both backends
// ---------------------------------------------------------------------------

pub(crate) const READING_COLUMNS: &str = "id, alcohol, vibration, distance, seatbelt, impact, \
     lat, lng, lcd_display, heart_rate, recorded_at";

#[derive(Debug, Clone, Copy)]
pub(crate) enum Table {
    SensorReadings,
    AccidentEvents,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::SensorReadings => "sensor_readings",
            Table::AccidentEvents => "accident_events",
        }
    }

    /// Sensor ids are monotonic; accident ids are random, so accidents sort
    /// by their server-assigned timestamp.
    fn order_by(self, order: SortOrder) -> &'static str {
        match (self, order) {
            (Table::SensorReadings, SortOrder::Insertion) => "id ASC",
            (Table::SensorReadings, SortOrder::NewestFirst) => "id DESC",
            (Table::AccidentEvents, SortOrder::Insertion) => "recorded_at ASC, id ASC",
            (Table::AccidentEvents, SortOrder::NewestFirst) => "recorded_at DESC, id DESC",
        }
    }
}

/// `SELECT` statement for a list query. Contains no bind parameters, so the
/// same text runs on Postgres and SQLite.
pub(crate) fn select_sql(table: Table, query: ListQuery) -> String {
    let mut sql = format!("SELECT {READING_COLUMNS} FROM {}", table.name());
    if query.filter == RecordFilter::WithCoordinates {
        sql.push_str(" WHERE lat IS NOT NULL AND lng IS NOT NULL");
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(table.order_by(query.order));
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_all_in_insertion_order() {
        let sql = select_sql(Table::SensorReadings, ListQuery::default());
        assert_eq!(
            sql,
            format!("SELECT {READING_COLUMNS} FROM sensor_readings ORDER BY id ASC")
        );
    }

    #[test]
    fn select_with_coordinates_newest_first_limited() {
        let sql = select_sql(
            Table::AccidentEvents,
            ListQuery::newest_first().with_coordinates().limit(10),
        );
        assert!(sql.contains("FROM accident_events"));
        assert!(sql.contains("WHERE lat IS NOT NULL AND lng IS NOT NULL"));
        assert!(sql.ends_with("ORDER BY recorded_at DESC, id DESC LIMIT 10"));
    }
}
