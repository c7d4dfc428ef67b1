use std::{path::Path, str::FromStr};

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use super::{
    models::{AccidentEvent, NewReading, SensorReading},
    select_sql, ListQuery, RecordFilter, SortOrder, Store, StoreError, Table, READING_COLUMNS,
};

/// Embedded, file-backed store used outside production.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database file at `path`.
    pub fn connect_lazy(path: &Path, max_connections: u32) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy_with(options);
        Self::new(pool)
    }

    /// A migrated, private in-memory database.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations/sqlite").run(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert_sensor_reading(
        &self,
        reading: &NewReading,
    ) -> Result<SensorReading, StoreError> {
        let sql = format!(
            "INSERT INTO sensor_readings \
                 (alcohol, vibration, distance, seatbelt, impact, \
                  lat, lng, lcd_display, heart_rate, recorded_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {READING_COLUMNS}"
        );
        let m = &reading.measurements;
        let row = sqlx::query_as::<_, SensorReading>(&sql)
            .bind(m.alcohol)
            .bind(m.vibration)
            .bind(m.distance)
            .bind(m.seatbelt)
            .bind(m.impact)
            .bind(m.lat)
            .bind(m.lng)
            .bind(m.lcd_display.as_deref())
            .bind(m.heart_rate)
            .bind(reading.recorded_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_accident_event(
        &self,
        id: &str,
        reading: &NewReading,
    ) -> Result<AccidentEvent, StoreError> {
        let sql = format!(
            "INSERT INTO accident_events \
                 (id, alcohol, vibration, distance, seatbelt, impact, \
                  lat, lng, lcd_display, heart_rate, recorded_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {READING_COLUMNS}"
        );
        let m = &reading.measurements;
        let row = sqlx::query_as::<_, AccidentEvent>(&sql)
            .bind(id)
            .bind(m.alcohol)
            .bind(m.vibration)
            .bind(m.distance)
            .bind(m.seatbelt)
            .bind(m.impact)
            .bind(m.lat)
            .bind(m.lng)
            .bind(m.lcd_display.as_deref())
            .bind(m.heart_rate)
            .bind(reading.recorded_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn latest_sensor_reading(
        &self,
        filter: RecordFilter,
    ) -> Result<Option<SensorReading>, StoreError> {
        let query = ListQuery {
            filter,
            order: SortOrder::NewestFirst,
            limit: Some(1),
        };
        let row = sqlx::query_as::<_, SensorReading>(&select_sql(Table::SensorReadings, query))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn sensor_readings(&self, query: ListQuery) -> Result<Vec<SensorReading>, StoreError> {
        let rows = sqlx::query_as::<_, SensorReading>(&select_sql(Table::SensorReadings, query))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn accident_events(&self, query: ListQuery) -> Result<Vec<AccidentEvent>, StoreError> {
        let rows = sqlx::query_as::<_, AccidentEvent>(&select_sql(Table::AccidentEvents, query))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn accident_event(&self, id: &str) -> Result<Option<AccidentEvent>, StoreError> {
        let sql = format!("SELECT {READING_COLUMNS} FROM accident_events WHERE id = ?");
        let row = sqlx::query_as::<_, AccidentEvent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::db::models::Measurements;

    fn measurements(alcohol: f64, position: Option<(f64, f64)>) -> Measurements {
        Measurements {
            alcohol,
            vibration: 0.2,
            distance: 150.0,
            seatbelt: true,
            impact: 0.1,
            lat: position.map(|p| p.0),
            lng: position.map(|p| p.1),
            lcd_display: None,
            heart_rate: None,
        }
    }

    #[tokio::test]
    async fn empty_store_has_no_latest_reading() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store
            .latest_sensor_reading(RecordFilter::All)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .sensor_readings(ListQuery::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        let a = store
            .insert_sensor_reading(&NewReading::stamped(measurements(0.1, None), now))
            .await
            .unwrap();
        let b = store
            .insert_sensor_reading(&NewReading::stamped(measurements(0.2, None), now))
            .await
            .unwrap();

        assert!(b.id > a.id);
        assert_eq!(a.measurements, measurements(0.1, None));
        assert_eq!(a.recorded_at, now);
    }

    #[tokio::test]
    async fn latest_with_coordinates_skips_unlocated_readings() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        for m in [
            measurements(0.1, Some((5.65, -0.18))),
            measurements(0.2, None),
        ] {
            store
                .insert_sensor_reading(&NewReading::stamped(m, now))
                .await
                .unwrap();
        }

        let any = store
            .latest_sensor_reading(RecordFilter::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(any.measurements.alcohol, 0.2);

        let located = store
            .latest_sensor_reading(RecordFilter::WithCoordinates)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(located.measurements.alcohol, 0.1);
    }

    #[tokio::test]
    async fn sensor_readings_newest_first_respects_limit() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        for alcohol in [0.1, 0.2, 0.3] {
            store
                .insert_sensor_reading(&NewReading::stamped(measurements(alcohol, None), now))
                .await
                .unwrap();
        }

        let rows = store
            .sensor_readings(ListQuery::newest_first().limit(2))
            .await
            .unwrap();
        let alcohol: Vec<f64> = rows.iter().map(|r| r.measurements.alcohol).collect();
        assert_eq!(alcohol, vec![0.3, 0.2]);
    }

    #[tokio::test]
    async fn accident_events_order_by_timestamp() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        store
            .insert_accident_event(
                "older",
                &NewReading::stamped(measurements(0.1, None), now - Duration::hours(1)),
            )
            .await
            .unwrap();
        store
            .insert_accident_event("newer", &NewReading::stamped(measurements(0.2, None), now))
            .await
            .unwrap();

        let newest: Vec<String> = store
            .accident_events(ListQuery::newest_first())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(newest, vec!["newer", "older"]);

        let oldest: Vec<String> = store
            .accident_events(ListQuery::default())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(oldest, vec!["older", "newer"]);
    }

    #[tokio::test]
    async fn accident_event_lookup_by_id() {
        let store = SqliteStore::in_memory().await.unwrap();
        let stored = store
            .insert_accident_event(
                "lozq1abcde",
                &NewReading::stamped(measurements(0.4, Some((5.6, -0.1))), Utc::now()),
            )
            .await
            .unwrap();

        assert_eq!(store.accident_event("lozq1abcde").await.unwrap(), Some(stored));
        assert!(store.accident_event("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_accident_id_is_a_storage_error() {
        let store = SqliteStore::in_memory().await.unwrap();
        let reading = NewReading::stamped(measurements(0.1, None), Utc::now());
        store.insert_accident_event("same", &reading).await.unwrap();

        let err = store.insert_accident_event("same", &reading).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn closed_pool_fails_every_operation() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.close().await;

        assert!(store.latest_sensor_reading(RecordFilter::All).await.is_err());
        assert!(store.accident_events(ListQuery::default()).await.is_err());
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .insert_sensor_reading(&NewReading::stamped(measurements(0.1, None), Utc::now()))
            .await
            .unwrap();

        store.migrate().await.unwrap();
        assert_eq!(
            store.sensor_readings(ListQuery::default()).await.unwrap().len(),
            1
        );
    }
}
