use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::{
    models::{AccidentEvent, NewReading, SensorReading},
    select_sql, ListQuery, RecordFilter, SortOrder, Store, StoreError, Table, READING_COLUMNS,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations/postgres").run(&self.pool).await?;
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
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
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
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
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
        let sql = format!("SELECT {READING_COLUMNS} FROM accident_events WHERE id = $1");
        let row = sqlx::query_as::<_, AccidentEvent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

// ---------------------------------------------------------------------------
// Tests (need a Postgres DATABASE_URL; run with `cargo test -- --ignored`)
// ---------------------------------------------------------------------------
