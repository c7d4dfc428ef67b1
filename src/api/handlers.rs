use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use utoipa::OpenApi;

use super::{
    dto::{
        AccidentCreatedDto, AccidentEventDto, CarPositionDto, ErrorDto, HealthDto, MapPointDto,
        SensorCreatedDto, SensorReadingDto, StatsDto,
    },
    errors::ApiError,
    validation, AppState,
};
use crate::{
    db::{
        models::{new_accident_id, Measurements, NewReading},
        ListQuery, RecordFilter, StoreError,
    },
    fallback::{self, ReadEndpoint},
};

/// Upper bound on `GET /api/sensor/history`.
pub const HISTORY_LIMIT: u32 = 1000;

const INVALID_SENSOR_DATA: &str = "Invalid sensor data";
const INVALID_ACCIDENT_DATA: &str = "Invalid accident data";

// ---------------------------------------------------------------------------
// Fallback plumbing
// ---------------------------------------------------------------------------

/// Serializes `result`, or substitutes the endpoint's placeholder payload
/// when the store failed or had nothing to return.
fn respond_or_fallback<T: Serialize>(
    endpoint: ReadEndpoint,
    result: Result<Option<T>, StoreError>,
) -> Response {
    match result {
        Ok(Some(body)) => Json(body).into_response(),
        Ok(None) => {
            warn!(endpoint = %endpoint, "No data found; serving fallback payload");
            fallback::on_storage_failure(endpoint).into_response()
        }
        Err(e) => {
            error!(endpoint = %endpoint, error = %e, "Database error; serving fallback payload");
            fallback::on_storage_failure(endpoint).into_response()
        }
    }
}

fn parse_body(
    body: Result<Json<Value>, JsonRejection>,
    invalid: &'static str,
) -> Result<Measurements, ApiError> {
    let Json(payload) = body.map_err(|e| {
        debug!(error = %e, "Rejected unreadable JSON body");
        ApiError::Validation(invalid)
    })?;
    validation::parse_reading(payload).ok_or(ApiError::Validation(invalid))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is running", body = HealthDto),
    ),
    tag = "system"
)]
pub async fn health() -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok".to_owned(),
        time: Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Dashboard reads
// ---------------------------------------------------------------------------

/// Aggregate statistics over every stored accident event.
#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Aggregates, or placeholder numbers if the store is unavailable", body = StatsDto),
    ),
    tag = "dashboard"
)]
pub async fn get_stats(State(state): State<AppState>) -> Response {
    let result = async {
        let accidents = state.store.accident_events(ListQuery::default()).await?;
        let sensors = state.store.sensor_readings(ListQuery::default()).await?;
        Ok::<_, StoreError>(Some(StatsDto::compute(&accidents, sensors.len())))
    }
    .await;

    respond_or_fallback(ReadEndpoint::Stats, result)
}

/// Most recent sensor reading.
#[utoipa::path(
    get,
    path = "/api/sensor",
    responses(
        (status = 200, description = "Latest reading, or a placeholder reading", body = SensorReadingDto),
    ),
    tag = "sensors"
)]
pub async fn get_latest_sensor(State(state): State<AppState>) -> Response {
    let result = state
        .store
        .latest_sensor_reading(RecordFilter::All)
        .await
        .map(|r| r.map(SensorReadingDto::from));

    respond_or_fallback(ReadEndpoint::LatestSensor, result)
}

/// Accident locations for the map view.
#[utoipa::path(
    get,
    path = "/api/map",
    responses(
        (status = 200, description = "Located accident events", body = Vec<MapPointDto>),
    ),
    tag = "dashboard"
)]
pub async fn get_map(State(state): State<AppState>) -> Response {
    let result = state
        .store
        .accident_events(ListQuery::default().with_coordinates())
        .await
        .map(|events| {
            Some(
                events
                    .into_iter()
                    .filter_map(MapPointDto::from_event)
                    .collect::<Vec<_>>(),
            )
        });

    respond_or_fallback(ReadEndpoint::Map, result)
}

/// Every accident event, newest first.
#[utoipa::path(
    get,
    path = "/api/accidents",
    responses(
        (status = 200, description = "Accident events", body = Vec<AccidentEventDto>),
    ),
    tag = "accidents"
)]
pub async fn get_accidents(State(state): State<AppState>) -> Response {
    let result = state
        .store
        .accident_events(ListQuery::newest_first())
        .await
        .map(|events| {
            Some(
                events
                    .into_iter()
                    .map(AccidentEventDto::from)
                    .collect::<Vec<_>>(),
            )
        });

    respond_or_fallback(ReadEndpoint::Accidents, result)
}

/// Position from the most recent located sensor reading.
#[utoipa::path(
    get,
    path = "/api/car/position",
    responses(
        (status = 200, description = "Vehicle position", body = CarPositionDto),
    ),
    tag = "dashboard"
)]
pub async fn get_car_position(State(state): State<AppState>) -> Response {
    let result = state
        .store
        .latest_sensor_reading(RecordFilter::WithCoordinates)
        .await
        .map(|r| r.as_ref().and_then(CarPositionDto::from_reading));

    respond_or_fallback(ReadEndpoint::CarPosition, result)
}

/// Up to 1000 most recent sensor readings, newest first.
#[utoipa::path(
    get,
    path = "/api/sensor/history",
    responses(
        (status = 200, description = "Sensor readings", body = Vec<SensorReadingDto>),
        (status = 500, description = "Database error", body = ErrorDto),
    ),
    tag = "sensors"
)]
pub async fn get_sensor_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<SensorReadingDto>>, ApiError> {
    let rows = state
        .store
        .sensor_readings(ListQuery::newest_first().limit(HISTORY_LIMIT))
        .await?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// A single accident event.
#[utoipa::path(
    get,
    path = "/api/accident/{id}",
    params(
        ("id" = String, Path, description = "Accident id returned by POST /api/accident"),
    ),
    responses(
        (status = 200, description = "Accident event", body = AccidentEventDto),
        (status = 404, description = "No event with this id", body = ErrorDto),
        (status = 500, description = "Database error", body = ErrorDto),
    ),
    tag = "accidents"
)]
pub async fn get_accident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccidentEventDto>, ApiError> {
    let event = state
        .store
        .accident_event(&id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(event.into()))
}

// ---------------------------------------------------------------------------
// Device writes
// ---------------------------------------------------------------------------

/// Store one telemetry sample. Served on both `/api/sensor` and
/// `/api/sensor/http`.
#[utoipa::path(
    post,
    path = "/api/sensor",
    request_body = Measurements,
    params(
        ("X-API-Key" = Option<String>, Header, description = "Shared device secret"),
        ("api_key" = Option<String>, Query, description = "Shared device secret, if no header is sent"),
    ),
    responses(
        (status = 200, description = "Reading stored", body = SensorCreatedDto),
        (status = 400, description = "Invalid sensor data", body = ErrorDto),
        (status = 401, description = "Missing or wrong API key", body = ErrorDto),
        (status = 500, description = "Database error", body = ErrorDto),
    ),
    tag = "sensors"
)]
pub async fn create_sensor_reading(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SensorCreatedDto>, ApiError> {
    if let Ok(Json(payload)) = &body {
        debug!(path = %uri.path(), payload = %payload, "Received sensor reading");
    }
    let measurements = parse_body(body, INVALID_SENSOR_DATA)?;

    let reading = state
        .store
        .insert_sensor_reading(&NewReading::stamped(measurements, Utc::now()))
        .await?;
    info!(id = reading.id, path = %uri.path(), "Sensor reading stored");

    Ok(Json(SensorCreatedDto {
        status: "ok".to_owned(),
        id: reading.id,
    }))
}

/// Store an accident event under a freshly generated id.
#[utoipa::path(
    post,
    path = "/api/accident",
    request_body = Measurements,
    params(
        ("X-API-Key" = Option<String>, Header, description = "Shared device secret"),
        ("api_key" = Option<String>, Query, description = "Shared device secret, if no header is sent"),
    ),
    responses(
        (status = 200, description = "Accident stored", body = AccidentCreatedDto),
        (status = 400, description = "Invalid accident data", body = ErrorDto),
        (status = 401, description = "Missing or wrong API key", body = ErrorDto),
        (status = 500, description = "Database error", body = ErrorDto),
    ),
    tag = "accidents"
)]
pub async fn create_accident_event(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AccidentCreatedDto>, ApiError> {
    let measurements = parse_body(body, INVALID_ACCIDENT_DATA)?;

    let now = Utc::now();
    let id = new_accident_id(now);
    let event = state
        .store
        .insert_accident_event(&id, &NewReading::stamped(measurements, now))
        .await?;
    warn!(id = %event.id, lat = ?event.measurements.lat, lng = ?event.measurements.lng, "Accident event stored");

    Ok(Json(AccidentCreatedDto {
        status: "ok".to_owned(),
        id: event.id,
    }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_stats,
        get_latest_sensor,
        get_map,
        get_accidents,
        get_car_position,
        get_sensor_history,
        get_accident,
        create_sensor_reading,
        create_accident_event,
    ),
    components(schemas(
        Measurements,
        SensorReadingDto,
        AccidentEventDto,
        MapPointDto,
        CarPositionDto,
        StatsDto,
        HealthDto,
        SensorCreatedDto,
        AccidentCreatedDto,
        ErrorDto,
    )),
    tags(
        (name = "sensors",   description = "Sensor telemetry"),
        (name = "accidents", description = "Accident events"),
        (name = "dashboard", description = "Dashboard views"),
        (name = "system",    description = "System endpoints"),
    ),
    info(
        title = "SafeDrive Telemetry API",
        version = "0.1.0",
        description = "Ingest and dashboard API for the SafeDrive vehicle monitor"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
