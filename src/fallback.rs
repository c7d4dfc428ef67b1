//! Placeholder payloads served by the dashboard read endpoints when the
//! store cannot produce data.
//!
//! The values are fixed demo data, not derived from anything stored, and are
//! returned with `200 OK`. Clients cannot tell them apart from live data by
//! status code.

use std::fmt;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::{
    api::dto::{
        AccidentEventDto, CarPositionDto, MapPointDto, SensorReadingDto, StatsDto,
        REPORTED_SPEED_KMH,
    },
    db::models::Measurements,
};

/// University of Ghana, Legon.
const HOME_POSITION: (f64, f64) = (5.6545, -0.1869);

/// Read endpoints that answer with a placeholder instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEndpoint {
    Stats,
    LatestSensor,
    Map,
    Accidents,
    CarPosition,
}

impl fmt::Display for ReadEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stats => "stats",
            Self::LatestSensor => "sensor",
            Self::Map => "map",
            Self::Accidents => "accidents",
            Self::CarPosition => "car_position",
        };
        f.write_str(s)
    }
}

/// Same JSON shape as the corresponding success response.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FallbackPayload {
    Stats(StatsDto),
    Sensor(SensorReadingDto),
    Map(Vec<MapPointDto>),
    Accidents(Vec<AccidentEventDto>),
    CarPosition(CarPositionDto),
}

impl IntoResponse for FallbackPayload {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub fn on_storage_failure(endpoint: ReadEndpoint) -> FallbackPayload {
    match endpoint {
        ReadEndpoint::Stats => FallbackPayload::Stats(StatsDto {
            total_accidents: 5,
            max_alcohol: 0.8,
            avg_alcohol: 0.3,
            max_impact: 0.9,
            seatbelt_violations: 2,
            total_sensor_points: 120,
        }),
        ReadEndpoint::LatestSensor => FallbackPayload::Sensor(SensorReadingDto {
            id: 1,
            measurements: Measurements {
                alcohol: 0.05,
                vibration: 0.2,
                distance: 150.0,
                seatbelt: true,
                impact: 0.1,
                lat: None,
                lng: None,
                lcd_display: Some("SYSTEM OK".to_owned()),
                heart_rate: Some(75.0),
            },
            timestamp: Utc::now(),
        }),
        ReadEndpoint::Map => FallbackPayload::Map(
            [
                ("abc123", 5.6545, -0.1869, 1),
                ("def456", 5.6540, -0.1875, 2),
                ("ghi789", 5.6550, -0.1880, 3),
            ]
            .into_iter()
            .map(|(id, lat, lng, days_ago)| MapPointDto {
                id: id.to_owned(),
                lat,
                lng,
                timestamp: Utc::now() - Duration::days(days_ago),
            })
            .collect(),
        ),
        ReadEndpoint::Accidents => FallbackPayload::Accidents(vec![
            demo_accident("abc123", 0.02, 0.8, 20.0, true, 0.9, (5.6545, -0.1869), 1),
            demo_accident("def456", 0.04, 0.7, 15.0, false, 0.8, (5.6540, -0.1875), 2),
        ]),
        ReadEndpoint::CarPosition => FallbackPayload::CarPosition(CarPositionDto {
            lat: HOME_POSITION.0,
            lng: HOME_POSITION.1,
            speed: REPORTED_SPEED_KMH,
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn demo_accident(
    id: &str,
    alcohol: f64,
    vibration: f64,
    distance: f64,
    seatbelt: bool,
    impact: f64,
    (lat, lng): (f64, f64),
    days_ago: i64,
) -> AccidentEventDto {
    AccidentEventDto {
        id: id.to_owned(),
        measurements: Measurements {
            alcohol,
            vibration,
            distance,
            seatbelt,
            impact,
            lat: Some(lat),
            lng: Some(lng),
            lcd_display: Some("ACCIDENT DETECTED".to_owned()),
            heart_rate: None,
        },
        timestamp: Utc::now() - Duration::days(days_ago),
    }
}
