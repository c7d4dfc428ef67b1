use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::{AccidentEvent, Measurements, SensorReading};

/// Speed reported alongside every vehicle position, in km/h.
/// The device does not measure speed yet.
pub const REPORTED_SPEED_KMH: f64 = 42.0;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SensorReadingDto {
    pub id: i64,
    #[serde(flatten)]
    pub measurements: Measurements,
    /// Server-assigned write time.
    pub timestamp: DateTime<Utc>,
}

impl From<SensorReading> for SensorReadingDto {
    fn from(r: SensorReading) -> Self {
        Self {
            id: r.id,
            measurements: r.measurements,
            timestamp: r.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccidentEventDto {
    pub id: String,
    #[serde(flatten)]
    pub measurements: Measurements,
    pub timestamp: DateTime<Utc>,
}

impl From<AccidentEvent> for AccidentEventDto {
    fn from(e: AccidentEvent) -> Self {
        Self {
            id: e.id,
            measurements: e.measurements,
            timestamp: e.recorded_at,
        }
    }
}

/// One accident marker for the dashboard map.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MapPointDto {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

impl MapPointDto {
    /// `None` when the event carries no location.
    pub fn from_event(e: AccidentEvent) -> Option<Self> {
        let (lat, lng) = e.measurements.position()?;
        Some(Self {
            id: e.id,
            lat,
            lng,
            timestamp: e.recorded_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CarPositionDto {
    pub lat: f64,
    pub lng: f64,
    /// km/h
    pub speed: f64,
}

impl CarPositionDto {
    pub fn from_reading(r: &SensorReading) -> Option<Self> {
        let (lat, lng) = r.measurements.position()?;
        Some(Self {
            lat,
            lng,
            speed: REPORTED_SPEED_KMH,
        })
    }
}

/// Aggregates over every stored accident event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatsDto {
    pub total_accidents: usize,
    pub max_alcohol: f64,
    pub avg_alcohol: f64,
    pub max_impact: f64,
    /// Accidents where the seatbelt was not fastened.
    pub seatbelt_violations: usize,
    /// Number of stored sensor readings.
    pub total_sensor_points: usize,
}

impl StatsDto {
    /// Maxima and averages are `0.0` when there are no accidents.
    pub fn compute(accidents: &[AccidentEvent], total_sensor_points: usize) -> Self {
        let max_of = |f: fn(&Measurements) -> f64| {
            accidents
                .iter()
                .map(|a| f(&a.measurements))
                .reduce(f64::max)
                .unwrap_or(0.0)
        };

        let avg_alcohol = if accidents.is_empty() {
            0.0
        } else {
            let sum: f64 = accidents.iter().map(|a| a.measurements.alcohol).sum();
            sum / accidents.len() as f64
        };

        Self {
            total_accidents: accidents.len(),
            max_alcohol: max_of(|m| m.alcohol),
            avg_alcohol,
            max_impact: max_of(|m| m.impact),
            seatbelt_violations: accidents
                .iter()
                .filter(|a| !a.measurements.seatbelt)
                .count(),
            total_sensor_points,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthDto {
    pub status: String,
    pub time: DateTime<Utc>,
}

/// Acknowledgement for `POST /api/sensor` and `POST /api/sensor/http`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorCreatedDto {
    pub status: String,
    pub id: i64,
}

/// Acknowledgement for `POST /api/accident`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccidentCreatedDto {
    pub status: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDto {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accident(alcohol: f64, impact: f64, seatbelt: bool) -> AccidentEvent {
        AccidentEvent {
            id: format!("acc{alcohol}"),
            measurements: Measurements {
                alcohol,
                vibration: 0.5,
                distance: 20.0,
                seatbelt,
                impact,
                lat: None,
                lng: None,
                lcd_display: None,
                heart_rate: None,
            },
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn stats_of_nothing_are_zero() {
        let stats = StatsDto::compute(&[], 0);
        assert_eq!(
            stats,
            StatsDto {
                total_accidents: 0,
                max_alcohol: 0.0,
                avg_alcohol: 0.0,
                max_impact: 0.0,
                seatbelt_violations: 0,
                total_sensor_points: 0,
            }
        );
    }

    #[test]
    fn stats_aggregate_accidents() {
        let accidents = [
            accident(0.1, 0.5, true),
            accident(0.3, 0.9, false),
            accident(0.2, 0.7, false),
        ];
        let stats = StatsDto::compute(&accidents, 42);

        assert_eq!(stats.total_accidents, 3);
        assert_eq!(stats.max_alcohol, 0.3);
        assert!((stats.avg_alcohol - 0.2).abs() < 1e-9);
        assert_eq!(stats.max_impact, 0.9);
        assert_eq!(stats.seatbelt_violations, 2);
        assert_eq!(stats.total_sensor_points, 42);
    }

    #[test]
    fn stats_max_keeps_negative_values() {
        let stats = StatsDto::compute(&[accident(-0.4, -1.0, true)], 0);
        assert_eq!(stats.max_alcohol, -0.4);
        assert_eq!(stats.max_impact, -1.0);
    }

    #[test]
    fn map_point_requires_location() {
        let mut event = accident(0.1, 0.5, true);
        assert!(MapPointDto::from_event(event.clone()).is_none());

        event.measurements.lat = Some(5.65);
        event.measurements.lng = Some(-0.18);
        let point = MapPointDto::from_event(event).unwrap();
        assert_eq!((point.lat, point.lng), (5.65, -0.18));
    }

    #[test]
    fn sensor_reading_serializes_flat_with_timestamp() {
        let dto = SensorReadingDto {
            id: 7,
            measurements: accident(0.05, 0.1, true).measurements,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&dto).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["alcohol"], 0.05);
        assert_eq!(json["seatbelt"], true);
        assert!(json["lat"].is_null());
        assert!(json["timestamp"].is_string());
        assert!(json.get("measurements").is_none());
    }
}
