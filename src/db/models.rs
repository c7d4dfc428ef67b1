use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Number of random base-36 characters appended to an accident id.
const ACCIDENT_ID_SUFFIX_LEN: usize = 5;

/// The telemetry sample shared by sensor readings and accident events.
///
/// Column names match the JSON field names sent by the device.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Measurements {
    /// Breath alcohol level as reported by the sensor.
    pub alcohol: f64,
    pub vibration: f64,
    /// Distance to the nearest obstacle, in centimetres.
    pub distance: f64,
    pub seatbelt: bool,
    pub impact: f64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Text currently shown on the device's LCD.
    pub lcd_display: Option<String>,
    /// Beats per minute.
    pub heart_rate: Option<f64>,
}

impl Measurements {
    /// Both coordinates, if the sample carries a location.
    pub fn position(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lng)
    }
}

/// A validated sample stamped with its server-side write time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub measurements: Measurements,
    pub recorded_at: DateTime<Utc>,
}

impl NewReading {
    pub fn stamped(measurements: Measurements, recorded_at: DateTime<Utc>) -> Self {
        Self {
            measurements,
            recorded_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SensorReading {
    /// Store-assigned, increasing in insertion order.
    pub id: i64,
    #[sqlx(flatten)]
    pub measurements: Measurements,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AccidentEvent {
    /// Generated by [`new_accident_id`], never by the store.
    pub id: String,
    #[sqlx(flatten)]
    pub measurements: Measurements,
    pub recorded_at: DateTime<Utc>,
}

/// Builds an accident id: `now` in epoch milliseconds rendered in base 36,
/// followed by five random base-36 characters.
pub fn new_accident_id(now: DateTime<Utc>) -> String {
    let millis = u128::try_from(now.timestamp_millis()).unwrap_or_default();
    let mut id = to_base36(millis);

    let mut entropy = Uuid::new_v4().as_u128();
    for _ in 0..ACCIDENT_ID_SUFFIX_LEN {
        id.push(BASE36[(entropy % 36) as usize] as char);
        entropy /= 36;
    }
    id
}

fn to_base36(mut n: u128) -> String {
    if n == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
