//! Shape checks for telemetry payloads posted by the device.
//!
//! Only JSON types are checked. Values are not range-checked, so a negative
//! alcohol level is accepted as long as it is a number.

use serde_json::{Map, Value};

use crate::db::models::Measurements;

const REQUIRED_NUMBERS: [&str; 4] = ["alcohol", "vibration", "distance", "impact"];
const OPTIONAL_NUMBERS: [&str; 3] = ["lat", "lng", "heart_rate"];

/// Whether `payload` is an acceptable sensor reading or accident event.
///
/// Optional fields may be absent, but an explicit `null` is a type mismatch.
pub fn is_valid_reading(payload: &Value) -> bool {
    let Some(fields) = payload.as_object() else {
        return false;
    };

    REQUIRED_NUMBERS
        .iter()
        .all(|key| fields.get(*key).is_some_and(Value::is_number))
        && fields.get("seatbelt").is_some_and(Value::is_boolean)
        && OPTIONAL_NUMBERS
            .iter()
            .all(|key| optional_matches(fields, key, Value::is_number))
        && optional_matches(fields, "lcd_display", Value::is_string)
}

fn optional_matches(fields: &Map<String, Value>, key: &str, check: fn(&Value) -> bool) -> bool {
    fields.get(key).map_or(true, check)
}

/// Validates and converts a payload. Unknown fields, including any
/// client-supplied `id` or `timestamp`, are dropped.
pub fn parse_reading(payload: Value) -> Option<Measurements> {
    if !is_valid_reading(&payload) {
        return None;
    }
    serde_json::from_value(payload).ok()
}
