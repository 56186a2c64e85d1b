//! # GPRMC Sentence Encoder
//!
//! Builds GPRMC sentences from vehicle state snapshots.

use super::coords::{speed_to_knots, to_degrees_minutes};
use super::protocol::*;
use crate::error::{NmeaBridgeError, Result};
use crate::telemetry::state::VehicleState;

/// Build a GPRMC sentence from a state snapshot
///
/// # Arguments
///
/// * `state` - Snapshot of the vehicle state
///
/// # Returns
///
/// * `Result<GprmcSentence>` - Sentence whose fields are all in range
///
/// # Errors
///
/// Returns error if:
/// - Position, ground speed or capture time has never been set (`MissingField`)
/// - A coordinate lies outside its domain (`InputRange`)
/// - Speed, course or variation is negative, not finite, or wider than the
///   six-character field (`InputRange`)
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use nmea_bridge::nmea::encoder::build_sentence;
/// use nmea_bridge::telemetry::state::{GlobalPosition, VehicleState};
///
/// let state = VehicleState {
///     global_position: Some(GlobalPosition { lat: -35.361354, lon: 149.165218, alt: 20.0 }),
///     ground_speed: Some(5.0),
///     capture_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
///     ..Default::default()
/// };
/// let sentence = build_sentence(&state)?;
/// assert!(sentence.to_string().starts_with("$GPRMC,000000,V,3521.68,S"));
/// # Ok::<(), nmea_bridge::error::NmeaBridgeError>(())
/// ```
pub fn build_sentence(state: &VehicleState) -> Result<GprmcSentence> {
    let position = state
        .global_position
        .ok_or(NmeaBridgeError::MissingField("global_position"))?;
    let ground_speed = state
        .ground_speed
        .ok_or(NmeaBridgeError::MissingField("ground_speed"))?;
    let fix_time = state
        .capture_time
        .ok_or(NmeaBridgeError::MissingField("capture_time"))?;

    let sentence = GprmcSentence {
        fix_time,
        validity: state.fix_validity,
        latitude: to_degrees_minutes(position.lat, Axis::Latitude)?,
        longitude: to_degrees_minutes(position.lon, Axis::Longitude)?,
        speed_knots: check_numeric_field("speed", speed_to_knots(ground_speed))?,
        course_made_good: check_numeric_field("course_made_good", state.course_made_good)?,
        magnetic_variation: check_numeric_field("magnetic_variation", state.magnetic_variation)?,
    };

    verify_body(&sentence.body())?;
    Ok(sentence)
}

/// Build and serialize a GPRMC sentence (`$<body>*<checksum>`)
pub fn encode_sentence(state: &VehicleState) -> Result<String> {
    Ok(build_sentence(state)?.to_string())
}

/// Check that a value fits a two-decimal, six-character numeric field
fn check_numeric_field(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(NmeaBridgeError::InputRange(format!("{} is not finite", name)));
    }

    let rounded = (value * 100.0).round() / 100.0;
    if value < 0.0 || rounded > NUMERIC_FIELD_MAX {
        return Err(NmeaBridgeError::InputRange(format!(
            "{} {} outside [0, {}]",
            name, value, NUMERIC_FIELD_MAX
        )));
    }

    // -0.0 passes the sign check but would render as `-00.00`
    Ok(value.abs())
}

/// Final shape check on the body before it is checksummed
fn verify_body(body: &str) -> Result<()> {
    if !body.is_ascii() || body.contains(NMEA_START) || body.contains(NMEA_CHECKSUM_SEPARATOR) {
        return Err(NmeaBridgeError::InputRange(format!(
            "sentence body contains reserved characters: {}",
            body
        )));
    }

    let field_count = body.split(NMEA_FIELD_SEPARATOR).count();
    if field_count != GPRMC_FIELD_COUNT {
        return Err(NmeaBridgeError::InputRange(format!(
            "sentence has {} fields, expected {}",
            field_count, GPRMC_FIELD_COUNT
        )));
    }

    Ok(())
}
