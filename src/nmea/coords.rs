//! # Coordinate and Unit Codec
//!
//! Converts decimal-degree coordinates into the degrees + decimal-minutes form
//! used by NMEA position fields, and vehicle speed into knots.

use super::protocol::{Axis, DegreesMinutes, Hemisphere, MPS_TO_KNOTS};
use crate::error::{NmeaBridgeError, Result};

/// Seconds in one degree of arc
const SECONDS_PER_DEGREE: f64 = 3600.0;

/// Split a decimal-degree value into whole degrees and decimal minutes
///
/// The magnitude is always reported as positive; the sign travels in the
/// hemisphere letter. Zero maps to `N` / `E`. Minutes are rounded to two
/// decimals, and a rounding result of `60.00` is carried into the degrees.
///
/// # Arguments
///
/// * `value` - Signed decimal degrees
/// * `axis` - Whether `value` is a latitude or a longitude
///
/// # Errors
///
/// Returns `InputRange` if `value` is not finite or lies outside
/// `[-90, 90]` (latitude) / `[-180, 180]` (longitude).
///
/// # Examples
///
/// ```
/// use nmea_bridge::nmea::coords::to_degrees_minutes;
/// use nmea_bridge::nmea::protocol::{Axis, Hemisphere};
///
/// let dm = to_degrees_minutes(-35.362558, Axis::Latitude)?;
/// assert_eq!(dm.degrees, 35);
/// assert_eq!(dm.hemisphere, Hemisphere::South);
/// # Ok::<(), nmea_bridge::error::NmeaBridgeError>(())
/// ```
pub fn to_degrees_minutes(value: f64, axis: Axis) -> Result<DegreesMinutes> {
    if !value.is_finite() || value.abs() > axis.limit() {
        return Err(NmeaBridgeError::InputRange(format!(
            "{:?} {} outside [-{limit}, {limit}]",
            axis,
            value,
            limit = axis.limit()
        )));
    }

    let hemisphere = Hemisphere::for_value(value, axis);

    let total_seconds = value.abs() * SECONDS_PER_DEGREE;
    let total_minutes = (total_seconds / 60.0).floor();
    let seconds = total_seconds - total_minutes * 60.0;
    let mut degrees = (total_minutes / 60.0).floor();
    let mut minutes = round_hundredths(total_minutes - degrees * 60.0 + seconds / 60.0);

    if minutes >= 60.0 {
        degrees += 1.0;
        minutes -= 60.0;
    }

    Ok(DegreesMinutes {
        degrees: degrees as u16,
        minutes,
        hemisphere,
    })
}

/// Convert metres per second to knots
///
/// Linear, no rounding; the encoder formats the result.
pub fn speed_to_knots(value_mps: f64) -> f64 {
    value_mps * MPS_TO_KNOTS
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
