//! # Vehicle State
//!
//! The latest known position/attitude of the vehicle, and the value types it
//! is built from. Attribute payloads decode straight into these types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::nmea::protocol::FixValidity;

/// Global position (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GlobalPosition {
    /// Latitude in signed decimal degrees
    pub lat: f64,

    /// Longitude in signed decimal degrees
    pub lon: f64,

    /// Altitude in meters (MSL)
    pub alt: f64,
}

/// Position relative to the home location (NED frame, meters)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LocalPosition {
    pub north: f64,
    pub east: f64,
    pub down: f64,
}

/// Vehicle attitude in radians
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Attitude {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Complete vehicle state as seen by the bridge
///
/// `Copy` so that a snapshot is a plain value, never a view into live state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleState {
    /// Latest global position, `None` until the first position update
    pub global_position: Option<GlobalPosition>,

    /// Latest local position; recorded in snapshots, never encoded
    pub local_position: Option<LocalPosition>,

    /// Latest attitude
    pub attitude: Option<Attitude>,

    /// Ground speed in meters per second
    pub ground_speed: Option<f64>,

    /// Receiver status mapped to `A` / `V`
    pub fix_validity: FixValidity,

    /// Course made good, degrees true. No live source updates it.
    pub course_made_good: f64,

    /// Magnetic variation, degrees. No live source updates it.
    pub magnetic_variation: f64,

    /// Instant of the last position or attitude update
    pub capture_time: Option<DateTime<Utc>>,
}
