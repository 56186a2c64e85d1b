//! # Attribute Updates
//!
//! The closed set of vehicle attribute changes the bridge tracks.
//!
//! The vehicle link broadcasts many more attributes than these; names outside
//! the set decode to `None` and are dropped without error.

use serde::Deserialize;
use serde_json::Value;

use super::state::{Attitude, GlobalPosition, LocalPosition};
use crate::error::{NmeaBridgeError, Result};

/// Attribute name for the global position
pub const ATTR_GLOBAL_FRAME: &str = "location.global_frame";

/// Attribute name for the local NED position
pub const ATTR_LOCAL_FRAME: &str = "location.local_frame";

/// Attribute name for attitude
pub const ATTR_ATTITUDE: &str = "attitude";

/// Alternate attitude name used by some vehicle links
pub const ATTR_ATTITUDE_ALIAS: &str = "location.attitude";

/// Attribute name for ground speed
pub const ATTR_GROUNDSPEED: &str = "groundspeed";

/// Attribute name for EKF health (fix validity)
pub const ATTR_EKF_OK: &str = "ekf_ok";

/// One recognised attribute change
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeUpdate {
    GlobalPosition(GlobalPosition),
    LocalPosition(LocalPosition),
    Attitude(Attitude),
    /// Meters per second
    GroundSpeed(f64),
    /// EKF healthy flag
    FixValidity(bool),
}

impl AttributeUpdate {
    /// Decode a named attribute notification
    ///
    /// # Returns
    ///
    /// * `Ok(Some(update))` - recognised name with a well-formed value
    /// * `Ok(None)` - name the bridge does not track
    ///
    /// # Errors
    ///
    /// Returns `Feed` if a recognised name carries a malformed value.
    ///
    /// # Examples
    ///
    /// ```
    /// use nmea_bridge::telemetry::update::AttributeUpdate;
    /// use serde_json::json;
    ///
    /// let update = AttributeUpdate::from_attribute("groundspeed", &json!(5.0))?;
    /// assert_eq!(update, Some(AttributeUpdate::GroundSpeed(5.0)));
    ///
    /// let ignored = AttributeUpdate::from_attribute("heading", &json!(90))?;
    /// assert_eq!(ignored, None);
    /// # Ok::<(), nmea_bridge::error::NmeaBridgeError>(())
    /// ```
    pub fn from_attribute(name: &str, value: &Value) -> Result<Option<Self>> {
        let update = match name {
            ATTR_GLOBAL_FRAME => AttributeUpdate::GlobalPosition(decode(name, value)?),
            ATTR_LOCAL_FRAME => AttributeUpdate::LocalPosition(decode(name, value)?),
            ATTR_ATTITUDE | ATTR_ATTITUDE_ALIAS => AttributeUpdate::Attitude(decode(name, value)?),
            ATTR_GROUNDSPEED => AttributeUpdate::GroundSpeed(decode(name, value)?),
            ATTR_EKF_OK => AttributeUpdate::FixValidity(decode(name, value)?),
            _ => return Ok(None),
        };
        Ok(Some(update))
    }

    /// Canonical attribute name
    pub fn name(&self) -> &'static str {
        match self {
            AttributeUpdate::GlobalPosition(_) => ATTR_GLOBAL_FRAME,
            AttributeUpdate::LocalPosition(_) => ATTR_LOCAL_FRAME,
            AttributeUpdate::Attitude(_) => ATTR_ATTITUDE,
            AttributeUpdate::GroundSpeed(_) => ATTR_GROUNDSPEED,
            AttributeUpdate::FixValidity(_) => ATTR_EKF_OK,
        }
    }

    /// Whether this update represents a new fix and moves `capture_time`
    pub fn refreshes_capture_time(&self) -> bool {
        matches!(
            self,
            AttributeUpdate::GlobalPosition(_) | AttributeUpdate::Attitude(_)
        )
    }

    /// Whether this update is written to the snapshot log
    pub fn is_position_or_attitude(&self) -> bool {
        matches!(
            self,
            AttributeUpdate::GlobalPosition(_)
                | AttributeUpdate::LocalPosition(_)
                | AttributeUpdate::Attitude(_)
        )
    }
}

fn decode<'a, T: Deserialize<'a>>(name: &str, value: &'a Value) -> Result<T> {
    T::deserialize(value).map_err(|e| NmeaBridgeError::Feed(format!("{}: {}", name, e)))
}
