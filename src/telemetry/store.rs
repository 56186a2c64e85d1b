//! # Telemetry State Store
//!
//! Shared owner of the [`VehicleState`]. Every mutation and every snapshot
//! goes through one mutex, held only for a field assignment or a copy, so a
//! snapshot never mixes fields from before and after a single update.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

use super::state::VehicleState;
use super::update::AttributeUpdate;
use crate::error::{NmeaBridgeError, Result};
use crate::nmea::protocol::FixValidity;

/// Cloneable handle to the shared vehicle state
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<VehicleState>>,
}

impl StateStore {
    /// Create a store with an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with an initial state
    pub fn with_state(state: VehicleState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Apply one update, stamping position/attitude updates with the current time
    ///
    /// # Returns
    ///
    /// * `Result<VehicleState>` - The state as it stands right after this update
    ///
    /// # Errors
    ///
    /// Returns `StatePoisoned` if a previous writer panicked while holding the lock.
    pub fn apply_update(&self, update: &AttributeUpdate) -> Result<VehicleState> {
        self.apply_update_at(update, Utc::now())
    }

    /// Apply one update with an explicit capture instant
    ///
    /// `capture_time` never moves backwards: an instant earlier than the
    /// stored one leaves it unchanged.
    pub fn apply_update_at(&self, update: &AttributeUpdate, now: DateTime<Utc>) -> Result<VehicleState> {
        let mut state = self.lock()?;

        match *update {
            AttributeUpdate::GlobalPosition(position) => state.global_position = Some(position),
            AttributeUpdate::LocalPosition(position) => state.local_position = Some(position),
            AttributeUpdate::Attitude(attitude) => state.attitude = Some(attitude),
            AttributeUpdate::GroundSpeed(speed) => state.ground_speed = Some(speed),
            AttributeUpdate::FixValidity(ok) => state.fix_validity = FixValidity::from(ok),
        }

        if update.refreshes_capture_time() {
            state.capture_time = Some(match state.capture_time {
                Some(previous) if previous > now => previous,
                _ => now,
            });
        }

        Ok(*state)
    }

    /// Decode and apply a named attribute notification
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - the attribute is tracked and was applied
    /// * `Ok(false)` - the attribute is not tracked; state is untouched
    ///
    /// # Errors
    ///
    /// Returns `Feed` for a tracked name with a malformed value, or
    /// `StatePoisoned` if the lock is unusable.
    pub fn apply_named(&self, name: &str, value: &Value) -> Result<bool> {
        match AttributeUpdate::from_attribute(name, value)? {
            Some(update) => {
                self.apply_update(&update)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Result<VehicleState> {
        Ok(*self.lock()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, VehicleState>> {
        self.inner.lock().map_err(|_| NmeaBridgeError::StatePoisoned)
    }
}
