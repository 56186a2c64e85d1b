//! # Telemetry Module
//!
//! Holds the latest known vehicle state.
//!
//! This module handles:
//! - Decoding attribute notifications into typed updates
//! - Applying updates to the shared state under one lock
//! - Tear-free snapshots for the sentence encoder
//! - Forwarding position/attitude snapshots to the snapshot log

pub mod state;
pub mod update;
pub mod store;
pub mod updater;
