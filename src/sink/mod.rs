//! # Sink Module
//!
//! Where sentences and state snapshots go once they are produced.
//!
//! This module handles:
//! - Best-effort UDP delivery of each sentence to the LiDAR
//! - Appending sentences to the durable sentence log
//! - Recording raw state snapshots as CSV

pub mod transport;
pub mod log;
