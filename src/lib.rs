//! # NMEA Bridge Library
//!
//! Stream vehicle telemetry to a LiDAR as NMEA GPRMC sentences, with a
//! pulse-per-second line for GPS time alignment.
//!
//! This library provides the sentence codec, the shared vehicle state, the
//! tick dispatcher and the network, file and GPIO sinks the bridge drives.

pub mod config;
pub mod error;
pub mod feed;
pub mod nmea;
pub mod pulse;
pub mod scheduler;
pub mod sink;
pub mod telemetry;
