//! # NMEA Protocol Module
//!
//! Encoder for the NMEA 0183 GPRMC sentence consumed by the LiDAR.
//!
//! This module handles:
//! - Decimal degrees to degrees + decimal minutes conversion
//! - Speed conversion to knots
//! - Fixed-width field formatting
//! - XOR-fold checksum calculation

pub mod protocol;
pub mod coords;
pub mod encoder;
pub mod checksum;
