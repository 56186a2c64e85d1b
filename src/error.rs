//! # Error Types
//!
//! Custom error types for the NMEA bridge using `thiserror`.

use thiserror::Error;

/// Main error type for the NMEA bridge
#[derive(Debug, Error)]
pub enum NmeaBridgeError {
    /// A coordinate, speed or numeric field is outside the encodable domain
    #[error("Input out of range: {0}")]
    InputRange(String),

    /// A snapshot field required by the encoder has never been set
    #[error("Snapshot is missing required field: {0}")]
    MissingField(&'static str),

    /// Datagram transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// Durable log append errors
    #[error("Persistence error on {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Pulse line errors
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// A recognised attribute arrived with a payload that does not decode
    #[error("Attribute feed error: {0}")]
    Feed(String),

    /// The vehicle state lock was poisoned by a panicking writer
    #[error("Vehicle state lock poisoned")]
    StatePoisoned,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the NMEA bridge
pub type Result<T> = std::result::Result<T, NmeaBridgeError>;
