//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::error::{NmeaBridgeError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub feed: FeedConfig,
    pub transport: TransportConfig,
    pub scheduler: SchedulerConfig,
    pub pulse: PulseConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

/// Attribute feed configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Sentence transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_lidar_addr")]
    pub lidar_addr: String,

    #[serde(default = "default_lidar_port")]
    pub port: u16,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

/// Tick scheduler configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_skew_budget_us")]
    pub skew_budget_us: u64,
}

/// Pulse-per-second output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PulseConfig {
    #[serde(default = "default_pulse_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gpio_pin")]
    pub gpio_pin: u32,

    #[serde(default = "default_duration_us")]
    pub duration_us: u64,

    #[serde(default = "default_gpio_root")]
    pub gpio_root: String,
}

/// Durable log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    #[serde(default = "default_save_sentences")]
    pub save_sentences: bool,

    #[serde(default = "default_sentence_log")]
    pub sentence_log: String,

    #[serde(default = "default_record_snapshots")]
    pub record_snapshots: bool,

    #[serde(default = "default_snapshot_log")]
    pub snapshot_log: String,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_listen_addr() -> String { "127.0.0.1:14560".to_string() }
fn default_channel_capacity() -> usize { 1024 }

fn default_lidar_addr() -> String { "192.168.1.201".to_string() }
fn default_lidar_port() -> u16 { 10110 }
fn default_bind_addr() -> String { "0.0.0.0:0".to_string() }

fn default_interval_ms() -> u64 { 1000 }
fn default_skew_budget_us() -> u64 { 2000 }

fn default_pulse_enabled() -> bool { true }
fn default_gpio_pin() -> u32 { 18 }
fn default_duration_us() -> u64 { 500 }
fn default_gpio_root() -> String { crate::pulse::DEFAULT_GPIO_ROOT.to_string() }

fn default_save_sentences() -> bool { true }
fn default_sentence_log() -> String { "./logs/nmea_sentences.log".to_string() }
fn default_record_snapshots() -> bool { true }
fn default_snapshot_log() -> String { "./logs/vehicle_state.csv".to_string() }

fn default_log_level() -> String { "info".to_string() }

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn invalid(msg: impl std::fmt::Display) -> NmeaBridgeError {
    NmeaBridgeError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use nmea_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Socket address the attribute feed listens on
    pub fn feed_listen_addr(&self) -> Result<SocketAddr> {
        self.feed
            .listen_addr
            .parse()
            .map_err(|_| invalid(format!("feed listen_addr '{}' is not a socket address", self.feed.listen_addr)))
    }

    /// LiDAR destination for sentences
    pub fn lidar_destination(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .transport
            .lidar_addr
            .parse()
            .map_err(|_| invalid(format!("lidar_addr '{}' is not an IP address", self.transport.lidar_addr)))?;
        Ok(SocketAddr::new(ip, self.transport.port))
    }

    /// Local address the transport socket binds to
    pub fn transport_bind_addr(&self) -> Result<SocketAddr> {
        self.transport
            .bind_addr
            .parse()
            .map_err(|_| invalid(format!("bind_addr '{}' is not a socket address", self.transport.bind_addr)))
    }

    /// Tick period
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.interval_ms)
    }

    /// Largest acceptable pulse-to-snapshot skew
    pub fn skew_budget(&self) -> Duration {
        Duration::from_micros(self.scheduler.skew_budget_us)
    }

    /// Pulse high time
    pub fn pulse_width(&self) -> Duration {
        Duration::from_micros(self.pulse.duration_us)
    }

    /// Validate configuration values
    ///
    /// # Returns
    ///
    /// * `Result<()>` - Ok if valid, Err if invalid
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate addresses
        self.feed_listen_addr()?;
        self.lidar_destination()?;
        self.transport_bind_addr()?;

        if self.transport.port == 0 {
            return Err(invalid("transport port must be non-zero"));
        }

        if self.feed.channel_capacity == 0 || self.feed.channel_capacity > 65536 {
            return Err(invalid("channel_capacity must be between 1 and 65536"));
        }

        // Validate timing fields
        if self.scheduler.interval_ms == 0 || self.scheduler.interval_ms > 60000 {
            return Err(invalid("interval_ms must be between 1 and 60000"));
        }

        if self.scheduler.skew_budget_us == 0 {
            return Err(invalid("skew_budget_us must be greater than 0"));
        }

        // Validate pulse: sub-millisecond, so always shorter than one tick
        if self.pulse.duration_us == 0 || self.pulse.duration_us >= 1000 {
            return Err(invalid("pulse duration_us must be between 1 and 999"));
        }

        if self.pulse.enabled && self.pulse.gpio_root.is_empty() {
            return Err(invalid("pulse gpio_root cannot be empty when enabled"));
        }

        // Validate persistence paths
        if self.persistence.save_sentences && self.persistence.sentence_log.is_empty() {
            return Err(invalid("sentence_log cannot be empty when save_sentences is enabled"));
        }

        if self.persistence.record_snapshots && self.persistence.snapshot_log.is_empty() {
            return Err(invalid("snapshot_log cannot be empty when record_snapshots is enabled"));
        }

        // Validate log level
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}
