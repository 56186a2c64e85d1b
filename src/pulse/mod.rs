//! # Pulse Module
//!
//! Pulse-per-second output for the LiDAR's GPS time alignment.
//!
//! The LiDAR latches its internal clock on the rising edge of this line and
//! expects the neighbouring GPRMC sentence to describe the same second.
//!
//! This module handles:
//! - Driving a digital output line through Linux sysfs GPIO
//! - Emitting a bounded-width pulse off the async runtime
//! - Reporting the rising-edge instant for skew measurement

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{NmeaBridgeError, Result};

/// Default sysfs GPIO root
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// Trait for a single digital output line
#[cfg_attr(test, mockall::automock)]
pub trait PulseLine: Send {
    /// Drive the line high (`true`) or low (`false`)
    fn set_level(&mut self, high: bool) -> io::Result<()>;
}

/// Output line exported through `/sys/class/gpio`
///
/// The pin is exported and configured lazily on the first level change; after
/// a failed write the handle is dropped and the next pulse retries the setup.
#[derive(Debug)]
pub struct SysfsGpioLine {
    pin: u32,
    root: PathBuf,
    value: Option<File>,
}

impl SysfsGpioLine {
    pub fn new<P: Into<PathBuf>>(pin: u32, root: P) -> Self {
        Self {
            pin,
            root: root.into(),
            value: None,
        }
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    fn open_value(&self) -> io::Result<File> {
        let pin_dir = self.pin_dir();
        if !pin_dir.exists() {
            fs::write(self.root.join("export"), self.pin.to_string())?;
        }
        fs::write(pin_dir.join("direction"), "out")?;
        let file = OpenOptions::new().write(true).open(pin_dir.join("value"))?;
        info!("GPIO {} exported as output", self.pin);
        Ok(file)
    }

    fn value_file(&mut self) -> io::Result<&mut File> {
        let file = match self.value.take() {
            Some(file) => file,
            None => self.open_value()?,
        };
        Ok(self.value.insert(file))
    }
}

impl PulseLine for SysfsGpioLine {
    fn set_level(&mut self, high: bool) -> io::Result<()> {
        let level: &[u8] = if high { b"1" } else { b"0" };
        let result = self.value_file().and_then(|file| {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(level)
        });

        if result.is_err() {
            self.value = None;
        }
        result
    }
}

impl Drop for SysfsGpioLine {
    fn drop(&mut self) {
        if let Some(file) = self.value.as_mut() {
            let _ = file.seek(SeekFrom::Start(0)).and_then(|_| file.write_all(b"0"));
        }
    }
}

/// Instants of one emitted pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEdge {
    pub rising: Instant,
    pub falling: Instant,
    /// Wall-clock time of the rising edge, for comparison with sentence time
    pub rising_utc: DateTime<Utc>,
}

impl PulseEdge {
    /// Measured high time
    pub fn width(&self) -> Duration {
        self.falling.saturating_duration_since(self.rising)
    }
}

/// Emits fixed-width pulses on a [`PulseLine`]
pub struct PulseEmitter<P: PulseLine> {
    line: Arc<Mutex<P>>,
    width: Duration,
}

impl<P: PulseLine> std::fmt::Debug for PulseEmitter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseEmitter")
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}

impl<P: PulseLine + 'static> PulseEmitter<P> {
    pub fn new(line: P, width: Duration) -> Self {
        Self {
            line: Arc::new(Mutex::new(line)),
            width,
        }
    }

    /// Configured pulse width
    pub fn width(&self) -> Duration {
        self.width
    }

    /// Emit one pulse: high, hold for the configured width, low
    ///
    /// Runs on the blocking pool so a sub-millisecond hold is not rounded up
    /// to the timer resolution.
    ///
    /// # Errors
    ///
    /// Returns `Hardware` if the line cannot be driven.
    pub async fn emit(&self) -> Result<PulseEdge> {
        let line = Arc::clone(&self.line);
        let width = self.width;

        tokio::task::spawn_blocking(move || emit_blocking(&*line, width))
            .await
            .map_err(|e| NmeaBridgeError::Hardware(format!("Pulse task failed: {}", e)))?
    }
}

fn emit_blocking<P: PulseLine>(line: &Mutex<P>, width: Duration) -> Result<PulseEdge> {
    let mut line = line
        .lock()
        .map_err(|_| NmeaBridgeError::Hardware("Pulse line lock poisoned".to_string()))?;

    line.set_level(true)
        .map_err(|e| NmeaBridgeError::Hardware(format!("Failed to raise pulse line: {}", e)))?;
    let rising = Instant::now();
    let rising_utc = Utc::now();

    std::thread::sleep(width);

    // One retry, so a transient write error does not leave the line high
    let lowered = line.set_level(false).or_else(|e| {
        warn!("Failed to lower pulse line, retrying: {}", e);
        line.set_level(false)
    });
    let falling = Instant::now();
    lowered.map_err(|e| NmeaBridgeError::Hardware(format!("Failed to lower pulse line: {}", e)))?;

    debug!("Pulse emitted ({:?} high)", falling.saturating_duration_since(rising));
    Ok(PulseEdge {
        rising,
        falling,
        rising_utc,
    })
}
