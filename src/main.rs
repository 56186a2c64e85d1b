//! # NMEA Bridge
//!
//! Stream vehicle telemetry to a LiDAR as NMEA GPRMC sentences.
//!
//! The bridge listens for vehicle attribute notifications, keeps the latest
//! vehicle state, and once per second sends a GPRMC sentence to the LiDAR
//! while pulsing a GPIO line the LiDAR uses for GPS time alignment.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use nmea_bridge::config::{Config, LoggingConfig};
use nmea_bridge::feed::AttributeFeed;
use nmea_bridge::pulse::{PulseEmitter, SysfsGpioLine};
use nmea_bridge::scheduler::Dispatcher;
use nmea_bridge::sink::log::{run_snapshot_recorder, SentenceLog, SnapshotLog};
use nmea_bridge::sink::transport::UdpTransport;
use nmea_bridge::telemetry::store::StateStore;
use nmea_bridge::telemetry::updater::run_update_loop;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix of the rolling diagnostic log
const LOG_FILE_PREFIX: &str = "nmea-bridge.log";

/// Main entry point for the NMEA bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging to stdout and, optionally, a daily log file
///    - Start the attribute feed, the state update loop and the snapshot
///      recorder
///    - Bind the sentence transport and set up the pulse line
///
/// 2. **Main Loop**
///    - Every tick: snapshot, pulse, encode, send, persist
///    - Per-tick failures are logged and the next tick runs as usual
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C stops the dispatcher, which waits for in-flight transmits
///    - The feed is stopped; the update loop and the snapshot recorder are
///      awaited until every queued record is written
///    - The pulse line is driven low when it is dropped
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded
/// - The feed or transport socket cannot be bound
/// - The vehicle state store becomes unusable
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);

    info!("NMEA Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let store = StateStore::new();

    // Snapshot recorder (position/attitude CSV)
    let (recorder_tx, recorder_task) = if config.persistence.record_snapshots {
        let log = SnapshotLog::new(config.persistence.snapshot_log.as_str());
        log.prepare().await?;
        info!("Recording vehicle state to {}", log.path().display());

        let (tx, rx) = mpsc::channel(config.feed.channel_capacity);
        (Some(tx), Some(tokio::spawn(run_snapshot_recorder(rx, log))))
    } else {
        (None, None)
    };

    // Attribute feed -> update loop
    let (update_tx, update_rx) = mpsc::channel(config.feed.channel_capacity);
    let feed = AttributeFeed::bind(config.feed_listen_addr()?).await?;
    let feed_task = tokio::spawn(async move {
        if let Err(e) = feed.run(update_tx).await {
            error!("Attribute feed stopped: {}", e);
        }
    });

    let update_store = store.clone();
    let update_task = tokio::spawn(run_update_loop(update_rx, update_store, recorder_tx));

    // Sentence transport and pulse line
    let transport = UdpTransport::bind(config.transport_bind_addr()?, config.lidar_destination()?).await?;

    let mut dispatcher: Dispatcher = Dispatcher::new(store, transport, config.tick_interval())
        .with_skew_budget(config.skew_budget());

    if config.persistence.save_sentences {
        let log = SentenceLog::new(config.persistence.sentence_log.as_str());
        log.prepare().await?;
        info!("Saving sentences to {}", log.path().display());
        dispatcher = dispatcher.with_sentence_log(log);
    }

    if config.pulse.enabled {
        let line = SysfsGpioLine::new(config.pulse.gpio_pin, config.pulse.gpio_root.as_str());
        info!("Pulsing GPIO {} for {:?} per tick", line.pin(), config.pulse_width());
        dispatcher = dispatcher.with_pulse(PulseEmitter::new(line, config.pulse_width()));
    }

    info!("Press Ctrl+C to exit");

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(e) => error!("Failed to listen for Ctrl+C, shutting down: {}", e),
        }
    };

    let ticks = dispatcher.run(shutdown).await?;
    info!("Total ticks: {}", ticks);

    // Dropping the feed closes the update channel; the update loop then closes
    // the recorder channel, and the recorder drains what is queued
    feed_task.abort();
    let _ = feed_task.await;

    match update_task.await {
        Ok(Ok(applied)) => info!("State update loop applied {} updates", applied),
        Ok(Err(e)) => error!("State update loop stopped: {}", e),
        Err(e) => error!("State update loop task failed: {}", e),
    }

    if let Some(recorder_task) = recorder_task {
        match recorder_task.await {
            Ok(written) => info!("Snapshot log flushed ({} records)", written),
            Err(e) => error!("Snapshot recorder task failed: {}", e),
        }
    }

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// must be held until exit so buffered file output is flushed.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = if config.dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}
