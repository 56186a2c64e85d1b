//! # Persistence Logs
//!
//! Append-only text files next to the bridge:
//! - the sentence log, one GPRMC sentence per line
//! - the snapshot log, one comma-separated vehicle state per position or
//!   attitude update
//!
//! Each append opens the file, writes one line and closes it again, so no
//! handle outlives a failed write.

use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::{NmeaBridgeError, Result};
use crate::telemetry::updater::StateRecord;

/// Line separator for both logs
pub const RECORD_SEPARATOR: &str = "\n";

/// Header of the snapshot log
pub const SNAPSHOT_HEADER: &str =
    "capture_time,attribute,lat,lon,alt,north,east,down,roll,pitch,yaw,ground_speed_mps,fix";

/// Append-only log of every generated sentence
#[derive(Debug, Clone)]
pub struct SentenceLog {
    path: PathBuf,
}

impl SentenceLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory if it does not exist yet
    pub async fn prepare(&self) -> Result<()> {
        create_parent_dir(&self.path).await
    }

    /// Append one sentence followed by the record separator
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the file cannot be opened or written.
    pub async fn append(&self, sentence: &str) -> Result<()> {
        let mut file = open_append(&self.path).await?;
        let line = format!("{}{}", sentence, RECORD_SEPARATOR);
        write_line(&mut file, &self.path, &line).await
    }
}

/// Append-only CSV of raw vehicle state snapshots
#[derive(Debug, Clone)]
pub struct SnapshotLog {
    path: PathBuf,
}

impl SnapshotLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory if it does not exist yet
    pub async fn prepare(&self) -> Result<()> {
        create_parent_dir(&self.path).await
    }

    /// Append one record, writing the header first if the file is empty
    pub async fn append(&self, record: &StateRecord) -> Result<()> {
        let mut file = open_append(&self.path).await?;
        let len = file
            .metadata()
            .await
            .map_err(|e| persistence_error(&self.path, e))?
            .len();

        let mut text = String::new();
        if len == 0 {
            text.push_str(SNAPSHOT_HEADER);
            text.push_str(RECORD_SEPARATOR);
        }
        text.push_str(&format_record(record));
        text.push_str(RECORD_SEPARATOR);

        write_line(&mut file, &self.path, &text).await
    }
}

/// Render a record as one CSV line (no separator)
///
/// Fields the vehicle has not reported yet are left empty.
pub fn format_record(record: &StateRecord) -> String {
    let state = &record.state;
    let global = state.global_position;
    let local = state.local_position;
    let attitude = state.attitude;

    let fields = [
        state.capture_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
        record.attribute.to_string(),
        cell(global.map(|p| p.lat)),
        cell(global.map(|p| p.lon)),
        cell(global.map(|p| p.alt)),
        cell(local.map(|p| p.north)),
        cell(local.map(|p| p.east)),
        cell(local.map(|p| p.down)),
        cell(attitude.map(|a| a.roll)),
        cell(attitude.map(|a| a.pitch)),
        cell(attitude.map(|a| a.yaw)),
        cell(state.ground_speed),
        state.fix_validity.to_string(),
    ];
    fields.join(",")
}

/// Drain snapshot records into `log` until the channel closes
///
/// Append failures are reported and the recorder keeps going.
pub async fn run_snapshot_recorder(mut records: mpsc::Receiver<StateRecord>, log: SnapshotLog) -> u64 {
    let mut written: u64 = 0;

    while let Some(record) = records.recv().await {
        match log.append(&record).await {
            Ok(()) => {
                written += 1;
                debug!("Recorded {} snapshot", record.attribute);
            }
            Err(e) => error!("Failed to record snapshot: {}", e),
        }
    }

    info!("Snapshot recorder stopped after {} records", written);
    written
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

async fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| persistence_error(path, e))
}

async fn write_line(file: &mut File, path: &Path, text: &str) -> Result<()> {
    file.write_all(text.as_bytes())
        .await
        .map_err(|e| persistence_error(path, e))?;
    file.flush().await.map_err(|e| persistence_error(path, e))
}

async fn create_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .await
            .map_err(|e| persistence_error(dir, e)),
        _ => Ok(()),
    }
}

fn persistence_error(path: &Path, source: std::io::Error) -> NmeaBridgeError {
    NmeaBridgeError::Persistence {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::protocol::FixValidity;
    use crate::telemetry::state::{Attitude, GlobalPosition, VehicleState};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn record() -> StateRecord {
        StateRecord {
            attribute: "location.global_frame",
            state: VehicleState {
                global_position: Some(GlobalPosition { lat: -35.5, lon: 149.25, alt: 20.0 }),
                attitude: Some(Attitude { yaw: 1.5, pitch: 0.25, roll: -0.5 }),
                ground_speed: Some(3.0),
                fix_validity: FixValidity::Valid,
                capture_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_sentence_log_appends_lines() {
        let dir = tempdir().unwrap();
        let log = SentenceLog::new(dir.path().join("nmea.log"));

        log.append("$GPRMC,first*1").await.unwrap();
        log.append("$GPRMC,second*2").await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, "$GPRMC,first*1\n$GPRMC,second*2\n");
    }

    #[tokio::test]
    async fn test_sentence_log_preserves_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nmea.log");
        std::fs::write(&path, "$GPRMC,old*0\n").unwrap();

        SentenceLog::new(&path).append("$GPRMC,new*1").await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "$GPRMC,old*0\n$GPRMC,new*1\n");
    }

    #[tokio::test]
    async fn test_sentence_log_unwritable_path() {
        let dir = tempdir().unwrap();
        let log = SentenceLog::new(dir.path().join("missing").join("nmea.log"));

        match log.append("$GPRMC*0").await {
            Err(NmeaBridgeError::Persistence { path, .. }) => assert!(path.contains("missing")),
            other => panic!("Expected Persistence error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prepare_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let log = SentenceLog::new(dir.path().join("logs").join("nested").join("nmea.log"));

        log.prepare().await.unwrap();
        log.append("$GPRMC*0").await.unwrap();
        assert!(log.path().exists());
    }

    #[test]
    fn test_format_record() {
        assert_eq!(
            format_record(&record()),
            "2024-01-01T00:00:00+00:00,location.global_frame,-35.5,149.25,20,,,,-0.5,0.25,1.5,3,A"
        );
    }

    #[test]
    fn test_format_record_empty_state() {
        let line = format_record(&StateRecord {
            attribute: "location.local_frame",
            state: VehicleState::default(),
        });
        assert_eq!(line, ",location.local_frame,,,,,,,,,,,V");
        assert_eq!(line.split(',').count(), SNAPSHOT_HEADER.split(',').count());
    }

    #[tokio::test]
    async fn test_snapshot_log_writes_header_once() {
        let dir = tempdir().unwrap();
        let log = SnapshotLog::new(dir.path().join("state.csv"));

        log.append(&record()).await.unwrap();
        log.append(&record()).await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], SNAPSHOT_HEADER);
        assert_eq!(lines[1], lines[2]);
    }

    #[tokio::test]
    async fn test_snapshot_recorder_drains_channel() {
        let dir = tempdir().unwrap();
        let log = SnapshotLog::new(dir.path().join("state.csv"));
        let (tx, rx) = mpsc::channel(4);

        tx.send(record()).await.unwrap();
        tx.send(record()).await.unwrap();
        drop(tx);

        let written = run_snapshot_recorder(rx, log.clone()).await;
        assert_eq!(written, 2);

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_recorder_survives_append_failure() {
        let dir = tempdir().unwrap();
        let log = SnapshotLog::new(dir.path().join("missing").join("state.csv"));
        let (tx, rx) = mpsc::channel(4);

        tx.send(record()).await.unwrap();
        drop(tx);

        assert_eq!(run_snapshot_recorder(rx, log).await, 0);
    }
}
