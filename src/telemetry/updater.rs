//! # State Update Loop
//!
//! Single writer for the [`StateStore`]. Attribute updates arrive on a
//! channel from the feed; position/attitude changes are forwarded to the
//! snapshot recorder without ever waiting on file I/O.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use super::state::VehicleState;
use super::store::StateStore;
use super::update::AttributeUpdate;
use crate::error::Result;

/// A state snapshot taken right after a position or attitude update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateRecord {
    /// Name of the attribute that triggered the record
    pub attribute: &'static str,

    /// State immediately after the update
    pub state: VehicleState,
}

/// Apply updates from `updates` until every sender is dropped
///
/// # Arguments
///
/// * `updates` - Receiving end of the attribute channel
/// * `store` - State store to write into
/// * `recorder` - Optional snapshot recorder channel
///
/// # Returns
///
/// * `Result<u64>` - Number of updates applied
///
/// # Errors
///
/// Returns `StatePoisoned` if the store lock is unusable; nothing else stops
/// the loop.
pub async fn run_update_loop(
    mut updates: mpsc::Receiver<AttributeUpdate>,
    store: StateStore,
    mut recorder: Option<mpsc::Sender<StateRecord>>,
) -> Result<u64> {
    let mut applied: u64 = 0;

    while let Some(update) = updates.recv().await {
        let state = store.apply_update(&update)?;
        applied += 1;
        trace!("Applied {} update", update.name());

        if !update.is_position_or_attitude() {
            continue;
        }

        if let Some(tx) = &recorder {
            let record = StateRecord {
                attribute: update.name(),
                state,
            };
            match tx.try_send(record) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Snapshot recorder is behind, dropping {} record", update.name());
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Snapshot recorder closed, no further records");
                    recorder = None;
                }
            }
        }
    }

    info!("Attribute channel closed after {} updates", applied);
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::log::{run_snapshot_recorder, SnapshotLog};
    use crate::telemetry::state::{Attitude, GlobalPosition};
    use tempfile::tempdir;
    use tokio::sync::oneshot;

    fn global(lat: f64) -> AttributeUpdate {
        AttributeUpdate::GlobalPosition(GlobalPosition { lat, lon: 149.0, alt: 20.0 })
    }

    #[tokio::test]
    async fn test_applies_updates_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let store = StateStore::new();

        tx.send(global(1.0)).await.unwrap();
        tx.send(global(2.0)).await.unwrap();
        tx.send(AttributeUpdate::GroundSpeed(5.0)).await.unwrap();
        drop(tx);

        let applied = run_update_loop(rx, store.clone(), None).await.unwrap();
        assert_eq!(applied, 3);

        let state = store.snapshot().unwrap();
        assert_eq!(state.global_position.map(|p| p.lat), Some(2.0));
        assert_eq!(state.ground_speed, Some(5.0));
    }

    #[tokio::test]
    async fn test_records_position_and_attitude_only() {
        let (tx, rx) = mpsc::channel(8);
        let (record_tx, mut record_rx) = mpsc::channel(8);

        tx.send(global(1.0)).await.unwrap();
        tx.send(AttributeUpdate::GroundSpeed(5.0)).await.unwrap();
        tx.send(AttributeUpdate::FixValidity(true)).await.unwrap();
        tx.send(AttributeUpdate::Attitude(Attitude { yaw: 0.5, pitch: 0.0, roll: 0.0 }))
            .await
            .unwrap();
        drop(tx);

        run_update_loop(rx, StateStore::new(), Some(record_tx)).await.unwrap();

        let first = record_rx.recv().await.unwrap();
        assert_eq!(first.attribute, "location.global_frame");
        assert_eq!(first.state.ground_speed, None);

        let second = record_rx.recv().await.unwrap();
        assert_eq!(second.attribute, "attitude");
        assert_eq!(second.state.ground_speed, Some(5.0));

        assert!(record_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_full_recorder_does_not_block_updates() {
        let (tx, rx) = mpsc::channel(16);
        let (record_tx, mut record_rx) = mpsc::channel(1);
        let store = StateStore::new();

        for i in 0..10 {
            tx.send(global(i as f64)).await.unwrap();
        }
        drop(tx);

        let applied = run_update_loop(rx, store.clone(), Some(record_tx)).await.unwrap();
        assert_eq!(applied, 10);
        assert_eq!(store.snapshot().unwrap().global_position.map(|p| p.lat), Some(9.0));

        // Only the first record fit; the rest were dropped
        assert_eq!(record_rx.recv().await.unwrap().state.global_position.map(|p| p.lat), Some(0.0));
        assert!(record_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_recorder_is_tolerated() {
        let (tx, rx) = mpsc::channel(4);
        let (record_tx, record_rx) = mpsc::channel(4);
        drop(record_rx);

        tx.send(global(1.0)).await.unwrap();
        tx.send(global(2.0)).await.unwrap();
        drop(tx);

        let applied = run_update_loop(rx, StateStore::new(), Some(record_tx)).await.unwrap();
        assert_eq!(applied, 2);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_records_to_disk() {
        let dir = tempdir().unwrap();
        let log = SnapshotLog::new(dir.path().join("state.csv"));
        let (tx, rx) = mpsc::channel(16);
        let (record_tx, record_rx) = mpsc::channel(16);
        let (queued_tx, queued_rx) = oneshot::channel();

        let recorder = tokio::spawn(run_snapshot_recorder(record_rx, log.clone()));
        let updater = tokio::spawn(run_update_loop(rx, StateStore::new(), Some(record_tx)));

        // Feed stand-in: queues updates, then idles until it is aborted
        let feed = tokio::spawn(async move {
            for i in 0..5 {
                tx.send(global(i as f64)).await.unwrap();
            }
            queued_tx.send(()).unwrap();
            std::future::pending::<()>().await;
        });

        queued_rx.await.unwrap();
        feed.abort();
        let _ = feed.await;

        assert_eq!(updater.await.unwrap().unwrap(), 5);
        assert_eq!(recorder.await.unwrap(), 5);

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 6);
    }
}
