//! # Scheduler Module
//!
//! Dual-job dispatcher: once per tick, emit the timing pulse and transmit a
//! GPRMC sentence.
//!
//! Both jobs hang off the same `tokio::time::interval` tick. The snapshot is
//! taken first and the pulse is launched straight after it. The sentence is
//! encoded on the tick, then sent and persisted on its own task, so a slow
//! network or disk never holds back the next pulse. At most
//! [`MAX_TRANSMITS_IN_FLIGHT`] transmits run at once; beyond that a tick's
//! sentence is dropped with a warning.
//!
//! Every tick measures how far the pulse's rising edge is from the time the
//! sentence reports and compares it against the skew budget.
//!
//! A failure in one job never stops the other, and no per-tick failure stops
//! the dispatcher. The only fatal error is a poisoned state store.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{NmeaBridgeError, Result};
use crate::nmea::encoder::build_sentence;
use crate::pulse::{PulseEdge, PulseEmitter, PulseLine, SysfsGpioLine};
use crate::sink::log::SentenceLog;
use crate::sink::transport::{DatagramSink, UdpTransport};
use crate::telemetry::state::VehicleState;
use crate::telemetry::store::StateStore;

/// Default tick interval (one sentence and one pulse per second)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on the gap between the pulse edge and the sentence time
pub const DEFAULT_PULSE_SKEW_BUDGET: Duration = Duration::from_millis(2);

/// Number of ticks between status log messages
pub const LOG_INTERVAL_TICKS: u64 = 60;

/// Send/persist tasks allowed to run at the same time
pub const MAX_TRANSMITS_IN_FLIGHT: u32 = 4;

/// Outcome of one job within a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Job ran and succeeded
    Done,
    /// Job did not run this tick (e.g. nothing to send yet)
    Skipped(String),
    /// Job ran and failed; the next tick runs it again
    Failed(String),
    /// Job is turned off in the configuration
    Disabled,
}

impl JobOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, JobOutcome::Done)
    }
}

/// Result of sending and persisting one sentence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitReport {
    pub send: JobOutcome,
    pub persist: JobOutcome,
}

impl TransmitReport {
    fn skipped(reason: String) -> Self {
        Self {
            send: JobOutcome::Skipped(reason.clone()),
            persist: JobOutcome::Skipped(reason),
        }
    }
}

/// Transmit half of a tick, possibly still running
#[derive(Debug)]
pub enum PendingTransmit {
    /// Nothing was handed to the network or the log
    Skipped(String),
    /// Send and persist are running on their own task
    Running(JoinHandle<TransmitReport>),
}

impl PendingTransmit {
    /// Wait for the transmit to finish
    pub async fn outcome(self) -> TransmitReport {
        match self {
            PendingTransmit::Skipped(reason) => TransmitReport::skipped(reason),
            PendingTransmit::Running(handle) => handle.await.unwrap_or_else(|e| {
                let reason = format!("Transmit task failed: {}", e);
                TransmitReport {
                    send: JobOutcome::Failed(reason.clone()),
                    persist: JobOutcome::Failed(reason),
                }
            }),
        }
    }
}

/// What happened during one tick
///
/// The pulse has finished by the time the report is returned; the transmit
/// may not have.
#[derive(Debug)]
pub struct TickReport {
    /// Tick number, starting at 1
    pub tick: u64,
    /// Sentence generated this tick, if the snapshot was encodable
    pub sentence: Option<String>,
    pub pulse: JobOutcome,
    /// Time from taking the snapshot to the pulse's rising edge
    pub pulse_latency: Option<Duration>,
    /// Gap between the rising edge and the time the sentence reports
    pub pulse_skew: Option<Duration>,
    /// Whether `pulse_skew` exceeded the configured budget
    pub skew_exceeded: bool,
    pub transmit: PendingTransmit,
}

/// Runs the pulse and transmit jobs on a shared tick
pub struct Dispatcher<S: DatagramSink + 'static = UdpSocket, P: PulseLine + 'static = SysfsGpioLine> {
    store: StateStore,
    transport: Arc<UdpTransport<S>>,
    sentence_log: Option<SentenceLog>,
    pulse: Option<PulseEmitter<P>>,
    interval: Duration,
    skew_budget: Duration,
    in_flight: Arc<Semaphore>,
    ticks: u64,
    pulses: u64,
    sent: Arc<AtomicU64>,
}

impl<S: DatagramSink + 'static, P: PulseLine + 'static> std::fmt::Debug for Dispatcher<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &self.transport)
            .field("sentence_log", &self.sentence_log)
            .field("pulse", &self.pulse)
            .field("interval", &self.interval)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl<S: DatagramSink + 'static, P: PulseLine + 'static> Dispatcher<S, P> {
    /// Create a dispatcher with no sentence log and no pulse line
    pub fn new(store: StateStore, transport: UdpTransport<S>, interval: Duration) -> Self {
        Self {
            store,
            transport: Arc::new(transport),
            sentence_log: None,
            pulse: None,
            interval,
            skew_budget: DEFAULT_PULSE_SKEW_BUDGET,
            in_flight: Arc::new(Semaphore::new(MAX_TRANSMITS_IN_FLIGHT as usize)),
            ticks: 0,
            pulses: 0,
            sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Persist every generated sentence to `log`
    pub fn with_sentence_log(mut self, log: SentenceLog) -> Self {
        self.sentence_log = Some(log);
        self
    }

    /// Emit a pulse on every tick
    pub fn with_pulse(mut self, emitter: PulseEmitter<P>) -> Self {
        self.pulse = Some(emitter);
        self
    }

    pub fn with_skew_budget(mut self, budget: Duration) -> Self {
        self.skew_budget = budget;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn skew_budget(&self) -> Duration {
        self.skew_budget
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Pulses emitted successfully so far
    pub fn pulses(&self) -> u64 {
        self.pulses
    }

    /// Sentences delivered to the transport so far
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Run one tick: pulse inline, transmit on a spawned task
    ///
    /// # Errors
    ///
    /// Returns `StatePoisoned` if the state store is unusable. Every other
    /// failure is recorded in the returned [`TickReport`].
    pub async fn tick(&mut self) -> Result<TickReport> {
        self.ticks += 1;
        let tick = self.ticks;

        let state = self.store.snapshot()?;
        let captured = Instant::now();

        // The pulse future is polled first, so the edge is launched before encoding
        let (pulse, (sentence, transmit)) =
            tokio::join!(self.pulse_job(), async { self.start_transmit(tick, &state) });

        let reported_time = sentence.as_ref().and(state.capture_time);
        let (pulse, pulse_latency, pulse_skew) = match pulse {
            Some(Ok(edge)) => (
                JobOutcome::Done,
                Some(elapsed_between(captured, edge.rising)),
                reported_time.and_then(|time| utc_gap(edge.rising_utc, time)),
            ),
            Some(Err(e)) => {
                warn!("Tick {}: pulse failed: {}", tick, e);
                (JobOutcome::Failed(e.to_string()), None, None)
            }
            None => (JobOutcome::Disabled, None, None),
        };

        let late = pulse_skew.filter(|skew| *skew > self.skew_budget);
        if let Some(skew) = late {
            warn!(
                "Tick {}: pulse edge is {:?} from the sentence time (budget {:?})",
                tick, skew, self.skew_budget
            );
        }

        if pulse.is_done() {
            self.pulses += 1;
        }

        debug!("Tick {}: pulse {:?}, latency {:?}", tick, pulse, pulse_latency);
        if tick % LOG_INTERVAL_TICKS == 0 {
            info!(
                "{} ticks: {} sentences sent, {} pulses emitted",
                tick,
                self.sent(),
                self.pulses
            );
        }

        Ok(TickReport {
            tick,
            sentence,
            pulse,
            pulse_latency,
            pulse_skew,
            skew_exceeded: late.is_some(),
            transmit,
        })
    }

    /// Tick at the configured interval until `shutdown` completes
    ///
    /// Late ticks are delayed rather than bunched up. Transmits still in
    /// flight at shutdown are awaited before returning.
    ///
    /// # Returns
    ///
    /// * `Result<u64>` - Number of ticks run
    ///
    /// # Errors
    ///
    /// Returns `StatePoisoned` if the state store becomes unusable.
    pub async fn run<F: Future<Output = ()>>(&mut self, shutdown: F) -> Result<u64> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Dispatching to {} every {:?} (pulse {})",
            self.transport.destination(),
            self.interval,
            if self.pulse.is_some() { "on" } else { "off" }
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await?;
                }

                _ = &mut shutdown => {
                    info!("Dispatcher stopping after {} ticks", self.ticks);
                    break;
                }
            }
        }

        self.flush().await;
        Ok(self.ticks)
    }

    /// Wait until no transmit is in flight
    pub async fn flush(&self) {
        match self.in_flight.acquire_many(MAX_TRANSMITS_IN_FLIGHT).await {
            Ok(permits) => drop(permits),
            Err(e) => debug!("Transmit limiter closed: {}", e),
        }
    }

    async fn pulse_job(&self) -> Option<Result<PulseEdge>> {
        match &self.pulse {
            Some(emitter) => Some(emitter.emit().await),
            None => None,
        }
    }

    /// Encode the snapshot and hand it to a transmit task
    fn start_transmit(&self, tick: u64, state: &VehicleState) -> (Option<String>, PendingTransmit) {
        let sentence = match build_sentence(state) {
            Ok(sentence) => sentence,
            Err(e) => {
                match e {
                    NmeaBridgeError::MissingField(field) => {
                        debug!("Tick {}: no sentence yet, {} not set", tick, field)
                    }
                    _ => warn!("Tick {}: not encoding snapshot: {}", tick, e),
                }
                return (None, PendingTransmit::Skipped(e.to_string()));
            }
        };

        let text = sentence.to_string();
        let permit = match Arc::clone(&self.in_flight).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    "Tick {}: {} transmits still in flight, dropping sentence",
                    tick, MAX_TRANSMITS_IN_FLIGHT
                );
                return (Some(text), PendingTransmit::Skipped("transmit backlog".to_string()));
            }
        };

        let transport = Arc::clone(&self.transport);
        let log = self.sentence_log.clone();
        let sent = Arc::clone(&self.sent);
        let datagram = sentence.to_datagram();
        let line = text.clone();

        let handle = tokio::spawn(async move {
            let report = transmit(tick, &*transport, log.as_ref(), &datagram, &line).await;
            if report.send.is_done() {
                sent.fetch_add(1, Ordering::Relaxed);
            }
            drop(permit);
            report
        });

        (Some(text), PendingTransmit::Running(handle))
    }
}

/// Send and persist one sentence concurrently; neither waits for the other
async fn transmit<S: DatagramSink>(
    tick: u64,
    transport: &UdpTransport<S>,
    log: Option<&SentenceLog>,
    datagram: &[u8],
    sentence: &str,
) -> TransmitReport {
    let send = async {
        match transport.send(datagram).await {
            Ok(()) => JobOutcome::Done,
            Err(e) => {
                warn!("Tick {}: {}", tick, e);
                JobOutcome::Failed(e.to_string())
            }
        }
    };

    let persist = async {
        let Some(log) = log else {
            return JobOutcome::Disabled;
        };
        match log.append(sentence).await {
            Ok(()) => JobOutcome::Done,
            Err(e) => {
                error!("Tick {}: {}", tick, e);
                JobOutcome::Failed(e.to_string())
            }
        }
    };

    let (send, persist) = tokio::join!(send, persist);
    TransmitReport { send, persist }
}

fn elapsed_between(a: Instant, b: Instant) -> Duration {
    if b >= a {
        b.duration_since(a)
    } else {
        a.duration_since(b)
    }
}

/// Absolute wall-clock gap, `None` if it does not fit in microseconds
fn utc_gap(a: DateTime<Utc>, b: DateTime<Utc>) -> Option<Duration> {
    (a - b)
        .num_microseconds()
        .map(|us| Duration::from_micros(us.unsigned_abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::protocol::FixValidity;
    use crate::pulse::MockPulseLine;
    use crate::sink::transport::mocks::RecordingSink;
    use crate::telemetry::state::GlobalPosition;
    use crate::telemetry::update::AttributeUpdate;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::io;
    use std::net::SocketAddr;
    use tempfile::tempdir;
    use tokio_test::assert_ok;

    const REFERENCE_SENTENCE: &str =
        "$GPRMC,000000,A,3521.68,S,14909.91,E,009.72,000.00,010124,000.00,E*87";

    /// Sink that takes far longer than a tick to send
    struct SlowSink {
        delay: Duration,
    }

    #[async_trait]
    impl DatagramSink for SlowSink {
        async fn send_to(&self, payload: &[u8], _destination: SocketAddr) -> io::Result<usize> {
            tokio::time::sleep(self.delay).await;
            Ok(payload.len())
        }
    }

    fn lidar() -> SocketAddr {
        "192.168.1.201:10110".parse().unwrap()
    }

    fn reference_state() -> VehicleState {
        VehicleState {
            global_position: Some(GlobalPosition { lat: -35.361354, lon: 149.165218, alt: 20.0 }),
            ground_speed: Some(5.0),
            fix_validity: FixValidity::Valid,
            capture_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        }
    }

    fn reference_store() -> StateStore {
        StateStore::with_state(reference_state())
    }

    fn fresh_store() -> StateStore {
        StateStore::with_state(VehicleState {
            capture_time: Some(Utc::now()),
            ..reference_state()
        })
    }

    fn working_line() -> MockPulseLine {
        let mut line = MockPulseLine::new();
        line.expect_set_level().returning(|_| Ok(()));
        line
    }

    fn dispatcher(
        store: StateStore,
        sink: &RecordingSink,
        line: MockPulseLine,
    ) -> Dispatcher<RecordingSink, MockPulseLine> {
        Dispatcher::new(store, UdpTransport::with_sink(sink.clone(), lidar()), Duration::from_millis(10))
            .with_pulse(PulseEmitter::new(line, Duration::from_micros(100)))
    }

    #[tokio::test]
    async fn test_tick_runs_both_jobs() {
        let dir = tempdir().unwrap();
        let log = SentenceLog::new(dir.path().join("nmea.log"));
        let sink = RecordingSink::new();
        let mut dispatcher = dispatcher(reference_store(), &sink, working_line()).with_sentence_log(log.clone());

        let report = dispatcher.tick().await.unwrap();

        assert_eq!(report.tick, 1);
        assert_eq!(report.sentence.as_deref(), Some(REFERENCE_SENTENCE));
        assert_eq!(report.pulse, JobOutcome::Done);
        assert!(report.pulse_latency.is_some());

        let transmit = report.transmit.outcome().await;
        assert_eq!(transmit.send, JobOutcome::Done);
        assert_eq!(transmit.persist, JobOutcome::Done);

        let sent = sink.get_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, REFERENCE_SENTENCE.as_bytes());
        assert_eq!(sent[0].1, lidar());
        assert_eq!(dispatcher.sent(), 1);

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, format!("{}\n", REFERENCE_SENTENCE));
    }

    #[tokio::test]
    async fn test_fresh_fix_is_within_skew_budget() {
        let sink = RecordingSink::new();
        let mut dispatcher = dispatcher(fresh_store(), &sink, working_line()).with_skew_budget(Duration::from_secs(5));

        let report = dispatcher.tick().await.unwrap();

        let skew = report.pulse_skew.unwrap();
        assert!(skew < Duration::from_secs(5), "skew {:?}", skew);
        assert!(!report.skew_exceeded);
    }

    #[tokio::test]
    async fn test_stale_fix_exceeds_skew_budget() {
        let sink = RecordingSink::new();
        let mut dispatcher = dispatcher(reference_store(), &sink, working_line()).with_skew_budget(Duration::from_secs(1));

        let report = dispatcher.tick().await.unwrap();

        // The sentence reports 2024-01-01T00:00:00Z, long before the pulse
        let skew = report.pulse_skew.unwrap();
        assert!(skew > Duration::from_secs(24 * 3600), "skew {:?}", skew);
        assert!(report.skew_exceeded);
        // Still transmitted; the skew is reported, not enforced
        assert_eq!(report.transmit.outcome().await.send, JobOutcome::Done);
    }

    #[tokio::test]
    async fn test_uninitialized_store_still_pulses() {
        let sink = RecordingSink::new();
        let mut dispatcher = dispatcher(StateStore::new(), &sink, working_line());

        let report = dispatcher.tick().await.unwrap();

        assert!(report.sentence.is_none());
        assert_eq!(report.pulse, JobOutcome::Done);
        assert!(report.pulse_skew.is_none());

        let transmit = report.transmit.outcome().await;
        assert!(matches!(transmit.send, JobOutcome::Skipped(_)));
        assert!(matches!(transmit.persist, JobOutcome::Skipped(_)));
        assert!(sink.get_sent().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_snapshot_is_not_sent() {
        let store = reference_store();
        store
            .apply_update(&AttributeUpdate::GlobalPosition(GlobalPosition {
                lat: 91.0,
                lon: 0.0,
                alt: 0.0,
            }))
            .unwrap();
        let sink = RecordingSink::new();
        let mut dispatcher = dispatcher(store, &sink, working_line());

        let report = dispatcher.tick().await.unwrap();

        match report.transmit.outcome().await.send {
            JobOutcome::Skipped(reason) => assert!(reason.contains("range")),
            other => panic!("Expected skipped send, got: {:?}", other),
        }
        assert!(sink.get_sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_does_not_stop_next_tick() {
        let dir = tempdir().unwrap();
        let log = SentenceLog::new(dir.path().join("nmea.log"));
        let sink = RecordingSink::new();
        sink.fail_next(1);
        let mut dispatcher = dispatcher(reference_store(), &sink, working_line()).with_sentence_log(log.clone());

        let first = dispatcher.tick().await.unwrap();
        assert_eq!(first.pulse, JobOutcome::Done);
        let first = first.transmit.outcome().await;
        assert!(matches!(first.send, JobOutcome::Failed(_)));
        assert_eq!(first.persist, JobOutcome::Done);

        let second = dispatcher.tick().await.unwrap();
        assert_eq!(second.tick, 2);
        assert_eq!(second.pulse, JobOutcome::Done);
        assert_eq!(second.transmit.outcome().await.send, JobOutcome::Done);

        assert_eq!(sink.get_sent().len(), 1);
        // Both generated sentences are logged regardless of delivery
        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_pulse_failure_does_not_affect_transmit() {
        let mut line = MockPulseLine::new();
        line.expect_set_level()
            .returning(|_| Err(io::Error::new(io::ErrorKind::NotFound, "no gpio")));
        let sink = RecordingSink::new();
        let mut dispatcher = dispatcher(reference_store(), &sink, line);

        let report = assert_ok!(dispatcher.tick().await);

        assert!(matches!(report.pulse, JobOutcome::Failed(_)));
        assert!(report.pulse_skew.is_none());
        assert_eq!(report.transmit.outcome().await.send, JobOutcome::Done);
        assert_eq!(sink.get_sent().len(), 1);
        assert_eq!(dispatcher.pulses(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_still_sends() {
        let dir = tempdir().unwrap();
        let log = SentenceLog::new(dir.path().join("missing").join("nmea.log"));
        let sink = RecordingSink::new();
        let mut dispatcher = dispatcher(reference_store(), &sink, working_line()).with_sentence_log(log);

        let report = assert_ok!(dispatcher.tick().await);
        let transmit = report.transmit.outcome().await;

        assert!(matches!(transmit.persist, JobOutcome::Failed(_)));
        assert_eq!(transmit.send, JobOutcome::Done);
        assert_eq!(sink.get_sent().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_jobs_are_reported() {
        let sink = RecordingSink::new();
        let mut dispatcher: Dispatcher<RecordingSink, MockPulseLine> = Dispatcher::new(
            reference_store(),
            UdpTransport::with_sink(sink.clone(), lidar()),
            DEFAULT_TICK_INTERVAL,
        );

        let report = dispatcher.tick().await.unwrap();

        assert_eq!(report.pulse, JobOutcome::Disabled);
        assert!(report.pulse_latency.is_none());
        let transmit = report.transmit.outcome().await;
        assert_eq!(transmit.persist, JobOutcome::Disabled);
        assert_eq!(transmit.send, JobOutcome::Done);
        assert_eq!(dispatcher.skew_budget(), DEFAULT_PULSE_SKEW_BUDGET);
    }

    #[tokio::test]
    async fn test_repeated_ticks_on_frozen_snapshot_are_identical() {
        let sink = RecordingSink::new();
        let mut dispatcher = dispatcher(reference_store(), &sink, working_line());

        dispatcher.tick().await.unwrap().transmit.outcome().await;
        dispatcher.tick().await.unwrap().transmit.outcome().await;

        let sent = sink.get_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, sent[1].0);
    }

    #[tokio::test]
    async fn test_run_ticks_until_shutdown() {
        let sink = RecordingSink::new();
        let mut dispatcher = dispatcher(reference_store(), &sink, working_line());

        let ticks = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.run(tokio::time::sleep(Duration::from_millis(55))),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(ticks >= 2, "expected several ticks, got {}", ticks);
        assert_eq!(ticks, dispatcher.ticks());
        assert_eq!(dispatcher.pulses(), ticks);
        // run() waits for in-flight transmits before returning
        assert_eq!(sink.get_sent().len() as u64, dispatcher.sent());
        assert!(dispatcher.sent() >= 2);
    }

    #[tokio::test]
    async fn test_slow_transport_does_not_delay_pulses() {
        let transport = UdpTransport::with_sink(
            SlowSink {
                delay: Duration::from_millis(200),
            },
            lidar(),
        );
        let mut dispatcher = Dispatcher::new(reference_store(), transport, Duration::from_millis(20))
            .with_pulse(PulseEmitter::new(working_line(), Duration::from_micros(100)));

        let ticks = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.run(tokio::time::sleep(Duration::from_millis(300))),
        )
        .await
        .unwrap()
        .unwrap();

        // A blocking transmit would allow only one or two ticks in 300 ms
        assert!(ticks >= 8, "expected a pulse every tick, got {} ticks", ticks);
        assert_eq!(dispatcher.pulses(), ticks);
        // The backlog is capped; the rest of the sentences were dropped
        assert!(dispatcher.sent() <= ticks);
        assert!(dispatcher.sent() >= 1);
    }

    #[tokio::test]
    async fn test_transmit_backlog_is_capped() {
        let transport = UdpTransport::with_sink(
            SlowSink {
                delay: Duration::from_millis(500),
            },
            lidar(),
        );
        let mut dispatcher: Dispatcher<SlowSink, MockPulseLine> =
            Dispatcher::new(reference_store(), transport, DEFAULT_TICK_INTERVAL);

        let mut running = 0;
        for _ in 0..MAX_TRANSMITS_IN_FLIGHT {
            let report = dispatcher.tick().await.unwrap();
            if matches!(report.transmit, PendingTransmit::Running(_)) {
                running += 1;
            }
        }
        assert_eq!(running, MAX_TRANSMITS_IN_FLIGHT);

        let report = dispatcher.tick().await.unwrap();
        assert!(report.sentence.is_some());
        match report.transmit {
            PendingTransmit::Skipped(reason) => assert!(reason.contains("backlog")),
            other => panic!("Expected backlog skip, got: {:?}", other),
        }

        dispatcher.flush().await;
        assert_eq!(dispatcher.sent(), MAX_TRANSMITS_IN_FLIGHT as u64);
    }

    #[test]
    fn test_elapsed_between_is_absolute() {
        let earlier = Instant::now();
        let later = earlier + Duration::from_micros(250);

        assert_eq!(elapsed_between(earlier, later), Duration::from_micros(250));
        assert_eq!(elapsed_between(later, earlier), Duration::from_micros(250));
    }

    #[test]
    fn test_utc_gap_is_absolute() {
        let fix = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let edge = fix + chrono::Duration::microseconds(1500);

        assert_eq!(utc_gap(edge, fix), Some(Duration::from_micros(1500)));
        assert_eq!(utc_gap(fix, edge), Some(Duration::from_micros(1500)));
    }

    #[test]
    fn test_default_timing_constants() {
        assert_eq!(DEFAULT_TICK_INTERVAL, Duration::from_secs(1));
        assert!(DEFAULT_PULSE_SKEW_BUDGET < DEFAULT_TICK_INTERVAL);
        assert_eq!(DEFAULT_PULSE_SKEW_BUDGET, Duration::from_millis(2));
    }
}
