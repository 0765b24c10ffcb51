//! Receiving side of the transport session
//!
//! Runs two tasks: a receive loop that validates and buffers incoming
//! datagrams, and a playback tick that paces ordered packets out to the
//! consumer. Per-packet anomalies are counted and absorbed; only lifecycle
//! failures surface to the caller.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::buffer::JitterBuffer;
use crate::codec::PacketDecoder;
use crate::config::TransportConfig;
use crate::error::{Result, SessionError};
use crate::network::udp;
use crate::protocol::{AudioPacket, MetricsSnapshot, SessionEvent};
use crate::sync::ClockDriftCorrector;

/// Lifecycle states of a receiving session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Window length of the rolling latency average
const LATENCY_WINDOW: usize = 200;

/// Rolling latency window
#[derive(Default)]
struct LatencyTracker {
    samples: VecDeque<u64>,
    sum: u64,
}

impl LatencyTracker {
    fn record(&mut self, latency_ns: u64) {
        if self.samples.len() >= LATENCY_WINDOW {
            if let Some(old) = self.samples.pop_front() {
                self.sum -= old;
            }
        }
        self.samples.push_back(latency_ns);
        self.sum += latency_ns;
    }

    fn average(&self) -> Duration {
        if self.samples.is_empty() {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.sum / self.samples.len() as u64)
        }
    }

    fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0;
    }
}

/// State shared between the receive loop and the playback tick
///
/// Each lock is held only for the duration of a single buffer or corrector
/// operation; neither task ever holds one across an await point.
struct Shared {
    buffer: Mutex<JitterBuffer>,
    clock: Mutex<ClockDriftCorrector>,
    latency: Mutex<LatencyTracker>,
    /// Last sequence handed to the playback queue, -1 before any
    playback_floor: AtomicI64,
    packets_received: AtomicU64,
    packets_corrupted: AtomicU64,
    connection_errors: AtomicU64,
    prefilter_late: AtomicU64,
    queue_dropped: AtomicU64,
    current_latency_ns: AtomicU64,
}

impl Shared {
    fn new(config: &TransportConfig) -> Self {
        Self {
            buffer: Mutex::new(JitterBuffer::new(config)),
            clock: Mutex::new(ClockDriftCorrector::new()),
            latency: Mutex::new(LatencyTracker::default()),
            playback_floor: AtomicI64::new(-1),
            packets_received: AtomicU64::new(0),
            packets_corrupted: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            prefilter_late: AtomicU64::new(0),
            queue_dropped: AtomicU64::new(0),
            current_latency_ns: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let buffer_stats = self.buffer.lock().stats();
        let network_jitter = self.clock.lock().network_jitter();
        let average_latency = self.latency.lock().average();

        MetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_corrupted: self.packets_corrupted.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            dropped_late: buffer_stats.dropped_late + self.prefilter_late.load(Ordering::Relaxed),
            dropped_overflow: buffer_stats.dropped_overflow
                + self.queue_dropped.load(Ordering::Relaxed),
            lost: buffer_stats.lost,
            reordered: buffer_stats.reordered,
            duplicates: buffer_stats.duplicates,
            buffered: buffer_stats.buffered,
            buffer_target: buffer_stats.target,
            current_latency: Duration::from_nanos(self.current_latency_ns.load(Ordering::Relaxed)),
            average_latency,
            network_jitter,
        }
    }

    fn reset(&self) {
        self.buffer.lock().reset();
        self.clock.lock().reset();
        self.latency.lock().clear();
        self.playback_floor.store(-1, Ordering::Relaxed);
        self.packets_received.store(0, Ordering::Relaxed);
        self.packets_corrupted.store(0, Ordering::Relaxed);
        self.connection_errors.store(0, Ordering::Relaxed);
        self.prefilter_late.store(0, Ordering::Relaxed);
        self.queue_dropped.store(0, Ordering::Relaxed);
        self.current_latency_ns.store(0, Ordering::Relaxed);
    }
}

/// Pull-based receiving session
///
/// The external audio engine drains `next_ready_packet` at its own cadence;
/// packets come out strictly in sequence order and never twice.
pub struct AudioReceiver {
    config: TransportConfig,
    state: Mutex<SessionState>,
    shared: Arc<Shared>,
    ready_tx: Sender<AudioPacket>,
    ready_rx: Receiver<AudioPacket>,
    event_tx: Sender<SessionEvent>,
    event_rx: Receiver<SessionEvent>,
    shutdown: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl AudioReceiver {
    pub fn new(config: TransportConfig) -> Self {
        let (ready_tx, ready_rx) = bounded(config.ready_queue_capacity);
        let (event_tx, event_rx) = bounded(config.event_queue_capacity);

        Self {
            shared: Arc::new(Shared::new(&config)),
            config,
            state: Mutex::new(SessionState::Idle),
            ready_tx,
            ready_rx,
            event_tx,
            event_rx,
            shutdown: None,
            tasks: Vec::new(),
            local_addr: None,
        }
    }

    /// Bind the socket and start the receive loop and the playback tick
    ///
    /// A bind failure leaves the session Idle and is returned to the caller.
    pub async fn start(&mut self, bind_addr: SocketAddr) -> Result<()> {
        self.config.validate()?;
        {
            let mut state = self.state.lock();
            if *state != SessionState::Idle {
                return Err(SessionError::AlreadyRunning.into());
            }
            *state = SessionState::Starting;
        }

        let socket = match udp::bind_socket(bind_addr) {
            Ok(socket) => Arc::new(socket),
            Err(e) => {
                *self.state.lock() = SessionState::Idle;
                return Err(e);
            }
        };
        self.local_addr = socket.local_addr().ok();
        tracing::info!(%bind_addr, "receiver session starting");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let epoch = Instant::now();

        self.tasks.push(tokio::spawn(receive_loop(
            socket,
            self.config.clone(),
            self.shared.clone(),
            self.event_tx.clone(),
            shutdown_rx.clone(),
            epoch,
        )));
        self.tasks.push(tokio::spawn(playback_tick(
            self.config.clone(),
            self.shared.clone(),
            self.ready_tx.clone(),
            self.event_tx.clone(),
            shutdown_rx,
        )));

        self.shutdown = Some(shutdown_tx);
        *self.state.lock() = SessionState::Running;
        Ok(())
    }

    /// Stop the session, cancel both tasks, and reset all cursors
    ///
    /// Safe to call while packets are in flight; a subsequent `start` begins
    /// a completely fresh session.
    pub async fn stop(&mut self) {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Running {
                return;
            }
            *state = SessionState::Stopping;
        }

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        while self.ready_rx.try_recv().is_ok() {}
        self.shared.reset();
        self.local_addr = None;
        *self.state.lock() = SessionState::Idle;
        tracing::info!("receiver session stopped");
    }

    /// Next in-order packet, if the playback tick has released one
    pub fn next_ready_packet(&self) -> Option<AudioPacket> {
        self.ready_rx.try_recv().ok()
    }

    /// Event stream of the running session
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }

    /// Read-only view of the session counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.snapshot()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Bound address while the session is running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for AudioReceiver {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    config: TransportConfig,
    shared: Arc<Shared>,
    event_tx: Sender<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
    epoch: Instant,
) {
    let mut decoder = PacketDecoder::new(config.sample_rate, config.channels);
    let mut buf = vec![0u8; config.max_packet_size.max(2048)];

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, _peer)) => {
                    let local_ns = epoch.elapsed().as_nanos() as u64;
                    handle_datagram(&buf[..len], local_ns, &mut decoder, &shared, &event_tx);
                }
                Err(e) => {
                    shared.connection_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("receive error: {}", e);
                }
            },
        }
    }
}

fn handle_datagram(
    datagram: &[u8],
    local_ns: u64,
    decoder: &mut PacketDecoder,
    shared: &Shared,
    event_tx: &Sender<SessionEvent>,
) {
    let packet = match decoder.decode(datagram) {
        Ok(packet) => packet,
        Err(e) => {
            shared.packets_corrupted.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("discarding datagram: {}", e);
            return;
        }
    };

    // Cheap dedup against the playback floor before touching the buffer
    // lock; anything at or below it would be dropped as late anyway.
    if (packet.sequence as i64) <= shared.playback_floor.load(Ordering::Acquire) {
        shared.prefilter_late.fetch_add(1, Ordering::Relaxed);
        return;
    }

    shared.packets_received.fetch_add(1, Ordering::Relaxed);
    let sequence = packet.sequence;

    let (jitter, corrected_send_ns) = {
        let mut clock = shared.clock.lock();
        clock.ingest(packet.send_timestamp, local_ns);
        (
            clock.network_jitter(),
            clock.corrected_time(packet.send_timestamp),
        )
    };

    let latency_ns = local_ns.saturating_sub(corrected_send_ns);
    shared.current_latency_ns.store(latency_ns, Ordering::Relaxed);
    shared.latency.lock().record(latency_ns);

    {
        let mut buffer = shared.buffer.lock();
        buffer.set_network_jitter(jitter);
        buffer.insert(packet);
    }

    let _ = event_tx.try_send(SessionEvent::PacketArrived { sequence });
}

async fn playback_tick(
    config: TransportConfig,
    shared: Arc<Shared>,
    ready_tx: Sender<AudioPacket>,
    event_tx: Sender<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(config.playback_tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let ticks_per_snapshot = (config.metrics_interval.as_nanos()
        / config.playback_tick.as_nanos().max(1))
    .max(1) as u64;
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                let ready = shared.buffer.lock().extract_ready();
                for packet in ready {
                    let sequence = packet.sequence;
                    shared.playback_floor.store(sequence as i64, Ordering::Release);
                    match ready_tx.try_send(packet) {
                        Ok(()) => {
                            let _ = event_tx.try_send(SessionEvent::PlaybackReady { sequence });
                        }
                        Err(TrySendError::Full(_)) => {
                            // Consumer is not draining; freshness wins.
                            shared.queue_dropped.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(TrySendError::Disconnected(_)) => return,
                    }
                }

                ticks += 1;
                if ticks % ticks_per_snapshot == 0 {
                    let _ = event_tx.try_send(SessionEvent::MetricsTick(shared.snapshot()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut receiver = AudioReceiver::new(TransportConfig::default());
        receiver
            .start("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(receiver.state(), SessionState::Running);

        let err = receiver.start("127.0.0.1:0".parse().unwrap()).await;
        assert!(err.is_err());

        receiver.stop().await;
        assert_eq!(receiver.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_bind_failure_returns_to_idle() {
        // TEST-NET-1 is not assigned to any local interface, so the bind
        // fails and must leave the session Idle.
        let mut receiver = AudioReceiver::new(TransportConfig::default());
        assert!(receiver.start("192.0.2.1:5000".parse().unwrap()).await.is_err());
        assert_eq!(receiver.state(), SessionState::Idle);

        // The failed session can still start on a usable address afterwards.
        receiver
            .start("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        receiver.stop().await;
    }

    #[tokio::test]
    async fn test_stop_resets_counters() {
        let mut receiver = AudioReceiver::new(TransportConfig::default());
        receiver
            .start("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        receiver.stop().await;
        let metrics = receiver.metrics();
        assert_eq!(metrics.packets_received, 0);
        assert_eq!(metrics.buffered, 0);
        assert!(receiver.next_ready_packet().is_none());
    }

    #[test]
    fn test_latency_tracker_window() {
        let mut tracker = LatencyTracker::default();
        for _ in 0..LATENCY_WINDOW {
            tracker.record(1_000);
        }
        assert_eq!(tracker.average(), Duration::from_nanos(1_000));

        // Half a window of much larger samples pulls the average up but the
        // evicted old samples no longer weigh in.
        for _ in 0..LATENCY_WINDOW / 2 {
            tracker.record(3_000);
        }
        assert_eq!(tracker.average(), Duration::from_nanos(2_000));
    }
}
