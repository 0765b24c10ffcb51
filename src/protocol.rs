//! Shared packet and event types
//!
//! Defines the unit of transport (`AudioPacket`), the wire-format constants,
//! and the typed messages a running session publishes in place of callbacks.

use serde::Serialize;
use std::time::Duration;

/// Wire header length: sequence (8 bytes) + send timestamp (8 bytes)
pub const HEADER_LEN: usize = 16;

/// Trailing CRC32 over the payload bytes
pub const CHECKSUM_LEN: usize = 4;

/// Wire size of one f32 sample
pub const SAMPLE_WIRE_LEN: usize = 4;

/// Smallest possible datagram: header plus checksum around an empty payload
pub const MIN_PACKET_LEN: usize = HEADER_LEN + CHECKSUM_LEN;

/// A single unit of audio transport
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPacket {
    /// Monotonically increasing per sender session
    pub sequence: u32,
    /// Sender clock at encode time, nanoseconds since the session epoch
    pub send_timestamp: u64,
    /// Sample rate of the stream in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u8,
    /// Interleaved f32 samples
    pub samples: Vec<f32>,
}

impl AudioPacket {
    pub fn new(
        sequence: u32,
        send_timestamp: u64,
        sample_rate: u32,
        channels: u8,
        samples: Vec<f32>,
    ) -> Self {
        Self {
            sequence,
            send_timestamp,
            sample_rate,
            channels,
            samples,
        }
    }

    /// Number of samples per channel
    pub fn samples_per_channel(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Playback duration of this packet
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(
            self.samples_per_channel() as u64 * 1_000_000_000 / self.sample_rate as u64,
        )
    }
}

/// CRC32 over the payload's wire bytes
pub fn payload_checksum(samples: &[f32]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for sample in samples {
        hasher.update(&sample.to_bits().to_be_bytes());
    }
    hasher.finalize()
}

/// Events published by a running session
///
/// Observers consume these over a bounded channel; a slow consumer loses
/// events rather than stalling the transport.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A validated packet entered the jitter buffer
    PacketArrived { sequence: u32 },
    /// A packet was handed to the playback queue
    PlaybackReady { sequence: u32 },
    /// Periodic counters snapshot
    MetricsTick(MetricsSnapshot),
}

/// Read-only view of a receiving session's counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Validated packets accepted by the receive loop
    pub packets_received: u64,
    /// Datagrams rejected by the decoder
    pub packets_corrupted: u64,
    /// Socket-level receive failures
    pub connection_errors: u64,
    /// Packets behind the playback cursor when they arrived
    pub dropped_late: u64,
    /// Packets evicted by overflow protection or queue backpressure
    pub dropped_overflow: u64,
    /// Sequences the cursor skipped as permanent loss
    pub lost: u64,
    /// Packets buffered ahead of the cursor
    pub reordered: u64,
    /// Duplicate arrivals discarded by the buffer
    pub duplicates: u64,
    /// Current jitter buffer occupancy
    pub buffered: usize,
    /// Current adaptive occupancy target
    pub buffer_target: usize,
    /// Latency of the most recent packet (arrival vs. corrected send time)
    pub current_latency: Duration,
    /// Rolling average over the recent latency window
    pub average_latency: Duration,
    /// Current network jitter estimate
    pub network_jitter: Duration,
}
