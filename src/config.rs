//! Transport configuration
//!
//! All values are supplied by the embedding application; the core reads no
//! config files or environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::*;
use crate::error::SessionError;
use crate::protocol::{MIN_PACKET_LEN, SAMPLE_WIRE_LEN};

/// Configuration for a transport session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Sample rate of the stream in Hz
    pub sample_rate: u32,

    /// Interleaved channel count
    pub channels: u8,

    /// Maximum datagram size in bytes, header and checksum included
    pub max_packet_size: usize,

    /// Minimum jitter buffer occupancy target in packets
    pub min_buffer_packets: usize,

    /// Maximum jitter buffer occupancy target in packets
    pub max_buffer_packets: usize,

    /// Emit buffered audio after this long without playback output
    pub flush_timeout: Duration,

    /// Largest sequence gap the cursor jumps over when the stream stalls
    pub gap_tolerance: u32,

    /// Interval of the playback extraction tick
    pub playback_tick: Duration,

    /// Capacity of the queue feeding `next_ready_packet`
    pub ready_queue_capacity: usize,

    /// Capacity of the session event channel
    pub event_queue_capacity: usize,

    /// Interval between `MetricsTick` events
    pub metrics_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            max_packet_size: MAX_PACKET_SIZE,
            min_buffer_packets: MIN_BUFFER_PACKETS,
            max_buffer_packets: MAX_BUFFER_PACKETS,
            flush_timeout: FLUSH_TIMEOUT,
            gap_tolerance: GAP_TOLERANCE,
            playback_tick: PLAYBACK_TICK,
            ready_queue_capacity: READY_QUEUE_CAPACITY,
            event_queue_capacity: EVENT_QUEUE_CAPACITY,
            metrics_interval: METRICS_INTERVAL,
        }
    }
}

impl TransportConfig {
    /// Check invariants before a session starts
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.sample_rate == 0 {
            return Err(SessionError::InvalidConfig(
                "sample rate must be positive".into(),
            ));
        }
        if self.channels == 0 {
            return Err(SessionError::InvalidConfig(
                "channel count must be at least 1".into(),
            ));
        }
        if self.min_buffer_packets == 0 || self.min_buffer_packets > self.max_buffer_packets {
            return Err(SessionError::InvalidConfig(
                "buffer bounds must satisfy 0 < min <= max".into(),
            ));
        }
        if self.max_packet_size <= MIN_PACKET_LEN {
            return Err(SessionError::InvalidConfig(format!(
                "max packet size {} leaves no room for samples",
                self.max_packet_size
            )));
        }
        Ok(())
    }

    /// Number of samples that fit in a single datagram payload
    pub fn max_samples_per_packet(&self) -> usize {
        self.max_packet_size.saturating_sub(MIN_PACKET_LEN) / SAMPLE_WIRE_LEN
    }
}
