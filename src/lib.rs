//! # LAN PCM Transport
//!
//! Low-latency transport of raw PCM audio over UDP. Moves float samples
//! between a sender and a receiver across an unreliable, unordered network
//! while reconstructing a continuous, correctly ordered, clock-synchronized
//! stream for playback.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────── SENDER ────────────────────────────┐
//! │  audio callback ──► AudioSender (network::sender)              │
//! │                        │  stamp sequence + timestamp           │
//! │                        ▼                                       │
//! │                     PacketEncoder (codec::encoder)             │
//! │                        │  [seq | timestamp | f32 payload | crc]│
//! └────────────────────────┼───────────────────────────────────────┘
//!                          │ UDP datagrams (loss, reorder, dup)
//! ┌────────────────────────┼─────────────────────── RECEIVER ──────┐
//! │                        ▼                                       │
//! │                     PacketDecoder (codec::decoder)             │
//! │                        │ validated packets                     │
//! │        ┌───────────────┴───────────────┐                       │
//! │        ▼                               ▼                       │
//! │  ClockDriftCorrector ── jitter ──► JitterBuffer (buffer)       │
//! │  (sync::clock_drift)   estimate        │                       │
//! │                                        │ playback tick (2ms)   │
//! │                                        ▼                       │
//! │                        next_ready_packet() ──► audio engine    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The receiving session never stalls on a bad packet: decode failures,
//! late arrivals, duplicates, and overflow are counted and absorbed, while
//! sustained jitter or loss widens the adaptive buffer (more latency)
//! instead of glitching, up to a configured ceiling.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod sync;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Default sample rate for audio processing
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u8 = 2;

    /// Default frame length in milliseconds; keeps a stereo 48kHz frame
    /// inside a single datagram
    pub const DEFAULT_FRAME_SIZE_MS: f32 = 2.5;

    /// Maximum packet size for UDP
    pub const MAX_PACKET_SIZE: usize = 1472; // MTU - IP/UDP headers

    /// Minimum adaptive jitter buffer occupancy in packets
    pub const MIN_BUFFER_PACKETS: usize = 3;

    /// Maximum adaptive jitter buffer occupancy in packets
    pub const MAX_BUFFER_PACKETS: usize = 20;

    /// Emit buffered audio after this long without playback output
    pub const FLUSH_TIMEOUT: Duration = Duration::from_millis(5);

    /// Largest sequence gap the buffer cursor jumps when the stream stalls
    pub const GAP_TOLERANCE: u32 = 5;

    /// Playback extraction tick interval
    pub const PLAYBACK_TICK: Duration = Duration::from_millis(2);

    /// Ready-packet queue capacity
    pub const READY_QUEUE_CAPACITY: usize = 1024;

    /// Session event channel capacity
    pub const EVENT_QUEUE_CAPACITY: usize = 256;

    /// Interval between metrics snapshot events
    pub const METRICS_INTERVAL: Duration = Duration::from_secs(1);
}
