//! Error types for the transport core

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Packet encoding errors
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Datagram of {size} bytes exceeds the maximum of {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Sample count {samples} is not a multiple of {channels} channels")]
    ChannelMisaligned { samples: usize, channels: u8 },
}

/// Packet decoding errors
///
/// Every malformed datagram maps to one of these variants so the receive
/// loop can count the failure and continue; decoding never panics on
/// garbage input.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Datagram of {0} bytes is shorter than the minimum packet")]
    TooShort(usize),

    #[error("Payload checksum mismatch: wire {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Payload of {0} bytes is not a whole number of samples")]
    TruncatedPayload(usize),

    #[error("Sample count {samples} is not a multiple of {channels} channels")]
    ChannelMisaligned { samples: usize, channels: u8 },

    #[error("Sequence field {0} exceeds the 32-bit sequence space")]
    SequenceOutOfRange(u64),
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Session lifecycle errors
///
/// The only errors allowed to propagate to the caller; everything inside
/// the steady-state receive/playback path is absorbed and counted.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session is already running")]
    AlreadyRunning,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
