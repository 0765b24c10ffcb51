//! Wire codec for audio packets
//!
//! Serializes packets into self-contained datagrams and validates incoming
//! datagrams before they reach the jitter buffer.

pub mod decoder;
pub mod encoder;

pub use decoder::{DecoderStats, PacketDecoder};
pub use encoder::{EncoderStats, PacketEncoder};
