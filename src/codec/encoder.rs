//! Packet encoder
//!
//! Builds wire datagrams: 16-byte header, big-endian f32 payload, CRC32
//! trailer. One packet per datagram; the caller splits audio into frames
//! small enough to fit the datagram budget.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::EncodeError;
use crate::protocol::{payload_checksum, AudioPacket, CHECKSUM_LEN, HEADER_LEN, SAMPLE_WIRE_LEN};

/// Packet encoder with a fixed datagram budget
pub struct PacketEncoder {
    max_packet_size: usize,
    /// Packet counter for statistics
    packets_encoded: u64,
    /// Total bytes produced
    bytes_produced: u64,
}

impl PacketEncoder {
    /// Create an encoder bounded by the given maximum datagram size
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            max_packet_size,
            packets_encoded: 0,
            bytes_produced: 0,
        }
    }

    /// Serialize a packet into wire format
    ///
    /// Fails when the datagram would exceed the configured maximum; callers
    /// must send smaller frames instead of relying on IP fragmentation.
    pub fn encode(&mut self, packet: &AudioPacket) -> Result<Bytes, EncodeError> {
        if packet.channels == 0 || packet.samples.len() % packet.channels as usize != 0 {
            return Err(EncodeError::ChannelMisaligned {
                samples: packet.samples.len(),
                channels: packet.channels,
            });
        }

        let wire_len = HEADER_LEN + packet.samples.len() * SAMPLE_WIRE_LEN + CHECKSUM_LEN;
        if wire_len > self.max_packet_size {
            return Err(EncodeError::PayloadTooLarge {
                size: wire_len,
                max: self.max_packet_size,
            });
        }

        let mut buf = BytesMut::with_capacity(wire_len);
        buf.put_u64(packet.sequence as u64);
        buf.put_u64(packet.send_timestamp);
        for sample in &packet.samples {
            buf.put_u32(sample.to_bits());
        }
        buf.put_u32(payload_checksum(&packet.samples));

        self.packets_encoded += 1;
        self.bytes_produced += wire_len as u64;

        Ok(buf.freeze())
    }

    /// Maximum datagram size this encoder will produce
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Get statistics
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            packets_encoded: self.packets_encoded,
            bytes_produced: self.bytes_produced,
        }
    }
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    pub packets_encoded: u64,
    pub bytes_produced: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MIN_PACKET_LEN;

    #[test]
    fn test_header_layout() {
        let mut encoder = PacketEncoder::new(1472);
        let packet = AudioPacket::new(0x0102_0304, 0x1122_3344_5566_7788, 48_000, 1, vec![]);
        let wire = encoder.encode(&packet).unwrap();

        assert_eq!(wire.len(), MIN_PACKET_LEN);
        assert_eq!(
            u64::from_be_bytes(wire[0..8].try_into().unwrap()),
            0x0102_0304
        );
        assert_eq!(
            u64::from_be_bytes(wire[8..16].try_into().unwrap()),
            0x1122_3344_5566_7788
        );
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let mut encoder = PacketEncoder::new(100);
        let packet = AudioPacket::new(0, 0, 48_000, 1, vec![0.0; 64]);

        let err = encoder.encode(&packet).unwrap_err();
        assert!(matches!(err, EncodeError::PayloadTooLarge { .. }));
        assert_eq!(encoder.stats().packets_encoded, 0);
    }

    #[test]
    fn test_rejects_misaligned_channels() {
        let mut encoder = PacketEncoder::new(1472);
        let packet = AudioPacket::new(0, 0, 48_000, 2, vec![0.0; 3]);

        let err = encoder.encode(&packet).unwrap_err();
        assert!(matches!(err, EncodeError::ChannelMisaligned { .. }));
    }

    #[test]
    fn test_stats_accumulate() {
        let mut encoder = PacketEncoder::new(1472);
        let packet = AudioPacket::new(0, 0, 48_000, 2, vec![0.5; 8]);

        encoder.encode(&packet).unwrap();
        encoder.encode(&packet).unwrap();

        let stats = encoder.stats();
        assert_eq!(stats.packets_encoded, 2);
        assert_eq!(stats.bytes_produced as usize, 2 * (MIN_PACKET_LEN + 8 * 4));
    }
}
