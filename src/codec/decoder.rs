//! Packet decoder
//!
//! Validates and deserializes incoming datagrams. Malformed input maps to a
//! typed `DecodeError` so the receive loop can count failures and continue.

use bytes::Buf;

use crate::error::DecodeError;
use crate::protocol::{AudioPacket, CHECKSUM_LEN, HEADER_LEN, MIN_PACKET_LEN, SAMPLE_WIRE_LEN};

/// Packet decoder bound to a session's stream parameters
///
/// Sample rate and channel count are fixed per session; the decoder stamps
/// them into every validated packet.
pub struct PacketDecoder {
    sample_rate: u32,
    channels: u8,
    /// Packets successfully decoded
    packets_decoded: u64,
    /// Datagrams rejected as malformed
    packets_rejected: u64,
}

impl PacketDecoder {
    pub fn new(sample_rate: u32, channels: u8) -> Self {
        Self {
            sample_rate,
            channels,
            packets_decoded: 0,
            packets_rejected: 0,
        }
    }

    /// Deserialize one datagram into a validated packet
    pub fn decode(&mut self, data: &[u8]) -> Result<AudioPacket, DecodeError> {
        match self.decode_inner(data) {
            Ok(packet) => {
                self.packets_decoded += 1;
                Ok(packet)
            }
            Err(e) => {
                self.packets_rejected += 1;
                Err(e)
            }
        }
    }

    fn decode_inner(&self, data: &[u8]) -> Result<AudioPacket, DecodeError> {
        if data.len() < MIN_PACKET_LEN {
            return Err(DecodeError::TooShort(data.len()));
        }

        let payload_len = data.len() - HEADER_LEN - CHECKSUM_LEN;
        if payload_len % SAMPLE_WIRE_LEN != 0 {
            return Err(DecodeError::TruncatedPayload(payload_len));
        }

        let payload = &data[HEADER_LEN..HEADER_LEN + payload_len];
        let mut trailer = &data[HEADER_LEN + payload_len..];
        let expected = trailer.get_u32();
        let actual = crc32fast::hash(payload);
        if expected != actual {
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }

        let mut header = &data[..HEADER_LEN];
        let sequence = header.get_u64();
        let send_timestamp = header.get_u64();
        if sequence > u32::MAX as u64 {
            return Err(DecodeError::SequenceOutOfRange(sequence));
        }

        let sample_count = payload_len / SAMPLE_WIRE_LEN;
        if sample_count % self.channels as usize != 0 {
            return Err(DecodeError::ChannelMisaligned {
                samples: sample_count,
                channels: self.channels,
            });
        }

        let samples = payload
            .chunks_exact(SAMPLE_WIRE_LEN)
            .map(|b| f32::from_bits(u32::from_be_bytes([b[0], b[1], b[2], b[3]])))
            .collect();

        Ok(AudioPacket {
            sequence: sequence as u32,
            send_timestamp,
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples,
        })
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get channel count
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Get statistics
    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            packets_decoded: self.packets_decoded,
            packets_rejected: self.packets_rejected,
        }
    }
}

/// Decoder statistics
#[derive(Debug, Clone)]
pub struct DecoderStats {
    pub packets_decoded: u64,
    pub packets_rejected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PacketEncoder;
    use bytes::BufMut;

    fn encode(packet: &AudioPacket) -> Vec<u8> {
        PacketEncoder::new(65_536).encode(packet).unwrap().to_vec()
    }

    #[test]
    fn test_roundtrip() {
        let packet = AudioPacket::new(42, 1_234_567_890, 48_000, 2, vec![0.1, -0.2, 0.3, -0.4]);
        let wire = encode(&packet);

        let mut decoder = PacketDecoder::new(48_000, 2);
        let decoded = decoder.decode(&wire).unwrap();

        assert_eq!(decoded, packet);
        assert_eq!(decoder.stats().packets_decoded, 1);
    }

    #[test]
    fn test_too_short() {
        let mut decoder = PacketDecoder::new(48_000, 2);
        let err = decoder.decode(&[0u8; 12]).unwrap_err();

        assert!(matches!(err, DecodeError::TooShort(12)));
        assert_eq!(decoder.stats().packets_rejected, 1);
    }

    #[test]
    fn test_checksum_mismatch() {
        let packet = AudioPacket::new(7, 99, 48_000, 1, vec![0.5, 0.25]);
        let mut wire = encode(&packet);
        wire[HEADER_LEN] ^= 0xFF; // corrupt the first payload byte

        let mut decoder = PacketDecoder::new(48_000, 1);
        let err = decoder.decode(&wire).unwrap_err();
        assert!(matches!(err, DecodeError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_truncated_payload() {
        let packet = AudioPacket::new(7, 99, 48_000, 1, vec![0.5, 0.25]);
        let mut wire = encode(&packet);
        wire.truncate(wire.len() - 2);

        let mut decoder = PacketDecoder::new(48_000, 1);
        let err = decoder.decode(&wire).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedPayload(_)));
    }

    #[test]
    fn test_sequence_out_of_range() {
        // Hand-built datagram with a sequence beyond u32 and a valid
        // checksum over its empty payload.
        let mut wire = Vec::new();
        wire.put_u64(u64::MAX);
        wire.put_u64(0);
        wire.put_u32(crc32fast::hash(&[]));

        let mut decoder = PacketDecoder::new(48_000, 1);
        let err = decoder.decode(&wire).unwrap_err();
        assert!(matches!(err, DecodeError::SequenceOutOfRange(u64::MAX)));
    }

    #[test]
    fn test_channel_misalignment() {
        // Three samples cannot interleave across two channels.
        let packet = AudioPacket::new(0, 0, 48_000, 1, vec![0.1, 0.2, 0.3]);
        let wire = encode(&packet);

        let mut decoder = PacketDecoder::new(48_000, 2);
        let err = decoder.decode(&wire).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::ChannelMisaligned {
                samples: 3,
                channels: 2
            }
        ));
    }

    #[test]
    fn test_garbage_never_panics() {
        let mut decoder = PacketDecoder::new(48_000, 2);
        for len in 0..64 {
            let garbage = vec![0xA5u8; len];
            let _ = decoder.decode(&garbage);
        }
    }
}
