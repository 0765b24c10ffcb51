//! Sending side of the transport session
//!
//! Best-effort: each audio frame is stamped, encoded, and sent exactly once.
//! A late retransmit is worse than a dropped frame for live audio, so there
//! is no acknowledgment or retry path.

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;
use tokio::net::UdpSocket;

use crate::codec::PacketEncoder;
use crate::config::TransportConfig;
use crate::error::{NetworkError, Result};
use crate::network::udp;
use crate::protocol::AudioPacket;

/// Sends PCM frames as sequenced, timestamped datagrams
pub struct AudioSender {
    socket: UdpSocket,
    encoder: Mutex<PacketEncoder>,
    /// Sequence of the next frame; never regresses within a session
    sequence: AtomicU32,
    /// Session epoch for send timestamps
    epoch: Instant,
    sample_rate: u32,
    channels: u8,
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    send_errors: AtomicU64,
}

impl AudioSender {
    /// Bind an ephemeral local socket and connect it to the receiver
    pub async fn connect(target: SocketAddr, config: &TransportConfig) -> Result<Self> {
        config.validate()?;

        let socket = udp::bind_socket(udp::unspecified_local(&target))?;
        socket
            .connect(target)
            .await
            .map_err(|e| NetworkError::ConnectFailed(e.to_string()))?;
        tracing::info!(%target, "sender connected");

        Ok(Self {
            socket,
            encoder: Mutex::new(PacketEncoder::new(config.max_packet_size)),
            sequence: AtomicU32::new(0),
            epoch: Instant::now(),
            sample_rate: config.sample_rate,
            channels: config.channels,
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
        })
    }

    /// Stamp, encode, and send one frame of interleaved samples
    ///
    /// Returns the sequence number the frame was sent under. Socket errors
    /// are counted and surfaced to the caller but never poison the sender;
    /// the next frame goes out under the next sequence.
    pub fn send_samples(&self, samples: &[f32]) -> Result<u32> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let send_timestamp = self.epoch.elapsed().as_nanos() as u64;
        let packet = AudioPacket::new(
            sequence,
            send_timestamp,
            self.sample_rate,
            self.channels,
            samples.to_vec(),
        );
        let datagram = self.encoder.lock().encode(&packet)?;

        match self.socket.try_send(&datagram) {
            Ok(len) => {
                self.packets_sent.fetch_add(1, Ordering::Relaxed);
                self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
                Ok(sequence)
            }
            Err(e) => {
                self.send_errors.fetch_add(1, Ordering::Relaxed);
                Err(NetworkError::SendFailed(e.to_string()).into())
            }
        }
    }

    /// Sequence number the next frame will carry
    pub fn next_sequence(&self) -> u32 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Local address of the connected socket
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Get statistics
    pub fn stats(&self) -> SenderStats {
        SenderStats {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

/// Sender statistics
#[derive(Debug, Clone, Default)]
pub struct SenderStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sequences_increase_monotonically() {
        // A receiver-less target: sends still succeed at the socket level.
        let sink = udp::bind_socket("127.0.0.1:0".parse().unwrap()).unwrap();
        let target = sink.local_addr().unwrap();

        let config = TransportConfig {
            channels: 1,
            ..TransportConfig::default()
        };
        let sender = AudioSender::connect(target, &config).await.unwrap();

        let samples = vec![0.0f32; 64];
        for expected in 0..5u32 {
            assert_eq!(sender.send_samples(&samples).unwrap(), expected);
        }

        let stats = sender.stats();
        assert_eq!(stats.packets_sent, 5);
        assert_eq!(stats.send_errors, 0);
        assert_eq!(sender.next_sequence(), 5);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let sink = udp::bind_socket("127.0.0.1:0".parse().unwrap()).unwrap();
        let target = sink.local_addr().unwrap();

        let config = TransportConfig {
            channels: 1,
            ..TransportConfig::default()
        };
        let sender = AudioSender::connect(target, &config).await.unwrap();

        // One more sample than fits the datagram budget.
        let samples = vec![0.0f32; config.max_samples_per_packet() + 1];
        assert!(sender.send_samples(&samples).is_err());
        assert_eq!(sender.stats().packets_sent, 0);
    }
}
