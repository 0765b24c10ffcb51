//! Audio Receiver Application
//!
//! Binds a UDP port, reconstructs the incoming stream, and drains ready
//! packets the way an audio engine would, logging metrics snapshots.

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_pcm_transport::{
    config::TransportConfig, network::AudioReceiver, protocol::SessionEvent,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PCM audio receiver");

    // Get bind address from args or use default
    let bind_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:5000".to_string())
        .parse()
        .expect("Invalid bind address");

    let config = TransportConfig::default();
    let mut receiver = AudioReceiver::new(config);
    receiver.start(bind_addr).await?;

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("Waiting for audio stream...");

    let events = receiver.events();
    let mut packets_played = 0u64;

    loop {
        // Drain ordered packets; a real audio engine would hand these
        // samples to the device here.
        while let Some(packet) = receiver.next_ready_packet() {
            packets_played += 1;
            if packets_played == 1 {
                tracing::info!(
                    "First packet: seq {}, {} samples, {}Hz, {} channels",
                    packet.sequence,
                    packet.samples.len(),
                    packet.sample_rate,
                    packet.channels
                );
            }
        }

        while let Ok(event) = events.try_recv() {
            if let SessionEvent::MetricsTick(metrics) = event {
                tracing::info!(
                    "{} received, {} played, {} late, {} overflow, {} lost, \
                     latency {:.2}ms (avg {:.2}ms), jitter {:.2}ms, target {}",
                    metrics.packets_received,
                    packets_played,
                    metrics.dropped_late,
                    metrics.dropped_overflow,
                    metrics.lost,
                    metrics.current_latency.as_secs_f64() * 1000.0,
                    metrics.average_latency.as_secs_f64() * 1000.0,
                    metrics.network_jitter.as_secs_f64() * 1000.0,
                    metrics.buffer_target
                );
            }
        }

        // Small sleep to prevent busy-waiting
        tokio::time::sleep(Duration::from_micros(500)).await;
    }
}
