//! Audio Sender Application
//!
//! Streams a 440Hz test tone to a receiver in MTU-sized PCM frames.

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_pcm_transport::{config::TransportConfig, constants::*, network::AudioSender};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PCM test-tone sender");

    // Get target address from args or use default
    let target: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5000".to_string())
        .parse()
        .expect("Invalid target address");

    tracing::info!("Target receiver: {}", target);

    let config = TransportConfig::default();
    let sender = AudioSender::connect(target, &config).await?;

    let samples_per_channel =
        (config.sample_rate as f32 * DEFAULT_FRAME_SIZE_MS / 1000.0) as usize;
    let frame_len = samples_per_channel * config.channels as usize;
    let frame_interval = Duration::from_secs_f32(DEFAULT_FRAME_SIZE_MS / 1000.0);

    tracing::info!(
        "Streaming 440Hz tone: {} samples/frame ({:.1}ms), {} channels at {}Hz",
        frame_len,
        DEFAULT_FRAME_SIZE_MS,
        config.channels,
        config.sample_rate
    );

    let phase_step = 440.0 * 2.0 * std::f32::consts::PI / config.sample_rate as f32;
    let mut phase: f32 = 0.0;
    let mut frame = vec![0.0f32; frame_len];

    let mut interval = tokio::time::interval(frame_interval);

    tracing::info!("Starting main loop - press Ctrl+C to stop");

    loop {
        interval.tick().await;

        for i in 0..samples_per_channel {
            let value = (phase + i as f32 * phase_step).sin() * 0.5;
            for ch in 0..config.channels as usize {
                frame[i * config.channels as usize + ch] = value;
            }
        }
        phase = (phase + samples_per_channel as f32 * phase_step)
            % (2.0 * std::f32::consts::PI);

        if let Err(e) = sender.send_samples(&frame) {
            tracing::warn!("Failed to send frame: {}", e);
        }

        // Periodic stats logging
        let stats = sender.stats();
        if stats.packets_sent > 0 && stats.packets_sent % 2000 == 0 {
            tracing::info!(
                "Stats: {} packets sent, {:.1} KB sent, {} send errors",
                stats.packets_sent,
                stats.bytes_sent as f64 / 1024.0,
                stats.send_errors
            );
        }
    }
}
