//! End-to-end loopback tests: sender -> UDP -> receiving session -> pull API.

use std::time::Duration;

use lan_pcm_transport::config::TransportConfig;
use lan_pcm_transport::network::{AudioReceiver, AudioSender, SessionState};

fn test_config() -> TransportConfig {
    TransportConfig {
        channels: 1,
        min_buffer_packets: 2,
        flush_timeout: Duration::from_millis(2),
        ..TransportConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_plays_back_in_order() {
    let config = test_config();
    let mut receiver = AudioReceiver::new(config.clone());
    receiver
        .start("127.0.0.1:0".parse().unwrap())
        .await
        .expect("receiver start");
    let addr = receiver.local_addr().expect("bound address");

    let sender = AudioSender::connect(addr, &config)
        .await
        .expect("sender connect");
    for i in 0..50u32 {
        let samples = vec![i as f32 / 100.0; 120];
        sender.send_samples(&samples).expect("send");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    // Let the flush timeout drain the tail of the stream.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut played = Vec::new();
    while let Some(packet) = receiver.next_ready_packet() {
        assert_eq!(packet.samples.len(), 120);
        assert_eq!(packet.channels, 1);
        played.push(packet.sequence);
    }

    assert!(
        played.len() >= 40,
        "only {} of 50 packets made it through the loopback",
        played.len()
    );
    assert!(
        played.windows(2).all(|w| w[0] < w[1]),
        "playback order must be strictly increasing: {:?}",
        played
    );

    let metrics = receiver.metrics();
    assert_eq!(metrics.packets_received, 50);
    assert_eq!(metrics.packets_corrupted, 0);

    receiver.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn garbage_datagrams_are_counted_not_fatal() {
    let config = test_config();
    let mut receiver = AudioReceiver::new(config.clone());
    receiver
        .start("127.0.0.1:0".parse().unwrap())
        .await
        .expect("receiver start");
    let addr = receiver.local_addr().expect("bound address");

    // Raw socket spraying garbage at the session.
    let noise = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for _ in 0..10 {
        noise.send_to(&[0xA5u8; 31], addr).await.unwrap();
    }

    // A valid stream still gets through afterwards.
    let sender = AudioSender::connect(addr, &config).await.unwrap();
    for _ in 0..10u32 {
        sender.send_samples(&[0.5f32; 32]).unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let metrics = receiver.metrics();
    assert_eq!(metrics.packets_corrupted, 10);
    assert_eq!(metrics.packets_received, 10);
    assert_eq!(receiver.state(), SessionState::Running);

    let mut played = 0;
    while receiver.next_ready_packet().is_some() {
        played += 1;
    }
    assert!(played > 0, "valid packets should survive the garbage");

    receiver.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_yields_fresh_session() {
    let config = test_config();
    let mut receiver = AudioReceiver::new(config.clone());
    receiver
        .start("127.0.0.1:0".parse().unwrap())
        .await
        .expect("first start");
    let addr = receiver.local_addr().unwrap();

    let sender = AudioSender::connect(addr, &config).await.unwrap();
    for _ in 0..5u32 {
        sender.send_samples(&[0.1f32; 16]).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(receiver.metrics().packets_received > 0);

    receiver.stop().await;
    assert_eq!(receiver.metrics().packets_received, 0);
    assert!(receiver.next_ready_packet().is_none());

    // A new session starts clean on a fresh socket.
    receiver
        .start("127.0.0.1:0".parse().unwrap())
        .await
        .expect("restart");
    assert_eq!(receiver.state(), SessionState::Running);
    receiver.stop().await;
}
