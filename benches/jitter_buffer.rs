//! Insert/extract micro-benchmarks for the jitter buffer.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::time::Duration;

use lan_pcm_transport::buffer::JitterBuffer;
use lan_pcm_transport::config::TransportConfig;
use lan_pcm_transport::protocol::AudioPacket;

fn packet(seq: u32) -> AudioPacket {
    AudioPacket::new(seq, seq as u64 * 2_500_000, 48_000, 2, vec![0.0; 240])
}

fn bench_insert_extract(c: &mut Criterion) {
    let config = TransportConfig {
        min_buffer_packets: 64,
        max_buffer_packets: 128,
        flush_timeout: Duration::from_secs(3600),
        ..TransportConfig::default()
    };

    c.bench_function("insert_extract_64_reordered", |b| {
        b.iter(|| {
            let mut buffer = JitterBuffer::new(&config);
            for seq in 0..64u32 {
                // Swap adjacent pairs to exercise the reordering path.
                buffer.insert(packet(seq ^ 1));
            }
            black_box(buffer.extract_ready().len())
        })
    });
}

criterion_group!(benches, bench_insert_extract);
criterion_main!(benches);
