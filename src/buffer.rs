//! Adaptive jitter buffer
//!
//! Absorbs network reordering, duplication, and timing variance, and emits
//! packets strictly in sequence order at a pace the playback consumer
//! controls. The occupancy target adapts to measured jitter and loss, so
//! sustained bad conditions cost latency instead of glitches, up to a
//! configured ceiling.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::TransportConfig;
use crate::protocol::AudioPacket;

/// Outcome of inserting a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Packet accepted into the buffer
    Buffered,
    /// Sequence is behind the cursor; packet dropped and counted
    Late,
    /// Sequence already buffered; packet silently dropped
    Duplicate,
}

/// Reordering and pacing buffer keyed by packet sequence
///
/// Packets flow out when occupancy reaches the adaptive target, or when the
/// forced-flush timeout elapses with data waiting. A gap that stalls the
/// cursor past the timeout is jumped if it is small enough, bounding the
/// latency cost of irrecoverable loss.
pub struct JitterBuffer {
    buffer: HashMap<u32, AudioPacket>,
    /// Next sequence to emit; set by the first insert
    expected: Option<u32>,
    min_size: usize,
    max_size: usize,
    flush_timeout: Duration,
    gap_tolerance: u32,
    /// Latest jitter estimate, pushed in by the owning session
    network_jitter: Duration,
    last_emit: Instant,
    emitted: u64,
    dropped_late: u64,
    dropped_overflow: u64,
    lost: u64,
    reordered: u64,
    duplicates: u64,
}

impl JitterBuffer {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            buffer: HashMap::new(),
            expected: None,
            min_size: config.min_buffer_packets,
            max_size: config.max_buffer_packets,
            flush_timeout: config.flush_timeout,
            gap_tolerance: config.gap_tolerance,
            network_jitter: Duration::ZERO,
            last_emit: Instant::now(),
            emitted: 0,
            dropped_late: 0,
            dropped_overflow: 0,
            lost: 0,
            reordered: 0,
            duplicates: 0,
        }
    }

    /// Insert a packet, keyed by sequence
    pub fn insert(&mut self, packet: AudioPacket) -> InsertOutcome {
        let seq = packet.sequence;
        match self.expected {
            None => self.expected = Some(seq),
            Some(expected) if seq < expected => {
                if self.emitted == 0 {
                    // Nothing has been played yet: an earlier-sent packet
                    // simply arrived second, so the cursor moves back
                    // instead of dropping it.
                    self.expected = Some(seq);
                } else {
                    self.dropped_late += 1;
                    return InsertOutcome::Late;
                }
            }
            Some(_) => {}
        }

        if self.buffer.contains_key(&seq) {
            self.duplicates += 1;
            return InsertOutcome::Duplicate;
        }

        if let Some(expected) = self.expected {
            if seq > expected {
                self.reordered += 1;
            }
        }
        self.buffer.insert(seq, packet);
        InsertOutcome::Buffered
    }

    /// Pop every packet that is ready to play, in sequence order
    pub fn extract_ready(&mut self) -> Vec<AudioPacket> {
        self.enforce_capacity();

        let target = self.optimal_size();
        let timed_out =
            !self.buffer.is_empty() && self.last_emit.elapsed() >= self.flush_timeout;
        if self.buffer.len() < target && !timed_out {
            return Vec::new();
        }

        let mut ready = Vec::new();
        self.pop_contiguous(&mut ready);

        // A gap right at the cursor with nothing emitted: once the stream
        // has stalled past the flush timeout, a small enough gap is accepted
        // as permanent loss and jumped.
        if ready.is_empty() && timed_out {
            if let (Some(expected), Some(lowest)) = (self.expected, self.lowest_sequence()) {
                let gap = lowest - expected;
                if gap <= self.gap_tolerance {
                    self.lost += gap as u64;
                    self.expected = Some(lowest);
                    self.pop_contiguous(&mut ready);
                }
            }
        }

        if !ready.is_empty() {
            self.last_emit = Instant::now();
        }
        ready
    }

    /// Occupancy target adapted to current network conditions
    ///
    /// Base minimum, widened by the measured jitter and the recent loss
    /// rate, clamped to the configured ceiling.
    pub fn optimal_size(&self) -> usize {
        let jitter_ms = self.network_jitter.as_secs_f64() * 1_000.0;
        let size =
            self.min_size as f64 + (jitter_ms * 2.0).round() + (self.loss_rate() * 100.0).round();
        (size as usize).clamp(self.min_size, self.max_size)
    }

    /// Fraction of expected packets the cursor skipped as lost
    pub fn loss_rate(&self) -> f64 {
        let total = self.emitted + self.lost;
        if total == 0 {
            0.0
        } else {
            self.lost as f64 / total as f64
        }
    }

    /// Latest jitter estimate from the clock corrector
    pub fn set_network_jitter(&mut self, jitter: Duration) {
        self.network_jitter = jitter;
    }

    /// Next sequence the buffer expects to emit
    pub fn expected_sequence(&self) -> Option<u32> {
        self.expected
    }

    /// Current number of buffered packets
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear all state for a fresh session
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.expected = None;
        self.network_jitter = Duration::ZERO;
        self.last_emit = Instant::now();
        self.emitted = 0;
        self.dropped_late = 0;
        self.dropped_overflow = 0;
        self.lost = 0;
        self.reordered = 0;
        self.duplicates = 0;
    }

    /// Get statistics
    pub fn stats(&self) -> JitterBufferStats {
        JitterBufferStats {
            buffered: self.buffer.len(),
            target: self.optimal_size(),
            emitted: self.emitted,
            dropped_late: self.dropped_late,
            dropped_overflow: self.dropped_overflow,
            lost: self.lost,
            reordered: self.reordered,
            duplicates: self.duplicates,
        }
    }

    fn pop_contiguous(&mut self, out: &mut Vec<AudioPacket>) {
        let Some(mut seq) = self.expected else {
            return;
        };
        while let Some(packet) = self.buffer.remove(&seq) {
            out.push(packet);
            self.emitted += 1;
            seq = seq.wrapping_add(1);
        }
        self.expected = Some(seq);
    }

    /// Evict the oldest entries when occupancy runs far past the target
    fn enforce_capacity(&mut self) {
        let target = self.optimal_size();
        if self.buffer.len() <= target * 2 {
            return;
        }

        let mut sequences: Vec<u32> = self.buffer.keys().copied().collect();
        sequences.sort_unstable();
        let excess = self.buffer.len() - target;
        for seq in sequences.into_iter().take(excess) {
            self.buffer.remove(&seq);
            self.dropped_overflow += 1;
        }

        // Resync the cursor past the evicted range; a burst gap wider than
        // the jump tolerance would otherwise stall the stream for good.
        if let (Some(expected), Some(lowest)) = (self.expected, self.lowest_sequence()) {
            if lowest > expected {
                self.expected = Some(lowest);
            }
        }
    }

    fn lowest_sequence(&self) -> Option<u32> {
        self.buffer.keys().copied().min()
    }
}

/// Jitter buffer statistics
#[derive(Debug, Clone, Default)]
pub struct JitterBufferStats {
    pub buffered: usize,
    pub target: usize,
    pub emitted: u64,
    pub dropped_late: u64,
    pub dropped_overflow: u64,
    pub lost: u64,
    pub reordered: u64,
    pub duplicates: u64,
}

impl JitterBufferStats {
    /// Fraction of expected packets skipped as lost
    pub fn loss_rate(&self) -> f64 {
        let total = self.emitted + self.lost;
        if total == 0 {
            0.0
        } else {
            self.lost as f64 / total as f64
        }
    }
}
