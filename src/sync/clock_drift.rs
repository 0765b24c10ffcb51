//! Clock drift correction
//!
//! Estimates the linear relationship between the sender's packet timestamps
//! and the receiver's arrival clock with least-squares regression, so
//! playback can be scheduled on local time without drifting against the
//! sender's production rate. Also derives the network jitter estimate that
//! drives the jitter buffer's adaptive sizing.

use std::collections::VecDeque;
use std::time::Duration;

/// Maximum number of timestamp pairs kept for estimation
const MAX_OBSERVATIONS: usize = 100;

/// Minimum pairs required before a fit is computed
const MIN_OBSERVATIONS: usize = 10;

/// Number of ingests between refits
const REFIT_INTERVAL: usize = 32;

/// Minimum pairs required for a jitter estimate
const MIN_JITTER_SAMPLES: usize = 5;

/// One observed (remote send time, local arrival time) pair, in nanoseconds
#[derive(Debug, Clone, Copy)]
struct Observation {
    remote_ns: u64,
    local_ns: u64,
}

/// Estimates offset and drift between the sender clock and the local clock
///
/// `corrected_time` maps a remote timestamp onto the local clock. The fit is
/// refreshed every `REFIT_INTERVAL` ingests once enough samples exist;
/// before the first fit the corrector assumes unit slope from the first
/// observed pair.
#[derive(Debug)]
pub struct ClockDriftCorrector {
    observations: VecDeque<Observation>,
    /// First observed pair, the origin for regression deltas
    base: Option<Observation>,
    /// Local nanoseconds per remote nanosecond
    drift: f64,
    /// Local-clock intercept in nanoseconds, relative to the base pair
    offset: f64,
    ingests_since_fit: usize,
    has_fit: bool,
}

impl ClockDriftCorrector {
    pub fn new() -> Self {
        Self {
            observations: VecDeque::with_capacity(MAX_OBSERVATIONS),
            base: None,
            drift: 1.0,
            offset: 0.0,
            ingests_since_fit: 0,
            has_fit: false,
        }
    }

    /// Record a packet's send timestamp against its local arrival time
    pub fn ingest(&mut self, remote_ns: u64, local_ns: u64) {
        let observation = Observation {
            remote_ns,
            local_ns,
        };
        if self.base.is_none() {
            self.base = Some(observation);
        }

        if self.observations.len() >= MAX_OBSERVATIONS {
            self.observations.pop_front();
        }
        self.observations.push_back(observation);

        self.ingests_since_fit += 1;
        if self.observations.len() >= MIN_OBSERVATIONS
            && (self.ingests_since_fit >= REFIT_INTERVAL || !self.has_fit)
        {
            self.refit();
        }
    }

    /// Translate a remote timestamp into local nanoseconds
    ///
    /// Clamped to be non-negative. Returns the input unchanged before the
    /// first observation.
    pub fn corrected_time(&self, remote_ns: u64) -> u64 {
        let Some(base) = self.base else {
            return remote_ns;
        };
        let x = remote_ns as f64 - base.remote_ns as f64;
        let local = base.local_ns as f64 + self.drift * x + self.offset;
        if local < 0.0 {
            0
        } else {
            local as u64
        }
    }

    /// Standard deviation of the difference between inter-packet arrival
    /// spacing and inter-packet send spacing
    ///
    /// Zero until at least `MIN_JITTER_SAMPLES` pairs have been observed.
    pub fn network_jitter(&self) -> Duration {
        if self.observations.len() < MIN_JITTER_SAMPLES {
            return Duration::ZERO;
        }

        let mut diffs = Vec::with_capacity(self.observations.len() - 1);
        let mut prev: Option<Observation> = None;
        for obs in &self.observations {
            if let Some(p) = prev {
                let local_delta = obs.local_ns as f64 - p.local_ns as f64;
                let remote_delta = obs.remote_ns as f64 - p.remote_ns as f64;
                diffs.push(local_delta - remote_delta);
            }
            prev = Some(*obs);
        }

        let n = diffs.len() as f64;
        let mean = diffs.iter().sum::<f64>() / n;
        let variance = diffs.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / n;
        Duration::from_nanos(variance.sqrt() as u64)
    }

    /// Drift coefficient: local nanoseconds per remote nanosecond
    pub fn drift(&self) -> f64 {
        self.drift
    }

    /// Offset coefficient in nanoseconds, relative to the first observation
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Number of pairs currently in the window
    pub fn sample_count(&self) -> usize {
        self.observations.len()
    }

    /// Clear the window and the fit for a fresh session
    pub fn reset(&mut self) {
        self.observations.clear();
        self.base = None;
        self.drift = 1.0;
        self.offset = 0.0;
        self.ingests_since_fit = 0;
        self.has_fit = false;
    }

    /// Least-squares fit of local time against remote time, on deltas from
    /// the base pair so the arithmetic stays inside f64 precision
    fn refit(&mut self) {
        let Some(base) = self.base else {
            return;
        };

        let n = self.observations.len() as f64;
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        let mut sum_xy = 0.0f64;
        let mut sum_xx = 0.0f64;
        for obs in &self.observations {
            let x = obs.remote_ns as f64 - base.remote_ns as f64;
            let y = obs.local_ns as f64 - base.local_ns as f64;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
        }

        let denom = n * sum_xx - sum_x * sum_x;
        if denom.abs() < 1e-10 {
            // Degenerate window; keep the prior estimate.
            return;
        }

        self.drift = (n * sum_xy - sum_x * sum_y) / denom;
        self.offset = (sum_y - self.drift * sum_x) / n;
        self.ingests_since_fit = 0;
        self.has_fit = true;
    }
}

impl Default for ClockDriftCorrector {
    fn default() -> Self {
        Self::new()
    }
}
