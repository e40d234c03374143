// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Step detection from raw acceleration samples.
//!
//! A sample counts as a step when the summed per-axis change against the
//! previous sample exceeds a threshold and enough time has passed since the
//! last accepted step. No calibration, no filtering, no lookahead: each
//! sample is decided as it arrives.

use serde::{Deserialize, Serialize};

/// Summed per-axis delta (m/s²) above which a sample is a step candidate.
pub const DEFAULT_THRESHOLD: f64 = 6.0;
/// Refractory period between accepted steps.
pub const DEFAULT_MIN_STEP_INTERVAL_MS: i64 = 150;
/// Summed delta above which the device is considered to be moving at all.
pub const DEFAULT_NOISE_THRESHOLD: f64 = 2.0;

/// One 3-axis acceleration reading (gravity included).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Milliseconds, monotonic within a session
    pub timestamp_ms: i64,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp_ms: i64) -> Self {
        Self {
            x,
            y,
            z,
            timestamp_ms,
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// `|Δx| + |Δy| + |Δz|` against another sample.
    pub fn delta(&self, other: &MotionSample) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }
}

/// Configuration for step detection.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub threshold: f64,
    pub min_step_interval_ms: i64,
    pub noise_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_step_interval_ms: DEFAULT_MIN_STEP_INTERVAL_MS,
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
        }
    }
}

/// Thresholded delta-magnitude step detector with a refractory gate.
#[derive(Debug, Clone, Default)]
pub struct StepDetector {
    config: DetectorConfig,
    /// Last sample seen (accepted or not); `None` until the first sample.
    reference: Option<MotionSample>,
    /// Timestamp of the last accepted step.
    last_step_ms: Option<i64>,
    /// Set once any delta exceeds the noise threshold.
    motion_observed: bool,
}

impl StepDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Evaluate one sample. Returns `true` when a step is accepted.
    ///
    /// Malformed samples (non-finite axes, timestamps running backwards) are
    /// dropped without touching detector state.
    pub fn evaluate(&mut self, sample: &MotionSample) -> bool {
        if !sample.is_finite() {
            tracing::trace!(?sample, "Dropping non-finite motion sample");
            return false;
        }

        let Some(reference) = self.reference else {
            // First sample only establishes the baseline.
            self.reference = Some(*sample);
            return false;
        };

        if sample.timestamp_ms < reference.timestamp_ms {
            tracing::trace!(
                timestamp_ms = sample.timestamp_ms,
                reference_ms = reference.timestamp_ms,
                "Dropping out-of-order motion sample"
            );
            return false;
        }

        let delta = sample.delta(&reference);
        if delta > self.config.noise_threshold {
            self.motion_observed = true;
        }
        self.reference = Some(*sample);

        let gate_open = self
            .last_step_ms
            .is_none_or(|last| sample.timestamp_ms - last >= self.config.min_step_interval_ms);

        if delta > self.config.threshold && gate_open {
            self.last_step_ms = Some(sample.timestamp_ms);
            return true;
        }

        false
    }

    /// Evaluate a recorded stream, returning the number of accepted steps.
    pub fn evaluate_batch(&mut self, samples: &[MotionSample]) -> u32 {
        samples
            .iter()
            .map(|s| self.evaluate(s))
            .filter(|&accepted| accepted)
            .count() as u32
    }

    /// Whether any sample so far moved more than sensor noise.
    pub fn motion_observed(&self) -> bool {
        self.motion_observed
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Forget the baseline, refractory state and motion flag.
    pub fn reset(&mut self) {
        self.reference = None;
        self.last_step_ms = None;
        self.motion_observed = false;
    }
}
