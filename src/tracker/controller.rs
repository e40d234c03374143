// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-device tracking controller.
//!
//! One controller owns one detector and one session aggregator. Handles are
//! cheap to clone so the motion callback, the UI poller and the stop button
//! can each hold one. The internal lock is only held for synchronous
//! updates, never across an `.await`, so [`TrackingController::snapshot`]
//! stays non-blocking while a settlement is in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::error::Result;
use crate::services::settlement::{SettlementResult, SettlementService};
use crate::tracker::detector::{DetectorConfig, MotionSample, StepDetector};
use crate::tracker::session::{SessionAggregator, SessionSnapshot, SessionStatus};

#[derive(Debug, Default)]
struct TrackerState {
    detector: StepDetector,
    aggregator: SessionAggregator,
}

/// Handle to one device's tracking state.
#[derive(Debug, Clone, Default)]
pub struct TrackingController {
    state: Arc<Mutex<TrackerState>>,
}

impl TrackingController {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState {
                detector: StepDetector::new(config),
                aggregator: SessionAggregator::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new session.
    pub fn start(&self) -> Result<()> {
        let mut state = self.lock();
        state.aggregator.start(Utc::now())?;
        state.detector.reset();
        tracing::info!("Step tracking started");
        Ok(())
    }

    /// Feed one motion sample. Returns `true` when it produced a step.
    ///
    /// Samples arriving while no session is active are ignored.
    pub fn on_sample(&self, sample: &MotionSample) -> bool {
        let mut state = self.lock();
        if state.aggregator.status() != SessionStatus::Active {
            return false;
        }

        let accepted = state.detector.evaluate(sample);
        if state.detector.motion_observed() {
            state.aggregator.mark_motion();
        }
        if accepted {
            state.aggregator.on_step(Utc::now());
        }
        accepted
    }

    /// Manual step trigger for devices without motion sensors.
    ///
    /// Bypasses detection and counts exactly one step.
    pub fn simulate_step(&self) -> bool {
        let counted = self.lock().aggregator.on_step(Utc::now());
        if counted {
            tracing::debug!("Simulated step");
        }
        counted
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().aggregator.snapshot()
    }

    /// Stop tracking and settle the frozen session for `user_id`.
    ///
    /// The session is released back to idle whatever the settlement outcome,
    /// and also if this future is dropped mid-settlement. A second call
    /// without a new `start` fails with `NotTracking` and never reaches the
    /// store.
    pub async fn stop_and_settle(
        &self,
        settlement: &SettlementService,
        user_id: &str,
    ) -> Result<SettlementResult> {
        let frozen = self.lock().aggregator.stop(Utc::now())?;
        let _release = ReleaseOnDrop(self);

        tracing::info!(
            steps = frozen.session.steps,
            duration_secs = frozen.duration().num_seconds(),
            "Step tracking stopped, settling session"
        );

        settlement.settle(frozen, user_id).await
    }
}

/// Returns the aggregator to idle when dropped.
struct ReleaseOnDrop<'a>(&'a TrackingController);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.aggregator.finish_settlement();
        state.detector.reset();
    }
}
