//! Tracking session state and running totals.
//!
//! `Idle --start--> Active --stop--> Settling --finish--> Idle`

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};

/// Average stride of ~0.76 m, in kilometers.
pub const KM_PER_STEP: f64 = 0.00076;
/// Average energy per step (kcal).
pub const CALORIES_PER_STEP: f64 = 0.04;

/// Distance covered by `steps`, in kilometers.
pub fn distance_for_steps(steps: u32) -> f64 {
    steps as f64 * KM_PER_STEP
}

/// Calories burned by `steps`, rounded to the nearest whole calorie.
pub fn calories_for_steps(steps: u32) -> u32 {
    (steps as f64 * CALORIES_PER_STEP).round() as u32
}

/// Whole minutes elapsed since `start`.
pub fn active_minutes_between(start: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let millis = (now - start).num_milliseconds().max(0);
    u32::try_from(millis / 60_000).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Active,
    Settling,
}

/// Running totals for one tracking session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingSession {
    pub steps: u32,
    pub distance_km: f64,
    pub calories: u32,
    pub active_minutes: u32,
    pub start_time: DateTime<Utc>,
    /// The detector saw movement above sensor noise at some point.
    pub motion_observed: bool,
}

impl TrackingSession {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            steps: 0,
            distance_km: 0.0,
            calories: 0,
            active_minutes: 0,
            start_time,
            motion_observed: false,
        }
    }

    /// Add one step and recompute the derived totals.
    fn record_step(&mut self, now: DateTime<Utc>) {
        self.steps = self.steps.saturating_add(1);
        self.distance_km = distance_for_steps(self.steps);
        self.calories = calories_for_steps(self.steps);
        self.active_minutes = active_minutes_between(self.start_time, now);
    }
}

/// A stopped session, ready for settlement.
///
/// Produced only by [`SessionAggregator::stop`], so each `stop` yields at
/// most one of these.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenSession {
    pub session: TrackingSession,
    pub end_time: DateTime<Utc>,
}

impl FrozenSession {
    pub fn duration(&self) -> chrono::Duration {
        (self.end_time - self.session.start_time).max(chrono::Duration::zero())
    }
}

/// Live view for UI polling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub steps: u32,
    pub distance_km: f64,
    pub calories: u32,
    pub active_minutes: u32,
    pub start_time: Option<DateTime<Utc>>,
}

/// Owns the current session and its state machine.
#[derive(Debug, Clone)]
pub struct SessionAggregator {
    status: SessionStatus,
    session: Option<TrackingSession>,
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            session: None,
        }
    }
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Begin a new session with zeroed counters.
    ///
    /// Rejected while a session is active or still settling.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != SessionStatus::Idle {
            return Err(AppError::AlreadyActive);
        }
        self.session = Some(TrackingSession::new(now));
        self.status = SessionStatus::Active;
        Ok(())
    }

    /// Count one step. Returns `false` (and changes nothing) unless active.
    pub fn on_step(&mut self, now: DateTime<Utc>) -> bool {
        match (&self.status, self.session.as_mut()) {
            (SessionStatus::Active, Some(session)) => {
                session.record_step(now);
                true
            }
            _ => false,
        }
    }

    /// Note that raw motion above sensor noise was observed.
    pub fn mark_motion(&mut self) {
        if self.status == SessionStatus::Active {
            if let Some(session) = self.session.as_mut() {
                session.motion_observed = true;
            }
        }
    }

    /// Current counters. Zeroed when idle.
    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.session {
            Some(s) => SessionSnapshot {
                status: self.status,
                steps: s.steps,
                distance_km: s.distance_km,
                calories: s.calories,
                active_minutes: s.active_minutes,
                start_time: Some(s.start_time),
            },
            None => SessionSnapshot {
                status: self.status,
                steps: 0,
                distance_km: 0.0,
                calories: 0,
                active_minutes: 0,
                start_time: None,
            },
        }
    }

    /// Freeze the active session and move to `Settling`.
    ///
    /// The counters stay readable through [`snapshot`](Self::snapshot) until
    /// [`finish_settlement`](Self::finish_settlement) releases them.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<FrozenSession> {
        if self.status != SessionStatus::Active {
            return Err(AppError::NotTracking);
        }
        let session = self.session.clone().ok_or(AppError::NotTracking)?;
        self.status = SessionStatus::Settling;
        Ok(FrozenSession {
            session,
            end_time: now,
        })
    }

    /// Release the session after settlement resolved, whatever the outcome.
    pub fn finish_settlement(&mut self) {
        if self.status == SessionStatus::Settling {
            self.session = None;
            self.status = SessionStatus::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_start_twice_fails() {
        let mut agg = SessionAggregator::new();
        agg.start(t0()).unwrap();
        assert!(matches!(agg.start(t0()), Err(AppError::AlreadyActive)));
    }

    #[test]
    fn test_steps_ignored_unless_active() {
        let mut agg = SessionAggregator::new();
        assert!(!agg.on_step(t0()));
        assert_eq!(agg.snapshot().steps, 0);
    }

    #[test]
    fn test_derived_totals_hold_after_every_step() {
        let mut agg = SessionAggregator::new();
        agg.start(t0()).unwrap();

        for i in 1..=1_000u32 {
            assert!(agg.on_step(t0() + Duration::milliseconds(i as i64 * 500)));
            let snap = agg.snapshot();
            assert_eq!(snap.steps, i);
            assert_eq!(snap.distance_km, i as f64 * KM_PER_STEP);
            assert_eq!(snap.calories, (i as f64 * CALORIES_PER_STEP).round() as u32);
        }

        let snap = agg.snapshot();
        assert!((snap.distance_km - 0.76).abs() < 1e-9);
        assert_eq!(snap.calories, 40);
        // Last step at 500s
        assert_eq!(snap.active_minutes, 8);
    }

    #[test]
    fn test_stop_freezes_and_blocks_steps() {
        let mut agg = SessionAggregator::new();
        agg.start(t0()).unwrap();
        agg.on_step(t0() + Duration::seconds(1));
        agg.on_step(t0() + Duration::seconds(2));

        let frozen = agg.stop(t0() + Duration::seconds(3)).unwrap();
        assert_eq!(frozen.session.steps, 2);
        assert_eq!(frozen.duration(), Duration::seconds(3));
        assert_eq!(agg.status(), SessionStatus::Settling);

        // Counters frozen while settling
        assert!(!agg.on_step(t0() + Duration::seconds(4)));
        assert_eq!(agg.snapshot().steps, 2);
        assert_eq!(agg.snapshot().status, SessionStatus::Settling);

        agg.finish_settlement();
        assert_eq!(agg.status(), SessionStatus::Idle);
        assert_eq!(agg.snapshot().steps, 0);
    }

    #[test]
    fn test_second_stop_fails_cleanly() {
        let mut agg = SessionAggregator::new();
        agg.start(t0()).unwrap();
        agg.stop(t0()).unwrap();
        assert!(matches!(agg.stop(t0()), Err(AppError::NotTracking)));

        agg.finish_settlement();
        assert!(matches!(agg.stop(t0()), Err(AppError::NotTracking)));
    }

    #[test]
    fn test_start_while_settling_rejected() {
        let mut agg = SessionAggregator::new();
        agg.start(t0()).unwrap();
        agg.stop(t0()).unwrap();
        assert!(matches!(agg.start(t0()), Err(AppError::AlreadyActive)));
    }

    #[test]
    fn test_restart_resets_counters() {
        let mut agg = SessionAggregator::new();
        agg.start(t0()).unwrap();
        agg.on_step(t0());
        agg.mark_motion();
        agg.stop(t0()).unwrap();
        agg.finish_settlement();

        agg.start(t0() + Duration::hours(1)).unwrap();
        let frozen = agg.stop(t0() + Duration::hours(1)).unwrap();
        assert_eq!(frozen.session.steps, 0);
        assert!(!frozen.session.motion_observed);
    }
}
