// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Settlement: turning finished sessions into activity records and coins.
//!
//! Handles the core workflow:
//! 1. Reject empty sessions (or apply the configured corrective credit)
//! 2. Validate payloads and plausibility bounds
//! 3. Build deterministic activity records
//! 4. Commit records and the balance credit in one ledger transaction

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::db::{Database, SettleOutcome};
use crate::error::{AppError, Result};
use crate::models::activity::{MAX_ACTIVE_MINUTES, WALKING};
use crate::models::{ActivityPayload, CurrencyBalance, FitnessActivity};
use crate::tracker::session::{
    active_minutes_between, calories_for_steps, distance_for_steps, FrozenSession,
};

/// Ledger conversion rate: one coin per this many steps, floor division.
pub const STEPS_PER_COIN: u64 = 100;

/// Coins earned for a step total.
pub fn coins_for_steps(steps: u64) -> u64 {
    steps / STEPS_PER_COIN
}

/// Nominal step credit for sessions where the sensor saw movement but no
/// sample crossed the step threshold.
///
/// This credits steps that were never detected, so it is off unless
/// explicitly configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectiveCredit {
    /// Steps credited in place of zero
    pub floor_steps: u32,
    /// Session must last longer than this
    pub min_duration_secs: u64,
}

impl CorrectiveCredit {
    pub const DEFAULT_MIN_DURATION_SECS: u64 = 5;
    pub const DEFAULT_FLOOR_STEPS: u32 = 10;
}

impl Default for CorrectiveCredit {
    fn default() -> Self {
        Self {
            floor_steps: Self::DEFAULT_FLOOR_STEPS,
            min_duration_secs: Self::DEFAULT_MIN_DURATION_SECS,
        }
    }
}

/// Server-side settlement rules.
///
/// Everything is off by default. The plausibility bounds apply only to
/// activities submitted over the sync endpoint; sessions tracked in this
/// process are settled as counted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementPolicy {
    pub corrective_credit: Option<CorrectiveCredit>,
    /// Upper bound on steps in a single submitted activity
    pub max_steps_per_activity: Option<u32>,
    /// Upper bound on average cadence of a submitted activity, steps per minute
    pub max_cadence_spm: Option<u32>,
}

impl SettlementPolicy {
    pub const RECOMMENDED_MAX_STEPS_PER_ACTIVITY: u32 = 100_000;
    pub const RECOMMENDED_MAX_CADENCE_SPM: u32 = 300;

    /// Enable both plausibility bounds at their recommended values.
    pub fn with_plausibility_bounds(self) -> Self {
        Self {
            max_steps_per_activity: Some(Self::RECOMMENDED_MAX_STEPS_PER_ACTIVITY),
            max_cadence_spm: Some(Self::RECOMMENDED_MAX_CADENCE_SPM),
            ..self
        }
    }

    /// Structural checks every record must pass.
    fn check_well_formed(activity: &FitnessActivity) -> Result<()> {
        if activity.end_time < activity.start_time {
            return Err(AppError::BadRequest(
                "end_time is before start_time".to_string(),
            ));
        }
        if !activity.distance.is_finite() {
            return Err(AppError::BadRequest("distance must be finite".to_string()));
        }
        Ok(())
    }

    /// Reject activities no pedometer could have produced.
    pub fn check_plausible(&self, activity: &FitnessActivity) -> Result<()> {
        Self::check_well_formed(activity)?;

        if let Some(max_steps) = self.max_steps_per_activity {
            if activity.steps > max_steps {
                return Err(AppError::ImplausibleActivity(format!(
                    "{} steps exceeds the per-activity limit of {}",
                    activity.steps, max_steps
                )));
            }
        }

        if let Some(max_spm) = self.max_cadence_spm {
            // Round the window up to whole minutes, at least one
            let millis = activity.duration().num_milliseconds().max(0) as u64;
            let minutes = millis.div_ceil(60_000).max(1);
            let allowed = u64::from(max_spm) * minutes;
            if u64::from(activity.steps) > allowed {
                return Err(AppError::ImplausibleActivity(format!(
                    "{} steps in {} minute(s) exceeds {} steps per minute",
                    activity.steps, minutes, max_spm
                )));
            }
        }

        Ok(())
    }

    /// Step count to settle for a zero-step session, if the corrective
    /// credit applies.
    fn corrective_steps(&self, frozen: &FrozenSession) -> Option<u32> {
        let credit = self.corrective_credit?;
        let min_duration = chrono::Duration::seconds(credit.min_duration_secs as i64);
        (frozen.session.motion_observed && frozen.duration() > min_duration)
            .then_some(credit.floor_steps)
    }
}

/// Where the activities being settled came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Counted by the tracking controller in this process
    Tracked,
    /// Reported by a client over the sync endpoint
    Submitted,
}

/// Successful settlement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SettlementResult {
    pub success: bool,
    pub message: String,
    pub currency: CurrencyBalance,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub coins_earned: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_steps: u64,
}

/// Settles sessions and submitted activities against the ledger.
#[derive(Clone)]
pub struct SettlementService {
    db: Database,
    policy: SettlementPolicy,
}

impl SettlementService {
    pub fn new(db: Database, policy: SettlementPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> &SettlementPolicy {
        &self.policy
    }

    /// Settle a stopped tracking session.
    pub async fn settle(&self, frozen: FrozenSession, user_id: &str) -> Result<SettlementResult> {
        if user_id.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let mut session = frozen.session.clone();

        if session.steps == 0 {
            let Some(floor_steps) = self.policy.corrective_steps(&frozen) else {
                tracing::info!(user_id, "Session stopped with no steps");
                return Err(AppError::NoSteps);
            };

            tracing::warn!(
                user_id,
                floor_steps,
                duration_secs = frozen.duration().num_seconds(),
                "Applying corrective step credit to zero-step session"
            );
            session.steps = floor_steps;
            session.distance_km = distance_for_steps(floor_steps);
            session.calories = calories_for_steps(floor_steps);
            session.active_minutes =
                active_minutes_between(session.start_time, frozen.end_time).max(1);
        }

        let payload = ActivityPayload {
            steps: session.steps,
            distance: session.distance_km,
            calories: session.calories,
            active_minutes: session.active_minutes.min(MAX_ACTIVE_MINUTES),
            start_time: session.start_time,
            end_time: Some(frozen.end_time),
            activity_type: WALKING.to_string(),
        };

        self.settle_payloads(user_id, vec![payload], Origin::Tracked).await
    }

    /// Settle one or more submitted activities in a single transaction.
    pub async fn settle_activities(
        &self,
        user_id: &str,
        payloads: Vec<ActivityPayload>,
    ) -> Result<SettlementResult> {
        self.settle_payloads(user_id, payloads, Origin::Submitted).await
    }

    async fn settle_payloads(
        &self,
        user_id: &str,
        payloads: Vec<ActivityPayload>,
        origin: Origin,
    ) -> Result<SettlementResult> {
        if user_id.is_empty() {
            return Err(AppError::Unauthorized);
        }
        if payloads.is_empty() {
            return Err(AppError::BadRequest("No activities provided".to_string()));
        }

        for payload in &payloads {
            payload
                .validate()
                .map_err(|e| AppError::BadRequest(format!("Invalid activity: {}", e)))?;
        }

        let now = Utc::now();
        let records = build_records(user_id, &payloads, now)?;

        for record in &records {
            match origin {
                Origin::Tracked => SettlementPolicy::check_well_formed(record)?,
                Origin::Submitted => self.policy.check_plausible(record)?,
            }
        }

        let total_steps: u64 = records.iter().map(|r| u64::from(r.steps)).sum();
        if total_steps == 0 {
            return Err(AppError::NoSteps);
        }
        let coins_earned = coins_for_steps(total_steps);

        let outcome = self
            .db
            .settle_atomic(user_id, &records, coins_earned, now)
            .await?;

        match outcome {
            SettleOutcome::Settled(currency) => {
                tracing::info!(
                    user_id,
                    activities = records.len(),
                    total_steps,
                    coins_earned,
                    balance = currency.coins,
                    "Activities settled"
                );
                Ok(SettlementResult {
                    success: true,
                    message: format!(
                        "Synced {} steps and earned {} coins!",
                        total_steps, coins_earned
                    ),
                    currency,
                    coins_earned,
                    total_steps,
                })
            }
            SettleOutcome::AlreadySettled => {
                tracing::info!(user_id, total_steps, "Activity already settled (duplicate)");
                Err(AppError::AlreadySettled)
            }
        }
    }
}

/// Build records, rejecting a batch that names the same session twice.
fn build_records(
    user_id: &str,
    payloads: &[ActivityPayload],
    now: DateTime<Utc>,
) -> Result<Vec<FitnessActivity>> {
    let mut seen = HashSet::with_capacity(payloads.len());
    payloads
        .iter()
        .map(|p| {
            let record = FitnessActivity::from_payload(user_id, p, now);
            if !seen.insert(record.id.clone()) {
                return Err(AppError::BadRequest(
                    "Duplicate activity in request".to_string(),
                ));
            }
            Ok(record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::session::TrackingSession;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn activity(steps: u32, minutes: i64) -> FitnessActivity {
        let payload = ActivityPayload {
            steps,
            distance: distance_for_steps(steps),
            calories: calories_for_steps(steps),
            active_minutes: minutes as u32,
            start_time: t0(),
            end_time: Some(t0() + Duration::minutes(minutes)),
            activity_type: WALKING.to_string(),
        };
        FitnessActivity::from_payload("user-1", &payload, t0())
    }

    fn frozen(steps: u32, motion: bool, secs: i64) -> FrozenSession {
        let mut session = TrackingSession::new(t0());
        session.steps = steps;
        session.motion_observed = motion;
        FrozenSession {
            session,
            end_time: t0() + Duration::seconds(secs),
        }
    }

    #[test]
    fn test_conversion_rate() {
        assert_eq!(coins_for_steps(0), 0);
        assert_eq!(coins_for_steps(99), 0);
        assert_eq!(coins_for_steps(100), 1);
        assert_eq!(coins_for_steps(250), 2);
        assert_eq!(coins_for_steps(1_000), 10);
    }

    #[test]
    fn test_bounds_off_by_default() {
        let policy = SettlementPolicy::default();
        assert_eq!(policy.max_steps_per_activity, None);
        assert_eq!(policy.max_cadence_spm, None);
        assert!(policy.check_plausible(&activity(100_001, 1)).is_ok());
    }

    #[test]
    fn test_cadence_bound() {
        let policy = SettlementPolicy::default().with_plausibility_bounds();
        assert!(policy.check_plausible(&activity(3_000, 10)).is_ok());
        assert!(matches!(
            policy.check_plausible(&activity(3_001, 10)),
            Err(AppError::ImplausibleActivity(_))
        ));
        // Sub-minute sessions get a one-minute window
        assert!(policy.check_plausible(&activity(300, 0)).is_ok());
    }

    #[test]
    fn test_steps_bound() {
        let policy = SettlementPolicy {
            max_steps_per_activity: Some(100_000),
            ..SettlementPolicy::default()
        };
        assert!(matches!(
            policy.check_plausible(&activity(100_001, 600)),
            Err(AppError::ImplausibleActivity(_))
        ));
        assert!(policy.check_plausible(&activity(100_000, 1)).is_ok());
    }

    #[test]
    fn test_reversed_times_rejected() {
        let mut record = activity(10, 5);
        std::mem::swap(&mut record.start_time, &mut record.end_time);
        assert!(matches!(
            SettlementPolicy::default().check_plausible(&record),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_corrective_credit_disabled_by_default() {
        let policy = SettlementPolicy::default();
        assert_eq!(policy.corrective_steps(&frozen(0, true, 60)), None);
    }

    #[test]
    fn test_corrective_credit_conditions() {
        let policy = SettlementPolicy {
            corrective_credit: Some(CorrectiveCredit::default()),
            ..SettlementPolicy::default()
        };
        assert_eq!(policy.corrective_steps(&frozen(0, true, 6)), Some(10));
        // Too short
        assert_eq!(policy.corrective_steps(&frozen(0, true, 5)), None);
        // No movement seen
        assert_eq!(policy.corrective_steps(&frozen(0, false, 60)), None);
    }

    #[test]
    fn test_duplicate_payloads_rejected() {
        let payload = ActivityPayload {
            steps: 10,
            distance: 0.0,
            calories: 0,
            active_minutes: 0,
            start_time: t0(),
            end_time: Some(t0() + Duration::minutes(1)),
            activity_type: WALKING.to_string(),
        };
        let result = build_records("user-1", &[payload.clone(), payload], t0());
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
