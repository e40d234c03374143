// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Fitness activity model for storage and API.

use crate::time_utils::{format_utc_rfc3339, rfc3339_millis};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Activity type recorded for pedometer sessions.
pub const WALKING: &str = "walking";

/// Longest activity a single record may claim, one day.
pub const MAX_ACTIVE_MINUTES: u32 = 24 * 60;

/// Stored activity record in `fitness_activities`.
///
/// Created exactly once per settled session and never modified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FitnessActivity {
    /// Deterministic record id (also used as document ID)
    pub id: String,
    /// Owner
    pub user_id: String,
    pub steps: u32,
    /// Distance in kilometers
    pub distance: f64,
    pub calories: u32,
    pub active_minutes: u32,
    #[serde(with = "rfc3339_millis")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_time: DateTime<Utc>,
    #[serde(with = "rfc3339_millis")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub end_time: DateTime<Utc>,
    /// "walking" for pedometer sessions
    pub activity_type: String,
}

impl FitnessActivity {
    /// Build a record from a validated payload.
    pub fn from_payload(user_id: &str, payload: &ActivityPayload, now: DateTime<Utc>) -> Self {
        let end_time = payload.end_time.unwrap_or(now);
        Self {
            id: Self::record_id(user_id, payload.start_time, end_time, payload.steps),
            user_id: user_id.to_string(),
            steps: payload.steps,
            distance: payload.distance,
            calories: payload.calories,
            active_minutes: payload.active_minutes,
            start_time: payload.start_time,
            end_time,
            activity_type: payload.activity_type.clone(),
        }
    }

    /// Record id derived from the fields that identify one session.
    ///
    /// A resubmitted session maps to the same id, which is how the ledger
    /// detects duplicates.
    pub fn record_id(
        user_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        steps: u32,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(user_id.as_bytes());
        hasher.update(b"|");
        hasher.update(format_utc_rfc3339(start_time).as_bytes());
        hasher.update(b"|");
        hasher.update(format_utc_rfc3339(end_time).as_bytes());
        hasher.update(b"|");
        hasher.update(steps.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Session duration, zero if the clock went backwards.
    pub fn duration(&self) -> chrono::Duration {
        (self.end_time - self.start_time).max(chrono::Duration::zero())
    }
}

fn default_activity_type() -> String {
    WALKING.to_string()
}

/// Activity as submitted by a client for settlement.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ActivityPayload {
    #[serde(default)]
    #[validate(range(max = 1_000_000))]
    pub steps: u32,
    /// Distance in kilometers
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1000.0))]
    pub distance: f64,
    #[serde(default)]
    #[validate(range(max = 100_000))]
    pub calories: u32,
    #[serde(default)]
    #[validate(range(max = MAX_ACTIVE_MINUTES))]
    pub active_minutes: u32,
    pub start_time: DateTime<Utc>,
    /// Defaults to the settlement time when absent
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "default_activity_type")]
    #[validate(length(min = 1, max = 32))]
    pub activity_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload(steps: u32) -> ActivityPayload {
        ActivityPayload {
            steps,
            distance: steps as f64 * 0.00076,
            calories: 0,
            active_minutes: 0,
            start_time: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            end_time: Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 20, 0).unwrap()),
            activity_type: WALKING.to_string(),
        }
    }

    #[test]
    fn test_record_id_is_stable() {
        let now = Utc::now();
        let a = FitnessActivity::from_payload("user-1", &payload(250), now);
        let b = FitnessActivity::from_payload("user-1", &payload(250), now);
        let other_user = FitnessActivity::from_payload("user-2", &payload(250), now);
        let other_steps = FitnessActivity::from_payload("user-1", &payload(251), now);

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, other_user.id);
        assert_ne!(a.id, other_steps.id);
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn test_payload_defaults() {
        let json = r#"{"steps": 120, "start_time": "2024-01-15T10:00:00Z"}"#;
        let parsed: ActivityPayload = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.activity_type, WALKING);
        assert_eq!(parsed.distance, 0.0);
        assert!(parsed.end_time.is_none());
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_payload_validation_rejects_negative_distance() {
        let mut bad = payload(10);
        bad.distance = -1.0;
        assert!(bad.validate().is_err());

        let mut bad = payload(10);
        bad.activity_type = String::new();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_missing_end_time_uses_settlement_time() {
        let mut p = payload(10);
        p.end_time = None;
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap();

        let record = FitnessActivity::from_payload("user-1", &p, now);

        assert_eq!(record.end_time, now);
        assert_eq!(record.duration(), chrono::Duration::hours(1));
    }

    #[test]
    fn test_record_serializes_fixed_width_times() {
        let record = FitnessActivity::from_payload("user-1", &payload(10), Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["start_time"], "2024-01-15T10:00:00.000Z");
    }
}
