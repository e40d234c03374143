// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Companion game progress payloads.

use crate::time_utils::rfc3339_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_ID_LEN: usize = 64;
const MAX_PLAY_SESSION_SECS: u64 = 24 * 60 * 60;

/// Progress reported by the companion game client, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameProgress {
    LevelCompleted { level: u32, score: u64 },
    AchievementUnlocked { achievement_id: String },
    CropHarvested { crop: String, quantity: u32 },
    PlaySession { duration_secs: u64 },
}

impl GameProgress {
    /// Structural checks beyond what the schema enforces.
    pub fn check(&self) -> Result<(), String> {
        match self {
            GameProgress::LevelCompleted { level, .. } => {
                if *level == 0 {
                    return Err("level must be at least 1".to_string());
                }
            }
            GameProgress::AchievementUnlocked { achievement_id } => {
                check_identifier("achievement_id", achievement_id)?;
            }
            GameProgress::CropHarvested { crop, quantity } => {
                check_identifier("crop", crop)?;
                if *quantity == 0 {
                    return Err("quantity must be at least 1".to_string());
                }
            }
            GameProgress::PlaySession { duration_secs } => {
                if *duration_secs > MAX_PLAY_SESSION_SECS {
                    return Err("duration_secs exceeds one day".to_string());
                }
            }
        }
        Ok(())
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GameProgress::LevelCompleted { .. } => "level_completed",
            GameProgress::AchievementUnlocked { .. } => "achievement_unlocked",
            GameProgress::CropHarvested { .. } => "crop_harvested",
            GameProgress::PlaySession { .. } => "play_session",
        }
    }
}

fn check_identifier(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if value.len() > MAX_ID_LEN {
        return Err(format!("{field} exceeds {MAX_ID_LEN} characters"));
    }
    Ok(())
}

/// Stored progress event in `game_progress`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameProgressRecord {
    pub id: String,
    pub user_id: String,
    pub progress: GameProgress,
    #[serde(with = "rfc3339_millis")]
    pub received_at: DateTime<Utc>,
}

impl GameProgressRecord {
    pub fn new(user_id: &str, progress: GameProgress, now: DateTime<Utc>) -> Self {
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000));
        Self {
            id: format!("{}_{}", urlencoding::encode(user_id), nanos),
            user_id: user_id.to_string(),
            progress,
            received_at: now,
        }
    }
}
