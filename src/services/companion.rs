// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Companion game client bridge.
//!
//! The game client reaches the same ledger as the web client through a
//! closed set of operations. Requests are decoded into [`CompanionRequest`]
//! up front, so every operation has a typed input and is validated before
//! the store is touched.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{Database, SpendOutcome};
use crate::error::{AppError, Result};
use crate::models::{
    CurrencyBalance, CurrencySummary, FitnessActivity, GameProgress, GameProgressRecord, Profile,
};

/// Activities included in a `get-user-data` response.
pub const RECENT_ACTIVITY_LIMIT: u32 = 7;

/// One companion operation with its decoded input.
#[derive(Debug, Clone, PartialEq)]
pub enum CompanionRequest {
    GetUserData,
    SpendCoins { amount: i64 },
    AddGameProgress { progress: GameProgress },
}

#[derive(Deserialize)]
struct SpendCoinsBody {
    amount: serde_json::Number,
}

#[derive(Deserialize)]
struct AddGameProgressBody {
    progress: GameProgress,
}

impl CompanionRequest {
    pub const GET_USER_DATA: &'static str = "get-user-data";
    pub const SPEND_COINS: &'static str = "spend-coins";
    pub const ADD_GAME_PROGRESS: &'static str = "add-game-progress";

    /// Decode an operation name and its JSON body.
    pub fn decode(operation: &str, body: &[u8]) -> Result<Self> {
        match operation {
            Self::GET_USER_DATA => Ok(CompanionRequest::GetUserData),
            Self::SPEND_COINS => {
                let body: SpendCoinsBody = parse_body(body)?;
                let amount = body
                    .amount
                    .as_i64()
                    .ok_or_else(|| AppError::InvalidAmount(body.amount.to_string()))?;
                Ok(CompanionRequest::SpendCoins { amount })
            }
            Self::ADD_GAME_PROGRESS => {
                let body: AddGameProgressBody = parse_body(body)?;
                body.progress.check().map_err(AppError::BadRequest)?;
                Ok(CompanionRequest::AddGameProgress {
                    progress: body.progress,
                })
            }
            other => Err(AppError::NotFound(format!(
                "Unknown companion operation: {}",
                other
            ))),
        }
    }

    /// Operation name, as used in the routed path.
    pub fn operation(&self) -> &'static str {
        match self {
            CompanionRequest::GetUserData => Self::GET_USER_DATA,
            CompanionRequest::SpendCoins { .. } => Self::SPEND_COINS,
            CompanionRequest::AddGameProgress { .. } => Self::ADD_GAME_PROGRESS,
        }
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Missing request body".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Profile, balance and recent activity snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct UserDataResponse {
    pub profile: Option<Profile>,
    pub currency: CurrencySummary,
    pub fitness: Vec<FitnessActivity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressAck {
    pub success: bool,
}

/// Response for any companion operation.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CompanionResponse {
    UserData(UserDataResponse),
    Currency(CurrencyBalance),
    Progress(ProgressAck),
}

/// Companion operations over the shared ledger.
#[derive(Clone)]
pub struct CompanionService {
    db: Database,
}

impl CompanionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Run one decoded request for an authenticated user.
    pub async fn dispatch(
        &self,
        user_id: &str,
        request: CompanionRequest,
    ) -> Result<CompanionResponse> {
        tracing::debug!(user_id, operation = request.operation(), "Companion request");
        match request {
            CompanionRequest::GetUserData => {
                self.get_user_data(user_id).await.map(CompanionResponse::UserData)
            }
            CompanionRequest::SpendCoins { amount } => self
                .spend_coins(user_id, amount)
                .await
                .map(CompanionResponse::Currency),
            CompanionRequest::AddGameProgress { progress } => self
                .add_game_progress(user_id, progress)
                .await
                .map(CompanionResponse::Progress),
        }
    }

    /// Debit `amount` coins. The balance never goes negative.
    pub async fn spend_coins(&self, user_id: &str, amount: i64) -> Result<CurrencyBalance> {
        let requested = match u64::try_from(amount) {
            Ok(a) if a > 0 => a,
            _ => return Err(AppError::InvalidAmount(amount.to_string())),
        };

        match self.db.spend_atomic(user_id, requested, Utc::now()).await? {
            SpendOutcome::Spent(balance) => {
                tracing::info!(user_id, amount = requested, balance = balance.coins, "Coins spent");
                Ok(balance)
            }
            SpendOutcome::Insufficient { available } => {
                tracing::info!(user_id, requested, available, "Spend rejected: insufficient funds");
                Err(AppError::InsufficientFunds {
                    available,
                    requested,
                })
            }
        }
    }

    /// Read-only snapshot for the game client.
    pub async fn get_user_data(&self, user_id: &str) -> Result<UserDataResponse> {
        let (profile, balance, fitness) = tokio::try_join!(
            self.db.get_profile(user_id),
            self.db.get_balance(user_id),
            self.db.get_recent_activities(user_id, RECENT_ACTIVITY_LIMIT),
        )?;

        Ok(UserDataResponse {
            profile,
            currency: CurrencySummary::from(balance),
            fitness,
        })
    }

    pub async fn add_game_progress(
        &self,
        user_id: &str,
        progress: GameProgress,
    ) -> Result<ProgressAck> {
        progress.check().map_err(AppError::BadRequest)?;

        let kind = progress.kind();
        let record = GameProgressRecord::new(user_id, progress, Utc::now());
        self.db.record_game_progress(&record).await?;

        tracing::info!(user_id, kind, record_id = %record.id, "Game progress recorded");
        Ok(ProgressAck { success: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_operations() {
        assert_eq!(
            CompanionRequest::decode("get-user-data", b"").unwrap(),
            CompanionRequest::GetUserData
        );
        assert_eq!(
            CompanionRequest::decode("spend-coins", br#"{"amount": 25}"#).unwrap(),
            CompanionRequest::SpendCoins { amount: 25 }
        );

        let request = CompanionRequest::decode(
            "add-game-progress",
            br#"{"progress": {"kind": "level_completed", "level": 3, "score": 1200}}"#,
        )
        .unwrap();
        assert_eq!(request.operation(), "add-game-progress");
    }

    #[test]
    fn test_decode_unknown_operation() {
        assert!(matches!(
            CompanionRequest::decode("delete-everything", b"{}"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_decode_bad_amounts() {
        assert!(matches!(
            CompanionRequest::decode("spend-coins", br#"{"amount": 2.5}"#),
            Err(AppError::InvalidAmount(_))
        ));
        assert!(matches!(
            CompanionRequest::decode("spend-coins", br#"{"amount": "10"}"#),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            CompanionRequest::decode("spend-coins", b"{}"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_decode_rejects_untyped_progress() {
        assert!(matches!(
            CompanionRequest::decode("add-game-progress", br#"{"progress": {"anything": true}}"#),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            CompanionRequest::decode(
                "add-game-progress",
                br#"{"progress": {"kind": "crop_harvested", "crop": "", "quantity": 1}}"#
            ),
            Err(AppError::BadRequest(_))
        ));
    }
}
