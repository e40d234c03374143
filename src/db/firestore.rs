// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Profiles
//! - Currency balances (one document per user)
//! - Fitness activities (one document per settled session)
//! - Game progress events from the companion client

use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::{FirestoreConsistencySelector, FirestoreTransaction};

use crate::db::{collections, SettleOutcome, SpendOutcome};
use crate::error::AppError;
use crate::models::{CurrencyBalance, FitnessActivity, GameProgressRecord, Profile};

/// Attempts before a contended ledger transaction is reported as failed.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY_MS: u64 = 25;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Why a single transaction attempt ended without committing.
enum AttemptError {
    /// Commit hit contention; safe to run the whole attempt again.
    Retry(FirestoreError),
    Fatal(AppError),
}

impl From<AppError> for AttemptError {
    fn from(e: AppError) -> Self {
        AttemptError::Fatal(e)
    }
}

fn is_retryable(e: &FirestoreError) -> bool {
    matches!(e, FirestoreError::DatabaseError(db_err) if db_err.retry_possible)
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Profile Operations ──────────────────────────────────────

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&profile.user_id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Currency Operations ─────────────────────────────────────

    pub async fn get_balance(&self, user_id: &str) -> Result<Option<CurrencyBalance>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_CURRENCY)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Most recent activities for a user.
    ///
    /// Times are stored as fixed-width RFC 3339 strings, so ordering by
    /// `start_time` is chronological.
    pub async fn get_recent_activities(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<FitnessActivity>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::FITNESS_ACTIVITIES)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([("start_time", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Game Progress ───────────────────────────────────────────

    pub async fn record_game_progress(&self, record: &GameProgressRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::GAME_PROGRESS)
            .document_id(&record.id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Atomic Ledger Operations ────────────────────────────────

    /// Atomically store activity records and credit the user's balance.
    ///
    /// The existence checks and the balance read happen inside the
    /// transaction, so a concurrent settlement or spend touching the same
    /// balance document aborts one of the two commits. Aborted attempts are
    /// retried from the top with fresh reads.
    pub async fn settle_atomic(
        &self,
        user_id: &str,
        records: &[FitnessActivity],
        coins: u64,
        now: DateTime<Utc>,
    ) -> Result<SettleOutcome, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_settle(user_id, records, coins, now).await {
                Ok(outcome) => return Ok(outcome),
                Err(AttemptError::Retry(e)) if attempt < MAX_TRANSACTION_ATTEMPTS => {
                    tracing::debug!(user_id, attempt, error = %e, "Settlement contended, retrying");
                    backoff(attempt).await;
                }
                Err(AttemptError::Retry(e)) => {
                    return Err(AppError::Database(format!(
                        "Settlement transaction failed after {} attempts: {}",
                        attempt, e
                    )))
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
            }
        }
    }

    async fn try_settle(
        &self,
        user_id: &str,
        records: &[FitnessActivity],
        coins: u64,
        now: DateTime<Utc>,
    ) -> Result<SettleOutcome, AttemptError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let outcome = self
            .stage_settlement(&mut transaction, user_id, records, coins, now)
            .await;

        let balance = match outcome {
            Ok(Some(balance)) => balance,
            Ok(None) => {
                // Rollback since there is nothing to write
                let _ = transaction.rollback().await;
                return Ok(SettleOutcome::AlreadySettled);
            }
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e.into());
            }
        };

        match transaction.commit().await {
            Ok(_) => {
                tracing::info!(
                    user_id,
                    records = records.len(),
                    coins,
                    balance = balance.coins,
                    "Settlement committed"
                );
                Ok(SettleOutcome::Settled(balance))
            }
            Err(e) if is_retryable(&e) => Err(AttemptError::Retry(e)),
            Err(e) => Err(AppError::Database(format!("Transaction commit failed: {}", e)).into()),
        }
    }

    /// Read state inside `transaction` and queue the writes. Returns `None`
    /// when any record already exists.
    async fn stage_settlement(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        user_id: &str,
        records: &[FitnessActivity],
        coins: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<CurrencyBalance>, AppError> {
        let client = self.get_client()?;
        let reader = client.clone_with_consistency_selector(
            FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
        );

        // 1. Idempotency: any existing record means this batch was settled
        for record in records {
            let existing: Option<FitnessActivity> = reader
                .fluent()
                .select()
                .by_id_in(collections::FITNESS_ACTIVITIES)
                .obj()
                .one(&record.id)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to read activity in transaction: {}", e))
                })?;
            if existing.is_some() {
                tracing::debug!(
                    user_id,
                    activity_id = %record.id,
                    "Activity already settled (idempotent skip)"
                );
                return Ok(None);
            }
        }

        // 2. Current balance, registered for conflict detection
        let current: Option<CurrencyBalance> = reader
            .fluent()
            .select()
            .by_id_in(collections::USER_CURRENCY)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read balance in transaction: {}", e))
            })?;

        let mut balance = current.unwrap_or_else(|| CurrencyBalance::empty(user_id, now));
        balance.credit(coins, now);

        // 3. Queue record writes
        for record in records {
            client
                .fluent()
                .update()
                .in_col(collections::FITNESS_ACTIVITIES)
                .document_id(&record.id)
                .object(record)
                .add_to_transaction(transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add activity to transaction: {}", e))
                })?;
        }

        // 4. Queue balance write
        client
            .fluent()
            .update()
            .in_col(collections::USER_CURRENCY)
            .document_id(user_id)
            .object(&balance)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add balance to transaction: {}", e))
            })?;

        Ok(Some(balance))
    }

    /// Atomically debit the user's balance if it covers `amount`.
    pub async fn spend_atomic(
        &self,
        user_id: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<SpendOutcome, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_spend(user_id, amount, now).await {
                Ok(outcome) => return Ok(outcome),
                Err(AttemptError::Retry(e)) if attempt < MAX_TRANSACTION_ATTEMPTS => {
                    tracing::debug!(user_id, attempt, error = %e, "Spend contended, retrying");
                    backoff(attempt).await;
                }
                Err(AttemptError::Retry(e)) => {
                    return Err(AppError::Database(format!(
                        "Spend transaction failed after {} attempts: {}",
                        attempt, e
                    )))
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
            }
        }
    }

    async fn try_spend(
        &self,
        user_id: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<SpendOutcome, AttemptError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let reader = client.clone_with_consistency_selector(
            FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
        );

        let current: Result<Option<CurrencyBalance>, _> = reader
            .fluent()
            .select()
            .by_id_in(collections::USER_CURRENCY)
            .obj()
            .one(user_id)
            .await;

        let mut balance = match current {
            Ok(current) => current.unwrap_or_else(|| CurrencyBalance::empty(user_id, now)),
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(AppError::Database(format!(
                    "Failed to read balance in transaction: {}",
                    e
                ))
                .into());
            }
        };

        if !balance.debit(amount, now) {
            let _ = transaction.rollback().await;
            return Ok(SpendOutcome::Insufficient {
                available: balance.coins,
            });
        }

        let queued = client
            .fluent()
            .update()
            .in_col(collections::USER_CURRENCY)
            .document_id(user_id)
            .object(&balance)
            .add_to_transaction(&mut transaction)
            .map(|_| ());
        if let Err(e) = queued {
            let _ = transaction.rollback().await;
            return Err(
                AppError::Database(format!("Failed to add balance to transaction: {}", e)).into(),
            );
        }

        match transaction.commit().await {
            Ok(_) => {
                tracing::info!(user_id, amount, balance = balance.coins, "Spend committed");
                Ok(SpendOutcome::Spent(balance))
            }
            Err(e) if is_retryable(&e) => Err(AttemptError::Retry(e)),
            Err(e) => Err(AppError::Database(format!("Transaction commit failed: {}", e)).into()),
        }
    }
}

async fn backoff(attempt: u32) {
    let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt.saturating_sub(1));
    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
}
