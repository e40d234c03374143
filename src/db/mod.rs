//! Database layer: the currency ledger and activity store.
//!
//! `Database` dispatches to Firestore in production and to a process-local
//! store for development and tests. Balance mutations only happen through
//! `settle_atomic` and `spend_atomic`.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use chrono::{DateTime, Utc};

use crate::config::{Config, StoreBackend};
use crate::error::AppError;
use crate::models::{CurrencyBalance, FitnessActivity, GameProgressRecord, Profile};

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    pub const FITNESS_ACTIVITIES: &str = "fitness_activities";
    /// One balance document per user, keyed by user id
    pub const USER_CURRENCY: &str = "user_currency";
    pub const GAME_PROGRESS: &str = "game_progress";
}

/// Result of an atomic settlement.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// Records written and balance credited; carries the new balance.
    Settled(CurrencyBalance),
    /// At least one record already exists. Nothing was written.
    AlreadySettled,
}

/// Result of an atomic spend.
#[derive(Debug, Clone, PartialEq)]
pub enum SpendOutcome {
    Spent(CurrencyBalance),
    /// Balance does not cover the amount. Nothing was written.
    Insufficient { available: u64 },
}

/// Ledger backend selected at startup.
#[derive(Clone)]
pub enum Database {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

impl Database {
    /// Connect to the backend named in the configuration.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        match config.store_backend {
            StoreBackend::Firestore => Ok(Database::Firestore(
                FirestoreDb::new(&config.gcp_project_id).await?,
            )),
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data will not survive a restart");
                Ok(Database::Memory(MemoryDb::new()))
            }
        }
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        match self {
            Database::Firestore(db) => db.get_profile(user_id).await,
            Database::Memory(db) => db.get_profile(user_id).await,
        }
    }

    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        match self {
            Database::Firestore(db) => db.upsert_profile(profile).await,
            Database::Memory(db) => db.upsert_profile(profile).await,
        }
    }

    pub async fn get_balance(&self, user_id: &str) -> Result<Option<CurrencyBalance>, AppError> {
        match self {
            Database::Firestore(db) => db.get_balance(user_id).await,
            Database::Memory(db) => db.get_balance(user_id).await,
        }
    }

    /// Most recent activities for a user, newest `start_time` first.
    pub async fn get_recent_activities(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<FitnessActivity>, AppError> {
        match self {
            Database::Firestore(db) => db.get_recent_activities(user_id, limit).await,
            Database::Memory(db) => db.get_recent_activities(user_id, limit).await,
        }
    }

    /// Write all `records` and credit `coins` to the user's balance, or
    /// write nothing.
    pub async fn settle_atomic(
        &self,
        user_id: &str,
        records: &[FitnessActivity],
        coins: u64,
        now: DateTime<Utc>,
    ) -> Result<SettleOutcome, AppError> {
        match self {
            Database::Firestore(db) => db.settle_atomic(user_id, records, coins, now).await,
            Database::Memory(db) => db.settle_atomic(user_id, records, coins, now).await,
        }
    }

    /// Debit `amount` if the balance covers it.
    pub async fn spend_atomic(
        &self,
        user_id: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<SpendOutcome, AppError> {
        match self {
            Database::Firestore(db) => db.spend_atomic(user_id, amount, now).await,
            Database::Memory(db) => db.spend_atomic(user_id, amount, now).await,
        }
    }

    pub async fn record_game_progress(&self, record: &GameProgressRecord) -> Result<(), AppError> {
        match self {
            Database::Firestore(db) => db.record_game_progress(record).await,
            Database::Memory(db) => db.record_game_progress(record).await,
        }
    }
}

impl From<FirestoreDb> for Database {
    fn from(db: FirestoreDb) -> Self {
        Database::Firestore(db)
    }
}

impl From<MemoryDb> for Database {
    fn from(db: MemoryDb) -> Self {
        Database::Memory(db)
    }
}
