// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local store with the same contract as [`FirestoreDb`].
//!
//! Every read-modify-write for a user runs under that user's async lock, so
//! concurrent settlements and spends apply in some serial order. Used for
//! local development (`STORE_BACKEND=memory`) and tests.
//!
//! [`FirestoreDb`]: crate::db::FirestoreDb

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::{SettleOutcome, SpendOutcome};
use crate::error::AppError;
use crate::models::{CurrencyBalance, FitnessActivity, GameProgressRecord, Profile};

/// Per-user locks serializing ledger updates.
pub type UserLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Holds a user's ledger lock. On drop, the lock's map entry is removed
/// once no other task holds or waits on it.
struct UserLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    user_id: String,
    locks: UserLocks,
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of 1 means only the map is left
        self.locks.remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Default)]
struct Store {
    profiles: DashMap<String, Profile>,
    balances: DashMap<String, CurrencyBalance>,
    /// Keyed by record id
    activities: DashMap<String, FitnessActivity>,
    progress: DashMap<String, GameProgressRecord>,
    user_locks: UserLocks,
    fail_next_write: AtomicBool,
}

/// In-memory database handle. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryDb {
    store: Arc<Store>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail with a database error, after all reads and
    /// checks have passed.
    pub fn fail_next_write(&self) {
        self.store.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Number of stored activity records for a user.
    pub fn activity_count(&self, user_id: &str) -> usize {
        self.store
            .activities
            .iter()
            .filter(|a| a.user_id == user_id)
            .count()
    }

    /// Stored progress events for a user.
    pub fn game_progress_for(&self, user_id: &str) -> Vec<GameProgressRecord> {
        self.store
            .progress
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect()
    }

    async fn lock_user(&self, user_id: &str) -> UserLockGuard {
        let lock = self
            .store
            .user_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        UserLockGuard {
            guard: Some(lock.lock_owned().await),
            user_id: user_id.to_string(),
            locks: self.store.user_locks.clone(),
        }
    }

    fn check_injected_failure(&self) -> Result<(), AppError> {
        if self.store.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(AppError::Database("injected write failure".to_string()));
        }
        Ok(())
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        Ok(self.store.profiles.get(user_id).map(|p| p.clone()))
    }

    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        self.check_injected_failure()?;
        self.store
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    pub async fn get_balance(&self, user_id: &str) -> Result<Option<CurrencyBalance>, AppError> {
        Ok(self.store.balances.get(user_id).map(|b| b.clone()))
    }

    pub async fn get_recent_activities(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<FitnessActivity>, AppError> {
        let mut activities: Vec<FitnessActivity> = self
            .store
            .activities
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.value().clone())
            .collect();
        activities.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        activities.truncate(limit as usize);
        Ok(activities)
    }

    pub async fn settle_atomic(
        &self,
        user_id: &str,
        records: &[FitnessActivity],
        coins: u64,
        now: DateTime<Utc>,
    ) -> Result<SettleOutcome, AppError> {
        let _guard = self.lock_user(user_id).await;

        if records
            .iter()
            .any(|r| self.store.activities.contains_key(&r.id))
        {
            return Ok(SettleOutcome::AlreadySettled);
        }

        let mut balance = self
            .store
            .balances
            .get(user_id)
            .map(|b| b.clone())
            .unwrap_or_else(|| CurrencyBalance::empty(user_id, now));

        // Let other tasks run between the read and the write, as a network
        // store would.
        tokio::task::yield_now().await;

        self.check_injected_failure()?;

        balance.credit(coins, now);
        for record in records {
            self.store.activities.insert(record.id.clone(), record.clone());
        }
        self.store
            .balances
            .insert(user_id.to_string(), balance.clone());

        Ok(SettleOutcome::Settled(balance))
    }

    pub async fn spend_atomic(
        &self,
        user_id: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<SpendOutcome, AppError> {
        let _guard = self.lock_user(user_id).await;

        let mut balance = self
            .store
            .balances
            .get(user_id)
            .map(|b| b.clone())
            .unwrap_or_else(|| CurrencyBalance::empty(user_id, now));

        tokio::task::yield_now().await;

        if !balance.debit(amount, now) {
            return Ok(SpendOutcome::Insufficient {
                available: balance.coins,
            });
        }

        self.check_injected_failure()?;

        self.store
            .balances
            .insert(user_id.to_string(), balance.clone());
        Ok(SpendOutcome::Spent(balance))
    }

    pub async fn record_game_progress(&self, record: &GameProgressRecord) -> Result<(), AppError> {
        self.check_injected_failure()?;
        self.store.progress.insert(record.id.clone(), record.clone());
        Ok(())
    }
}
