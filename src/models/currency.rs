// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Currency balance model.

use crate::time_utils::rfc3339_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One coin balance per user, stored in `user_currency`.
///
/// Only the ledger's atomic settle/spend paths write this document.
/// `coins` is unsigned, so a balance can never go negative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CurrencyBalance {
    pub user_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub coins: u64,
    #[serde(with = "rfc3339_millis")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub last_updated: DateTime<Utc>,
}

impl CurrencyBalance {
    /// Balance row for a user that has never earned or spent.
    pub fn empty(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            coins: 0,
            last_updated: now,
        }
    }

    /// Apply a settlement credit.
    pub fn credit(&mut self, coins: u64, now: DateTime<Utc>) {
        self.coins = self.coins.saturating_add(coins);
        self.last_updated = now;
    }

    /// Apply a spend. Returns `false` and leaves the balance untouched when
    /// the balance does not cover `amount`.
    pub fn debit(&mut self, amount: u64, now: DateTime<Utc>) -> bool {
        match self.coins.checked_sub(amount) {
            Some(remaining) => {
                self.coins = remaining;
                self.last_updated = now;
                true
            }
            None => false,
        }
    }
}

/// Balance as reported to clients. A user without a balance row reads as
/// zero coins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CurrencySummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub coins: u64,
    #[serde(default, with = "rfc3339_millis::option")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<Option<CurrencyBalance>> for CurrencySummary {
    fn from(balance: Option<CurrencyBalance>) -> Self {
        match balance {
            Some(b) => Self {
                coins: b.coins,
                last_updated: Some(b.last_updated),
            },
            None => Self {
                coins: 0,
                last_updated: None,
            },
        }
    }
}
