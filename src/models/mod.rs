// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod currency;
pub mod profile;
pub mod progress;

pub use activity::{ActivityPayload, FitnessActivity};
pub use currency::{CurrencyBalance, CurrencySummary};
pub use profile::Profile;
pub use progress::{GameProgress, GameProgressRecord};
