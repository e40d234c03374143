// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod companion;
pub mod settlement;

pub use companion::{CompanionRequest, CompanionResponse, CompanionService};
pub use settlement::{SettlementPolicy, SettlementResult, SettlementService};
