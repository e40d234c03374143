// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Stepfarm: step tracking and coin settlement for a farming game.
//!
//! This crate provides the on-device step detector and session state
//! machine, the exactly-once settlement of sessions into activity records
//! and coins, and the backend API shared by the web and companion game
//! clients.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;
pub mod tracker;

use config::Config;
use db::Database;
use services::{CompanionService, SettlementService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub settlement: SettlementService,
    pub companion: CompanionService,
}

impl AppState {
    /// Wire the services to one database handle.
    pub fn new(config: Config, db: Database) -> Self {
        let settlement = SettlementService::new(db.clone(), config.settlement_policy.clone());
        let companion = CompanionService::new(db.clone());
        Self {
            config,
            db,
            settlement,
            companion,
        }
    }
}
