// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pedometer pipeline: motion samples → step events → tracking session.
//!
//! Everything here is synchronous and in-memory. The only asynchronous step
//! is handing a stopped session to the settlement service.

pub mod controller;
pub mod detector;
pub mod session;

pub use controller::TrackingController;
pub use detector::{DetectorConfig, MotionSample, StepDetector};
pub use session::{
    FrozenSession, SessionAggregator, SessionSnapshot, SessionStatus, TrackingSession,
};
