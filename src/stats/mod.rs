//! Daily study progress tracking
//!
//! This module provides:
//! - Per-day counters for introduced cards, reviews, and answer ratings
//! - Accumulated study time per day
//! - Configurable daily limits that gate how much the session builder
//!   may schedule

pub mod models;
pub mod tracker;

pub use models::*;
pub use tracker::DailyProgress;
