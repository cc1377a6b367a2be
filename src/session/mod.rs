//! Study sessions
//!
//! This module provides:
//! - Session assembly from the card pools (learning, unlocked secondary
//!   senses, due reviews, new cards) with limits and priority ordering
//! - The rating processor that applies scheduler outcomes to the store
//! - The [`SessionEngine`], the imperative surface the rest of the
//!   application drives

pub mod builder;
pub mod engine;
pub mod models;

pub use engine::SessionEngine;
pub use models::*;
