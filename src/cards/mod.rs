//! Card store and review history
//!
//! This module provides:
//! - Card and review log data models
//! - Durable per-card storage with append-only review and session logs
//! - The in-memory card store with a write-buffer for rapid rating bursts

pub mod bank;
pub mod models;
pub mod store;

pub use bank::{BankMeta, CardBank, StoreError, SCHEMA_VERSION};
pub use models::*;
pub use store::CardStore;
