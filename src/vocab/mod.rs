//! Vocabulary entry types
//!
//! The engine schedules cards for (lemma, sense) pairs but does not own the
//! vocabulary itself. Entries are produced elsewhere and handed in whenever
//! cards need to be created or senses unlocked.

pub mod models;

pub use models::*;
