//! Data models for study sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cards::{CardKey, Rating};

/// How new cards are ordered relative to due reviews in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriorityMode {
    /// Spread new cards evenly among the reviews
    #[default]
    Mixed,
    /// All new cards up front
    NewFirst,
    /// All reviews first, new cards at the end
    ReviewFirst,
}

/// Options for assembling a study session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOptions {
    /// Lemmas kept out of the session entirely
    pub excluded_lemmas: Vec<String>,
    /// Cap on new cards; the remaining daily budget when unset
    pub new_limit: Option<usize>,
    /// Cap on due reviews; the remaining daily budget when unset,
    /// unlimited when a pool is given
    pub review_limit: Option<usize>,
    pub priority: PriorityMode,
    /// Restrict the session to these lemmas; their order decides which
    /// new cards make the cut
    pub pool: Option<Vec<String>>,
    /// Admit every sense of an unstarted lemma, not just the primary one
    pub all_senses: bool,
    /// Cram mode: ignore schedules, limits and unlock gating, and leave
    /// cards, logs and daily counters untouched
    pub cram: bool,
}

/// Per-rating answer counts within one session
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingTally {
    pub again: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

impl RatingTally {
    pub fn bump(&mut self, rating: Rating) {
        match rating {
            Rating::Again => self.again += 1,
            Rating::Hard => self.hard += 1,
            Rating::Good => self.good += 1,
            Rating::Easy => self.easy += 1,
            Rating::Manual => {}
        }
    }
}

/// Live state of a study session. Held by the engine, never persisted.
#[derive(Debug)]
pub struct StudySession {
    pub id: Uuid,
    pub queue: Vec<CardKey>,
    pub cursor: usize,
    pub started_at: DateTime<Utc>,
    pub cards_studied: u32,
    pub tally: RatingTally,
    pub cram: bool,
}

/// Shape of a freshly built session, handed back to the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub total: usize,
    pub new_cards: usize,
    pub reviews: usize,
}

/// Summary returned when a session ends
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub cards_studied: u32,
    pub cram: bool,
}

/// One line of the append-only session log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLogEntry {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub cards_studied: u32,
    #[serde(default)]
    pub cram: bool,
}

/// Point-in-time deck statistics
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckCounts {
    pub total: usize,
    /// Cards still in the new state, locked or not
    pub new_total: usize,
    /// Lemmas with no studied sense yet
    pub true_new: usize,
    /// New cards whose lemma already has a studied sense
    pub unlocked_new: usize,
    /// Cards in the learning or relearning state
    pub learning: usize,
    pub review: usize,
    /// Scheduled cards whose due time has passed
    pub due_now: usize,
}
