//! Data models for scheduled cards and review history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vocab::EntryType;

/// Scheduling state of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardState {
    /// Never studied
    New,
    /// In initial learning steps
    Learning,
    /// Regular spaced review
    Review,
    /// Lapsed and re-learning
    Relearning,
}

impl Default for CardState {
    fn default() -> Self {
        Self::New
    }
}

impl CardState {
    /// Numeric code used in the compact sync encoding
    pub fn code(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Learning => 1,
            Self::Review => 2,
            Self::Relearning => 3,
        }
    }

    /// Decode a numeric state; unknown codes fall back to New
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Learning,
            2 => Self::Review,
            3 => Self::Relearning,
            _ => Self::New,
        }
    }
}

/// Answer rating for a card
///
/// `Manual` marks a card edit that is not an answer; it never reaches the
/// scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
    Manual,
}

impl Rating {
    /// Whether this rating drives a scheduling update
    pub fn is_actionable(self) -> bool {
        !matches!(self, Self::Manual)
    }

    /// Grade on the 1-4 scale used by the scheduling formulas
    pub fn grade(self) -> Option<u32> {
        match self {
            Self::Again => Some(1),
            Self::Hard => Some(2),
            Self::Good => Some(3),
            Self::Easy => Some(4),
            Self::Manual => None,
        }
    }
}

/// Identity of a card: one lemma paired with one of its senses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardKey {
    pub lemma: String,
    pub sense_id: u32,
}

impl CardKey {
    pub fn new(lemma: impl Into<String>, sense_id: u32) -> Self {
        Self {
            lemma: lemma.into(),
            sense_id,
        }
    }
}

/// A scheduled card for one meaning of a vocabulary entry
///
/// The memory fields (`stability`, `difficulty`, `scheduled_days`, `reps`,
/// `lapses`, `state`) follow the FSRS card shape. `elapsed_days` is kept for
/// on-disk compatibility but is derived from `last_review` at review time
/// and is never trusted across devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub lemma: String,
    pub sense_id: u32,
    #[serde(default)]
    pub entry_type: EntryType,
    pub due: DateTime<Utc>,
    #[serde(default)]
    pub stability: f64,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default)]
    pub elapsed_days: f64,
    #[serde(default)]
    pub scheduled_days: f64,
    #[serde(default)]
    pub reps: u32,
    #[serde(default)]
    pub lapses: u32,
    #[serde(default)]
    pub state: CardState,
    /// Index into the learning step sequence while in Learning/Relearning
    #[serde(default)]
    pub learning_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_review: Option<DateTime<Utc>>,
}

impl Card {
    pub fn new(lemma: impl Into<String>, sense_id: u32, entry_type: EntryType, now: DateTime<Utc>) -> Self {
        Self {
            lemma: lemma.into(),
            sense_id,
            entry_type,
            due: now,
            stability: 0.0,
            difficulty: 0.0,
            elapsed_days: 0.0,
            scheduled_days: 0.0,
            reps: 0,
            lapses: 0,
            state: CardState::New,
            learning_steps: 0,
            last_review: None,
        }
    }

    pub fn key(&self) -> CardKey {
        CardKey::new(self.lemma.clone(), self.sense_id)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            state: self.state,
            stability: self.stability,
            difficulty: self.difficulty,
            due: self.due,
        }
    }
}

/// Memory state captured before and after a review
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    pub state: CardState,
    pub stability: f64,
    pub difficulty: f64,
    pub due: DateTime<Utc>,
}

/// One line of the append-only review log (JSONL)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLogEntry {
    pub lemma: String,
    pub sense_id: u32,
    pub rating: Rating,
    pub before: MemorySnapshot,
    pub after: MemorySnapshot,
    pub reviewed_at: DateTime<Utc>,
}
