//! A per-meaning spaced-repetition scheduling engine
//!
//! Vocabulary entries are split into senses, and every (lemma, sense)
//! pair is a card with its own schedule. Secondary senses stay locked
//! until the lemma has been studied once, so a learner meets one meaning
//! of a word before the next. The crate covers the whole study loop:
//!
//! - [`vocab`]: vocabulary entry and sense types
//! - [`cards`]: the card bank on disk and the in-memory store with
//!   debounced persistence
//! - [`scheduler`]: the pluggable review scheduler and the FSRS
//!   implementation behind it
//! - [`session`]: queue assembly, the rating processor and the
//!   [`SessionEngine`] that ties everything together
//! - [`stats`]: daily study counters and limits
//! - [`sync`]: last-write-wins snapshot sync across devices

pub mod cards;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod sync;
pub mod vocab;

pub use cards::{Card, CardKey, CardState, CardStore, Rating, ReviewLogEntry, StoreError};
pub use scheduler::{format_interval, FsrsScheduler, ReviewScheduler, SchedulePreview};
pub use session::{
    DeckCounts, PriorityMode, RatingTally, SessionEngine, SessionInfo, SessionOptions,
    SessionSummary,
};
pub use stats::{DailyStats, StudyLimits};
pub use sync::{HttpRemoteStore, RemoteStore, SyncOptions, SyncOutcome};
pub use vocab::{EntryType, Sense, VocabEntry};
