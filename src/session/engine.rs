//! The session engine
//!
//! Owns the card store, the scheduler, the daily progress tracker and the
//! sync reconciler, and drives them through the study loop: build a queue,
//! preview the current card, apply ratings, close the session. Callers hold
//! one engine and serialize access to it; async appears only at the
//! explicit persistence and network boundaries.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{Local, Utc};
use uuid::Uuid;

use super::builder::build_queue;
use super::models::{
    DeckCounts, RatingTally, SessionInfo, SessionLogEntry, SessionOptions, SessionSummary,
    StudySession,
};
use crate::cards::{Card, CardState, CardStore, Rating, StoreError};
use crate::scheduler::{format_interval, FsrsScheduler, ReviewScheduler, SchedulePreview};
use crate::stats::{DailyProgress, StudyLimits};
use crate::sync::{RemoteStore, SyncDirection, SyncOptions, SyncOutcome, SyncReconciler};
use crate::vocab::VocabEntry;

pub struct SessionEngine {
    store: CardStore,
    scheduler: Box<dyn ReviewScheduler>,
    progress: DailyProgress,
    reconciler: SyncReconciler,
    session: Option<StudySession>,
    preview: Option<SchedulePreview>,
    revision: u64,
}

impl SessionEngine {
    /// Open an engine rooted at the data directory, scheduling with the
    /// default FSRS parameters
    pub fn open(data_dir: PathBuf) -> Result<Self, StoreError> {
        Self::with_scheduler(data_dir, Box::new(FsrsScheduler::default()))
    }

    pub fn with_scheduler(
        data_dir: PathBuf,
        scheduler: Box<dyn ReviewScheduler>,
    ) -> Result<Self, StoreError> {
        let store = CardStore::open(data_dir.clone())?;
        let progress = DailyProgress::open(data_dir)?;
        Ok(Self {
            store,
            scheduler,
            progress,
            reconciler: SyncReconciler::new(),
            session: None,
            preview: None,
            revision: 0,
        })
    }

    /// Default data directory, e.g. `~/.local/share/mneme` on Linux
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("mneme"))
    }

    /// Point the reconciler at a remote snapshot store
    pub fn configure_sync(&mut self, remote: Box<dyn RemoteStore>, user_id: impl Into<String>) {
        self.reconciler.configure(remote, user_id);
    }

    // ==================== Vocabulary intake ====================

    /// Create the primary-sense card for an entry. Returns true when a
    /// card was created.
    pub fn add_entry(&mut self, entry: &VocabEntry) -> bool {
        if entry.senses.is_empty() {
            log::warn!("Vocabulary entry '{}' has no senses, skipping", entry.lemma);
            return false;
        }
        let created = self.store.ensure_card(&entry.lemma, 0, entry.entry_type, Utc::now());
        if created {
            log::debug!("Created card {}#0", entry.lemma);
            self.store.flush_if_due();
            self.revision += 1;
        }
        created
    }

    /// Create cards for every sense of an entry at once, bypassing the
    /// one-at-a-time unlock path. Returns the number created.
    pub fn add_entry_all_senses(&mut self, entry: &VocabEntry) -> usize {
        if entry.senses.is_empty() {
            log::warn!("Vocabulary entry '{}' has no senses, skipping", entry.lemma);
            return 0;
        }
        let now = Utc::now();
        let mut created = 0;
        for sense_id in entry.sense_ids() {
            if self.store.ensure_card(&entry.lemma, sense_id, entry.entry_type, now) {
                created += 1;
            }
        }
        if created > 0 {
            self.store.flush_if_due();
            self.revision += 1;
        }
        created
    }

    /// Unlock the next missing sense of a lemma. Senses unlock one at a
    /// time, in order, and only once some sense of the lemma has been
    /// studied.
    pub fn try_unlock_next_sense(&mut self, entry: &VocabEntry) -> Option<u32> {
        if !self.store.lemma_started(&entry.lemma) {
            return None;
        }
        for sense_id in entry.sense_ids() {
            if !self.store.has_card(&entry.lemma, sense_id) {
                self.store.ensure_card(&entry.lemma, sense_id, entry.entry_type, Utc::now());
                log::info!("Unlocked sense {} of '{}'", sense_id, entry.lemma);
                self.store.flush_if_due();
                self.revision += 1;
                return Some(sense_id);
            }
        }
        None
    }

    // ==================== Sessions ====================

    /// Build a queue from the current pools and make it the active
    /// session. An already active session is discarded.
    pub fn start_study_session(&mut self, opts: SessionOptions) -> SessionInfo {
        if self.session.is_some() {
            log::warn!("Starting a study session while another is active, dropping the old queue");
        }
        let now = Utc::now();
        let today = Local::now().date_naive();
        let queue = build_queue(
            &self.store,
            &opts,
            self.progress.remaining_new(today) as usize,
            self.progress.remaining_reviews(today) as usize,
            now,
            &mut rand::thread_rng(),
        );
        let new_cards = queue
            .iter()
            .filter(|k| self.store.get(k).map_or(false, |c| c.state == CardState::New))
            .count();
        let info = SessionInfo {
            session_id: Uuid::new_v4(),
            total: queue.len(),
            new_cards,
            reviews: queue.len() - new_cards,
        };
        log::info!(
            "Session {} started: {} cards ({} new){}",
            info.session_id,
            info.total,
            info.new_cards,
            if opts.cram { " [cram]" } else { "" }
        );
        self.session = Some(StudySession {
            id: info.session_id,
            queue,
            cursor: 0,
            started_at: now,
            cards_studied: 0,
            tally: RatingTally::default(),
            cram: opts.cram,
        });
        self.refresh_preview();
        self.revision += 1;
        info
    }

    pub fn current_card(&self) -> Option<&Card> {
        let session = self.session.as_ref()?;
        let key = session.queue.get(session.cursor)?;
        self.store.get(key)
    }

    /// (cards rated so far, queue length) of the active session
    pub fn session_progress(&self) -> Option<(usize, usize)> {
        self.session.as_ref().map(|s| (s.cursor, s.queue.len()))
    }

    pub fn session_complete(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.cursor >= s.queue.len())
    }

    /// Per-rating answer counts of the active session
    pub fn session_tally(&self) -> Option<RatingTally> {
        self.session.as_ref().map(|s| s.tally)
    }

    /// Human-readable interval the rating would give the current card,
    /// for rating buttons. None for cram sessions and non-ratings.
    pub fn interval_text(&self, rating: Rating) -> Option<String> {
        let candidate = self.preview.as_ref()?.get(rating)?;
        Some(format_interval(candidate.card.due - Utc::now()))
    }

    /// Recompute scheduling candidates for the card under the cursor
    fn refresh_preview(&mut self) {
        self.preview = None;
        let Some(session) = self.session.as_ref() else { return };
        if session.cram {
            return;
        }
        let Some(card) = session.queue.get(session.cursor).and_then(|k| self.store.get(k)) else {
            return;
        };
        self.preview = Some(self.scheduler.preview(card, Utc::now()));
    }

    // ==================== Rating ====================

    /// Apply a rating to the card under the cursor. Again puts the card
    /// back at the end of the queue. Returns false when there is nothing
    /// to rate or the rating is not actionable.
    pub fn rate_card(&mut self, rating: Rating) -> bool {
        if !rating.is_actionable() {
            return false;
        }
        let (key, cram) = {
            let Some(session) = self.session.as_ref() else { return false };
            let Some(key) = session.queue.get(session.cursor) else { return false };
            (key.clone(), session.cram)
        };

        if cram {
            if let Some(session) = self.session.as_mut() {
                session.cards_studied += 1;
                session.tally.bump(rating);
                if rating == Rating::Again {
                    session.queue.push(key);
                }
                session.cursor += 1;
            }
            self.revision += 1;
            return true;
        }

        let Some(original) = self.store.get(&key).cloned() else {
            log::warn!("Card {}#{} missing from the store, skipping", key.lemma, key.sense_id);
            if let Some(session) = self.session.as_mut() {
                session.cursor += 1;
            }
            self.refresh_preview();
            self.revision += 1;
            return false;
        };

        // Candidates are precomputed when the cursor moves; recompute if
        // they are somehow missing
        let preview = match self.preview.take() {
            Some(p) => p,
            None => self.scheduler.preview(&original, Utc::now()),
        };
        let Some(candidate) = preview.take(rating) else {
            self.refresh_preview();
            return false;
        };
        let mut updated = candidate.card;

        // The scheduler is not trusted with identity fields
        updated.lemma = original.lemma.clone();
        updated.sense_id = original.sense_id;
        updated.entry_type = original.entry_type;

        let prior_state = original.state;
        self.store.update_card(updated);
        self.store.record_review(candidate.log);

        let today = Local::now().date_naive();
        if let Err(e) = self.progress.record_review(today, rating, prior_state) {
            log::warn!("Failed to record daily progress: {}", e);
        }

        if let Some(session) = self.session.as_mut() {
            session.cards_studied += 1;
            session.tally.bump(rating);
            if rating == Rating::Again {
                // Failed cards come back later in the same session
                session.queue.push(key);
            }
            session.cursor += 1;
        }

        self.store.flush_if_due();
        self.refresh_preview();
        self.revision += 1;
        true
    }

    /// Close the active session: log it, bank the study time and flush
    /// everything buffered
    pub async fn end_study_session(&mut self) -> Option<SessionSummary> {
        let session = self.session.take()?;
        self.preview = None;
        let ended_at = Utc::now();
        let duration_ms = (ended_at - session.started_at).num_milliseconds().max(0) as u64;

        if !session.cram && session.cards_studied > 0 {
            let today = Local::now().date_naive();
            if let Err(e) = self.progress.add_study_time(today, duration_ms) {
                log::warn!("Failed to record study time: {}", e);
            }
        }

        let entry = SessionLogEntry {
            session_id: session.id,
            started_at: session.started_at,
            ended_at,
            cards_studied: session.cards_studied,
            cram: session.cram,
        };
        if let Err(e) = self.store.append_session(&entry) {
            log::warn!("Failed to append session log: {}", e);
        }
        if let Err(e) = self.store.flush() {
            log::warn!("Failed to flush cards at session end: {}", e);
        }

        log::info!(
            "Session {} ended: {} cards studied in {}ms",
            session.id,
            session.cards_studied,
            duration_ms
        );
        self.revision += 1;
        Some(SessionSummary {
            session_id: session.id,
            started_at: session.started_at,
            ended_at,
            duration_ms,
            cards_studied: session.cards_studied,
            cram: session.cram,
        })
    }

    /// Flush all buffered durable state immediately
    pub async fn save_now(&mut self) -> Result<(), StoreError> {
        self.store.flush()
    }

    // ==================== Sync ====================

    /// Reconcile the local store with the remote snapshot. A pull
    /// invalidates the active session, whose queue may reference cards
    /// that no longer exist.
    pub async fn sync(&mut self, opts: SyncOptions) -> SyncOutcome {
        if let Err(e) = self.store.flush() {
            log::warn!("Pre-sync flush failed: {}", e);
        }
        let outcome = self.reconciler.sync(&mut self.store, opts).await;
        if let SyncOutcome::Success(report) = &outcome {
            if report.direction == SyncDirection::Pulled {
                if self.session.take().is_some() {
                    log::info!("Discarding active session after pulling a remote snapshot");
                }
                self.preview = None;
                self.revision += 1;
            }
        }
        outcome
    }

    // ==================== Settings and queries ====================

    pub fn limits(&self) -> StudyLimits {
        self.progress.limits()
    }

    pub fn set_limits(&mut self, limits: StudyLimits) -> Result<(), StoreError> {
        self.progress.set_limits(limits)?;
        self.revision += 1;
        Ok(())
    }

    pub fn store(&self) -> &CardStore {
        &self.store
    }

    pub fn progress(&self) -> &DailyProgress {
        &self.progress
    }

    /// Monotonic counter bumped on every state change, for cache
    /// invalidation by consumers that poll
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn deck_counts(&self) -> DeckCounts {
        let now = Utc::now();
        let mut started: HashSet<&str> = HashSet::new();
        for card in self.store.all_cards() {
            if card.state != CardState::New {
                started.insert(card.lemma.as_str());
            }
        }

        let mut counts = DeckCounts::default();
        let mut unstarted: HashSet<&str> = HashSet::new();
        for card in self.store.all_cards() {
            counts.total += 1;
            match card.state {
                CardState::New => {
                    counts.new_total += 1;
                    if started.contains(card.lemma.as_str()) {
                        counts.unlocked_new += 1;
                    } else {
                        unstarted.insert(card.lemma.as_str());
                    }
                }
                CardState::Learning | CardState::Relearning => counts.learning += 1,
                CardState::Review => counts.review += 1,
            }
            if card.state != CardState::New && card.is_due(now) {
                counts.due_now += 1;
            }
        }
        counts.true_new = unstarted.len();
        counts
    }

    /// Wipe all cards and start over. Review and session history survives.
    pub async fn reset_all(&mut self) -> Result<(), StoreError> {
        self.session = None;
        self.preview = None;
        self.store.reset_all()?;
        self.revision += 1;
        Ok(())
    }
}
