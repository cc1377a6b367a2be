//! In-memory card store with a write-buffer
//!
//! All lookups run against an in-memory map seeded from the card bank at
//! startup. Mutations mark cards dirty and buffer review log lines; the
//! buffer flushes on the mutation path once it passes a count or age
//! threshold, and unconditionally at explicit checkpoints (session end,
//! sync, shutdown). A failed deferred flush keeps the buffer so the next
//! mutation retries it.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};

use super::bank::{BankMeta, CardBank, Result};
use super::models::{Card, CardKey, CardState, ReviewLogEntry};
use crate::session::SessionLogEntry;
use crate::vocab::EntryType;

/// Dirty cards that trigger a flush on the mutation path
const FLUSH_DIRTY_LIMIT: usize = 20;
/// Age of the oldest buffered write that triggers a flush
const FLUSH_MAX_AGE: StdDuration = StdDuration::from_secs(5);

pub struct CardStore {
    bank: CardBank,
    cards: HashMap<CardKey, Card>,
    meta: BankMeta,
    dirty: HashSet<CardKey>,
    pending_reviews: Vec<ReviewLogEntry>,
    last_flush: Instant,
}

impl CardStore {
    /// Open the store, seeding the cache from disk
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        let bank = CardBank::new(data_dir)?;
        let cards = bank
            .load_cards()?
            .into_iter()
            .map(|c| (c.key(), c))
            .collect();
        let meta = bank.load_meta();
        Ok(Self {
            bank,
            cards,
            meta,
            dirty: HashSet::new(),
            pending_reviews: Vec::new(),
            last_flush: Instant::now(),
        })
    }

    // ==================== Lookups ====================

    pub fn get(&self, key: &CardKey) -> Option<&Card> {
        self.cards.get(key)
    }

    pub fn all_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.values()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn has_card(&self, lemma: &str, sense_id: u32) -> bool {
        self.cards.contains_key(&CardKey::new(lemma, sense_id))
    }

    /// All cards of a lemma, ordered by sense id
    pub fn cards_for_lemma(&self, lemma: &str) -> Vec<&Card> {
        let mut cards: Vec<&Card> = self.cards.values().filter(|c| c.lemma == lemma).collect();
        cards.sort_by_key(|c| c.sense_id);
        cards
    }

    /// Non-new cards whose due time has passed
    pub fn due_cards(&self, now: DateTime<Utc>) -> Vec<&Card> {
        self.cards
            .values()
            .filter(|c| c.state != CardState::New && c.is_due(now))
            .collect()
    }

    pub fn new_cards(&self) -> Vec<&Card> {
        self.cards
            .values()
            .filter(|c| c.state == CardState::New)
            .collect()
    }

    pub fn learning_cards(&self) -> Vec<&Card> {
        self.cards
            .values()
            .filter(|c| matches!(c.state, CardState::Learning | CardState::Relearning))
            .collect()
    }

    /// Review-state cards due for study
    pub fn review_cards(&self, now: DateTime<Utc>) -> Vec<&Card> {
        self.cards
            .values()
            .filter(|c| c.state == CardState::Review && c.is_due(now))
            .collect()
    }

    /// Whether any sense of this lemma has been studied at least once
    pub fn lemma_started(&self, lemma: &str) -> bool {
        self.cards
            .values()
            .any(|c| c.lemma == lemma && c.state != CardState::New)
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.meta.last_updated
    }

    pub fn device_id(&self) -> &str {
        &self.meta.device_id
    }

    // ==================== Mutations ====================

    /// Create the card for a (lemma, sense) pair if absent; true when created
    pub fn ensure_card(
        &mut self,
        lemma: &str,
        sense_id: u32,
        entry_type: EntryType,
        now: DateTime<Utc>,
    ) -> bool {
        let key = CardKey::new(lemma, sense_id);
        if self.cards.contains_key(&key) {
            return false;
        }
        self.cards
            .insert(key.clone(), Card::new(lemma, sense_id, entry_type, now));
        self.dirty.insert(key);
        self.touch(now);
        true
    }

    /// Replace a card and mark it for persistence
    pub fn update_card(&mut self, card: Card) {
        let key = card.key();
        self.cards.insert(key.clone(), card);
        self.dirty.insert(key);
        self.touch(Utc::now());
    }

    /// Buffer a review log line for the next flush
    pub fn record_review(&mut self, entry: ReviewLogEntry) {
        self.pending_reviews.push(entry);
    }

    /// Bump the mutation stamp, keeping it strictly monotonic
    fn touch(&mut self, now: DateTime<Utc>) {
        let bumped = self.meta.last_updated + Duration::milliseconds(1);
        self.meta.last_updated = now.max(bumped);
    }

    // ==================== Persistence ====================

    fn flush_due(&self) -> bool {
        if self.dirty.is_empty() && self.pending_reviews.is_empty() {
            return false;
        }
        self.dirty.len() >= FLUSH_DIRTY_LIMIT || self.last_flush.elapsed() >= FLUSH_MAX_AGE
    }

    /// Flush on the mutation path when the buffer policy triggers.
    /// Failures are logged and the buffer is kept for a later retry.
    pub fn flush_if_due(&mut self) {
        if !self.flush_due() {
            return;
        }
        if let Err(e) = self.flush() {
            log::warn!("Deferred card flush failed, will retry: {}", e);
        }
    }

    /// Write out all buffered state
    pub fn flush(&mut self) -> Result<()> {
        let keys: Vec<CardKey> = self.dirty.iter().cloned().collect();
        for key in keys {
            if let Some(card) = self.cards.get(&key) {
                self.bank.write_card(card)?;
            }
            self.dirty.remove(&key);
        }
        if !self.pending_reviews.is_empty() {
            self.bank.append_reviews(&self.pending_reviews)?;
            self.pending_reviews.clear();
        }
        self.bank.save_meta(&self.meta)?;
        self.last_flush = Instant::now();
        Ok(())
    }

    pub fn append_session(&self, entry: &SessionLogEntry) -> Result<()> {
        self.bank.append_session(entry)
    }

    /// Replace the whole card set with a synced snapshot
    ///
    /// Review and session logs are append-only and survive. The mutation
    /// stamp takes the remote value so the pull itself does not register
    /// as a fresh local edit.
    pub fn replace_all(&mut self, cards: Vec<Card>, stamp: DateTime<Utc>) -> Result<()> {
        self.bank.remove_all_cards()?;
        self.cards = cards.into_iter().map(|c| (c.key(), c)).collect();
        self.dirty.clear();
        for card in self.cards.values() {
            self.bank.write_card(card)?;
        }
        self.meta.last_updated = stamp;
        self.bank.save_meta(&self.meta)?;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Record the stamp a pushed snapshot was uploaded under.
    /// Never moves the stamp backwards.
    pub fn mark_synced(&mut self, stamp: DateTime<Utc>) -> Result<()> {
        self.meta.last_updated = stamp.max(self.meta.last_updated);
        self.bank.save_meta(&self.meta)
    }

    /// Delete every card, keeping review and session logs
    pub fn reset_all(&mut self) -> Result<()> {
        self.bank.remove_all_cards()?;
        self.cards.clear();
        self.dirty.clear();
        self.touch(Utc::now());
        self.bank.save_meta(&self.meta)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::Rating;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> CardStore {
        CardStore::open(dir.path().to_path_buf()).unwrap()
    }

    fn cards_on_disk(dir: &TempDir) -> Vec<Card> {
        CardBank::new(dir.path().to_path_buf())
            .unwrap()
            .load_cards()
            .unwrap()
    }

    fn review_entry(card: &Card, rating: Rating) -> ReviewLogEntry {
        ReviewLogEntry {
            lemma: card.lemma.clone(),
            sense_id: card.sense_id,
            rating,
            before: card.snapshot(),
            after: card.snapshot(),
            reviewed_at: Utc::now(),
        }
    }

    #[test]
    fn test_ensure_card_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let now = Utc::now();

        assert!(store.ensure_card("run", 0, EntryType::Word, now));
        assert!(!store.ensure_card("run", 0, EntryType::Word, now));
        assert_eq!(store.len(), 1);

        // A different sense of the same lemma is a different card
        assert!(store.ensure_card("run", 1, EntryType::Word, now));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_cards_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open_store(&dir);
            store.ensure_card("bridge", 0, EntryType::Word, Utc::now());
            store.flush().unwrap();
        }

        let store = open_store(&dir);
        assert_eq!(store.len(), 1);
        assert!(store.has_card("bridge", 0));
    }

    #[test]
    fn test_flush_policy_defers_small_batches() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("defer", 0, EntryType::Word, Utc::now());

        store.flush_if_due();
        assert!(cards_on_disk(&dir).is_empty());

        store.flush().unwrap();
        assert_eq!(cards_on_disk(&dir).len(), 1);
    }

    #[test]
    fn test_flush_policy_triggers_at_dirty_limit() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        for i in 0..FLUSH_DIRTY_LIMIT {
            store.ensure_card(&format!("word-{}", i), 0, EntryType::Word, Utc::now());
        }

        store.flush_if_due();
        assert_eq!(cards_on_disk(&dir).len(), FLUSH_DIRTY_LIMIT);
    }

    #[test]
    fn test_review_log_buffered_until_flush() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("log", 0, EntryType::Word, Utc::now());
        let card = store.get(&CardKey::new("log", 0)).unwrap().clone();
        store.record_review(review_entry(&card, Rating::Good));

        let bank = CardBank::new(dir.path().to_path_buf()).unwrap();
        assert!(bank.read_review_log().is_empty());

        store.flush().unwrap();
        let log = bank.read_review_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].lemma, "log");
    }

    #[test]
    fn test_mutation_stamp_is_strictly_monotonic() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let now = Utc::now();

        store.ensure_card("a", 0, EntryType::Word, now);
        let first = store.last_updated();
        store.ensure_card("b", 0, EntryType::Word, now);
        let second = store.last_updated();
        assert!(second > first);
    }

    #[test]
    fn test_state_queries_partition_the_deck() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let now = Utc::now();

        store.ensure_card("fresh", 0, EntryType::Word, now);

        store.ensure_card("step", 0, EntryType::Word, now);
        let mut learning = store.get(&CardKey::new("step", 0)).unwrap().clone();
        learning.state = CardState::Learning;
        learning.due = now - Duration::minutes(1);
        store.update_card(learning);

        store.ensure_card("ripe", 0, EntryType::Word, now);
        let mut due_review = store.get(&CardKey::new("ripe", 0)).unwrap().clone();
        due_review.state = CardState::Review;
        due_review.due = now - Duration::days(1);
        store.update_card(due_review);

        store.ensure_card("early", 0, EntryType::Word, now);
        let mut future_review = store.get(&CardKey::new("early", 0)).unwrap().clone();
        future_review.state = CardState::Review;
        future_review.due = now + Duration::days(3);
        store.update_card(future_review);

        assert_eq!(store.new_cards().len(), 1);
        assert_eq!(store.learning_cards().len(), 1);
        assert_eq!(store.review_cards(now).len(), 1);
        // Due covers learning and review cards past their due time
        assert_eq!(store.due_cards(now).len(), 2);
    }

    #[test]
    fn test_lemma_started_requires_non_new_card() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("spur", 0, EntryType::Word, Utc::now());
        assert!(!store.lemma_started("spur"));

        let mut card = store.get(&CardKey::new("spur", 0)).unwrap().clone();
        card.state = CardState::Learning;
        store.update_card(card);
        assert!(store.lemma_started("spur"));
    }

    #[test]
    fn test_replace_all_swaps_cards_and_takes_stamp() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("old", 0, EntryType::Word, Utc::now());
        let card = store.get(&CardKey::new("old", 0)).unwrap().clone();
        store.record_review(review_entry(&card, Rating::Good));
        store.flush().unwrap();

        let stamp = Utc::now() + Duration::hours(1);
        let incoming = vec![Card::new("new", 0, EntryType::Phrase, Utc::now())];
        store.replace_all(incoming, stamp).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.has_card("new", 0));
        assert_eq!(store.last_updated(), stamp);

        let on_disk = cards_on_disk(&dir);
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk[0].lemma, "new");

        // History survives the swap
        let bank = CardBank::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(bank.read_review_log().len(), 1);
    }

    #[test]
    fn test_reset_all_keeps_logs() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("gone", 0, EntryType::Word, Utc::now());
        let card = store.get(&CardKey::new("gone", 0)).unwrap().clone();
        store.record_review(review_entry(&card, Rating::Again));
        store.flush().unwrap();

        store.reset_all().unwrap();
        assert!(store.is_empty());
        assert!(cards_on_disk(&dir).is_empty());

        let bank = CardBank::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(bank.read_review_log().len(), 1);
    }
}
