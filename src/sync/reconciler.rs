//! Whole-snapshot reconciliation
//!
//! The protocol is last-write-wins at snapshot granularity:
//! 1. Refuse when unconfigured, already in flight, or inside the cooldown.
//! 2. Fetch the remote snapshot.
//! 3. A remote stamp newer than the local one is a conflict unless the
//!    caller accepts the remote side, in which case the local store is
//!    replaced wholesale.
//! 4. Matching stamps mean both sides are up to date.
//! 5. Otherwise the local snapshot wins and is uploaded under a fresh
//!    stamp, which the local store takes as well.
//!
//! The losing side's unsynced edits are discarded, never merged.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use super::models::{SnapshotDoc, SyncDirection, SyncErrorKind, SyncOptions, SyncOutcome, WireCard};
use super::remote::{RemoteError, RemoteStore};
use crate::cards::{CardStore, SCHEMA_VERSION};

/// Pause enforced between sync attempts
const SYNC_COOLDOWN: Duration = Duration::from_secs(30);

pub struct SyncReconciler {
    remote: Option<Box<dyn RemoteStore>>,
    user_id: Option<String>,
    cooldown: Duration,
    last_attempt: Option<Instant>,
    in_flight: bool,
}

impl Default for SyncReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncReconciler {
    pub fn new() -> Self {
        Self {
            remote: None,
            user_id: None,
            cooldown: SYNC_COOLDOWN,
            last_attempt: None,
            in_flight: false,
        }
    }

    pub fn configure(&mut self, remote: Box<dyn RemoteStore>, user_id: impl Into<String>) {
        self.remote = Some(remote);
        self.user_id = Some(user_id.into());
    }

    pub fn is_configured(&self) -> bool {
        self.remote.is_some() && self.user_id.is_some()
    }

    fn retry_in_secs(&self) -> u64 {
        match self.last_attempt {
            Some(at) => self.cooldown.saturating_sub(at.elapsed()).as_secs().max(1),
            None => self.cooldown.as_secs(),
        }
    }

    /// Run one sync attempt against the remote
    pub async fn sync(&mut self, store: &mut CardStore, opts: SyncOptions) -> SyncOutcome {
        if !self.is_configured() {
            return SyncOutcome::error(SyncErrorKind::NotConfigured, "Sync is not configured");
        }
        if self.in_flight {
            return SyncOutcome::RateLimited {
                retry_in_secs: self.retry_in_secs(),
            };
        }
        if !opts.force {
            if let Some(at) = self.last_attempt {
                if at.elapsed() < self.cooldown {
                    return SyncOutcome::RateLimited {
                        retry_in_secs: self.retry_in_secs(),
                    };
                }
            }
        }

        self.in_flight = true;
        self.last_attempt = Some(Instant::now());
        let outcome = self.run(store, opts).await;
        self.in_flight = false;
        outcome
    }

    async fn run(&self, store: &mut CardStore, opts: SyncOptions) -> SyncOutcome {
        let started = Instant::now();
        // Checked by the caller
        let (Some(remote), Some(user_id)) = (self.remote.as_ref(), self.user_id.as_deref()) else {
            return SyncOutcome::error(SyncErrorKind::NotConfigured, "Sync is not configured");
        };

        let local_updated = store.last_updated();
        let remote_doc = match remote.fetch(user_id).await {
            Ok(doc) => doc,
            Err(e) => return remote_failure("fetch", e),
        };

        if let Some(doc) = remote_doc {
            if doc.schema_version > SCHEMA_VERSION {
                return SyncOutcome::error(
                    SyncErrorKind::Decode,
                    format!(
                        "Remote snapshot uses schema v{}, newer than supported v{}",
                        doc.schema_version, SCHEMA_VERSION
                    ),
                );
            }

            if doc.last_updated > local_updated {
                if !opts.accept_remote {
                    log::warn!(
                        "Sync conflict: remote snapshot from '{}' is newer than the local store",
                        doc.device
                    );
                    return SyncOutcome::Conflict {
                        local_updated,
                        remote_updated: doc.last_updated,
                        remote_device: doc.device,
                    };
                }
                let stamp = doc.last_updated;
                let cards: Vec<_> = doc.cards.into_iter().map(WireCard::into_card).collect();
                let count = cards.len();
                return match store.replace_all(cards, stamp) {
                    Ok(()) => {
                        log::info!("Pulled remote snapshot from '{}': {} cards", doc.device, count);
                        SyncOutcome::success(SyncDirection::Pulled, count, elapsed_ms(started))
                    }
                    Err(e) => SyncOutcome::error(
                        SyncErrorKind::Remote,
                        format!("Failed to apply remote snapshot: {}", e),
                    ),
                };
            }

            if doc.last_updated == local_updated {
                return SyncOutcome::success(SyncDirection::UpToDate, 0, elapsed_ms(started));
            }
        }

        // Local wins. Upload under a fresh stamp and keep it locally so the
        // next comparison sees both sides equal.
        let stamp = Utc::now().max(local_updated);
        let push = build_snapshot(store, stamp);
        let cards = push.cards.len();
        match remote.store(user_id, &push).await {
            Ok(()) => {
                if let Err(e) = store.mark_synced(stamp) {
                    log::warn!("Failed to persist the sync stamp: {}", e);
                }
                log::info!("Pushed snapshot: {} cards", cards);
                SyncOutcome::success(SyncDirection::Pushed, cards, elapsed_ms(started))
            }
            Err(e) => remote_failure("store", e),
        }
    }
}

fn build_snapshot(store: &CardStore, stamp: DateTime<Utc>) -> SnapshotDoc {
    let cards = store.all_cards().map(WireCard::from_card).collect();
    SnapshotDoc::new(stamp, store.device_id().to_string(), cards)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Map a remote failure onto the outcome taxonomy
fn remote_failure(op: &str, err: RemoteError) -> SyncOutcome {
    let kind = match &err {
        RemoteError::Http(e) if e.is_connect() || e.is_timeout() => SyncErrorKind::Network,
        RemoteError::Http(_) => SyncErrorKind::Remote,
        RemoteError::Blocked => SyncErrorKind::Blocked,
        RemoteError::Server { .. } => SyncErrorKind::Remote,
        RemoteError::Decode(_) => SyncErrorKind::Decode,
        RemoteError::InvalidUrl(_) => SyncErrorKind::Remote,
    };
    log::warn!("Sync {} failed: {}", op, err);
    SyncOutcome::error(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CardKey;
    use crate::sync::remote::MemoryRemoteStore;
    use crate::vocab::EntryType;
    use chrono::{Duration as ChronoDuration, Utc};
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> CardStore {
        CardStore::open(dir.path().to_path_buf()).unwrap()
    }

    fn configured(remote: &MemoryRemoteStore) -> SyncReconciler {
        let mut reconciler = SyncReconciler::new();
        reconciler.configure(Box::new(remote.clone()), "alice");
        reconciler
    }

    fn remote_doc_with(stamp: chrono::DateTime<Utc>, lemma: &str) -> SnapshotDoc {
        let mut card = crate::cards::Card::new(lemma, 0, EntryType::Word, stamp);
        card.elapsed_days = 5.0;
        SnapshotDoc::new(stamp, "laptop".to_string(), vec![WireCard::from_card(&card)])
    }

    #[tokio::test]
    async fn test_unconfigured_sync_errors() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let mut reconciler = SyncReconciler::new();

        let outcome = reconciler.sync(&mut store, SyncOptions::default()).await;
        match outcome {
            SyncOutcome::Error { kind, .. } => assert_eq!(kind, SyncErrorKind::NotConfigured),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_sync_pushes_local_cards() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("apple", 0, EntryType::Word, Utc::now());
        store.ensure_card("pear", 0, EntryType::Word, Utc::now());

        let remote = MemoryRemoteStore::new();
        let mut reconciler = configured(&remote);

        let before = store.last_updated();
        let outcome = reconciler.sync(&mut store, SyncOptions::default()).await;
        match outcome {
            SyncOutcome::Success(report) => {
                assert_eq!(report.direction, SyncDirection::Pushed);
                assert_eq!(report.cards, 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        // The push stamp is taken on both sides and never regresses
        let doc = remote.snapshot("alice").unwrap();
        assert_eq!(doc.cards.len(), 2);
        assert_eq!(doc.last_updated, store.last_updated());
        assert!(store.last_updated() >= before);
        assert_eq!(doc.device, store.device_id());
    }

    #[tokio::test]
    async fn test_cooldown_rate_limits_without_touching_network() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("apple", 0, EntryType::Word, Utc::now());

        let remote = MemoryRemoteStore::new();
        let mut reconciler = configured(&remote);

        assert!(reconciler.sync(&mut store, SyncOptions::default()).await.is_success());
        assert_eq!(remote.fetches(), 1);

        let outcome = reconciler.sync(&mut store, SyncOptions::default()).await;
        match outcome {
            SyncOutcome::RateLimited { retry_in_secs } => assert!(retry_in_secs > 0),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(remote.fetches(), 1);
    }

    #[tokio::test]
    async fn test_force_bypasses_cooldown() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("apple", 0, EntryType::Word, Utc::now());

        let remote = MemoryRemoteStore::new();
        let mut reconciler = configured(&remote);

        assert!(reconciler.sync(&mut store, SyncOptions::default()).await.is_success());

        let opts = SyncOptions {
            force: true,
            ..Default::default()
        };
        let outcome = reconciler.sync(&mut store, opts).await;
        match outcome {
            SyncOutcome::Success(report) => assert_eq!(report.direction, SyncDirection::UpToDate),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(remote.fetches(), 2);
        // Only the first attempt wrote
        assert_eq!(remote.stores(), 1);
    }

    #[tokio::test]
    async fn test_newer_remote_is_a_conflict_and_mutates_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("local-word", 0, EntryType::Word, Utc::now());

        let remote_stamp = Utc::now() + ChronoDuration::hours(1);
        let remote = MemoryRemoteStore::new();
        remote.seed("alice", remote_doc_with(remote_stamp, "remote-word"));
        let mut reconciler = configured(&remote);

        let local_stamp = store.last_updated();
        let outcome = reconciler.sync(&mut store, SyncOptions::default()).await;
        match outcome {
            SyncOutcome::Conflict {
                local_updated,
                remote_updated,
                remote_device,
            } => {
                assert_eq!(local_updated, local_stamp);
                assert_eq!(remote_updated, remote_stamp);
                assert_eq!(remote_device, "laptop");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(store.len(), 1);
        assert!(store.get(&CardKey::new("local-word", 0)).is_some());
        assert_eq!(store.last_updated(), local_stamp);
        assert_eq!(remote.stores(), 0);
    }

    #[tokio::test]
    async fn test_accept_remote_pulls_wholesale() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("local-word", 0, EntryType::Word, Utc::now());

        let remote_stamp = Utc::now() + ChronoDuration::hours(1);
        let remote = MemoryRemoteStore::new();
        remote.seed("alice", remote_doc_with(remote_stamp, "remote-word"));
        let mut reconciler = configured(&remote);

        let opts = SyncOptions {
            accept_remote: true,
            ..Default::default()
        };
        let outcome = reconciler.sync(&mut store, opts).await;
        match outcome {
            SyncOutcome::Success(report) => {
                assert_eq!(report.direction, SyncDirection::Pulled);
                assert_eq!(report.cards, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(store.len(), 1);
        let card = store.get(&CardKey::new("remote-word", 0)).unwrap();
        // Elapsed time never crosses devices
        assert_eq!(card.elapsed_days, 0.0);
        assert_eq!(store.last_updated(), remote_stamp);
    }

    #[tokio::test]
    async fn test_equal_stamps_are_up_to_date() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("apple", 0, EntryType::Word, Utc::now());

        let remote = MemoryRemoteStore::new();
        let doc = SnapshotDoc::new(store.last_updated(), "laptop".to_string(), Vec::new());
        remote.seed("alice", doc);
        let mut reconciler = configured(&remote);

        let outcome = reconciler.sync(&mut store, SyncOptions::default()).await;
        match outcome {
            SyncOutcome::Success(report) => {
                assert_eq!(report.direction, SyncDirection::UpToDate);
                assert_eq!(report.cards, 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(remote.stores(), 0);
    }

    #[tokio::test]
    async fn test_newer_schema_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.ensure_card("apple", 0, EntryType::Word, Utc::now());

        let remote = MemoryRemoteStore::new();
        let mut doc = SnapshotDoc::new(
            Utc::now() + ChronoDuration::hours(1),
            "laptop".to_string(),
            Vec::new(),
        );
        doc.schema_version = SCHEMA_VERSION + 1;
        remote.seed("alice", doc);
        let mut reconciler = configured(&remote);

        let outcome = reconciler.sync(&mut store, SyncOptions::default()).await;
        match outcome {
            SyncOutcome::Error { kind, .. } => assert_eq!(kind, SyncErrorKind::Decode),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(store.len(), 1);
    }
}
