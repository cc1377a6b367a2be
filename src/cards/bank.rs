//! Durable storage for cards and study history
//!
//! Directory layout under the data dir:
//! ```text
//! <data_dir>/
//! ├── cards/
//! │   └── {lemma}__{sense}.json   # One file per card, written atomically
//! ├── review_log.jsonl            # Append-only review history
//! ├── sessions.jsonl              # Append-only session history
//! └── meta.json                   # Mutation stamp, schema version, device id
//! ```
//!
//! Lemmas are percent-encoded in file names so arbitrary vocabulary stays
//! filesystem-safe.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::{Card, ReviewLogEntry};
use crate::session::SessionLogEntry;

/// Storage schema version, recorded in meta.json and in sync snapshots
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Metadata tracked alongside the card files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankMeta {
    /// Strictly monotonic timestamp of the latest local mutation
    pub last_updated: DateTime<Utc>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Hostname-based identifier for this device
    #[serde(default = "device_id")]
    pub device_id: String,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Device id for sync attribution (hostname-based, stable across restarts)
pub fn device_id() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

impl Default for BankMeta {
    fn default() -> Self {
        Self {
            // Epoch stamp means "never mutated", so a fresh install loses
            // last-write-wins against any existing remote snapshot
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            schema_version: SCHEMA_VERSION,
            device_id: device_id(),
        }
    }
}

/// Durable layer behind the in-memory card store
pub struct CardBank {
    data_dir: PathBuf,
}

impl CardBank {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(data_dir.join("cards"))?;
        Ok(Self { data_dir })
    }

    fn cards_dir(&self) -> PathBuf {
        self.data_dir.join("cards")
    }

    fn card_path(&self, lemma: &str, sense_id: u32) -> PathBuf {
        self.cards_dir()
            .join(format!("{}__{}.json", urlencoding::encode(lemma), sense_id))
    }

    fn review_log_path(&self) -> PathBuf {
        self.data_dir.join("review_log.jsonl")
    }

    fn sessions_path(&self) -> PathBuf {
        self.data_dir.join("sessions.jsonl")
    }

    fn meta_path(&self) -> PathBuf {
        self.data_dir.join("meta.json")
    }

    // ==================== Cards ====================

    /// Load every card file, skipping unreadable entries with a warning
    pub fn load_cards(&self) -> Result<Vec<Card>> {
        let dir = self.cards_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut cards = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.extension().map_or(false, |ext| ext == "json") {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(StoreError::from)
                .and_then(|content| serde_json::from_str::<Card>(&content).map_err(StoreError::from));
            match parsed {
                Ok(card) => cards.push(card),
                Err(e) => log::warn!("Skipping unreadable card file {}: {}", path.display(), e),
            }
        }
        Ok(cards)
    }

    /// Write one card atomically (write to .tmp then rename)
    pub fn write_card(&self, card: &Card) -> Result<()> {
        let path = self.card_path(&card.lemma, card.sense_id);
        write_atomic(&path, &serde_json::to_string_pretty(card)?)
    }

    /// Delete every card file; logs and meta are untouched
    pub fn remove_all_cards(&self) -> Result<()> {
        let dir = self.cards_dir();
        if !dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    // ==================== Logs ====================

    pub fn append_reviews(&self, entries: &[ReviewLogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.review_log_path())?;
        for entry in entries {
            writeln!(file, "{}", serde_json::to_string(entry)?)?;
        }
        Ok(())
    }

    pub fn append_session(&self, entry: &SessionLogEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.sessions_path())?;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        Ok(())
    }

    /// Read the whole review history in chronological order
    pub fn read_review_log(&self) -> Vec<ReviewLogEntry> {
        read_jsonl(&self.review_log_path())
    }

    pub fn read_sessions(&self) -> Vec<SessionLogEntry> {
        read_jsonl(&self.sessions_path())
    }

    // ==================== Meta ====================

    pub fn load_meta(&self) -> BankMeta {
        let path = self.meta_path();
        if !path.exists() {
            return BankMeta::default();
        }
        let parsed = fs::read_to_string(&path)
            .map_err(StoreError::from)
            .and_then(|content| serde_json::from_str(&content).map_err(StoreError::from));
        match parsed {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("Resetting unreadable meta file: {}", e);
                BankMeta::default()
            }
        }
    }

    pub fn save_meta(&self, meta: &BankMeta) -> Result<()> {
        write_atomic(&self.meta_path(), &serde_json::to_string_pretty(meta)?)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read a JSONL file, skipping blank and malformed lines
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    if !path.exists() {
        return Vec::new();
    }
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return Vec::new(),
    };

    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        if let Ok(line) = line {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str::<T>(trimmed) {
                entries.push(entry);
            }
        }
    }
    entries
}
