//! Data models for snapshot sync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cards::{Card, CardState, SCHEMA_VERSION};
use crate::vocab::EntryType;

/// Options for a sync attempt
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncOptions {
    /// Skip the cooldown. An attempt already in flight still wins.
    pub force: bool,
    /// Resolve a conflict by taking the remote snapshot wholesale
    pub accept_remote: bool,
}

/// Whole-account snapshot exchanged with the remote store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDoc {
    /// Mutation stamp of the store that produced the snapshot
    pub last_updated: DateTime<Utc>,
    /// Device that produced the snapshot
    pub device: String,
    pub schema_version: u32,
    pub cards: Vec<WireCard>,
}

impl SnapshotDoc {
    pub fn new(last_updated: DateTime<Utc>, device: String, cards: Vec<WireCard>) -> Self {
        Self {
            last_updated,
            device,
            schema_version: SCHEMA_VERSION,
            cards,
        }
    }
}

/// Compact wire form of a card
///
/// Keys are shortened to keep large snapshots small. Elapsed time is
/// deliberately absent from the wire: it is derived locally from
/// `last_review` and never trusted across devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCard {
    #[serde(rename = "l")]
    pub lemma: String,
    #[serde(rename = "s")]
    pub sense_id: u32,
    #[serde(rename = "t", default)]
    pub entry_type: u8,
    #[serde(rename = "d", with = "chrono::serde::ts_milliseconds")]
    pub due: DateTime<Utc>,
    #[serde(rename = "st", default)]
    pub stability: f64,
    #[serde(rename = "df", default)]
    pub difficulty: f64,
    #[serde(rename = "sd", default)]
    pub scheduled_days: f64,
    #[serde(rename = "r", default)]
    pub reps: u32,
    #[serde(rename = "lp", default)]
    pub lapses: u32,
    #[serde(rename = "c")]
    pub state: u8,
    #[serde(rename = "ls", default)]
    pub learning_steps: u32,
    #[serde(
        rename = "lr",
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub last_review: Option<DateTime<Utc>>,
}

impl WireCard {
    pub fn from_card(card: &Card) -> Self {
        Self {
            lemma: card.lemma.clone(),
            sense_id: card.sense_id,
            entry_type: match card.entry_type {
                EntryType::Word => 0,
                EntryType::Phrase => 1,
            },
            due: card.due,
            stability: card.stability,
            difficulty: card.difficulty,
            scheduled_days: card.scheduled_days,
            reps: card.reps,
            lapses: card.lapses,
            state: card.state.code(),
            learning_steps: card.learning_steps,
            last_review: card.last_review,
        }
    }

    /// Rebuild a full card. Elapsed time restarts at zero and is
    /// recomputed from `last_review` at the next rating.
    pub fn into_card(self) -> Card {
        Card {
            lemma: self.lemma,
            sense_id: self.sense_id,
            entry_type: if self.entry_type == 1 {
                EntryType::Phrase
            } else {
                EntryType::Word
            },
            due: self.due,
            stability: self.stability,
            difficulty: self.difficulty,
            elapsed_days: 0.0,
            scheduled_days: self.scheduled_days,
            reps: self.reps,
            lapses: self.lapses,
            state: CardState::from_code(self.state),
            learning_steps: self.learning_steps,
            last_review: self.last_review,
        }
    }
}

/// Direction a completed sync moved data in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncDirection {
    Pushed,
    Pulled,
    UpToDate,
}

/// Report for a successful sync
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub direction: SyncDirection,
    /// Cards carried by the snapshot that moved
    pub cards: usize,
    pub duration_ms: u64,
}

/// Failure classification, coarse enough for UI copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncErrorKind {
    /// Could not reach the remote at all
    Network,
    /// The remote refused our credentials
    Blocked,
    /// The remote exchange failed, or its snapshot could not be applied
    Remote,
    /// The snapshot could not be understood
    Decode,
    NotConfigured,
}

/// Terminal outcome of a sync attempt
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SyncOutcome {
    Success(SyncReport),
    /// The remote snapshot is newer than the local store; nothing moved
    Conflict {
        local_updated: DateTime<Utc>,
        remote_updated: DateTime<Utc>,
        remote_device: String,
    },
    /// Inside the cooldown window, or another attempt is in flight
    RateLimited { retry_in_secs: u64 },
    Error {
        kind: SyncErrorKind,
        message: String,
    },
}

impl SyncOutcome {
    pub fn success(direction: SyncDirection, cards: usize, duration_ms: u64) -> Self {
        Self::Success(SyncReport {
            direction,
            cards,
            duration_ms,
        })
    }

    pub fn error(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_card() -> Card {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut card = Card::new("bank", 1, EntryType::Word, now);
        card.state = CardState::Review;
        card.stability = 12.5;
        card.difficulty = 4.2;
        card.elapsed_days = 5.0;
        card.scheduled_days = 12.0;
        card.reps = 7;
        card.lapses = 1;
        card.last_review = Some(now);
        card
    }

    #[test]
    fn test_wire_card_uses_compact_keys_and_drops_elapsed() {
        let wire = WireCard::from_card(&sample_card());
        let json: serde_json::Value = serde_json::to_value(&wire).unwrap();
        let obj = json.as_object().unwrap();
        for key in ["l", "s", "d", "st", "df", "r", "lp", "c", "lr"] {
            assert!(obj.contains_key(key), "missing key {}", key);
        }
        assert!(!obj.contains_key("elapsedDays"));
        assert!(!obj.contains_key("lemma"));
        assert_eq!(obj["c"], serde_json::json!(2));
    }

    #[test]
    fn test_wire_roundtrip_resets_elapsed() {
        let card = sample_card();
        let wire = WireCard::from_card(&card);
        let back = wire.into_card();
        assert_eq!(back.lemma, "bank");
        assert_eq!(back.sense_id, 1);
        assert_eq!(back.state, CardState::Review);
        assert_eq!(back.reps, 7);
        assert_eq!(back.last_review, card.last_review);
        assert_eq!(back.elapsed_days, 0.0);
        assert_eq!(back.scheduled_days, 12.0);
    }

    #[test]
    fn test_wire_card_decodes_without_optional_fields() {
        let json = r#"{"l":"tree","s":0,"d":1709294400000,"c":0}"#;
        let wire: WireCard = serde_json::from_str(json).unwrap();
        let card = wire.into_card();
        assert_eq!(card.lemma, "tree");
        assert_eq!(card.state, CardState::New);
        assert_eq!(card.stability, 0.0);
        assert_eq!(card.learning_steps, 0);
        assert!(card.last_review.is_none());
    }

    #[test]
    fn test_snapshot_doc_serializes_camel_case() {
        let doc = SnapshotDoc::new(Utc::now(), "laptop".to_string(), Vec::new());
        let json = serde_json::to_value(&doc).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("lastUpdated"));
        assert!(obj.contains_key("schemaVersion"));
        assert_eq!(obj["device"], serde_json::json!("laptop"));
    }

    #[test]
    fn test_outcome_tagging() {
        let outcome = SyncOutcome::success(SyncDirection::Pushed, 3, 120);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], serde_json::json!("success"));
        assert_eq!(json["direction"], serde_json::json!("pushed"));
        assert!(outcome.is_success());

        let outcome = SyncOutcome::RateLimited { retry_in_secs: 12 };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], serde_json::json!("rateLimited"));
        assert!(!outcome.is_success());
    }
}
