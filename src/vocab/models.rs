//! Data models for vocabulary entries

use serde::{Deserialize, Serialize};

/// Kind of vocabulary entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryType {
    /// Single word
    Word,
    /// Multi-word phrase or expression
    Phrase,
}

impl Default for EntryType {
    fn default() -> Self {
        Self::Word
    }
}

/// One meaning of a vocabulary entry
///
/// A sense is identified by its position in the entry's sense list; the
/// sense at index 0 is the primary meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sense {
    pub gloss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl Sense {
    pub fn new(gloss: impl Into<String>) -> Self {
        Self {
            gloss: gloss.into(),
            example: None,
        }
    }
}

/// A vocabulary entry with its ordered list of senses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabEntry {
    pub lemma: String,
    #[serde(default)]
    pub entry_type: EntryType,
    #[serde(default)]
    pub senses: Vec<Sense>,
}

impl VocabEntry {
    pub fn new(lemma: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            lemma: lemma.into(),
            entry_type,
            senses: Vec::new(),
        }
    }

    pub fn with_senses(lemma: impl Into<String>, entry_type: EntryType, glosses: &[&str]) -> Self {
        Self {
            lemma: lemma.into(),
            entry_type,
            senses: glosses.iter().map(|g| Sense::new(*g)).collect(),
        }
    }

    /// Sense ids are positions in the sense list
    pub fn sense_ids(&self) -> std::ops::Range<u32> {
        0..self.senses.len() as u32
    }
}
