//! Data models for daily progress tracking

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Counters for one local calendar day
///
/// Days are keyed by the device's local date so "today" matches what the
/// learner sees, and serialize as plain `YYYY-MM-DD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    /// Cards introduced for the first time
    #[serde(default)]
    pub new_cards: u32,
    /// Ratings of already-introduced cards
    #[serde(default)]
    pub reviews: u32,
    #[serde(default)]
    pub again: u32,
    #[serde(default)]
    pub hard: u32,
    #[serde(default)]
    pub good: u32,
    #[serde(default)]
    pub easy: u32,
    #[serde(default)]
    pub study_time_ms: u64,
}

impl DailyStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            new_cards: 0,
            reviews: 0,
            again: 0,
            hard: 0,
            good: 0,
            easy: 0,
            study_time_ms: 0,
        }
    }
}

/// Daily study quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyLimits {
    #[serde(default = "default_new_per_day")]
    pub new_per_day: u32,
    #[serde(default = "default_reviews_per_day")]
    pub reviews_per_day: u32,
}

fn default_new_per_day() -> u32 {
    20
}

fn default_reviews_per_day() -> u32 {
    100
}

impl Default for StudyLimits {
    fn default() -> Self {
        Self {
            new_per_day: default_new_per_day(),
            reviews_per_day: default_reviews_per_day(),
        }
    }
}
