//! Review scheduling
//!
//! The forgetting-curve mathematics sit behind the [`ReviewScheduler`]
//! trait: given a card and the current time, a scheduler returns one
//! candidate outcome per answer rating. The default implementation in
//! [`fsrs`] uses the published FSRS-4.5 formulas; callers that want a
//! different algorithm plug in their own implementation.

pub mod fsrs;

use chrono::{DateTime, Duration, Utc};

use crate::cards::{Card, Rating, ReviewLogEntry};

pub use fsrs::FsrsScheduler;

/// One possible outcome of answering a card
#[derive(Debug, Clone)]
pub struct SchedulingCandidate {
    /// The card as it would look after this rating
    pub card: Card,
    /// The review log line that rating would append
    pub log: ReviewLogEntry,
}

/// Candidate outcomes for all four answer ratings
#[derive(Debug, Clone)]
pub struct SchedulePreview {
    pub again: SchedulingCandidate,
    pub hard: SchedulingCandidate,
    pub good: SchedulingCandidate,
    pub easy: SchedulingCandidate,
}

impl SchedulePreview {
    /// Candidate for a rating; `Manual` has no scheduling outcome
    pub fn get(&self, rating: Rating) -> Option<&SchedulingCandidate> {
        match rating {
            Rating::Again => Some(&self.again),
            Rating::Hard => Some(&self.hard),
            Rating::Good => Some(&self.good),
            Rating::Easy => Some(&self.easy),
            Rating::Manual => None,
        }
    }

    pub fn take(self, rating: Rating) -> Option<SchedulingCandidate> {
        match rating {
            Rating::Again => Some(self.again),
            Rating::Hard => Some(self.hard),
            Rating::Good => Some(self.good),
            Rating::Easy => Some(self.easy),
            Rating::Manual => None,
        }
    }
}

/// Forgetting-curve algorithm seam
///
/// Implementations must be pure: no I/O, no clock reads, no mutation of the
/// input card. Severity must stay monotonic, meaning the candidate due
/// times satisfy again <= hard <= good <= easy.
pub trait ReviewScheduler: Send {
    fn preview(&self, card: &Card, now: DateTime<Utc>) -> SchedulePreview;
}

/// Format the time until a candidate due date as a short label
///
/// Negative deltas floor to "now".
pub fn format_interval(delta: Duration) -> String {
    let secs = delta.num_seconds();
    if secs <= 0 {
        return "now".to_string();
    }
    let mins = secs / 60;
    if mins < 1 {
        "1m".to_string()
    } else if mins < 60 {
        format!("{}m", mins)
    } else if mins < 60 * 24 {
        format!("{}h", mins / 60)
    } else {
        let days = mins / (60 * 24);
        if days < 30 {
            format!("{}d", days)
        } else if days < 365 {
            format!("{}mo", days / 30)
        } else {
            format!("{}y", days / 365)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::seconds(-30)), "now");
        assert_eq!(format_interval(Duration::zero()), "now");
        assert_eq!(format_interval(Duration::seconds(20)), "1m");
        assert_eq!(format_interval(Duration::minutes(5)), "5m");
        assert_eq!(format_interval(Duration::minutes(90)), "1h");
        assert_eq!(format_interval(Duration::hours(23)), "23h");
        assert_eq!(format_interval(Duration::days(1)), "1d");
        assert_eq!(format_interval(Duration::days(29)), "29d");
        assert_eq!(format_interval(Duration::days(45)), "1mo");
        assert_eq!(format_interval(Duration::days(364)), "12mo");
        assert_eq!(format_interval(Duration::days(730)), "2y");
    }
}
