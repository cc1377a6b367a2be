//! Daily progress storage implementation

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use super::models::{DailyStats, StudyLimits};
use crate::cards::{CardState, Rating, StoreError};

type Result<T> = std::result::Result<T, StoreError>;

/// Tracker for per-day counters and study limits
///
/// Persists independently of the card store: `daily_stats.json` holds the
/// day records, `limits.json` the quotas. Both reload at startup.
pub struct DailyProgress {
    data_dir: PathBuf,
    days: Vec<DailyStats>,
    limits: StudyLimits,
}

impl DailyProgress {
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir)?;
        let mut progress = Self {
            data_dir,
            days: Vec::new(),
            limits: StudyLimits::default(),
        };
        progress.reload()?;
        Ok(progress)
    }

    fn stats_file(&self) -> PathBuf {
        self.data_dir.join("daily_stats.json")
    }

    fn limits_file(&self) -> PathBuf {
        self.data_dir.join("limits.json")
    }

    fn reload(&mut self) -> Result<()> {
        let stats_path = self.stats_file();
        if stats_path.exists() {
            let content = fs::read_to_string(&stats_path)?;
            self.days = serde_json::from_str(&content)?;
        }
        let limits_path = self.limits_file();
        if limits_path.exists() {
            let content = fs::read_to_string(&limits_path)?;
            self.limits = serde_json::from_str(&content)?;
        }
        Ok(())
    }

    fn save_days(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.days)?;
        fs::write(self.stats_file(), json)?;
        Ok(())
    }

    /// Upsert the record for a date
    fn day_mut(&mut self, date: NaiveDate) -> &mut DailyStats {
        if let Some(pos) = self.days.iter().position(|d| d.date == date) {
            return &mut self.days[pos];
        }
        self.days.push(DailyStats::new(date));
        self.days.sort_by_key(|d| d.date);
        let pos = self
            .days
            .iter()
            .position(|d| d.date == date)
            .unwrap_or(self.days.len() - 1);
        &mut self.days[pos]
    }

    // ==================== Recording ====================

    /// Record one answered card; `prior` is the card's state before the rating
    pub fn record_review(&mut self, date: NaiveDate, rating: Rating, prior: CardState) -> Result<()> {
        let day = self.day_mut(date);
        match prior {
            CardState::New => day.new_cards += 1,
            CardState::Review => day.reviews += 1,
            // Learning steps drain neither daily quota
            CardState::Learning | CardState::Relearning => {}
        }
        match rating {
            Rating::Again => day.again += 1,
            Rating::Hard => day.hard += 1,
            Rating::Good => day.good += 1,
            Rating::Easy => day.easy += 1,
            Rating::Manual => {}
        }
        self.save_days()
    }

    pub fn add_study_time(&mut self, date: NaiveDate, ms: u64) -> Result<()> {
        self.day_mut(date).study_time_ms += ms;
        self.save_days()
    }

    // ==================== Queries ====================

    pub fn stats_for(&self, date: NaiveDate) -> Option<&DailyStats> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn list_days(&self) -> &[DailyStats] {
        &self.days
    }

    /// New-card budget left for the date, floored at zero
    pub fn remaining_new(&self, date: NaiveDate) -> u32 {
        let used = self.stats_for(date).map(|d| d.new_cards).unwrap_or(0);
        self.limits.new_per_day.saturating_sub(used)
    }

    /// Review budget left for the date, floored at zero
    pub fn remaining_reviews(&self, date: NaiveDate) -> u32 {
        let used = self.stats_for(date).map(|d| d.reviews).unwrap_or(0);
        self.limits.reviews_per_day.saturating_sub(used)
    }

    pub fn limits(&self) -> StudyLimits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: StudyLimits) -> Result<()> {
        self.limits = limits;
        let json = serde_json::to_string_pretty(&self.limits)?;
        fs::write(self.limits_file(), json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn open(dir: &TempDir) -> DailyProgress {
        DailyProgress::open(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_new_and_review_counters_are_disjoint() {
        let dir = TempDir::new().unwrap();
        let mut progress = open(&dir);
        let today = date("2026-03-01");

        for _ in 0..3 {
            progress.record_review(today, Rating::Good, CardState::New).unwrap();
        }
        progress.record_review(today, Rating::Again, CardState::Review).unwrap();
        progress.record_review(today, Rating::Easy, CardState::Review).unwrap();

        let day = progress.stats_for(today).unwrap();
        assert_eq!(day.new_cards, 3);
        assert_eq!(day.reviews, 2);
        assert_eq!(day.again, 1);
        assert_eq!(day.good, 3);
        assert_eq!(day.easy, 1);
        assert_eq!(day.hard, 0);
    }

    #[test]
    fn test_learning_steps_drain_no_quota() {
        let dir = TempDir::new().unwrap();
        let mut progress = open(&dir);
        let today = date("2026-03-01");

        progress
            .record_review(today, Rating::Good, CardState::Learning)
            .unwrap();
        progress
            .record_review(today, Rating::Again, CardState::Relearning)
            .unwrap();

        // Rating buckets fill, quotas stay untouched
        let day = progress.stats_for(today).unwrap();
        assert_eq!(day.new_cards, 0);
        assert_eq!(day.reviews, 0);
        assert_eq!(day.good, 1);
        assert_eq!(day.again, 1);
        assert_eq!(progress.remaining_new(today), 20);
        assert_eq!(progress.remaining_reviews(today), 100);
    }

    #[test]
    fn test_other_dates_are_untouched() {
        let dir = TempDir::new().unwrap();
        let mut progress = open(&dir);
        progress
            .record_review(date("2026-03-01"), Rating::Good, CardState::New)
            .unwrap();

        assert!(progress.stats_for(date("2026-03-02")).is_none());
        assert_eq!(progress.remaining_new(date("2026-03-02")), 20);
        assert_eq!(progress.remaining_reviews(date("2026-03-02")), 100);
    }

    #[test]
    fn test_remaining_quotas_floor_at_zero() {
        let dir = TempDir::new().unwrap();
        let mut progress = open(&dir);
        let today = date("2026-03-01");
        progress
            .set_limits(StudyLimits {
                new_per_day: 2,
                reviews_per_day: 1,
            })
            .unwrap();

        for _ in 0..3 {
            progress.record_review(today, Rating::Good, CardState::New).unwrap();
        }
        for _ in 0..2 {
            progress.record_review(today, Rating::Good, CardState::Review).unwrap();
        }

        assert_eq!(progress.remaining_new(today), 0);
        assert_eq!(progress.remaining_reviews(today), 0);
    }

    #[test]
    fn test_counters_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let today = date("2026-03-01");
        {
            let mut progress = open(&dir);
            progress.record_review(today, Rating::Hard, CardState::Review).unwrap();
            progress.add_study_time(today, 90_000).unwrap();
        }

        let progress = open(&dir);
        let day = progress.stats_for(today).unwrap();
        assert_eq!(day.reviews, 1);
        assert_eq!(day.hard, 1);
        assert_eq!(day.study_time_ms, 90_000);
    }

    #[test]
    fn test_limits_default_and_persist() {
        let dir = TempDir::new().unwrap();
        {
            let mut progress = open(&dir);
            assert_eq!(progress.limits(), StudyLimits::default());
            assert_eq!(progress.limits().new_per_day, 20);
            assert_eq!(progress.limits().reviews_per_day, 100);
            progress
                .set_limits(StudyLimits {
                    new_per_day: 5,
                    reviews_per_day: 50,
                })
                .unwrap();
        }

        let progress = open(&dir);
        assert_eq!(progress.limits().new_per_day, 5);
        assert_eq!(progress.limits().reviews_per_day, 50);
    }

    #[test]
    fn test_days_stay_sorted() {
        let dir = TempDir::new().unwrap();
        let mut progress = open(&dir);
        progress
            .record_review(date("2026-03-05"), Rating::Good, CardState::New)
            .unwrap();
        progress
            .record_review(date("2026-03-01"), Rating::Good, CardState::New)
            .unwrap();

        let days: Vec<NaiveDate> = progress.list_days().iter().map(|d| d.date).collect();
        assert_eq!(days, vec![date("2026-03-01"), date("2026-03-05")]);
    }
}
