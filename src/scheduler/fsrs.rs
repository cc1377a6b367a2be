//! FSRS-4.5 spaced repetition scheduling
//!
//! Implementation of the published FSRS-4.5 formulas (17-parameter model,
//! power forgetting curve) combined with Anki-style learning steps for
//! cards that have not yet graduated to day-level intervals.
//!
//! Answer ratings (1-4):
//! - 1 Again: failed to recall
//! - 2 Hard: recalled with serious difficulty
//! - 3 Good: recalled with some effort
//! - 4 Easy: recalled without hesitation

use chrono::{DateTime, Duration, Utc};

use crate::cards::{Card, CardState, Rating, ReviewLogEntry};

use super::{ReviewScheduler, SchedulePreview, SchedulingCandidate};

/// Published FSRS-4.5 default parameters
const WEIGHTS: [f64; 17] = [
    0.4872, 1.4003, 3.7145, 13.8206, 5.1618, 1.2298, 0.8975, 0.031, 1.6474, 0.1367, 1.0461, 2.1072,
    0.0793, 0.3246, 1.587, 0.2272, 2.8755,
];

/// Decay exponent of the power forgetting curve
const DECAY: f64 = -0.5;
/// Chosen so retrievability is 90% when elapsed time equals stability
const FACTOR: f64 = 19.0 / 81.0;

const MIN_DIFFICULTY: f64 = 1.0;
const MAX_DIFFICULTY: f64 = 10.0;

/// Scheduler backed by the FSRS-4.5 memory model
pub struct FsrsScheduler {
    weights: [f64; 17],
    desired_retention: f64,
    /// Upper bound on any scheduled interval, in days
    maximum_interval: u32,
    learning_steps: Vec<Duration>,
    relearning_steps: Vec<Duration>,
}

impl Default for FsrsScheduler {
    fn default() -> Self {
        Self {
            weights: WEIGHTS,
            desired_retention: 0.9,
            maximum_interval: 36500,
            learning_steps: vec![Duration::minutes(1), Duration::minutes(10)],
            relearning_steps: vec![Duration::minutes(10)],
        }
    }
}

impl FsrsScheduler {
    pub fn new(desired_retention: f64, maximum_interval: u32) -> Self {
        Self {
            desired_retention,
            maximum_interval,
            ..Self::default()
        }
    }

    /// Probability of recall after `elapsed_days` for a given stability
    fn retrievability(&self, elapsed_days: f64, stability: f64) -> f64 {
        if stability <= 0.0 {
            return 0.0;
        }
        (1.0 + FACTOR * elapsed_days / stability).powf(DECAY)
    }

    /// Interval in whole days that hits the desired retention
    fn next_interval(&self, stability: f64) -> f64 {
        let interval = stability / FACTOR * (self.desired_retention.powf(1.0 / DECAY) - 1.0);
        interval.round().clamp(1.0, self.maximum_interval as f64)
    }

    fn init_stability(&self, grade: u32) -> f64 {
        let idx = (grade.clamp(1, 4) - 1) as usize;
        self.weights[idx].max(0.1)
    }

    fn init_difficulty(&self, grade: u32) -> f64 {
        let g = grade as f64;
        (self.weights[4] - self.weights[5] * (g - 3.0)).clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    fn next_difficulty(&self, difficulty: f64, grade: u32) -> f64 {
        let g = grade as f64;
        let shifted = difficulty - self.weights[6] * (g - 3.0);
        // Mean reversion toward the Easy initial difficulty
        let reverted = self.weights[7] * self.init_difficulty(4) + (1.0 - self.weights[7]) * shifted;
        reverted.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    fn next_recall_stability(
        &self,
        difficulty: f64,
        stability: f64,
        retrievability: f64,
        grade: u32,
    ) -> f64 {
        let hard_penalty = if grade == 2 { self.weights[15] } else { 1.0 };
        let easy_bonus = if grade == 4 { self.weights[16] } else { 1.0 };
        stability
            * (1.0
                + self.weights[8].exp()
                    * (11.0 - difficulty)
                    * stability.powf(-self.weights[9])
                    * ((self.weights[10] * (1.0 - retrievability)).exp() - 1.0)
                    * hard_penalty
                    * easy_bonus)
    }

    /// Post-lapse stability, capped so a lapse never increases stability
    fn next_forget_stability(&self, difficulty: f64, stability: f64, retrievability: f64) -> f64 {
        let s = self.weights[11]
            * difficulty.powf(-self.weights[12])
            * ((stability + 1.0).powf(self.weights[13]) - 1.0)
            * (self.weights[14] * (1.0 - retrievability)).exp();
        s.min(stability)
    }

    /// Days since the last review, floored at zero
    fn elapsed_days(card: &Card, now: DateTime<Utc>) -> f64 {
        card.last_review
            .map(|lr| (now - lr).num_seconds().max(0) as f64 / 86_400.0)
            .unwrap_or(0.0)
    }

    /// Shared per-review bookkeeping for every candidate
    fn base_next(card: &Card, now: DateTime<Utc>) -> Card {
        let mut next = card.clone();
        next.elapsed_days = Self::elapsed_days(card, now);
        next.reps = card.reps + 1;
        next.last_review = Some(now);
        next
    }

    fn graduate(&self, next: &mut Card, interval: f64, now: DateTime<Utc>) {
        next.state = CardState::Review;
        next.learning_steps = 0;
        next.scheduled_days = interval;
        next.due = now + Duration::days(interval as i64);
    }

    fn candidate(
        &self,
        original: &Card,
        next: Card,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> SchedulingCandidate {
        let log = ReviewLogEntry {
            lemma: original.lemma.clone(),
            sense_id: original.sense_id,
            rating,
            before: original.snapshot(),
            after: next.snapshot(),
            reviewed_at: now,
        };
        SchedulingCandidate { card: next, log }
    }

    fn preview_new(&self, card: &Card, now: DateTime<Utc>) -> SchedulePreview {
        let base = Self::base_next(card, now);
        let steps = &self.learning_steps;

        let mut again = base.clone();
        again.stability = self.init_stability(1);
        again.difficulty = self.init_difficulty(1);
        again.state = CardState::Learning;
        again.learning_steps = 0;
        again.scheduled_days = 0.0;
        again.due = now + first_step(steps);

        let mut hard = base.clone();
        hard.stability = self.init_stability(2);
        hard.difficulty = self.init_difficulty(2);
        hard.state = CardState::Learning;
        hard.learning_steps = 0;
        hard.scheduled_days = 0.0;
        hard.due = now + hard_delay(steps, 0);

        let mut good = base.clone();
        good.stability = self.init_stability(3);
        good.difficulty = self.init_difficulty(3);
        good.state = CardState::Learning;
        if steps.len() > 1 {
            good.learning_steps = 1;
            good.scheduled_days = 0.0;
            good.due = now + steps[1];
        } else {
            let interval = self.next_interval(good.stability);
            self.graduate(&mut good, interval, now);
        }

        let mut easy = base;
        easy.stability = self.init_stability(4);
        easy.difficulty = self.init_difficulty(4);
        let mut easy_interval = self.next_interval(easy.stability);
        if good.state == CardState::Review {
            easy_interval = easy_interval.max(good.scheduled_days + 1.0);
        }
        self.graduate(&mut easy, easy_interval, now);

        SchedulePreview {
            again: self.candidate(card, again, Rating::Again, now),
            hard: self.candidate(card, hard, Rating::Hard, now),
            good: self.candidate(card, good, Rating::Good, now),
            easy: self.candidate(card, easy, Rating::Easy, now),
        }
    }

    /// Learning and relearning cards move through fixed steps; memory state
    /// carries over unchanged until the card graduates
    fn preview_steps(&self, card: &Card, now: DateTime<Utc>) -> SchedulePreview {
        let base = Self::base_next(card, now);
        let steps = if card.state == CardState::Relearning {
            &self.relearning_steps
        } else {
            &self.learning_steps
        };
        let step = card.learning_steps as usize;

        let mut again = base.clone();
        again.learning_steps = 0;
        again.scheduled_days = 0.0;
        again.due = now + first_step(steps);

        let mut hard = base.clone();
        hard.scheduled_days = 0.0;
        hard.due = now + hard_delay(steps, step);

        let mut good = base.clone();
        if step + 1 >= steps.len() {
            let interval = self.next_interval(card.stability);
            self.graduate(&mut good, interval, now);
        } else {
            good.learning_steps = card.learning_steps + 1;
            good.scheduled_days = 0.0;
            good.due = now + steps[step + 1];
        }

        let mut easy = base;
        let mut easy_interval = self.next_interval(card.stability);
        if good.state == CardState::Review {
            easy_interval = easy_interval.max(good.scheduled_days + 1.0);
        }
        self.graduate(&mut easy, easy_interval, now);

        SchedulePreview {
            again: self.candidate(card, again, Rating::Again, now),
            hard: self.candidate(card, hard, Rating::Hard, now),
            good: self.candidate(card, good, Rating::Good, now),
            easy: self.candidate(card, easy, Rating::Easy, now),
        }
    }

    fn preview_review(&self, card: &Card, now: DateTime<Utc>) -> SchedulePreview {
        let base = Self::base_next(card, now);
        // Floor guards against corrupt snapshots with zeroed stability
        let stability = card.stability.max(0.01);
        let difficulty = card.difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        let retrievability = self.retrievability(base.elapsed_days, stability);

        let s_again = self.next_forget_stability(difficulty, stability, retrievability);
        let s_hard = self.next_recall_stability(difficulty, stability, retrievability, 2);
        let s_good = self.next_recall_stability(difficulty, stability, retrievability, 3);
        let s_easy = self.next_recall_stability(difficulty, stability, retrievability, 4);

        // Published monotonicity clamps: hard <= good < easy
        let mut hard_interval = self.next_interval(s_hard);
        let mut good_interval = self.next_interval(s_good);
        hard_interval = hard_interval.min(good_interval);
        good_interval = good_interval.max(hard_interval + 1.0);
        let easy_interval = self.next_interval(s_easy).max(good_interval + 1.0);

        let mut again = base.clone();
        again.state = CardState::Relearning;
        again.learning_steps = 0;
        again.lapses = card.lapses + 1;
        again.stability = s_again;
        again.difficulty = self.next_difficulty(difficulty, 1);
        again.scheduled_days = 0.0;
        again.due = now + first_step(&self.relearning_steps);

        let mut hard = base.clone();
        hard.stability = s_hard;
        hard.difficulty = self.next_difficulty(difficulty, 2);
        self.graduate(&mut hard, hard_interval, now);

        let mut good = base.clone();
        good.stability = s_good;
        good.difficulty = self.next_difficulty(difficulty, 3);
        self.graduate(&mut good, good_interval, now);

        let mut easy = base;
        easy.stability = s_easy;
        easy.difficulty = self.next_difficulty(difficulty, 4);
        self.graduate(&mut easy, easy_interval, now);

        SchedulePreview {
            again: self.candidate(card, again, Rating::Again, now),
            hard: self.candidate(card, hard, Rating::Hard, now),
            good: self.candidate(card, good, Rating::Good, now),
            easy: self.candidate(card, easy, Rating::Easy, now),
        }
    }
}

impl ReviewScheduler for FsrsScheduler {
    fn preview(&self, card: &Card, now: DateTime<Utc>) -> SchedulePreview {
        match card.state {
            CardState::New => self.preview_new(card, now),
            CardState::Learning | CardState::Relearning => self.preview_steps(card, now),
            CardState::Review => self.preview_review(card, now),
        }
    }
}

/// Delay for answering Again at any step: back to the first step
fn first_step(steps: &[Duration]) -> Duration {
    steps.first().copied().unwrap_or_else(|| Duration::minutes(1))
}

/// Delay for answering Hard: halfway between the first two steps when at
/// step zero, otherwise a repeat of the current step
fn hard_delay(steps: &[Duration], step: usize) -> Duration {
    if step == 0 {
        match steps.len() {
            0 => Duration::minutes(1),
            1 => steps[0] * 3 / 2,
            _ => (steps[0] + steps[1]) / 2,
        }
    } else {
        steps
            .get(step)
            .copied()
            .unwrap_or_else(|| first_step(steps))
    }
}
