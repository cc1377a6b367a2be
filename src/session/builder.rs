//! Study queue assembly
//!
//! Four pools feed a session queue:
//! - learning: learning/relearning cards whose due time has passed
//! - unlocked secondary senses: new cards of lemmas that already have a
//!   studied sense; they ride along with the learning pool
//! - review: due review cards, oldest due first, capped by the review limit
//! - new: new cards of never-studied lemmas, capped by the new limit; only
//!   the lowest sense of each lemma qualifies unless every sense is admitted
//!
//! Each pool is shuffled on its own, then the pools are merged according to
//! the priority mode. Cram sessions bypass the pools and deal one shuffled
//! card per lemma regardless of schedule.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use super::models::{PriorityMode, SessionOptions};
use crate::cards::{Card, CardKey, CardState, CardStore};

/// Assemble the queue for a session. The daily budgets apply when the
/// options carry no explicit limits.
pub fn build_queue(
    store: &CardStore,
    opts: &SessionOptions,
    daily_new_budget: usize,
    daily_review_budget: usize,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Vec<CardKey> {
    if opts.cram {
        return build_cram_queue(store, opts, rng);
    }

    let excluded: HashSet<&str> = opts.excluded_lemmas.iter().map(String::as_str).collect();
    let pool_order: Option<HashMap<&str, usize>> = opts
        .pool
        .as_ref()
        .map(|lemmas| lemmas.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect());

    let admitted = |card: &Card| -> bool {
        if excluded.contains(card.lemma.as_str()) {
            return false;
        }
        match &pool_order {
            Some(order) => order.contains_key(card.lemma.as_str()),
            None => true,
        }
    };

    let new_limit = opts.new_limit.unwrap_or(daily_new_budget);
    // An explicit pool is a deliberate selection, so reviews in it are not
    // capped unless the caller says so
    let review_limit = match (opts.review_limit, &opts.pool) {
        (Some(limit), _) => limit,
        (None, Some(_)) => usize::MAX,
        (None, None) => daily_review_budget,
    };

    let mut started: HashSet<&str> = HashSet::new();
    for card in store.all_cards() {
        if card.state != CardState::New {
            started.insert(card.lemma.as_str());
        }
    }

    let mut learning: Vec<&Card> = Vec::new();
    let mut review: Vec<&Card> = Vec::new();
    let mut fresh: Vec<&Card> = Vec::new();

    for card in store.all_cards() {
        if !admitted(card) {
            continue;
        }
        match card.state {
            CardState::Learning | CardState::Relearning => {
                if card.is_due(now) {
                    learning.push(card);
                }
            }
            CardState::Review => {
                if card.is_due(now) {
                    review.push(card);
                }
            }
            CardState::New => {
                if started.contains(card.lemma.as_str()) {
                    // Unlocked secondary sense: studied right away, outside
                    // the new-card limit
                    learning.push(card);
                } else {
                    fresh.push(card);
                }
            }
        }
    }

    review.sort_by_key(|c| c.due);
    review.truncate(review_limit);

    // Unstarted lemmas enter through their lowest sense only
    fresh.sort_by(|a, b| a.lemma.cmp(&b.lemma).then(a.sense_id.cmp(&b.sense_id)));
    if !opts.all_senses {
        let mut seen: HashSet<&str> = HashSet::new();
        fresh.retain(|c| seen.insert(c.lemma.as_str()));
    }
    if let Some(order) = &pool_order {
        fresh.sort_by_key(|c| (order.get(c.lemma.as_str()).copied().unwrap_or(usize::MAX), c.sense_id));
    }
    fresh.truncate(new_limit);

    let mut learning: Vec<CardKey> = learning.iter().map(|c| c.key()).collect();
    let mut review: Vec<CardKey> = review.iter().map(|c| c.key()).collect();
    let mut fresh: Vec<CardKey> = fresh.iter().map(|c| c.key()).collect();
    learning.shuffle(rng);
    review.shuffle(rng);
    fresh.shuffle(rng);

    // Learning cards lead the review stream; their due times are minutes away
    let mut stream = learning;
    stream.append(&mut review);

    match opts.priority {
        PriorityMode::NewFirst => {
            fresh.extend(stream);
            fresh
        }
        PriorityMode::ReviewFirst => {
            stream.extend(fresh);
            stream
        }
        PriorityMode::Mixed => interleave(stream, fresh),
    }
}

/// Spread new cards among reviews at a fixed ratio: emit `ratio` reviews,
/// then one new card, until both run dry.
fn interleave(reviews: Vec<CardKey>, fresh: Vec<CardKey>) -> Vec<CardKey> {
    if fresh.is_empty() {
        return reviews;
    }
    if reviews.is_empty() {
        return fresh;
    }

    let ratio = (reviews.len() as f64 / fresh.len() as f64).round().max(1.0) as usize;
    let mut out = Vec::with_capacity(reviews.len() + fresh.len());
    let mut reviews = reviews.into_iter();
    let mut fresh = fresh.into_iter();

    loop {
        let mut emitted = false;
        for _ in 0..ratio {
            match reviews.next() {
                Some(key) => {
                    out.push(key);
                    emitted = true;
                }
                None => break,
            }
        }
        if let Some(key) = fresh.next() {
            out.push(key);
            emitted = true;
        }
        if !emitted {
            break;
        }
    }
    out
}

/// Cram queue: one card per lemma (its lowest sense), shuffled. Schedules,
/// limits and unlock gating are ignored; exclusions and the pool still apply.
fn build_cram_queue(store: &CardStore, opts: &SessionOptions, rng: &mut impl Rng) -> Vec<CardKey> {
    let excluded: HashSet<&str> = opts.excluded_lemmas.iter().map(String::as_str).collect();
    let pool: Option<HashSet<&str>> = opts
        .pool
        .as_ref()
        .map(|lemmas| lemmas.iter().map(String::as_str).collect());

    let mut best: HashMap<&str, &Card> = HashMap::new();
    for card in store.all_cards() {
        if excluded.contains(card.lemma.as_str()) {
            continue;
        }
        if let Some(pool) = &pool {
            if !pool.contains(card.lemma.as_str()) {
                continue;
            }
        }
        let entry = best.entry(card.lemma.as_str()).or_insert(card);
        if card.sense_id < entry.sense_id {
            *entry = card;
        }
    }

    let mut queue: Vec<CardKey> = best.values().map(|c| c.key()).collect();
    queue.shuffle(rng);
    queue
}
