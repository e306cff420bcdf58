//! Picks the scripture reference each generation request is about.

use std::{collections::HashMap, time::SystemTime};

use rand::{
    Rng,
    distr::{Distribution, weighted::WeightedIndex},
    rngs::StdRng,
};
use tracing::{debug, warn};

use crate::dao::models::Testament;

use super::{
    corpus::{Book, books_in},
    ledger::UsageLedger,
};

/// Share of the batch a single book may reach once the batch is big enough.
const BOOK_SHARE_CAP: f64 = 0.25;
/// Batch size from which [`BOOK_SHARE_CAP`] applies.
const BOOK_CAP_MIN_ITEMS: u32 = 4;

/// Running composition of the batch.
#[derive(Debug, Clone, Default)]
pub struct BatchTally {
    old: u32,
    new: u32,
    books: HashMap<&'static str, u32>,
}

impl BatchTally {
    pub fn record(&mut self, book: &'static Book) {
        match book.testament {
            Testament::Old => self.old += 1,
            Testament::New => self.new += 1,
        }
        *self.books.entry(book.name).or_default() += 1;
    }

    pub fn total(&self) -> u32 {
        self.old + self.new
    }

    /// Testament behind the 50/50 target, `None` on a tie.
    pub fn underrepresented(&self) -> Option<Testament> {
        match self.old.cmp(&self.new) {
            std::cmp::Ordering::Less => Some(Testament::Old),
            std::cmp::Ordering::Greater => Some(Testament::New),
            std::cmp::Ordering::Equal => None,
        }
    }

    fn count(&self, book: &str) -> u32 {
        self.books.get(book).copied().unwrap_or(0)
    }

    fn most_used(&self) -> u32 {
        self.books.values().copied().max().unwrap_or(0)
    }

    /// Book to steer away from: the current leader, or any book whose share
    /// would exceed the cap.
    fn is_overused(&self, book: &str) -> bool {
        let count = self.count(book);
        if count == 0 {
            return false;
        }
        let leader = count >= 2 && count == self.most_used();
        let total = self.total();
        let capped = total >= BOOK_CAP_MIN_ITEMS
            && f64::from(count + 1) / f64::from(total + 1) > BOOK_SHARE_CAP;
        leader || capped
    }
}

/// Candidate reference handed to a generation request.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub reference: String,
    pub book: &'static Book,
    /// Set when the ledger rejected every draw and this candidate was
    /// returned anyway.
    pub policy_violation: bool,
}

/// Weighted random reference selection with ledger avoidance.
pub struct ItemSelector {
    rng: StdRng,
    max_retries: u32,
}

impl ItemSelector {
    pub fn new(rng: StdRng, max_retries: u32) -> Self {
        Self { rng, max_retries }
    }

    /// Draw a reference for the next request.
    pub fn select(
        &mut self,
        tally: &BatchTally,
        ledger: &UsageLedger,
        now: SystemTime,
    ) -> Candidate {
        let testament = match tally.underrepresented() {
            Some(testament) => testament,
            None if self.rng.random_bool(0.5) => Testament::Old,
            None => Testament::New,
        };

        for attempt in 0..self.max_retries {
            let (book, reference) = self.draw(testament, tally);
            if ledger.is_available(&reference, now) {
                return Candidate {
                    reference,
                    book,
                    policy_violation: false,
                };
            }
            debug!(reference = %reference, attempt, "candidate rejected by usage ledger");
        }

        let (book, reference) = self.draw(testament, tally);
        warn!(
            policy_violation = true,
            reference = %reference,
            retries = self.max_retries,
            "usage ledger rejected every draw; using emergency candidate"
        );
        Candidate {
            reference,
            book,
            policy_violation: true,
        }
    }

    fn draw(&mut self, testament: Testament, tally: &BatchTally) -> (&'static Book, String) {
        let book = self.pick_book(testament, tally);
        let chapter = self.rng.random_range(1..=book.chapters);
        let verse = self.rng.random_range(1..=book.verse_cap);
        (book, book.reference(chapter, verse))
    }

    fn pick_book(&mut self, testament: Testament, tally: &BatchTally) -> &'static Book {
        let all: Vec<&'static Book> = books_in(testament).collect();
        let mut allowed: Vec<&'static Book> = all
            .iter()
            .copied()
            .filter(|book| !tally.is_overused(book.name))
            .collect();
        if allowed.is_empty() {
            allowed = all;
        }

        match WeightedIndex::new(allowed.iter().map(|book| book.chapters)) {
            Ok(weights) => allowed[weights.sample(&mut self.rng)],
            Err(_) => allowed[self.rng.random_range(0..allowed.len())],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::SeedableRng;

    use super::*;
    use crate::generation::corpus::find_book;

    fn selector(seed: u64) -> ItemSelector {
        ItemSelector::new(StdRng::seed_from_u64(seed), 20)
    }

    fn ledger() -> UsageLedger {
        UsageLedger::empty(Duration::from_secs(3600))
    }

    #[test]
    fn alternates_towards_the_lagging_testament() {
        let mut tally = BatchTally::default();
        tally.record(find_book("Genesis").unwrap());
        let candidate = selector(1).select(&tally, &ledger(), SystemTime::now());
        assert_eq!(candidate.book.testament, Testament::New);
        assert!(!candidate.policy_violation);
    }

    #[test]
    fn keeps_batches_balanced_and_no_book_dominates() {
        let mut selector = selector(7);
        let mut ledger = ledger();
        let mut tally = BatchTally::default();
        let now = SystemTime::now();
        for _ in 0..20 {
            let candidate = selector.select(&tally, &ledger, now);
            ledger.reserve(&candidate.reference);
            tally.record(candidate.book);
        }
        assert_eq!(tally.old, 10);
        assert_eq!(tally.new, 10);
        assert!(tally.most_used() * 4 <= tally.total());
    }

    #[test]
    fn reference_stays_inside_the_book() {
        let mut selector = selector(3);
        let now = SystemTime::now();
        for _ in 0..50 {
            let candidate = selector.select(&BatchTally::default(), &ledger(), now);
            let location = candidate
                .reference
                .strip_prefix(candidate.book.name)
                .unwrap()
                .trim();
            let (chapter, verse) = location.split_once(':').unwrap();
            let chapter: u32 = chapter.parse().unwrap();
            let verse: u32 = verse.parse().unwrap();
            assert!((1..=candidate.book.chapters).contains(&chapter));
            assert!((1..=candidate.book.verse_cap).contains(&verse));
        }
    }

    #[test]
    fn exhausted_ledger_yields_flagged_candidate() {
        let mut selector = ItemSelector::new(StdRng::seed_from_u64(5), 0);
        let candidate = selector.select(&BatchTally::default(), &ledger(), SystemTime::now());
        assert!(candidate.policy_violation);
    }
}
