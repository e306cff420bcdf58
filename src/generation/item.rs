//! Validated question drafts, ready to be numbered and persisted.

use std::time::SystemTime;

use rand::{Rng, seq::SliceRandom};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{Difficulty, QuestionEntity, QuestionSource, Testament, stored_instant};

/// Options shown per question, correct answer included.
const MAX_OPTIONS: usize = 4;
const MIN_OPTIONS: usize = 2;

/// Reasons a draft cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("question text is empty")]
    EmptyText,
    #[error("correct answer is empty")]
    EmptyAnswer,
    #[error("question needs at least two distinct options, got {0}")]
    TooFewOptions(usize),
    #[error("source reference is empty")]
    EmptyReference,
}

/// Fields a draft is built from.
#[derive(Debug, Clone)]
pub struct DraftSource {
    pub text: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    pub reference: String,
    pub book: String,
    pub testament: Testament,
    pub difficulty: Difficulty,
    pub source: QuestionSource,
}

/// A question that passed validation, options deduplicated and shuffled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    text: String,
    correct_answer: String,
    options: Vec<String>,
    reference: String,
    book: String,
    testament: Testament,
    difficulty: Difficulty,
    source: QuestionSource,
}

impl QuestionDraft {
    pub fn new(source: DraftSource, rng: &mut impl Rng) -> Result<Self, DraftError> {
        let text = source.text.trim().to_owned();
        let correct_answer = source.correct_answer.trim().to_owned();
        let reference = source.reference.trim().to_owned();
        if text.is_empty() {
            return Err(DraftError::EmptyText);
        }
        if correct_answer.is_empty() {
            return Err(DraftError::EmptyAnswer);
        }
        if reference.is_empty() {
            return Err(DraftError::EmptyReference);
        }

        let mut options = vec![correct_answer.clone()];
        for answer in source.incorrect_answers {
            if options.len() == MAX_OPTIONS {
                break;
            }
            let answer = answer.trim();
            if !answer.is_empty() && !options.iter().any(|o| o.eq_ignore_ascii_case(answer)) {
                options.push(answer.to_owned());
            }
        }
        if options.len() < MIN_OPTIONS {
            return Err(DraftError::TooFewOptions(options.len()));
        }
        options.shuffle(rng);

        Ok(Self {
            text,
            correct_answer,
            options,
            reference,
            book: source.book,
            testament: source.testament,
            difficulty: source.difficulty,
            source: source.source,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn book(&self) -> &str {
        &self.book
    }

    pub fn testament(&self) -> Testament {
        self.testament
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Persistable row at position `number`.
    pub fn into_entity(self, game_id: Uuid, number: u32, now: SystemTime) -> QuestionEntity {
        QuestionEntity {
            id: Uuid::new_v4(),
            game_id,
            question_number: number,
            question_text: self.text,
            correct_answer: self.correct_answer,
            options: self.options,
            source_reference: self.reference,
            book: self.book,
            testament: self.testament,
            difficulty: self.difficulty,
            points: self.difficulty.points(),
            source: self.source,
            created_at: stored_instant(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn source(incorrect: &[&str]) -> DraftSource {
        DraftSource {
            text: " Who built the ark? ".into(),
            correct_answer: "Noah".into(),
            incorrect_answers: incorrect.iter().map(|s| s.to_string()).collect(),
            reference: "Genesis 6:14".into(),
            book: "Genesis".into(),
            testament: Testament::Old,
            difficulty: Difficulty::Hard,
            source: QuestionSource::Generated,
        }
    }

    #[test]
    fn options_are_deduplicated_and_capped() {
        let mut rng = StdRng::seed_from_u64(11);
        let draft = QuestionDraft::new(
            source(&["NOAH", "Moses", "moses", "Abraham", "David", "Enoch"]),
            &mut rng,
        )
        .unwrap();
        let mut options = draft.options().to_vec();
        options.sort();
        assert_eq!(options, vec!["Abraham", "David", "Moses", "Noah"]);
        assert_eq!(draft.text(), "Who built the ark?");
    }

    #[test]
    fn single_option_is_refused() {
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(
            QuestionDraft::new(source(&["noah", " "]), &mut rng),
            Err(DraftError::TooFewOptions(1))
        );
    }

    #[test]
    fn entity_carries_points_for_difficulty() {
        let mut rng = StdRng::seed_from_u64(2);
        let draft = QuestionDraft::new(source(&["Moses"]), &mut rng).unwrap();
        let entity = draft.into_entity(Uuid::new_v4(), 3, SystemTime::now());
        assert_eq!(entity.points, 30);
        assert_eq!(entity.question_number, 3);
        assert!(entity.options.contains(&entity.correct_answer));
    }
}
