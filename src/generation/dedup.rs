//! Duplicate rejection applied to every candidate question of a game.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt,
};

use crate::dao::models::Testament;

/// Similarity bonus when both questions come from the same testament.
const SAME_TESTAMENT_BONUS: f64 = 0.3;
/// Similarity bonus when both questions ask the same kind of thing.
const SAME_TYPE_BONUS: f64 = 0.2;
/// Accepted items needed before the book-overuse layer applies.
const OVERUSE_MIN_ACCEPTED: usize = 3;
const OVERUSE_SHARE: f64 = 0.25;

/// Words too common to say anything about what a question is about.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "does", "do", "for", "from", "had",
    "has", "have", "he", "her", "his", "in", "into", "is", "it", "its", "of", "on", "or", "she",
    "that", "the", "their", "them", "they", "this", "to", "was", "were", "with",
];

/// Question words, scored through the type bonus rather than as content.
const INTERROGATIVES: &[&str] = &[
    "who", "whom", "whose", "what", "where", "when", "why", "how", "which",
];

/// Interrogative family of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionType {
    Who,
    What,
    Where,
    When,
    Why,
    How,
    Which,
    Other,
}

impl QuestionType {
    /// First interrogative keyword found in the text decides the type.
    pub fn infer(text: &str) -> Self {
        normalize(text)
            .split_whitespace()
            .find_map(|word| match word {
                "who" | "whom" | "whose" => Some(QuestionType::Who),
                "what" => Some(QuestionType::What),
                "where" => Some(QuestionType::Where),
                "when" => Some(QuestionType::When),
                "why" => Some(QuestionType::Why),
                "how" => Some(QuestionType::How),
                "which" => Some(QuestionType::Which),
                _ => None,
            })
            .unwrap_or(QuestionType::Other)
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn content_words(normalized: &str) -> BTreeSet<String> {
    normalized
        .split_whitespace()
        .filter(|word| !STOPWORDS.contains(word) && !INTERROGATIVES.contains(word))
        .map(str::to_owned)
        .collect()
}

/// Polynomial rolling hash over the sorted unique word list, so reordered
/// rewordings land in the same bucket.
pub fn bucket_hash(normalized: &str) -> u64 {
    const BASE: u64 = 131;
    let words: BTreeSet<&str> = normalized.split_whitespace().collect();
    let mut hash: u64 = 0;
    for word in words {
        for byte in word.bytes().chain(std::iter::once(b' ')) {
            hash = hash.wrapping_mul(BASE).wrapping_add(u64::from(byte));
        }
    }
    hash
}

/// Jaccard index of two word sets.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Question under consideration.
#[derive(Debug, Clone, Copy)]
pub struct DedupCandidate<'a> {
    pub text: &'a str,
    pub reference: &'a str,
    pub book: &'a str,
    pub testament: Testament,
}

/// Why a candidate was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    ExactText,
    HashBucket,
    ReferenceReused,
    Similar { score: f64 },
    BookOverused { book: String },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::ExactText => f.write_str("identical question text"),
            Rejection::HashBucket => f.write_str("same word bucket as an accepted question"),
            Rejection::ReferenceReused => f.write_str("reference already used in this game"),
            Rejection::Similar { score } => write!(f, "too similar (score {score:.2})"),
            Rejection::BookOverused { book } => write!(f, "{book} over its share"),
        }
    }
}

#[derive(Debug, Clone)]
struct Accepted {
    words: BTreeSet<String>,
    testament: Testament,
    kind: QuestionType,
}

/// Per-game duplicate filter.
#[derive(Debug, Clone)]
pub struct DedupEngine {
    threshold: f64,
    texts: HashSet<String>,
    buckets: HashMap<u64, u32>,
    references: HashSet<String>,
    books: HashMap<String, usize>,
    accepted: Vec<Accepted>,
}

impl DedupEngine {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            texts: HashSet::new(),
            buckets: HashMap::new(),
            references: HashSet::new(),
            books: HashMap::new(),
            accepted: Vec::new(),
        }
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    /// Every layer.
    pub fn check(&self, candidate: &DedupCandidate<'_>) -> Result<(), Rejection> {
        let normalized = normalize(candidate.text);
        self.check_exact(&normalized, candidate)?;

        if self
            .buckets
            .get(&bucket_hash(&normalized))
            .is_some_and(|seen| *seen > 0)
        {
            return Err(Rejection::HashBucket);
        }

        let words = content_words(&normalized);
        let kind = QuestionType::infer(candidate.text);
        for accepted in &self.accepted {
            let mut score = jaccard(&words, &accepted.words);
            if accepted.testament == candidate.testament {
                score += SAME_TESTAMENT_BONUS;
            }
            if accepted.kind == kind {
                score += SAME_TYPE_BONUS;
            }
            if score >= self.threshold {
                return Err(Rejection::Similar { score });
            }
        }

        let total = self.accepted.len();
        if total >= OVERUSE_MIN_ACCEPTED {
            let used = self.books.get(candidate.book).copied().unwrap_or(0);
            if used as f64 / total as f64 > OVERUSE_SHARE {
                return Err(Rejection::BookOverused {
                    book: candidate.book.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Exact text and reference layers only, used for pool questions.
    pub fn check_relaxed(&self, candidate: &DedupCandidate<'_>) -> Result<(), Rejection> {
        self.check_exact(&normalize(candidate.text), candidate)
    }

    fn check_exact(&self, normalized: &str, candidate: &DedupCandidate<'_>) -> Result<(), Rejection> {
        if self.texts.contains(normalized) {
            return Err(Rejection::ExactText);
        }
        if self.references.contains(candidate.reference) {
            return Err(Rejection::ReferenceReused);
        }
        Ok(())
    }

    /// Register an accepted question.
    pub fn accept(&mut self, candidate: &DedupCandidate<'_>) {
        let normalized = normalize(candidate.text);
        *self.buckets.entry(bucket_hash(&normalized)).or_default() += 1;
        self.references.insert(candidate.reference.to_owned());
        *self.books.entry(candidate.book.to_owned()).or_default() += 1;
        self.accepted.push(Accepted {
            words: content_words(&normalized),
            testament: candidate.testament,
            kind: QuestionType::infer(candidate.text),
        });
        self.texts.insert(normalized);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate<'a>(text: &'a str, reference: &'a str, book: &'a str) -> DedupCandidate<'a> {
        DedupCandidate {
            text,
            reference,
            book,
            testament: Testament::Old,
        }
    }

    fn engine_with(accepted: &[DedupCandidate<'_>]) -> DedupEngine {
        let mut engine = DedupEngine::new(0.6);
        for item in accepted {
            engine.accept(item);
        }
        engine
    }

    #[test]
    fn identical_text_after_normalization_is_rejected() {
        let engine = engine_with(&[candidate("Who built the ark?", "Genesis 6:14", "Genesis")]);
        assert_eq!(
            engine.check(&candidate("who BUILT the ark", "Genesis 6:15", "Genesis")),
            Err(Rejection::ExactText)
        );
    }

    #[test]
    fn reordered_words_share_a_bucket() {
        assert_eq!(
            bucket_hash(&normalize("Moses parted the sea")),
            bucket_hash(&normalize("the sea Moses parted"))
        );
        let engine = engine_with(&[candidate("Moses parted the sea", "Exodus 14:21", "Exodus")]);
        assert_eq!(
            engine.check(&candidate("The sea, Moses parted", "Exodus 14:22", "Exodus")),
            Err(Rejection::HashBucket)
        );
    }

    #[test]
    fn reference_reuse_is_rejected_even_when_relaxed() {
        let engine = engine_with(&[candidate("Who built the ark?", "Genesis 6:14", "Genesis")]);
        let reused = candidate("What animals entered the ark?", "Genesis 6:14", "Genesis");
        assert_eq!(engine.check_relaxed(&reused), Err(Rejection::ReferenceReused));
    }

    #[test]
    fn similarity_combines_words_testament_and_type() {
        let engine = engine_with(&[candidate(
            "Who led the Israelites across the Jordan river?",
            "Joshua 3:17",
            "Joshua",
        )]);
        let similar = candidate(
            "Who led Israelites over Jordan river into Canaan?",
            "Joshua 4:1",
            "Joshua",
        );
        assert!(matches!(
            engine.check(&similar),
            Err(Rejection::Similar { .. })
        ));

        let different = DedupCandidate {
            text: "Where was Paul shipwrecked?",
            reference: "Acts 27:41",
            book: "Acts",
            testament: Testament::New,
        };
        assert_eq!(engine.check(&different), Ok(()));
    }

    #[test]
    fn unrelated_questions_of_the_same_kind_and_testament_pass() {
        let engine = engine_with(&[candidate("Who built the ark?", "Genesis 6:14", "Genesis")]);
        let unrelated = candidate("Who killed Goliath?", "1 Samuel 17:50", "1 Samuel");
        assert_eq!(engine.check(&unrelated), Ok(()));

        let one_shared_word = candidate("Who entered the ark last?", "Genesis 7:13", "Genesis");
        assert!(matches!(
            engine.check(&one_shared_word),
            Err(Rejection::Similar { .. })
        ));
    }

    #[test]
    fn book_share_is_capped_after_three_items() {
        let engine = engine_with(&[
            DedupCandidate {
                text: "Where was Jesus born?",
                reference: "Matthew 2:1",
                book: "Matthew",
                testament: Testament::New,
            },
            candidate("Who interpreted dreams for Pharaoh?", "Genesis 41:25", "Genesis"),
            DedupCandidate {
                text: "How many loaves fed the crowd?",
                reference: "Mark 6:41",
                book: "Mark",
                testament: Testament::New,
            },
        ]);
        let overused = DedupCandidate {
            text: "Why did Cain envy Abel?",
            reference: "Genesis 4:5",
            book: "Genesis",
            testament: Testament::New,
        };
        assert_eq!(
            engine.check(&overused),
            Err(Rejection::BookOverused {
                book: "Genesis".into()
            })
        );
    }

    #[test]
    fn question_type_follows_first_keyword() {
        assert_eq!(QuestionType::infer("Who was Ruth?"), QuestionType::Who);
        assert_eq!(
            QuestionType::infer("In which city was Paul born?"),
            QuestionType::Which
        );
        assert_eq!(QuestionType::infer("Name the first king"), QuestionType::Other);
    }
}
