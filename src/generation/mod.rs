//! Question provisioning: provider abstraction, selection, deduplication and
//! the pipeline that ties them together.

pub mod corpus;
pub mod dedup;
pub mod item;
pub mod ledger;
#[cfg(feature = "openai-generator")]
pub mod openai;
pub mod parse;
pub mod pipeline;
pub mod pool;
pub mod retry;
pub mod selector;

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::dao::models::{Difficulty, Testament};

/// Result type for generation calls.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Failures of a single generation request.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The provider answered 429.
    #[error("rate limited by the generation service")]
    RateLimited,
    /// The provider answered with a 5xx status.
    #[error("generation service error (status {0})")]
    Server(u16),
    /// Transport failure or unexpected non-success status.
    #[error("generation request failed: {0}")]
    Api(String),
    #[error("generation request timed out after {0:?}")]
    Timeout(Duration),
    /// The response could not be turned into a usable question.
    #[error("malformed generation response: {0}")]
    Malformed(String),
    #[error("invalid generator configuration: {0}")]
    Config(String),
}

impl GenerationError {
    /// Configuration problems will not fix themselves on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationError::Config(_))
    }
}

/// One prompt sent to the provider.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Scripture citation the question must be about.
    pub reference: String,
    pub testament: Testament,
    pub difficulty: Difficulty,
    pub timeout: Duration,
}

impl GenerateRequest {
    /// Instruction text for chat-style providers.
    pub fn prompt(&self) -> String {
        let audience = match self.difficulty {
            Difficulty::Easy => "a well-known fact suitable for beginners",
            Difficulty::Medium => "a detail familiar to regular readers",
            Difficulty::Hard => "a specific detail that requires careful reading",
            Difficulty::Expert => "an obscure detail only a dedicated student would know",
        };
        format!(
            "Write one multiple-choice Bible trivia question based on {reference} \
             ({testament} Testament). Ask about {audience}. \
             Respond with JSON only, shaped as \
             {{\"question\": string, \"correctAnswer\": string, \
             \"incorrectAnswers\": [string, string, string], \"reference\": \"{reference}\"}}. \
             The incorrect answers must be plausible, distinct and clearly wrong.",
            reference = self.reference,
            testament = match self.testament {
                Testament::Old => "Old",
                Testament::New => "New",
            },
        )
    }
}

/// Validated provider output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuestion {
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

/// External text-generation service producing one question per request.
pub trait QuestionGenerator: Send + Sync {
    /// Generate a question for the given prompt.
    fn generate(
        &self,
        request: GenerateRequest,
    ) -> BoxFuture<'static, GenerationResult<GeneratedQuestion>>;

    /// Provider name used in logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted generator for pipeline and service tests.

    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    /// Pops scripted responses in order; when the script runs dry it produces
    /// a distinct question per reference.
    #[derive(Clone, Default)]
    pub struct ScriptedGenerator {
        script: Arc<Mutex<Vec<GenerationResult<GeneratedQuestion>>>>,
        calls: Arc<AtomicUsize>,
        always_fail: bool,
    }

    impl ScriptedGenerator {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every call fails with a server error.
        pub fn failing() -> Self {
            Self {
                always_fail: true,
                ..Self::default()
            }
        }

        /// Queue responses returned before falling back to generated ones.
        pub fn with_script(script: Vec<GenerationResult<GeneratedQuestion>>) -> Self {
            let mut script = script;
            script.reverse();
            Self {
                script: Arc::new(Mutex::new(script)),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl QuestionGenerator for ScriptedGenerator {
        fn generate(
            &self,
            request: GenerateRequest,
        ) -> BoxFuture<'static, GenerationResult<GeneratedQuestion>> {
            let generator = self.clone();
            Box::pin(async move {
                let call = generator.calls.fetch_add(1, Ordering::SeqCst);
                if generator.always_fail {
                    return Err(GenerationError::Server(503));
                }
                let scripted = generator.script.lock().unwrap().pop();
                scripted.unwrap_or_else(|| {
                    // Vocabulary unique to each call keeps the text dissimilar.
                    Ok(GeneratedQuestion {
                        question: format!("tok{call}a tok{call}b tok{call}c tok{call}d?"),
                        correct_answer: format!("The account of {}", request.reference),
                        incorrect_answers: vec![
                            "A census of the tribes".into(),
                            "A letter to a church".into(),
                            "A royal decree".into(),
                        ],
                    })
                })
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
