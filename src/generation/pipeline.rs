//! Provision the question set of a game.
//!
//! Requests go out in waves; each wave fans out to the generator, joins, and
//! then every result runs through validation and deduplication in order.
//! Accepted questions are flushed to storage in sub-batches. When the attempt
//! budget is spent the remainder comes from the fallback pool.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::future::join_all;
use rand::{SeedableRng, rngs::StdRng};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, QuestionEntity, QuestionSource},
    storage::StorageError,
};

use super::{
    GenerateRequest, QuestionGenerator,
    corpus::{book_of_reference, find_book},
    dedup::{DedupCandidate, DedupEngine},
    item::{DraftSource, QuestionDraft},
    ledger::UsageLedger,
    pool::draw_order,
    retry::{RetryPolicy, retry_with_backoff},
    selector::{BatchTally, Candidate, ItemSelector},
};

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parallel requests per wave.
    pub wave_size: usize,
    /// Accepted questions per storage write.
    pub flush_size: usize,
    /// Generation requests allowed per run before falling back to the pool.
    pub max_attempts: u32,
    /// Ledger-rejected draws before the selector gives up.
    pub selector_retries: u32,
    pub usage_retention: Duration,
    pub similarity_threshold: f64,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Fixed seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            wave_size: 8,
            flush_size: 5,
            max_attempts: 40,
            selector_retries: 20,
            usage_retention: Duration::from_secs(30 * 24 * 60 * 60),
            similarity_threshold: 0.6,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            rng_seed: None,
        }
    }
}

/// The game could not be provisioned.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("only {available} of {required} questions could be provisioned")]
    NoItemsAvailable { required: u32, available: u32 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Questions already stored before the run.
    pub resumed: u32,
    pub generated: u32,
    pub from_pool: u32,
    pub requests: u32,
    pub policy_violations: u32,
}

/// Produces questions for games, generator first, pool second.
#[derive(Clone)]
pub struct GenerationPipeline {
    store: Arc<dyn GameStore>,
    generator: Option<Arc<dyn QuestionGenerator>>,
    config: PipelineConfig,
}

/// Mutable state of one run.
struct Run {
    game: GameEntity,
    now: SystemTime,
    rng: StdRng,
    ledger: UsageLedger,
    dedup: DedupEngine,
    tally: BatchTally,
    pending: Vec<QuestionEntity>,
    next_number: u32,
    accepted: u32,
    report: ProvisionReport,
}

impl Run {
    fn remaining(&self) -> u32 {
        self.game.questions_per_game.saturating_sub(self.accepted)
    }

    fn push(&mut self, draft: QuestionDraft) {
        let entity = draft.into_entity(self.game.id, self.next_number, self.now);
        self.next_number += 1;
        self.accepted += 1;
        self.pending.push(entity);
    }
}

impl GenerationPipeline {
    pub fn new(
        store: Arc<dyn GameStore>,
        generator: Option<Arc<dyn QuestionGenerator>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    /// Make sure `game` has `questions_per_game` stored questions.
    ///
    /// Questions persisted by an earlier attempt are kept and counted. On
    /// failure whatever was accepted stays stored so a retry resumes from it.
    pub async fn provision(&self, game: &GameEntity) -> Result<ProvisionReport, PipelineError> {
        let now = SystemTime::now();
        let existing = self.store.list_questions(game.id).await?;
        let required = game.questions_per_game;
        let existing_count = u32::try_from(existing.len()).unwrap_or(u32::MAX);
        if existing_count >= required {
            debug!(game_id = %game.id, existing = existing_count, "questions already provisioned");
            return Ok(ProvisionReport {
                resumed: existing_count,
                ..ProvisionReport::default()
            });
        }

        let ledger =
            match UsageLedger::load(self.store.as_ref(), self.config.usage_retention, now).await {
                Ok(ledger) => ledger,
                Err(err) => {
                    warn!(game_id = %game.id, error = %err, "usage ledger unavailable; starting empty");
                    UsageLedger::empty(self.config.usage_retention)
                }
            };
        let rng = match self.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut run = Run {
            game: game.clone(),
            now,
            rng,
            ledger,
            dedup: DedupEngine::new(self.config.similarity_threshold),
            tally: BatchTally::default(),
            pending: Vec::new(),
            next_number: existing
                .iter()
                .map(|question| question.question_number)
                .max()
                .unwrap_or(0)
                + 1,
            accepted: existing_count,
            report: ProvisionReport {
                resumed: existing_count,
                ..ProvisionReport::default()
            },
        };
        for question in &existing {
            let candidate = DedupCandidate {
                text: &question.question_text,
                reference: &question.source_reference,
                book: &question.book,
                testament: question.testament,
            };
            run.dedup.accept(&candidate);
            run.ledger.note_existing(&question.source_reference);
            if let Some(book) = find_book(&question.book) {
                run.tally.record(book);
            }
        }

        info!(
            game_id = %game.id,
            required,
            resumed = existing_count,
            generator = self.generator.as_ref().map(|g| g.name()).unwrap_or("none"),
            "provisioning questions"
        );

        if let Some(generator) = &self.generator {
            self.generate(&mut run, Arc::clone(generator)).await;
        }
        if run.remaining() > 0 {
            self.fill_from_pool(&mut run).await?;
        }

        let pending = std::mem::take(&mut run.pending);
        if !pending.is_empty() {
            self.store.insert_questions(game.id, pending).await?;
        }

        let stored = u32::try_from(self.store.list_questions(game.id).await?.len())
            .unwrap_or(u32::MAX);
        if stored < required {
            error!(
                game_id = %game.id,
                required,
                stored,
                requests = run.report.requests,
                "question provisioning exhausted generator and pool"
            );
            return Err(PipelineError::NoItemsAvailable {
                required,
                available: stored,
            });
        }

        info!(
            game_id = %game.id,
            generated = run.report.generated,
            from_pool = run.report.from_pool,
            requests = run.report.requests,
            policy_violations = run.report.policy_violations,
            "questions provisioned"
        );
        Ok(run.report)
    }

    async fn generate(&self, run: &mut Run, generator: Arc<dyn QuestionGenerator>) {
        let mut wave_number = 0u32;
        while run.remaining() > 0 && run.report.requests < self.config.max_attempts {
            wave_number += 1;
            let budget = self.config.max_attempts - run.report.requests;
            let wave_size = self
                .config
                .wave_size
                .min(usize::try_from(run.remaining()).unwrap_or(usize::MAX))
                .min(usize::try_from(budget).unwrap_or(usize::MAX));

            let mut selector =
                ItemSelector::new(StdRng::from_rng(&mut run.rng), self.config.selector_retries);
            run.ledger.begin_batch();
            let mut wave_tally = run.tally.clone();
            let candidates: Vec<Candidate> = (0..wave_size)
                .map(|_| {
                    let candidate = selector.select(&wave_tally, &run.ledger, run.now);
                    run.ledger.reserve(&candidate.reference);
                    wave_tally.record(candidate.book);
                    candidate
                })
                .collect();
            run.report.requests += u32::try_from(candidates.len()).unwrap_or(u32::MAX);
            run.report.policy_violations += u32::try_from(
                candidates.iter().filter(|c| c.policy_violation).count(),
            )
            .unwrap_or(0);

            debug!(game_id = %run.game.id, wave = wave_number, size = candidates.len(), "wave started");
            let requests = candidates.iter().map(|candidate| {
                let generator = Arc::clone(&generator);
                let policy = self.config.retry.clone();
                let request = GenerateRequest {
                    reference: candidate.reference.clone(),
                    testament: candidate.book.testament,
                    difficulty: run.game.difficulty,
                    timeout: self.config.request_timeout,
                };
                async move {
                    retry_with_backoff(&policy, |_| generator.generate(request.clone())).await
                }
            });
            let results = join_all(requests).await;

            let (mut accepted, mut rejected, mut failed) = (0u32, 0u32, 0u32);
            for (candidate, result) in candidates.into_iter().zip(results) {
                if run.remaining() == 0 {
                    break;
                }
                let generated = match result {
                    Ok(generated) => generated,
                    Err(err) => {
                        failed += 1;
                        error!(
                            game_id = %run.game.id,
                            reference = %candidate.reference,
                            attempts = err.attempts,
                            error = %err.last,
                            "generation request exhausted its retries"
                        );
                        continue;
                    }
                };
                let draft = QuestionDraft::new(
                    DraftSource {
                        text: generated.question,
                        correct_answer: generated.correct_answer,
                        incorrect_answers: generated.incorrect_answers,
                        reference: candidate.reference.clone(),
                        book: candidate.book.name.to_owned(),
                        testament: candidate.book.testament,
                        difficulty: run.game.difficulty,
                        source: QuestionSource::Generated,
                    },
                    &mut run.rng,
                );
                let draft = match draft {
                    Ok(draft) => draft,
                    Err(err) => {
                        rejected += 1;
                        debug!(reference = %candidate.reference, error = %err, "generated question invalid");
                        continue;
                    }
                };
                if self.admit(run, draft, false).await {
                    accepted += 1;
                    run.tally.record(candidate.book);
                    run.report.generated += 1;
                    if run.pending.len() >= self.config.flush_size {
                        self.flush(run).await;
                    }
                } else {
                    rejected += 1;
                }
            }

            info!(
                game_id = %run.game.id,
                wave = wave_number,
                accepted,
                rejected,
                failed,
                remaining = run.remaining(),
                "wave finished"
            );
        }

        if run.remaining() > 0 {
            warn!(
                game_id = %run.game.id,
                requests = run.report.requests,
                remaining = run.remaining(),
                "generation budget spent; falling back to pool"
            );
        }
    }

    async fn fill_from_pool(&self, run: &mut Run) -> Result<(), PipelineError> {
        let pool = self.store.list_pool(run.game.difficulty).await?;
        let available = pool.len();
        for question in draw_order(pool, &mut run.rng) {
            if run.remaining() == 0 {
                break;
            }
            let testament = book_of_reference(&question.source_reference)
                .map(|book| book.testament)
                .unwrap_or(question.testament);
            let draft = QuestionDraft::new(
                DraftSource {
                    text: question.question_text,
                    correct_answer: question.correct_answer,
                    incorrect_answers: question.incorrect_answers,
                    reference: question.source_reference,
                    book: question.book,
                    testament,
                    difficulty: question.difficulty,
                    source: QuestionSource::Pool,
                },
                &mut run.rng,
            );
            match draft {
                Ok(draft) => {
                    if self.admit(run, draft, true).await {
                        run.report.from_pool += 1;
                        if run.pending.len() >= self.config.flush_size {
                            self.flush(run).await;
                        }
                    }
                }
                Err(err) => warn!(error = %err, "pool question invalid"),
            }
        }
        debug!(
            game_id = %run.game.id,
            available,
            from_pool = run.report.from_pool,
            "pool fallback finished"
        );
        Ok(())
    }

    /// Dedup, ledger update and queueing of one draft. Returns whether it was kept.
    async fn admit(&self, run: &mut Run, draft: QuestionDraft, relaxed: bool) -> bool {
        let candidate = DedupCandidate {
            text: draft.text(),
            reference: draft.reference(),
            book: draft.book(),
            testament: draft.testament(),
        };
        let verdict = if relaxed {
            run.dedup.check_relaxed(&candidate)
        } else {
            run.dedup.check(&candidate)
        };
        if let Err(reason) = verdict {
            debug!(
                game_id = %run.game.id,
                reference = %candidate.reference,
                reason = %reason,
                "question rejected as duplicate"
            );
            return false;
        }
        run.dedup.accept(&candidate);

        let reference = draft.reference().to_owned();
        if let Err(err) = run
            .ledger
            .record_acceptance(self.store.as_ref(), &reference, run.now)
            .await
        {
            warn!(reference = %reference, error = %err, "failed to persist reference usage");
        }
        run.push(draft);
        true
    }

    /// Write pending questions; on failure they stay queued for the next boundary.
    async fn flush(&self, run: &mut Run) {
        let batch = run.pending.clone();
        match self.store.insert_questions(run.game.id, batch).await {
            Ok(written) => {
                debug!(game_id = %run.game.id, written, "sub-batch flushed");
                run.pending.clear();
            }
            Err(err) => {
                warn!(
                    game_id = %run.game.id,
                    pending = run.pending.len(),
                    error = %err,
                    "sub-batch flush failed; retrying at next boundary"
                );
            }
        }
    }
}
