//! Per-document question bank: build each pool once, then sample tests from it.
//!
//! A [`QuestionBank`] owns up to three pools (one per [`QuestionKind`]). A pool is
//! filled by exactly one successful call to the generation service and never
//! regenerated. Each pool keeps a working set of positions not yet served; draws
//! without repeats consume it and refill it from the full pool once it is empty.
//!
//! No-repeat draws apply reset-then-clamp:
//!   1. empty working set -> refill, signal `SetExhaustedReset`
//!   2. more than the whole pool requested -> clamp to the target size
//!   3. more than the working set requested -> clamp to the working set
//!
//! Steps 2 and 3 signal `PartialResult`.

use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, seq::index, SeedableRng};
use tracing::{debug, info, instrument, warn};

use crate::domain::{DrawSignal, QuestionKind, SourceDocument, TestDraw, TestKind};
use crate::error::{BankError, Result};
use crate::generator::{ExplanationRequest, GenerationRequest, QuestionGenerator};
use crate::grade::{ExplainedAnswer, SubmittedAnswer};
use crate::util::trunc_for_log;

/// The full generated set for one kind plus its unseen working set.
#[derive(Clone, Debug)]
pub struct QuestionPool {
    kind: QuestionKind,
    questions: Vec<String>,
    target_size: usize,
    custom_prompt: Option<String>,
    /// Positions into `questions` not served since the last reset.
    unseen: Vec<usize>,
}

impl QuestionPool {
    fn new(kind: QuestionKind, questions: Vec<String>, target_size: usize, custom_prompt: Option<String>) -> Self {
        let unseen = (0..questions.len()).collect();
        Self { kind, questions, target_size, custom_prompt, unseen }
    }

    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn unseen_len(&self) -> usize {
        self.unseen.len()
    }

    fn contains(&self, question: &str) -> bool {
        self.questions.iter().any(|q| q.trim() == question)
    }

    fn reset(&mut self) {
        self.unseen = (0..self.questions.len()).collect();
    }

    /// Distinct positions from the full pool; the working set is left alone.
    fn draw_with_repeats(&self, rng: &mut StdRng, count: usize) -> TestDraw {
        let served = count.min(self.questions.len());
        let mut signals = Vec::new();
        if served < count {
            signals.push(DrawSignal::PartialResult { requested: count, served });
        }

        let questions = index::sample(rng, self.questions.len(), served)
            .into_iter()
            .map(|i| self.questions[i].clone())
            .collect();
        TestDraw { kind: TestKind::Single(self.kind), questions, signals }
    }

    fn draw_unseen(&mut self, rng: &mut StdRng, count: usize) -> TestDraw {
        let mut signals = Vec::new();

        if self.unseen.is_empty() {
            self.reset();
            signals.push(DrawSignal::SetExhaustedReset);
        }

        let mut served = count;
        if served > self.questions.len() {
            served = self.target_size;
        }
        if served > self.unseen.len() {
            served = self.unseen.len();
        }
        if served < count {
            signals.push(DrawSignal::PartialResult { requested: count, served });
        }

        let mut picks = index::sample(rng, self.unseen.len(), served).into_vec();
        let questions = picks.iter().map(|&p| self.questions[self.unseen[p]].clone()).collect();

        // Highest first so swap_remove never moves a slot that is still to be removed.
        picks.sort_unstable_by(|a, b| b.cmp(a));
        for p in picks {
            self.unseen.swap_remove(p);
        }

        TestDraw { kind: TestKind::Single(self.kind), questions, signals }
    }
}

/// One optional pool per kind; `None` means "not built yet".
#[derive(Clone, Debug, Default)]
struct Pools {
    multiple_choice: Option<QuestionPool>,
    short_answer: Option<QuestionPool>,
    custom: Option<QuestionPool>,
}

impl Pools {
    fn slot(&self, kind: QuestionKind) -> &Option<QuestionPool> {
        match kind {
            QuestionKind::MultipleChoice => &self.multiple_choice,
            QuestionKind::ShortAnswer => &self.short_answer,
            QuestionKind::Custom => &self.custom,
        }
    }

    fn slot_mut(&mut self, kind: QuestionKind) -> &mut Option<QuestionPool> {
        match kind {
            QuestionKind::MultipleChoice => &mut self.multiple_choice,
            QuestionKind::ShortAnswer => &mut self.short_answer,
            QuestionKind::Custom => &mut self.custom,
        }
    }
}

/// Question bank for a single document session. Not shareable on its own;
/// callers that serve concurrent requests wrap it in a mutex (see `state`).
pub struct QuestionBank {
    document: Option<SourceDocument>,
    generator: Arc<dyn QuestionGenerator>,
    generation_timeout: Duration,
    rng: StdRng,
    pools: Pools,
}

impl QuestionBank {
    pub fn new(generator: Arc<dyn QuestionGenerator>, generation_timeout: Duration) -> Self {
        Self::with_rng(generator, generation_timeout, StdRng::from_entropy())
    }

    /// Same as [`QuestionBank::new`] but with a caller-supplied RNG (seeded in tests).
    pub fn with_rng(generator: Arc<dyn QuestionGenerator>, generation_timeout: Duration, rng: StdRng) -> Self {
        Self { document: None, generator, generation_timeout, rng, pools: Pools::default() }
    }

    /// Store the document text and derive the pool target size.
    /// A bank holds one document for its whole life; a second call fails with `AlreadyInitialized`.
    #[instrument(level = "info", skip(self, text), fields(text_len = text.len()))]
    pub fn initialize(&mut self, text: &str) -> Result<usize> {
        if self.is_initialized() {
            return Err(BankError::AlreadyInitialized);
        }
        let document = SourceDocument::new(text)?;
        let target_size = document.target_size();
        info!(target: "bank", length = document.length, target_size, "Document accepted");
        self.document = Some(document);
        Ok(target_size)
    }

    pub fn is_initialized(&self) -> bool {
        self.document.is_some()
    }

    pub fn document_length(&self) -> Option<usize> {
        self.document.as_ref().map(|d| d.length)
    }

    pub fn target_size(&self) -> Option<usize> {
        self.document.as_ref().map(SourceDocument::target_size)
    }

    pub fn pool(&self, kind: QuestionKind) -> Option<&QuestionPool> {
        self.pools.slot(kind).as_ref()
    }

    pub fn pool_size(&self, kind: QuestionKind) -> Option<usize> {
        self.pool(kind).map(QuestionPool::len)
    }

    pub fn unseen_len(&self, kind: QuestionKind) -> Option<usize> {
        self.pool(kind).map(QuestionPool::unseen_len)
    }

    /// Build the pool for `kind` unless it already exists. Returns the pool size.
    ///
    /// A built pool makes this a no-op whatever `custom_prompt` says. Otherwise
    /// `custom_prompt` must be given for [`QuestionKind::Custom`] and only for it.
    /// On failure the pool stays unbuilt, so a later call retries the generation.
    #[instrument(level = "info", skip(self, custom_prompt), fields(%kind, has_prompt = custom_prompt.is_some()))]
    pub async fn ensure_pool(&mut self, kind: QuestionKind, custom_prompt: Option<&str>) -> Result<usize> {
        let document = self.document.as_ref().ok_or(BankError::NotInitialized)?;

        if let Some(pool) = self.pools.slot(kind) {
            let requested = custom_prompt.map(str::trim).filter(|p| !p.is_empty());
            if requested.is_some() && pool.custom_prompt.as_deref() != requested {
                warn!(target: "bank", %kind, "Pool already built from a different prompt; keeping it");
            }
            debug!(target: "bank", %kind, size = pool.len(), "Pool already built");
            return Ok(pool.len());
        }

        let custom_prompt = check_custom_prompt(kind, custom_prompt)?;

        let target_size = document.target_size();
        let request = GenerationRequest {
            kind,
            document_text: &document.text,
            count: target_size,
            custom_prompt,
        };
        info!(target: "bank", %kind, target_size, generator = self.generator.name(), "Generating question pool");

        let mut questions =
            match tokio::time::timeout(self.generation_timeout, self.generator.generate(&request)).await {
                Err(_) => {
                    return Err(BankError::GenerationFailed {
                        kind,
                        reason: format!("timed out after {:?}", self.generation_timeout),
                    })
                }
                Ok(Err(reason)) => return Err(BankError::GenerationFailed { kind, reason }),
                Ok(Ok(questions)) => questions,
            };

        if questions.is_empty() {
            return Err(BankError::GenerationFailed { kind, reason: "service returned no questions".into() });
        }
        if questions.len() > target_size {
            warn!(target: "bank", %kind, returned = questions.len(), target_size, "Generator returned more than requested; truncating");
            questions.truncate(target_size);
        }
        if questions.len() < target_size {
            info!(target: "bank", %kind, returned = questions.len(), target_size, "Generator returned a short pool");
        }

        let pool = QuestionPool::new(kind, questions, target_size, custom_prompt.map(str::to_string));
        let size = pool.len();
        *self.pools.slot_mut(kind) = Some(pool);
        info!(target: "bank", %kind, size, "Question pool built");
        Ok(size)
    }

    /// Sample a test of `count` questions from an already built pool.
    #[instrument(level = "info", skip(self), fields(%kind))]
    pub fn draw_test(&mut self, kind: QuestionKind, count: usize, allow_repeats: bool) -> Result<TestDraw> {
        if count == 0 {
            return Err(BankError::InvalidCount);
        }
        let pool = self.pools.slot_mut(kind).as_mut().ok_or(BankError::PoolNotBuilt(kind))?;

        let draw = if allow_repeats {
            pool.draw_with_repeats(&mut self.rng, count)
        } else {
            pool.draw_unseen(&mut self.rng, count)
        };

        for signal in &draw.signals {
            match signal {
                DrawSignal::SetExhaustedReset => {
                    info!(target: "bank", %kind, pool = pool.len(), "All questions seen; working set reset")
                }
                DrawSignal::PartialResult { requested, served } => {
                    info!(target: "bank", %kind, requested, served, "Serving a shorter test than requested")
                }
            }
        }
        debug!(target: "bank", %kind, served = draw.questions.len(), unseen_left = ?self.unseen_len(kind), "Test drawn");
        Ok(draw)
    }

    /// Half multiple-choice (rounded up), half short-answer, interleaved.
    /// Both pools must already be built.
    #[instrument(level = "info", skip(self))]
    pub fn draw_mixed(&mut self, count: usize, allow_repeats: bool) -> Result<TestDraw> {
        if count == 0 {
            return Err(BankError::InvalidCount);
        }
        for kind in [QuestionKind::MultipleChoice, QuestionKind::ShortAnswer] {
            if self.pool_size(kind).is_none() {
                return Err(BankError::PoolNotBuilt(kind));
            }
        }

        let mc_count = count.div_ceil(2);
        let sa_count = count - mc_count;
        let mc = self.draw_test(QuestionKind::MultipleChoice, mc_count, allow_repeats)?;
        let sa = if sa_count > 0 {
            self.draw_test(QuestionKind::ShortAnswer, sa_count, allow_repeats)?
        } else {
            TestDraw { kind: TestKind::Single(QuestionKind::ShortAnswer), questions: Vec::new(), signals: Vec::new() }
        };

        let reset = mc.was_reset() || sa.was_reset();
        let mut questions = Vec::with_capacity(mc.questions.len() + sa.questions.len());
        let mut mc_iter = mc.questions.into_iter();
        let mut sa_iter = sa.questions.into_iter();
        loop {
            match (mc_iter.next(), sa_iter.next()) {
                (None, None) => break,
                (a, b) => questions.extend(a.into_iter().chain(b)),
            }
        }

        let mut signals = Vec::new();
        if reset {
            signals.push(DrawSignal::SetExhaustedReset);
        }
        if questions.len() < count {
            signals.push(DrawSignal::PartialResult { requested: count, served: questions.len() });
        }
        Ok(TestDraw { kind: TestKind::Mixed, questions, signals })
    }

    /// Ask the generation service to explain each answer, in order.
    ///
    /// Every question must have been served from one of this bank's pools; that
    /// is checked for all answers before the first explanation is requested.
    #[instrument(level = "info", skip(self, answers), fields(answers = answers.len()))]
    pub async fn explain_answers(&self, answers: &[SubmittedAnswer]) -> Result<Vec<ExplainedAnswer>> {
        let document = self.document.as_ref().ok_or(BankError::NotInitialized)?;
        if answers.is_empty() {
            return Err(BankError::NoAnswers);
        }

        let located = answers
            .iter()
            .map(|a| {
                self.locate(&a.question)
                    .map(|kind| (kind, a))
                    .ok_or_else(|| BankError::UnknownQuestion(trunc_for_log(a.question.trim(), 80)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut explained = Vec::with_capacity(located.len());
        for (kind, answer) in located {
            let request = ExplanationRequest {
                kind,
                document_text: &document.text,
                question: answer.question.trim(),
                answer: answer.answer.trim(),
            };
            let explanation =
                match tokio::time::timeout(self.generation_timeout, self.generator.explain(&request)).await {
                    Err(_) => {
                        return Err(BankError::ExplanationFailed {
                            reason: format!("timed out after {:?}", self.generation_timeout),
                        })
                    }
                    Ok(Err(reason)) => return Err(BankError::ExplanationFailed { reason }),
                    Ok(Ok(text)) => text.trim().to_string(),
                };
            if explanation.is_empty() {
                return Err(BankError::ExplanationFailed { reason: "service returned an empty explanation".into() });
            }
            explained.push(ExplainedAnswer {
                kind,
                question: request.question.to_string(),
                answer: request.answer.to_string(),
                explanation,
            });
        }

        info!(target: "bank", explained = explained.len(), "Answers explained");
        Ok(explained)
    }

    /// Which pool served `question`. Checked in multiple-choice, short-answer, custom order.
    fn locate(&self, question: &str) -> Option<QuestionKind> {
        let question = question.trim();
        [QuestionKind::MultipleChoice, QuestionKind::ShortAnswer, QuestionKind::Custom]
            .into_iter()
            .find(|&kind| self.pool(kind).is_some_and(|p| p.contains(question)))
    }
}

fn check_custom_prompt(kind: QuestionKind, custom_prompt: Option<&str>) -> Result<Option<&str>> {
    let prompt = custom_prompt.map(str::trim).filter(|p| !p.is_empty());
    match (kind, prompt) {
        (QuestionKind::Custom, None) => Err(BankError::InvalidQuestionKind(
            "a custom test needs a non-empty custom prompt".into(),
        )),
        (QuestionKind::Custom, Some(p)) => Ok(Some(p)),
        (_, Some(_)) => Err(BankError::InvalidQuestionKind(format!(
            "a custom prompt is only accepted for custom tests, not {kind}"
        ))),
        (_, None) => Ok(None),
    }
}
