//! Application state: document sessions, the generation service, and config.
//!
//! This module owns:
//!   - one `QuestionBank` per uploaded document, keyed by session id
//!   - the shared question generator (OpenAI or disabled)
//!   - the loaded configuration
//!
//! Each session sits behind its own `tokio::sync::Mutex`. Pool building holds that
//! lock across the generation call, so two requests for the same document can
//! never both see an unbuilt pool, and nobody observes a half-built one.
//!
//! Sessions are bounded: opening one past `max_sessions` is refused, and a
//! background sweeper drops sessions idle for longer than `idle_timeout_secs`.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::bank::{QuestionBank, QuestionPool};
use crate::config::{load_config, AppConfig};
use crate::domain::{QuestionKind, TestDraw, TestKind};
use crate::error::{BankError, Result};
use crate::generator::{DisabledGenerator, QuestionGenerator};
use crate::grade::{grade, GradeReport, SubmittedAnswer};
use crate::openai::OpenAI;

/// A document's bank plus the last time a request touched it.
pub struct Session {
    pub bank: QuestionBank,
    last_used: Instant,
}

impl Session {
    fn new(bank: QuestionBank) -> Self {
        Self { bank, last_used: Instant::now() }
    }

    fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
    pub generator: Arc<dyn QuestionGenerator>,
    pub config: AppConfig,
}

/// What a caller learns when a document is accepted.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub document_id: Uuid,
    pub length: usize,
    pub target_size: usize,
}

/// A built pool: its size and how many questions are still unseen.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub kind: QuestionKind,
    pub size: usize,
    pub unseen: usize,
}

impl From<&QuestionPool> for PoolStatus {
    fn from(pool: &QuestionPool) -> Self {
        Self { kind: pool.kind(), size: pool.len(), unseen: pool.unseen_len() }
    }
}

impl AppState {
    /// Build state from env: load config, init the OpenAI generator if a key is present.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let config = load_config();

        let generator: Arc<dyn QuestionGenerator> =
            match OpenAI::from_env(config.prompts.clone(), &config.generation) {
                Some(oa) => {
                    info!(target: "quizbank", base_url = %oa.base_url, model = %oa.model, timeout_secs = config.generation.timeout_secs, "OpenAI enabled.");
                    Arc::new(oa)
                }
                None => {
                    info!(target: "quizbank", "OpenAI disabled (no OPENAI_API_KEY). Pool building will fail until configured.");
                    Arc::new(DisabledGenerator)
                }
            };

        Self::new(generator, config)
    }

    pub fn new(generator: Arc<dyn QuestionGenerator>, config: AppConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            generator,
            config,
        }
    }

    fn new_bank(&self) -> QuestionBank {
        QuestionBank::new(self.generator.clone(), self.config.generation.timeout())
    }

    /// Validate the document and register a fresh bank for it.
    #[instrument(level = "info", skip(self, text), fields(text_len = text.len()))]
    pub async fn open_session(&self, text: &str) -> Result<SessionSummary> {
        let mut bank = self.new_bank();
        bank.initialize(text)?;
        let length = bank.document_length().unwrap_or_default();
        let target_size = bank.target_size().unwrap_or_default();

        let limit = self.config.sessions.max_sessions;
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= limit {
            warn!(target: "quizbank", open = sessions.len(), limit, "Session limit reached; refusing document");
            return Err(BankError::TooManySessions { limit });
        }

        let id = Uuid::new_v4();
        sessions.insert(id, Arc::new(Mutex::new(Session::new(bank))));
        info!(target: "quizbank", document_id = %id, length, target_size, "Document session opened");
        Ok(SessionSummary { document_id: id, length, target_size })
    }

    pub async fn session(&self, id: Uuid) -> Result<SharedSession> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(BankError::UnknownSession(id))
    }

    /// Lock a session for one operation and mark it as used.
    async fn lock_session(&self, id: Uuid) -> Result<OwnedMutexGuard<Session>> {
        let mut session = self.session(id).await?.lock_owned().await;
        session.touch();
        Ok(session)
    }

    /// Drop the bank and every pool it built.
    #[instrument(level = "info", skip(self), fields(%id))]
    pub async fn close_session(&self, id: Uuid) -> Result<()> {
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                info!(target: "quizbank", document_id = %id, "Document session closed");
                Ok(())
            }
            None => Err(BankError::UnknownSession(id)),
        }
    }

    #[instrument(level = "info", skip(self, custom_prompt), fields(%id, %kind))]
    pub async fn ensure_pool(&self, id: Uuid, kind: QuestionKind, custom_prompt: Option<&str>) -> Result<PoolStatus> {
        let mut session = self.lock_session(id).await?;
        session.bank.ensure_pool(kind, custom_prompt).await?;
        session.bank.pool(kind).map(PoolStatus::from).ok_or(BankError::PoolNotBuilt(kind))
    }

    /// Draw a test. Single-kind draws need the pool built beforehand; a mixed
    /// test builds the multiple-choice and short-answer pools on demand.
    #[instrument(level = "info", skip(self), fields(%id))]
    pub async fn draw_test(&self, id: Uuid, kind: TestKind, count: usize, allow_repeats: bool) -> Result<TestDraw> {
        let mut session = self.lock_session(id).await?;
        let bank = &mut session.bank;
        match kind {
            TestKind::Single(kind) => bank.draw_test(kind, count, allow_repeats),
            TestKind::Mixed => {
                if count == 0 {
                    return Err(BankError::InvalidCount);
                }
                bank.ensure_pool(QuestionKind::MultipleChoice, None).await?;
                bank.ensure_pool(QuestionKind::ShortAnswer, None).await?;
                bank.draw_mixed(count, allow_repeats)
            }
        }
    }

    /// Explain every submitted answer, then score the multiple-choice ones.
    #[instrument(level = "info", skip(self, answers), fields(%id, answers = answers.len()))]
    pub async fn grade_answers(&self, id: Uuid, answers: &[SubmittedAnswer]) -> Result<GradeReport> {
        let session = self.lock_session(id).await?;
        let explained = session.bank.explain_answers(answers).await?;
        drop(session);

        let report = grade(explained);
        info!(target: "quizbank", document_id = %id, correct = report.correct, graded = report.graded, percent = ?report.percent, "Answers graded");
        Ok(report)
    }

    /// Drop sessions idle for longer than the configured timeout. Sessions busy
    /// with a request are kept. Returns how many were dropped.
    #[instrument(level = "debug", skip(self))]
    pub async fn evict_idle(&self) -> usize {
        let idle_timeout = self.config.sessions.idle_timeout();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| match session.try_lock() {
            Ok(s) if s.idle_for() >= idle_timeout => {
                info!(target: "quizbank", document_id = %id, idle_secs = s.idle_for().as_secs(), "Idle document session evicted");
                false
            }
            _ => true,
        });
        before - sessions.len()
    }

    /// Run `evict_idle` every `sweep_interval_secs` until the runtime shuts down.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let state = self.clone();
        let period = self.config.sessions.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = state.evict_idle().await;
                if evicted > 0 {
                    let remaining = state.session_count().await;
                    debug!(target: "quizbank", evicted, remaining, "Session sweep done");
                }
            }
        })
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
