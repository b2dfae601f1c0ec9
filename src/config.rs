//! Loading service configuration (prompts, generation and session settings) from TOML and env.
//!
//! See `AppConfig`, `Prompts`, `GenerationCfg` and `SessionCfg` for the expected schema:
//!
//! ```toml
//! [generation]
//! timeout_secs = 90
//! temperature = 0.5
//!
//! [sessions]
//! max_sessions = 200
//! idle_timeout_secs = 1800
//!
//! [prompts]
//! multiple_choice_user_template = "{text}\nWrite {count} MCQs ..."
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationCfg,
  #[serde(default)]
  pub sessions: SessionCfg,
}

impl AppConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str::<AppConfig>(s)
  }
}

/// Settings for calls to the question generation service.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationCfg {
  /// Upper bound on a single generation call. The model endpoint is slow; 120s matches what it was sized for.
  pub timeout_secs: u64,
  pub temperature: f32,
}

impl Default for GenerationCfg {
  fn default() -> Self {
    Self { timeout_secs: 120, temperature: 0.7 }
  }
}

impl GenerationCfg {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs.max(1))
  }
}

/// Bounds on the in-memory document sessions.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionCfg {
  /// Opening a document beyond this many live sessions is refused.
  pub max_sessions: usize,
  /// Sessions untouched for this long are dropped by the sweeper.
  pub idle_timeout_secs: u64,
  pub sweep_interval_secs: u64,
}

impl Default for SessionCfg {
  fn default() -> Self {
    Self { max_sessions: 500, idle_timeout_secs: 3600, sweep_interval_secs: 60 }
  }
}

impl SessionCfg {
  pub fn idle_timeout(&self) -> Duration {
    Duration::from_secs(self.idle_timeout_secs.max(1))
  }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs.max(1))
  }
}

/// Prompts used by the generation client.
/// Question templates accept `{text}`, `{count}` and `{prompt}`;
/// explanation templates accept `{text}`, `{question}` and `{answer}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub question_system: String,
  pub multiple_choice_user_template: String,
  pub short_answer_user_template: String,
  pub custom_user_template: String,
  pub explanation_system: String,
  pub multiple_choice_explanation_template: String,
  pub short_answer_explanation_template: String,
  pub custom_explanation_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_system: "You write study questions strictly from the supplied document. Separate consecutive questions with exactly one blank line and output nothing else.".into(),
      multiple_choice_user_template: "{text}\nGenerate {count} MCQs to help me study from this document exclusively, and each time tell me what you think the level of difficulty is: Easy, Medium, Hard. Give each question four options labelled a) to d) and end it with a line 'Difficulty: <level>'.".into(),
      short_answer_user_template: "{text}\nGenerate {count} short answer questions based on the text above.".into(),
      custom_user_template: "{text}\n{prompt}".into(),
      explanation_system: "You are a patient tutor. Judge answers strictly against the supplied document and keep explanations short.".into(),
      multiple_choice_explanation_template: "Explain why the answer '{answer}' to the question '{question}' is correct or incorrect based on the following text: {text}.\nBegin your reply with the correct option written as its letter and a parenthesis, for example 'b)'.".into(),
      short_answer_explanation_template: "Explain why the answer '{answer}' to the question '{question}' is correct or incorrect based on the following text: {text}.".into(),
      custom_explanation_template: "Explain why the answer '{answer}' to the question '{question}' is correct or incorrect based on the following text: {text}.".into(),
    }
  }
}

/// Attempt to load `AppConfig` from QUIZBANK_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_file_from_env() -> Option<AppConfig> {
  let path = std::env::var("QUIZBANK_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match AppConfig::from_toml_str(&s) {
      Ok(cfg) => {
        info!(target: "quizbank", %path, "Loaded service config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quizbank", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quizbank", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// File config (or defaults) with env overrides applied on top.
pub fn load_config() -> AppConfig {
  let mut cfg = load_config_file_from_env().unwrap_or_default();
  if let Some(secs) = env_override::<u64>("GENERATION_TIMEOUT_SECS") {
    cfg.generation.timeout_secs = secs;
  }
  if let Some(max) = env_override::<usize>("MAX_SESSIONS") {
    cfg.sessions.max_sessions = max;
  }
  if let Some(secs) = env_override::<u64>("SESSION_IDLE_SECS") {
    cfg.sessions.idle_timeout_secs = secs;
  }
  cfg
}

fn env_override<T>(key: &str) -> Option<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  let raw = std::env::var(key).ok()?;
  match raw.parse::<T>() {
    Ok(v) => Some(v),
    Err(e) => {
      warn!(target: "quizbank", key, %raw, error = %e, "Ignoring invalid env override");
      None
    }
  }
}
