//! The question generation service seam.
//!
//! The bank never talks to a model endpoint directly; it is handed an
//! implementation of [`QuestionGenerator`] at construction time.

use async_trait::async_trait;

use crate::domain::QuestionKind;

/// One request for a batch of questions about a document.
#[derive(Clone, Debug)]
pub struct GenerationRequest<'a> {
  pub kind: QuestionKind,
  pub document_text: &'a str,
  /// Upper bound on how many questions are wanted.
  pub count: usize,
  /// Present only for [`QuestionKind::Custom`].
  pub custom_prompt: Option<&'a str>,
}

/// One answered question to be explained against its document.
#[derive(Clone, Debug)]
pub struct ExplanationRequest<'a> {
  pub kind: QuestionKind,
  pub document_text: &'a str,
  pub question: &'a str,
  pub answer: &'a str,
}

/// Turns document text + a prompt into question strings, and explains answers.
///
/// `generate` may return anywhere between 0 and `count` questions;
/// deciding whether an empty batch is a failure is left to the caller.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
  async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<String>, String>;

  /// Say whether `answer` is right and why. For multiple-choice questions the
  /// reply is expected to name the correct option as `x)` before anything else.
  async fn explain(&self, request: &ExplanationRequest<'_>) -> Result<String, String>;

  /// Short label for logs.
  fn name(&self) -> &str;
}

/// Stand-in used when no model endpoint is configured. Every call fails.
pub struct DisabledGenerator;

#[async_trait]
impl QuestionGenerator for DisabledGenerator {
  async fn generate(&self, _request: &GenerationRequest<'_>) -> Result<Vec<String>, String> {
    Err("no question generation service configured (set OPENAI_API_KEY)".into())
  }

  async fn explain(&self, _request: &ExplanationRequest<'_>) -> Result<String, String> {
    Err("no explanation service configured (set OPENAI_API_KEY)".into())
  }

  fn name(&self) -> &str {
    "disabled"
  }
}
