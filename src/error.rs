//! Error taxonomy for the question bank and its HTTP mapping.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Json, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::domain::QuestionKind;

pub type Result<T> = std::result::Result<T, BankError>;

#[derive(Debug, thiserror::Error)]
pub enum BankError {
  /// Not retryable without a different document.
  #[error("document is too short to make meaningful questions from ({length} characters, need at least {minimum})")]
  DocumentTooShort { length: usize, minimum: usize },

  #[error("question bank already holds a document")]
  AlreadyInitialized,

  #[error("question bank has no document yet")]
  NotInitialized,

  /// The generation service failed, timed out or returned nothing. Retryable by the caller.
  #[error("question generation failed for {kind}: {reason}")]
  GenerationFailed { kind: QuestionKind, reason: String },

  #[error("invalid question kind: {0}")]
  InvalidQuestionKind(String),

  #[error("no {0} pool has been built for this document")]
  PoolNotBuilt(QuestionKind),

  #[error("a test needs at least one question")]
  InvalidCount,

  #[error("unknown document session: {0}")]
  UnknownSession(Uuid),

  /// Opening another session would exceed the configured limit. Retry once idle sessions expire.
  #[error("too many open document sessions (limit {limit})")]
  TooManySessions { limit: usize },

  #[error("no answers were submitted")]
  NoAnswers,

  #[error("question was not served from this document: {0}")]
  UnknownQuestion(String),

  #[error("answer explanation failed: {reason}")]
  ExplanationFailed { reason: String },
}

impl BankError {
  pub fn status(&self) -> StatusCode {
    match self {
      BankError::DocumentTooShort { .. }
      | BankError::InvalidQuestionKind(_)
      | BankError::InvalidCount
      | BankError::NoAnswers
      | BankError::UnknownQuestion(_) => StatusCode::BAD_REQUEST,
      BankError::UnknownSession(_) => StatusCode::NOT_FOUND,
      BankError::AlreadyInitialized | BankError::NotInitialized | BankError::PoolNotBuilt(_) => StatusCode::CONFLICT,
      BankError::GenerationFailed { .. } | BankError::ExplanationFailed { .. } => StatusCode::BAD_GATEWAY,
      BankError::TooManySessions { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
  }
}

impl IntoResponse for BankError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = Json(json!({ "error": self.to_string() }));
    (status, body).into_response()
  }
}
