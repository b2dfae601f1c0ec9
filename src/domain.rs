//! Domain models used by the backend: question kinds, pools and draw results.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::BankError;

/// Documents shorter than this many characters cannot carry a meaningful quiz.
/// Also the divisor used to size a pool from the document length.
pub const MIN_DOCUMENT_LENGTH: usize = 212;

/// The format of the questions held by a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
  /// Question stem followed by `a)`..`d)` options and a difficulty label.
  MultipleChoice,
  /// Open question answered in a sentence or two.
  ShortAnswer,
  /// Whatever the caller's own prompt asks the model for.
  Custom,
}

impl QuestionKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      QuestionKind::MultipleChoice => "multiple_choice",
      QuestionKind::ShortAnswer => "short_answer",
      QuestionKind::Custom => "custom",
    }
  }
}

impl fmt::Display for QuestionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for QuestionKind {
  type Err = BankError;

  /// Accepts the snake_case names plus the labels the upload front-end sends ("mcq", "short answer").
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "multiple_choice" | "mcq" => Ok(QuestionKind::MultipleChoice),
      "short_answer" | "short answer" => Ok(QuestionKind::ShortAnswer),
      "custom" => Ok(QuestionKind::Custom),
      other => Err(BankError::InvalidQuestionKind(format!("unknown question kind '{other}'"))),
    }
  }
}

/// What a test is drawn from: a single pool, or an even mix of multiple-choice and short-answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestKind {
  Single(QuestionKind),
  Mixed,
}

impl TestKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      TestKind::Single(kind) => kind.as_str(),
      TestKind::Mixed => "mixed",
    }
  }
}

impl fmt::Display for TestKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TestKind {
  type Err = BankError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.trim().eq_ignore_ascii_case("mixed") {
      return Ok(TestKind::Mixed);
    }
    s.parse::<QuestionKind>().map(TestKind::Single)
  }
}

/// Plain text extracted from an uploaded document, validated for length.
#[derive(Clone, Debug)]
pub struct SourceDocument {
  pub text: String,
  /// Character count (not bytes).
  pub length: usize,
}

impl SourceDocument {
  pub fn new(text: impl Into<String>) -> Result<Self, BankError> {
    let text = text.into();
    let length = text.chars().count();
    if length < MIN_DOCUMENT_LENGTH {
      return Err(BankError::DocumentTooShort { length, minimum: MIN_DOCUMENT_LENGTH });
    }
    Ok(Self { text, length })
  }

  /// Default generation batch size: `max(1, round(length / 212))`, rounding halves away from zero.
  pub fn target_size(&self) -> usize {
    let ratio = self.length as f64 / MIN_DOCUMENT_LENGTH as f64;
    (ratio.round() as usize).max(1)
  }
}

/// Informational signals attached to a draw. None of them is a failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum DrawSignal {
  /// Fewer questions were served than requested.
  PartialResult { requested: usize, served: usize },
  /// The working set had been used up and was refilled from the full pool.
  SetExhaustedReset,
}

/// Result of one test draw.
#[derive(Clone, Debug)]
pub struct TestDraw {
  pub kind: TestKind,
  pub questions: Vec<String>,
  pub signals: Vec<DrawSignal>,
}

impl TestDraw {
  /// True when the draw carries no signal at all.
  pub fn is_ok(&self) -> bool {
    self.signals.is_empty()
  }

  pub fn is_partial(&self) -> bool {
    self.signals.iter().any(|s| matches!(s, DrawSignal::PartialResult { .. }))
  }

  pub fn was_reset(&self) -> bool {
    self.signals.contains(&DrawSignal::SetExhaustedReset)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_kind_names_and_frontend_labels() {
    assert_eq!("multiple_choice".parse::<QuestionKind>().unwrap(), QuestionKind::MultipleChoice);
    assert_eq!("MCQ".parse::<QuestionKind>().unwrap(), QuestionKind::MultipleChoice);
    assert_eq!("short answer".parse::<QuestionKind>().unwrap(), QuestionKind::ShortAnswer);
    assert_eq!("custom".parse::<QuestionKind>().unwrap(), QuestionKind::Custom);
    assert!(matches!("essay".parse::<QuestionKind>(), Err(BankError::InvalidQuestionKind(_))));
  }

  #[test]
  fn parses_mixed_test_kind() {
    assert_eq!("mixed".parse::<TestKind>().unwrap(), TestKind::Mixed);
    assert_eq!("short_answer".parse::<TestKind>().unwrap(), TestKind::Single(QuestionKind::ShortAnswer));
    assert_eq!("MCQ".parse::<TestKind>().unwrap().to_string(), "multiple_choice");
    assert_eq!(TestKind::Mixed.to_string(), "mixed");
  }

  #[test]
  fn rejects_documents_below_minimum_length() {
    let err = SourceDocument::new("x".repeat(211)).unwrap_err();
    assert!(matches!(err, BankError::DocumentTooShort { length: 211, minimum: 212 }));
  }

  #[test]
  fn length_counts_characters_not_bytes() {
    let doc = SourceDocument::new("é".repeat(212)).unwrap();
    assert_eq!(doc.length, 212);
    assert_eq!(doc.target_size(), 1);
  }

  #[test]
  fn target_size_rounds_length_ratio() {
    assert_eq!(SourceDocument::new("a".repeat(2120)).unwrap().target_size(), 10);
    // 317 / 212 = 1.495..
    assert_eq!(SourceDocument::new("a".repeat(317)).unwrap().target_size(), 1);
    // 318 / 212 = 1.5
    assert_eq!(SourceDocument::new("a".repeat(318)).unwrap().target_size(), 2);
  }
}
