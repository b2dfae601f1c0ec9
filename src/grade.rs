//! Grading submitted answers against model explanations.
//!
//! Multiple-choice answers are scored automatically: the first `x)` option
//! marker in the explanation is the answer key, compared with the option the
//! user picked. Short-answer and custom answers only carry their explanation
//! and are left to the reader to judge.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::QuestionKind;

#[derive(Clone, Debug, Deserialize)]
pub struct SubmittedAnswer {
  /// Question text exactly as it was served.
  pub question: String,
  /// Option letter for multiple-choice questions, free text otherwise.
  pub answer: String,
}

/// An answer together with the model's explanation of it.
#[derive(Clone, Debug)]
pub struct ExplainedAnswer {
  pub kind: QuestionKind,
  pub question: String,
  pub answer: String,
  pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
  pub question: String,
  pub kind: QuestionKind,
  pub answer: String,
  pub explanation: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub correct_option: Option<String>,
  /// `None` when the answer is not auto-graded.
  pub correct: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
  pub answers: Vec<GradedAnswer>,
  pub correct: usize,
  /// Multiple-choice answers submitted.
  pub graded: usize,
  /// `correct / graded * 100`; absent when nothing was auto-graded.
  pub percent: Option<f64>,
}

/// Score explained answers. A multiple-choice explanation without an answer
/// key still counts towards `graded`, as a wrong answer.
pub fn grade(explained: Vec<ExplainedAnswer>) -> GradeReport {
  let key_pattern = Regex::new(r"\b([a-dA-D])\)").ok();
  let mut correct = 0;
  let mut graded = 0;

  let answers = explained
    .into_iter()
    .map(|e| {
      let (correct_option, is_correct) = match e.kind {
        QuestionKind::MultipleChoice => {
          graded += 1;
          let key = key_pattern.as_ref().and_then(|re| answer_key(re, &e.explanation));
          let hit = key.is_some() && key == selected_option(&e.answer);
          if hit {
            correct += 1;
          }
          (key.map(String::from), Some(hit))
        }
        QuestionKind::ShortAnswer | QuestionKind::Custom => (None, None),
      };
      GradedAnswer {
        question: e.question,
        kind: e.kind,
        answer: e.answer,
        explanation: e.explanation,
        correct_option,
        correct: is_correct,
      }
    })
    .collect();

  let percent = (graded > 0).then(|| correct as f64 / graded as f64 * 100.0);
  GradeReport { answers, correct, graded, percent }
}

fn answer_key(pattern: &Regex, explanation: &str) -> Option<char> {
  let letter = pattern.captures(explanation)?.get(1)?.as_str().chars().next()?;
  Some(letter.to_ascii_lowercase())
}

/// The option letter a user picked. "b", "B", "b)", "(b)" and "b) Paris" all mean `b`.
pub fn selected_option(answer: &str) -> Option<char> {
  let trimmed = answer.trim().trim_start_matches('(');
  let mut chars = trimmed.chars();
  let letter = chars.next()?.to_ascii_lowercase();
  if !('a'..='d').contains(&letter) {
    return None;
  }
  match chars.next() {
    None | Some(')') | Some('.') | Some(':') => Some(letter),
    Some(c) if c.is_whitespace() => Some(letter),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn explained(kind: QuestionKind, answer: &str, explanation: &str) -> ExplainedAnswer {
    ExplainedAnswer {
      kind,
      question: format!("{kind} question"),
      answer: answer.into(),
      explanation: explanation.into(),
    }
  }

  #[test]
  fn reads_the_picked_option() {
    for raw in ["b", " B ", "b)", "(b)", "b) Paris", "b. Paris"] {
      assert_eq!(selected_option(raw), Some('b'), "{raw}");
    }
    for raw in ["", "e", "bread", "Paris"] {
      assert_eq!(selected_option(raw), None, "{raw}");
    }
  }

  #[test]
  fn first_option_marker_is_the_key() {
    let re = Regex::new(r"\b([a-dA-D])\)").unwrap();
    assert_eq!(answer_key(&re, "c) is right; a) confuses the dates."), Some('c'));
    assert_eq!(answer_key(&re, "The answer is (D) because..."), Some('d'));
    assert_eq!(answer_key(&re, "Bob) is not an option marker"), None);
  }

  #[test]
  fn scores_multiple_choice_over_answers_given() {
    let report = grade(vec![
      explained(QuestionKind::MultipleChoice, "b", "b) is correct since the text says so."),
      explained(QuestionKind::MultipleChoice, "a", "Correct option: c) 1848."),
      explained(QuestionKind::ShortAnswer, "Because of trade", "Partly right: the text stresses trade."),
    ]);
    assert_eq!(report.correct, 1);
    assert_eq!(report.graded, 2);
    assert_eq!(report.percent, Some(50.0));
    assert_eq!(report.answers[0].correct, Some(true));
    assert_eq!(report.answers[1].correct_option.as_deref(), Some("c"));
    assert_eq!(report.answers[1].correct, Some(false));
    assert_eq!(report.answers[2].correct, None);
    assert_eq!(report.answers[2].correct_option, None);
  }

  #[test]
  fn missing_key_counts_as_wrong() {
    let report = grade(vec![
      explained(QuestionKind::MultipleChoice, "a", "I cannot tell from the text."),
      explained(QuestionKind::MultipleChoice, "d", "d) matches paragraph two."),
      explained(QuestionKind::MultipleChoice, "d", "d) matches paragraph three."),
    ]);
    assert_eq!((report.correct, report.graded), (2, 3));
    assert!((report.percent.unwrap() - 66.666).abs() < 0.01);
  }

  #[test]
  fn free_text_only_has_no_percentage() {
    let report = grade(vec![explained(QuestionKind::Custom, "yes", "Right.")]);
    assert_eq!(report.graded, 0);
    assert_eq!(report.percent, None);
  }
}
