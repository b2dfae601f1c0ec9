//! Presentation helpers for raw model output.
//!
//! A generated multiple-choice block looks roughly like
//! `"3. What is X?\na) one\nb) two\nc) three\nd) four\nDifficulty: Medium"`.
//! Short-answer questions usually carry the level in parentheses instead:
//! `"2. Why did X happen? (Hard)"`. We split either form into a stem, its
//! options and the difficulty label so the front-end does not have to.

use serde::Serialize;

const OPTION_MARKERS: [&str; 4] = ["a)", "b)", "c)", "d)"];
const LEVELS: [&str; 3] = ["Easy", "Medium", "Hard"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedQuestion {
  pub stem: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub options: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub difficulty: Option<String>,
}

/// Split a raw question into stem / options / difficulty.
/// Text without an `a)` option marker is returned as a bare stem.
pub fn format_question(raw: &str) -> FormattedQuestion {
  let raw = raw.trim();
  let (body, difficulty) = split_difficulty(raw);

  let Some(first) = body.find(OPTION_MARKERS[0]) else {
    return FormattedQuestion { stem: body.trim().to_string(), options: Vec::new(), difficulty };
  };

  let stem = body[..first].trim().to_string();
  let rest = &body[first..];

  // Cut points: every later marker found in order after the previous one.
  let mut cuts = vec![0usize];
  for marker in &OPTION_MARKERS[1..] {
    let from = *cuts.last().unwrap_or(&0) + 1;
    match rest[from..].find(marker) {
      Some(pos) => cuts.push(from + pos),
      None => break,
    }
  }
  cuts.push(rest.len());

  let options = cuts
    .windows(2)
    .map(|w| rest[w[0]..w[1]].trim().to_string())
    .filter(|o| !o.is_empty())
    .collect();

  FormattedQuestion { stem, options, difficulty }
}

fn split_difficulty(raw: &str) -> (&str, Option<String>) {
  match raw.rfind("Difficulty:") {
    Some(pos) => {
      let label = raw[pos + "Difficulty:".len()..].trim().trim_matches('*').trim();
      let label = (!label.is_empty()).then(|| label.to_string());
      (raw[..pos].trim_end().trim_end_matches('*'), label)
    }
    None => match trailing_level(raw) {
      Some((body, level)) => (body, Some(level.to_string())),
      None => (raw, None),
    },
  }
}

/// `"... (Medium)"` -> (`"..."`, `"Medium"`). Other parentheticals are left alone.
fn trailing_level(raw: &str) -> Option<(&str, &'static str)> {
  let inner = raw.strip_suffix(')')?;
  let open = inner.rfind('(')?;
  let label = inner[open + 1..].trim();
  let level = LEVELS.into_iter().find(|l| l.eq_ignore_ascii_case(label))?;
  Some((raw[..open].trim_end(), level))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn splits_multiple_choice_block() {
    let q = format_question("1. What colour is the sky?\na) Blue\nb) Green\nc) Red\nd) Black\nDifficulty: Easy");
    assert_eq!(q.stem, "1. What colour is the sky?");
    assert_eq!(q.options, vec!["a) Blue", "b) Green", "c) Red", "d) Black"]);
    assert_eq!(q.difficulty.as_deref(), Some("Easy"));
  }

  #[test]
  fn handles_inline_options_without_difficulty() {
    let q = format_question("Which is prime? a) 4 b) 6 c) 7");
    assert_eq!(q.stem, "Which is prime?");
    assert_eq!(q.options, vec!["a) 4", "b) 6", "c) 7"]);
    assert_eq!(q.difficulty, None);
  }

  #[test]
  fn short_answer_level_in_parentheses() {
    let q = format_question("  2. Explain photosynthesis in two sentences. (medium)  ");
    assert_eq!(q.stem, "2. Explain photosynthesis in two sentences.");
    assert_eq!(q.difficulty.as_deref(), Some("Medium"));
    assert!(q.options.is_empty());
  }

  #[test]
  fn plain_question_is_bare_stem() {
    let q = format_question("What does the author mean (see page 3)?");
    assert_eq!(q.stem, "What does the author mean (see page 3)?");
    assert_eq!(q.difficulty, None);
    assert!(q.options.is_empty());
  }

  #[test]
  fn difficulty_only() {
    let q = format_question("Name the capital of France.\n**Difficulty:** Hard");
    assert_eq!(q.stem, "Name the capital of France.");
    assert_eq!(q.difficulty.as_deref(), Some("Hard"));
  }
}
