//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values in a single
/// left-to-right pass; inserted values are never scanned again, and unknown
/// `{...}` sequences are copied through untouched.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    let value = after
      .find('}')
      .and_then(|close| pairs.iter().find(|(k, _)| *k == &after[..close]).map(|(_, v)| (close, *v)));
    match value {
      Some((close, v)) => {
        out.push_str(v);
        rest = &after[close + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Split a model reply into individual questions.
/// Questions are separated by blank lines; surrounding whitespace and empty chunks are dropped.
pub fn split_questions(reply: &str, max: usize) -> Vec<String> {
  reply
    .replace("\r\n", "\n")
    .split("\n\n")
    .map(str::trim)
    .filter(|q| !q.is_empty())
    .take(max)
    .map(str::to_string)
    .collect()
}

/// Log-safe truncation for large strings, on a char boundary.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}
