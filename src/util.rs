//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// Single left-to-right pass: inserted values are never scanned again, so a
/// `{key}` inside a question or answer stays literal.
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

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads. Cuts on a char boundary.
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  match s.char_indices().nth(max_chars) {
    None => s.to_string(),
    Some((cut, _)) => format!("{}… ({} bytes total)", &s[..cut], s.len()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_every_occurrence() {
    let out = fill_template("{topic} at {difficulty}: {topic}", &[("topic", "Graphs"), ("difficulty", "Advanced")]);
    assert_eq!(out, "Graphs at Advanced: Graphs");
  }

  #[test]
  fn leaves_unknown_placeholders() {
    assert_eq!(fill_template("{a} {b}", &[("a", "1")]), "1 {b}");
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let out = trunc_for_log("ééééé", 2);
    assert!(out.starts_with("éé…"));
  }

  #[test]
  fn inserted_values_are_not_rescanned() {
    let out = fill_template(
      "Question: {question}\nAnswer: {answer}",
      &[("question", "What does f'{answer}' print?"), ("answer", "LEARNER")],
    );
    assert_eq!(out, "Question: What does f'{answer}' print?\nAnswer: LEARNER");
  }

  #[test]
  fn stray_braces_are_kept() {
    assert_eq!(fill_template("fn main() { {topic} }", &[("topic", "x")]), "fn main() { x }");
    assert_eq!(fill_template("open { only", &[]), "open { only");
  }
}
