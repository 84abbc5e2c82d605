//! Domain models: difficulty, question types, session config, challenge, grading and solution.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Learner level requested for a challenge.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Difficulty {
  Beginner,
  Intermediate,
  Advanced,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Beginner => "Beginner",
      Difficulty::Intermediate => "Intermediate",
      Difficulty::Advanced => "Advanced",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Which kind of question the learner would like.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TypePreference {
  Coding,
  Conceptual,
  /// Let the generator decide; it may return both kinds at once.
  #[serde(alias = "any", alias = "both")]
  Either,
}

impl TypePreference {
  /// Value sent to the generation prompt.
  pub fn as_wire(&self) -> &'static str {
    match self {
      TypePreference::Coding => "coding",
      TypePreference::Conceptual => "conceptual",
      TypePreference::Either => "any",
    }
  }
}

/// One half of a challenge. Also used as the active view.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
  Coding,
  Conceptual,
}

impl QuestionType {
  pub fn as_str(&self) -> &'static str {
    match self {
      QuestionType::Coding => "coding",
      QuestionType::Conceptual => "conceptual",
    }
  }
}

impl fmt::Display for QuestionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// What the generator actually produced.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RealizedType {
  Coding,
  Conceptual,
  Both,
}

impl RealizedType {
  pub fn includes(&self, view: QuestionType) -> bool {
    match self {
      RealizedType::Both => true,
      RealizedType::Coding => view == QuestionType::Coding,
      RealizedType::Conceptual => view == QuestionType::Conceptual,
    }
  }

  /// View shown right after generation. `Both` starts on coding.
  pub fn default_view(&self) -> QuestionType {
    match self {
      RealizedType::Conceptual => QuestionType::Conceptual,
      RealizedType::Coding | RealizedType::Both => QuestionType::Coding,
    }
  }
}

/// A complete selection: every field present, topic non-blank.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
  pub difficulty: Difficulty,
  pub topic: String,
  pub type_preference: TypePreference,
}

/// Partially filled selection form held by a session.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDraft {
  #[serde(default)] pub difficulty: Option<Difficulty>,
  #[serde(default)] pub topic: Option<String>,
  #[serde(default)] pub type_preference: Option<TypePreference>,
}

impl ConfigDraft {
  /// `Some` only when all three fields are set and the topic has content.
  pub fn complete(&self) -> Option<SessionConfig> {
    let topic = self.topic.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    Some(SessionConfig {
      difficulty: self.difficulty?,
      topic: topic.to_string(),
      type_preference: self.type_preference?,
    })
  }
}

/// Generated question(s) plus hint(s). Build it through [`Challenge::new`] so
/// the realized type always matches the questions that are present.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
  coding_question: Option<String>,
  coding_hint: Option<String>,
  conceptual_question: Option<String>,
  conceptual_hint: Option<String>,
  realized: RealizedType,
}

impl Challenge {
  pub fn new(
    realized: RealizedType,
    coding_question: Option<String>,
    coding_hint: Option<String>,
    conceptual_question: Option<String>,
    conceptual_hint: Option<String>,
  ) -> Result<Self, String> {
    let coding_question = non_blank(coding_question);
    let conceptual_question = non_blank(conceptual_question);
    let coding_hint = non_blank(coding_hint);
    let conceptual_hint = non_blank(conceptual_hint);

    let (has_coding, has_conceptual) = (coding_question.is_some(), conceptual_question.is_some());
    match realized {
      RealizedType::Coding if !has_coding => return Err("coding challenge without a coding question".into()),
      RealizedType::Conceptual if !has_conceptual => return Err("conceptual challenge without a conceptual question".into()),
      RealizedType::Both if !(has_coding && has_conceptual) => {
        return Err("dual challenge must carry both questions".into())
      }
      _ => {}
    }

    // Single-type challenges drop whatever the other half carried.
    let keep_coding = realized.includes(QuestionType::Coding);
    let keep_conceptual = realized.includes(QuestionType::Conceptual);
    Ok(Self {
      coding_question: coding_question.filter(|_| keep_coding),
      coding_hint: coding_hint.filter(|_| keep_coding),
      conceptual_question: conceptual_question.filter(|_| keep_conceptual),
      conceptual_hint: conceptual_hint.filter(|_| keep_conceptual),
      realized,
    })
  }

  pub fn single(kind: QuestionType, question: String, hint: Option<String>) -> Result<Self, String> {
    match kind {
      QuestionType::Coding => Self::new(RealizedType::Coding, Some(question), hint, None, None),
      QuestionType::Conceptual => Self::new(RealizedType::Conceptual, None, None, Some(question), hint),
    }
  }

  pub fn realized(&self) -> RealizedType { self.realized }

  pub fn question(&self, view: QuestionType) -> Option<&str> {
    match view {
      QuestionType::Coding => self.coding_question.as_deref(),
      QuestionType::Conceptual => self.conceptual_question.as_deref(),
    }
  }

  pub fn hint(&self, view: QuestionType) -> Option<&str> {
    match view {
      QuestionType::Coding => self.coding_hint.as_deref(),
      QuestionType::Conceptual => self.conceptual_hint.as_deref(),
    }
  }

  /// Fill in a hint obtained after generation. Ignored for a half the challenge lacks.
  pub fn set_hint(&mut self, view: QuestionType, hint: String) {
    if !self.realized.includes(view) {
      return;
    }
    match view {
      QuestionType::Coding => self.coding_hint = Some(hint),
      QuestionType::Conceptual => self.conceptual_hint = Some(hint),
    }
  }
}

fn non_blank(s: Option<String>) -> Option<String> {
  s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Verdict from the external grader. `passed` is taken as-is.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct GradingResult {
  pub score: u8,
  pub passed: bool,
  pub feedback: String,
}

/// Reference solution for the active question.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SolutionReveal {
  pub solution: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}
