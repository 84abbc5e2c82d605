//! Provider boundary: request types, the JSON shapes the model returns, and the
//! `ChallengeProvider` trait the session logic talks to.
//!
//! Providers never touch session state. They take a request snapshot and return
//! either a domain value or a `ProviderError`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{
  Challenge, Difficulty, GradingResult, QuestionType, RealizedType, SolutionReveal, TypePreference,
};
use crate::error::ProviderError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
  pub topic: String,
  pub difficulty: Difficulty,
  pub type_preference: TypePreference,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeGradingRequest {
  pub code: String,
  pub topic: String,
  pub difficulty: Difficulty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerGradingRequest {
  pub user_answer: String,
  pub question: String,
  pub topic: String,
  pub difficulty: Difficulty,
}

/// Grading contract chosen by the active view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GradingRequest {
  Code(CodeGradingRequest),
  Conceptual(AnswerGradingRequest),
}

impl GradingRequest {
  pub fn view(&self) -> QuestionType {
    match self {
      GradingRequest::Code(_) => QuestionType::Coding,
      GradingRequest::Conceptual(_) => QuestionType::Conceptual,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolutionRequest {
  pub topic: String,
  pub difficulty: Difficulty,
  pub question: String,
  pub question_type: QuestionType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HintRequest {
  pub question: String,
  pub topic: String,
  pub difficulty: Difficulty,
}

#[async_trait]
pub trait ChallengeProvider: Send + Sync {
  async fn generate_challenge(&self, req: &GenerationRequest) -> Result<Challenge, ProviderError>;

  async fn grade_code(&self, req: &CodeGradingRequest) -> Result<GradingResult, ProviderError>;

  async fn grade_conceptual(&self, req: &AnswerGradingRequest) -> Result<GradingResult, ProviderError>;

  async fn generate_solution(&self, req: &SolutionRequest) -> Result<SolutionReveal, ProviderError>;

  async fn generate_hint(&self, req: &HintRequest) -> Result<String, ProviderError>;

  /// Topic idea for a learner at `difficulty`.
  async fn suggest_topic(&self, difficulty: Difficulty) -> Result<String, ProviderError>;

  /// Short label for logs.
  fn name(&self) -> &str;
}

/// Dispatch a grading request to the matching contract.
pub async fn grade(provider: &dyn ChallengeProvider, req: &GradingRequest) -> Result<GradingResult, ProviderError> {
  match req {
    GradingRequest::Code(r) => provider.grade_code(r).await,
    GradingRequest::Conceptual(r) => provider.grade_conceptual(r).await,
  }
}

/// Used when no API key is configured. Every call fails, so sessions surface
/// a phase error instead of hanging.
pub struct UnavailableProvider;

#[async_trait]
impl ChallengeProvider for UnavailableProvider {
  async fn generate_challenge(&self, _req: &GenerationRequest) -> Result<Challenge, ProviderError> {
    Err(ProviderError::Unavailable)
  }
  async fn grade_code(&self, _req: &CodeGradingRequest) -> Result<GradingResult, ProviderError> {
    Err(ProviderError::Unavailable)
  }
  async fn grade_conceptual(&self, _req: &AnswerGradingRequest) -> Result<GradingResult, ProviderError> {
    Err(ProviderError::Unavailable)
  }
  async fn generate_solution(&self, _req: &SolutionRequest) -> Result<SolutionReveal, ProviderError> {
    Err(ProviderError::Unavailable)
  }
  async fn generate_hint(&self, _req: &HintRequest) -> Result<String, ProviderError> {
    Err(ProviderError::Unavailable)
  }
  async fn suggest_topic(&self, _difficulty: Difficulty) -> Result<String, ProviderError> {
    Err(ProviderError::Unavailable)
  }
  fn name(&self) -> &str { "unavailable" }
}

//
// Model output shapes
//

/// Generation output. The model returns either one question or the dual shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GenerationResponse {
  Dual(DualGeneration),
  Single(SingleGeneration),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleGeneration {
  pub question: String,
  #[serde(default)]
  pub hint: Option<String>,
  pub question_type: QuestionType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DualGeneration {
  #[serde(default)] pub coding_question: Option<String>,
  #[serde(default)] pub coding_hint: Option<String>,
  #[serde(default)] pub conceptual_question: Option<String>,
  #[serde(default)] pub conceptual_hint: Option<String>,
  pub question_type_generated: RealizedType,
}

impl GenerationResponse {
  /// Validate the payload against the challenge invariants and the requested preference.
  pub fn into_challenge(self, preference: TypePreference) -> Result<Challenge, ProviderError> {
    let challenge = match self {
      GenerationResponse::Single(s) => Challenge::single(s.question_type, s.question, s.hint),
      GenerationResponse::Dual(d) => Challenge::new(
        d.question_type_generated,
        d.coding_question,
        d.coding_hint,
        d.conceptual_question,
        d.conceptual_hint,
      ),
    }
    .map_err(ProviderError::Malformed)?;

    let realized = challenge.realized();
    // A single-type preference must get exactly that type, never the dual shape.
    let honoured = match preference {
      TypePreference::Coding => realized == RealizedType::Coding,
      TypePreference::Conceptual => realized == RealizedType::Conceptual,
      TypePreference::Either => true,
    };
    if !honoured {
      return Err(ProviderError::Malformed(format!(
        "asked for {} question, got {:?}",
        preference.as_wire(),
        realized
      )));
    }
    Ok(challenge)
  }
}

#[derive(Debug, Deserialize)]
pub struct GradingResponse {
  pub score: f64,
  pub passed: bool,
  #[serde(default)]
  pub feedback: String,
}

impl TryFrom<GradingResponse> for GradingResult {
  type Error = ProviderError;

  fn try_from(r: GradingResponse) -> Result<Self, Self::Error> {
    if !r.score.is_finite() || !(0.0..=100.0).contains(&r.score) {
      return Err(ProviderError::Malformed(format!("score {} outside 0..=100", r.score)));
    }
    Ok(GradingResult { score: r.score.round() as u8, passed: r.passed, feedback: r.feedback.trim().to_string() })
  }
}

#[derive(Debug, Deserialize)]
pub struct SolutionResponse {
  pub solution: String,
  #[serde(default)]
  pub explanation: Option<String>,
}

impl TryFrom<SolutionResponse> for SolutionReveal {
  type Error = ProviderError;

  fn try_from(r: SolutionResponse) -> Result<Self, Self::Error> {
    if r.solution.trim().is_empty() {
      return Err(ProviderError::Malformed("empty solution".into()));
    }
    let explanation = r.explanation.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
    Ok(SolutionReveal { solution: r.solution, explanation })
  }
}

#[derive(Debug, Deserialize)]
pub struct HintResponse {
  pub hint: String,
}

#[derive(Debug, Deserialize)]
pub struct TopicResponse {
  pub topic: String,
}

/// Reject blank single-field answers (hint, topic).
pub fn non_empty_text(field: &str, value: String) -> Result<String, ProviderError> {
  let v = value.trim();
  if v.is_empty() {
    Err(ProviderError::Malformed(format!("empty {field}")))
  } else {
    Ok(v.to_string())
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_single_question_shape() {
    let json = r#"{"question":"Implement bubble sort","hint":"Think about nested loops","questionType":"coding"}"#;
    let resp: GenerationResponse = serde_json::from_str(json).unwrap();
    let ch = resp.into_challenge(TypePreference::Coding).unwrap();
    assert_eq!(ch.realized(), RealizedType::Coding);
    assert_eq!(ch.question(QuestionType::Coding), Some("Implement bubble sort"));
    assert_eq!(ch.hint(QuestionType::Coding), Some("Think about nested loops"));
  }

  #[test]
  fn parses_dual_question_shape() {
    let json = r#"{
      "codingQuestion":"Write fizzbuzz","codingHint":"Modulo",
      "conceptualQuestion":"What is a loop invariant?",
      "questionTypeGenerated":"both"
    }"#;
    let resp: GenerationResponse = serde_json::from_str(json).unwrap();
    let ch = resp.into_challenge(TypePreference::Either).unwrap();
    assert_eq!(ch.realized(), RealizedType::Both);
    assert_eq!(ch.hint(QuestionType::Conceptual), None);
  }

  #[test]
  fn dual_shape_missing_question_is_malformed() {
    let json = r#"{"codingQuestion":"Write fizzbuzz","questionTypeGenerated":"both"}"#;
    let resp: GenerationResponse = serde_json::from_str(json).unwrap();
    assert!(matches!(resp.into_challenge(TypePreference::Either), Err(ProviderError::Malformed(_))));
  }

  #[test]
  fn ignored_preference_is_malformed() {
    let json = r#"{"question":"Explain recursion","hint":"Base case","questionType":"conceptual"}"#;
    let resp: GenerationResponse = serde_json::from_str(json).unwrap();
    assert!(resp.into_challenge(TypePreference::Coding).is_err());
  }

  #[test]
  fn dual_shape_for_single_preference_is_malformed() {
    let json = r#"{
      "codingQuestion":"Write fizzbuzz",
      "conceptualQuestion":"What is a loop invariant?",
      "questionTypeGenerated":"both"
    }"#;
    let resp: GenerationResponse = serde_json::from_str(json).unwrap();
    assert!(matches!(resp.into_challenge(TypePreference::Coding), Err(ProviderError::Malformed(_))));
    let resp: GenerationResponse = serde_json::from_str(json).unwrap();
    assert!(resp.into_challenge(TypePreference::Conceptual).is_err());
  }

  #[test]
  fn grading_score_must_be_in_range() {
    let ok = GradingResult::try_from(GradingResponse { score: 40.0, passed: false, feedback: " Incomplete ".into() }).unwrap();
    assert_eq!(ok, GradingResult { score: 40, passed: false, feedback: "Incomplete".into() });
    assert!(GradingResult::try_from(GradingResponse { score: 101.0, passed: true, feedback: String::new() }).is_err());
    assert!(GradingResult::try_from(GradingResponse { score: -1.0, passed: false, feedback: String::new() }).is_err());
  }

  #[test]
  fn passed_is_not_recomputed_from_score() {
    let r = GradingResult::try_from(GradingResponse { score: 95.0, passed: false, feedback: "style".into() }).unwrap();
    assert!(!r.passed);
  }

  #[test]
  fn blank_explanation_is_dropped() {
    let s = SolutionReveal::try_from(SolutionResponse { solution: "fn main() {}".into(), explanation: Some("  ".into()) }).unwrap();
    assert_eq!(s.explanation, None);
    assert!(SolutionReveal::try_from(SolutionResponse { solution: " ".into(), explanation: None }).is_err());
  }
}
