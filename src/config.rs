//! Loading agent configuration (prompt overrides) from TOML.
//!
//! See `AgentConfig` and `Prompts` for expected schema. Every template uses
//! `{key}` placeholders filled by `util::fill_template`.

use serde::Deserialize;
use tracing::{info, error};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompts used by the OpenAI provider. Defaults target programming practice.
/// Any field left out of the TOML keeps its default.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Question generation ({topic}, {difficulty}, {preference})
  pub question_system: String,
  pub question_user_template: String,
  /// Used when the learner accepts either type; asks for the dual shape.
  pub dual_question_user_template: String,
  // Grading
  pub code_grading_system: String,
  pub code_grading_user_template: String,
  pub answer_grading_system: String,
  pub answer_grading_user_template: String,
  // Reference solution
  pub solution_system: String,
  pub solution_user_template: String,
  // Hint on demand
  pub hint_system: String,
  pub hint_user_template: String,
  // Topic suggestion
  pub topic_system: String,
  pub topic_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_system: "You are an expert in writing coding and conceptual programming questions for learners, each with one helpful hint. Respond ONLY with strict JSON.".into(),
      question_user_template: "Topic: {topic}\nDifficulty: {difficulty}\nPreferred question type: {preference}\n\nIf the preference is 'coding' you MUST write a coding task. If it is 'conceptual' you MUST write a conceptual question.\nAlso write ONE concise, actionable hint that points at a key concept, approach or pitfall. The hint must not give away the solution and must not contain code.\nReturn JSON {\"question\": string, \"hint\": string, \"questionType\": \"coding\" | \"conceptual\"}.".into(),
      dual_question_user_template: "Topic: {topic}\nDifficulty: {difficulty}\n\nWrite one coding task AND one conceptual question on this topic, each with ONE concise hint that does not reveal the solution and contains no code.\nReturn JSON {\"codingQuestion\": string, \"codingHint\": string, \"conceptualQuestion\": string, \"conceptualHint\": string, \"questionTypeGenerated\": \"both\"}.".into(),
      code_grading_system: "You are a strict but encouraging code reviewer grading a learner's solution. Reply as compact JSON.".into(),
      code_grading_user_template: "Topic: {topic}\nDifficulty: {difficulty}\nCode:\n```\n{code}\n```\n\nGrade correctness, clarity and fit for the difficulty.\nReturn JSON {\"score\": integer 0-100, \"passed\": boolean, \"feedback\": string}. 'passed' = true if score >= 70.".into(),
      answer_grading_system: "You are a programming tutor grading a learner's answer to a conceptual question. Reply as compact JSON.".into(),
      answer_grading_user_template: "Topic: {topic}\nDifficulty: {difficulty}\nQuestion: {question}\nAnswer: {answer}\n\nReturn JSON {\"score\": integer 0-100, \"passed\": boolean, \"feedback\": string}. 'passed' = true if score >= 70.".into(),
      solution_system: "You are a programming tutor writing model answers. Reply as compact JSON.".into(),
      solution_user_template: "Topic: {topic}\nDifficulty: {difficulty}\nQuestion type: {question_type}\nQuestion: {question}\n\nWrite a reference solution (code for coding tasks, prose for conceptual questions) and a short explanation.\nReturn JSON {\"solution\": string, \"explanation\": string}.".into(),
      hint_system: "You are an expert programming tutor. Give ONE concise, actionable hint. Never reveal the solution or include code. Reply as compact JSON.".into(),
      hint_user_template: "Question: {question}\nTopic: {topic}\nDifficulty: {difficulty}\nReturn JSON {\"hint\": string}.".into(),
      topic_system: "You are a programming tutor. Reply as compact JSON.".into(),
      topic_user_template: "Suggest one programming topic a {difficulty} learner can study and practice. Keep it to a few words.\nReturn JSON {\"topic\": string}.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "codecrafter", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "codecrafter", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "codecrafter", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_agent_config(s: &str) -> Result<AgentConfig, toml::de::Error> {
  toml::from_str::<AgentConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_prompt_override_keeps_defaults() {
    let cfg = parse_agent_config(
      r#"
        [prompts]
        hint_system = "Be brief."
      "#,
    )
    .unwrap();
    assert_eq!(cfg.prompts.hint_system, "Be brief.");
    assert_eq!(cfg.prompts.solution_system, Prompts::default().solution_system);
  }

  #[test]
  fn empty_file_is_all_defaults() {
    let cfg = parse_agent_config("").unwrap();
    assert_eq!(cfg.prompts.topic_user_template, Prompts::default().topic_user_template);
  }
}
