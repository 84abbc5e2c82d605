//! Minimal OpenAI client implementing `ChallengeProvider`.
//!
//! We only call chat.completions and always request a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to avoid PII leaks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Challenge, Difficulty, GradingResult, SolutionReveal, TypePreference};
use crate::error::ProviderError;
use crate::providers::{
  non_empty_text, AnswerGradingRequest, ChallengeProvider, CodeGradingRequest, GenerationRequest,
  GenerationResponse, GradingResponse, HintRequest, HintResponse, SolutionRequest, SolutionResponse,
  TopicResponse,
};
use crate::util::{fill_template, trunc_for_log};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub prompts: Prompts,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());
    let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(30);

    match Self::new(api_key, base_url, fast_model, strong_model, Duration::from_secs(timeout_secs), prompts) {
      Ok(oa) => Some(oa),
      Err(e) => {
        error!(target: "codecrafter", error = %e, "Failed to build HTTP client");
        None
      }
    }
  }

  pub fn new(
    api_key: String,
    base_url: String,
    fast_model: String,
    strong_model: String,
    timeout: Duration,
    prompts: Prompts,
  ) -> Result<Self, ProviderError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ProviderError::Transport(e.to_string()))?;
    let base_url = base_url.trim_end_matches('/').to_string();
    Ok(Self { client, api_key, base_url, fast_model, strong_model, prompts })
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, ProviderError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: None,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "codecrafter-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| ProviderError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      error!(elapsed = ?start.elapsed(), status = status.as_u16(), "OpenAI call failed");
      return Err(ProviderError::Status { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse =
      res.json().await.map_err(|e| ProviderError::Malformed(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Model response received");
    debug!(preview = %trunc_for_log(&text, 120), "Model response preview");

    serde_json::from_str::<T>(&text).map_err(|e| ProviderError::Malformed(format!("JSON parse error: {}", e)))
  }
}

#[async_trait]
impl ChallengeProvider for OpenAI {
  #[instrument(level = "info", skip(self, req), fields(topic_len = req.topic.len(), difficulty = %req.difficulty, preference = req.type_preference.as_wire()))]
  async fn generate_challenge(&self, req: &GenerationRequest) -> Result<Challenge, ProviderError> {
    let p = &self.prompts;
    let template = match req.type_preference {
      TypePreference::Either => &p.dual_question_user_template,
      TypePreference::Coding | TypePreference::Conceptual => &p.question_user_template,
    };
    let user = fill_template(
      template,
      &[
        ("topic", req.topic.as_str()),
        ("difficulty", req.difficulty.as_str()),
        ("preference", req.type_preference.as_wire()),
      ],
    );
    let resp: GenerationResponse = self.chat_json(&self.strong_model, &p.question_system, &user, 0.9).await?;
    let challenge = resp.into_challenge(req.type_preference)?;
    info!(realized = ?challenge.realized(), "Challenge generated");
    Ok(challenge)
  }

  #[instrument(level = "info", skip(self, req), fields(code_len = req.code.len(), difficulty = %req.difficulty))]
  async fn grade_code(&self, req: &CodeGradingRequest) -> Result<GradingResult, ProviderError> {
    let p = &self.prompts;
    let user = fill_template(
      &p.code_grading_user_template,
      &[("topic", req.topic.as_str()), ("difficulty", req.difficulty.as_str()), ("code", req.code.as_str())],
    );
    let resp: GradingResponse = self.chat_json(&self.strong_model, &p.code_grading_system, &user, 0.2).await?;
    GradingResult::try_from(resp)
  }

  #[instrument(level = "info", skip(self, req), fields(answer_len = req.user_answer.len(), difficulty = %req.difficulty))]
  async fn grade_conceptual(&self, req: &AnswerGradingRequest) -> Result<GradingResult, ProviderError> {
    let p = &self.prompts;
    let user = fill_template(
      &p.answer_grading_user_template,
      &[
        ("topic", req.topic.as_str()),
        ("difficulty", req.difficulty.as_str()),
        ("question", req.question.as_str()),
        ("answer", req.user_answer.as_str()),
      ],
    );
    let resp: GradingResponse = self.chat_json(&self.strong_model, &p.answer_grading_system, &user, 0.2).await?;
    GradingResult::try_from(resp)
  }

  #[instrument(level = "info", skip(self, req), fields(question_len = req.question.len(), question_type = %req.question_type))]
  async fn generate_solution(&self, req: &SolutionRequest) -> Result<SolutionReveal, ProviderError> {
    let p = &self.prompts;
    let user = fill_template(
      &p.solution_user_template,
      &[
        ("topic", req.topic.as_str()),
        ("difficulty", req.difficulty.as_str()),
        ("question_type", req.question_type.as_str()),
        ("question", req.question.as_str()),
      ],
    );
    let resp: SolutionResponse = self.chat_json(&self.strong_model, &p.solution_system, &user, 0.3).await?;
    SolutionReveal::try_from(resp)
  }

  #[instrument(level = "info", skip(self, req), fields(question_len = req.question.len()))]
  async fn generate_hint(&self, req: &HintRequest) -> Result<String, ProviderError> {
    let p = &self.prompts;
    let user = fill_template(
      &p.hint_user_template,
      &[("question", req.question.as_str()), ("topic", req.topic.as_str()), ("difficulty", req.difficulty.as_str())],
    );
    let resp: HintResponse = self.chat_json(&self.fast_model, &p.hint_system, &user, 0.3).await?;
    non_empty_text("hint", resp.hint)
  }

  #[instrument(level = "info", skip(self), fields(%difficulty))]
  async fn suggest_topic(&self, difficulty: Difficulty) -> Result<String, ProviderError> {
    let p = &self.prompts;
    let user = fill_template(&p.topic_user_template, &[("difficulty", difficulty.as_str())]);
    let resp: TopicResponse = self.chat_json(&self.fast_model, &p.topic_system, &user, 0.9).await?;
    non_empty_text("topic", resp.topic)
  }

  fn name(&self) -> &str { "openai" }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
