//! Minimal OpenAI-compatible client used as the question generation service.
//!
//! We only call chat.completions and request plain text; a question reply is split
//! into questions on blank lines, an explanation reply is used as-is. Calls are instrumented and log model names, latencies,
//! and response sizes (not contents).
//!
//! NOTE: We never log the API key or the document text.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::{GenerationCfg, Prompts};
use crate::domain::QuestionKind;
use crate::generator::{ExplanationRequest, GenerationRequest, QuestionGenerator};
use crate::util::{fill_template, split_questions, trunc_for_log};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
  pub prompts: Prompts,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts, generation: &GenerationCfg) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    Self::new(api_key, base_url, model, prompts, generation).ok()
  }

  pub fn new(
    api_key: String,
    base_url: String,
    model: String,
    prompts: Prompts,
    generation: &GenerationCfg,
  ) -> Result<Self, String> {
    // Slightly above the bank's own deadline so the bank reports the timeout.
    let client = reqwest::Client::builder()
      .timeout(generation.timeout() + Duration::from_secs(5))
      .build()
      .map_err(|e| e.to_string())?;

    Ok(Self {
      client,
      api_key,
      base_url: base_url.trim_end_matches('/').to_string(),
      model,
      temperature: generation.temperature,
      prompts,
    })
  }

  /// Render the user message for a request from the configured templates.
  pub fn user_prompt(&self, request: &GenerationRequest<'_>) -> String {
    let tpl = match request.kind {
      QuestionKind::MultipleChoice => &self.prompts.multiple_choice_user_template,
      QuestionKind::ShortAnswer => &self.prompts.short_answer_user_template,
      QuestionKind::Custom => &self.prompts.custom_user_template,
    };
    let count = request.count.to_string();
    fill_template(
      tpl,
      &[
        ("text", request.document_text),
        ("count", count.as_str()),
        ("prompt", request.custom_prompt.unwrap_or_default()),
      ],
    )
  }

  /// Render the user message asking for an answer explanation.
  pub fn explanation_prompt(&self, request: &ExplanationRequest<'_>) -> String {
    let tpl = match request.kind {
      QuestionKind::MultipleChoice => &self.prompts.multiple_choice_explanation_template,
      QuestionKind::ShortAnswer => &self.prompts.short_answer_explanation_template,
      QuestionKind::Custom => &self.prompts.custom_explanation_template,
    };
    fill_template(
      tpl,
      &[("text", request.document_text), ("question", request.question), ("answer", request.answer)],
    )
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model, user_len = user.len()))]
  async fn chat_plain(&self, system: &str, user: &str) -> Result<String, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: self.temperature,
      max_tokens: None,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "quizbank-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    Ok(text)
  }
}

#[async_trait]
impl QuestionGenerator for OpenAI {
  #[instrument(
    level = "info",
    skip(self, request),
    fields(kind = %request.kind, count = request.count, text_len = request.document_text.len())
  )]
  async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<String>, String> {
    let user = self.user_prompt(request);
    let start = Instant::now();
    let result = self.chat_plain(&self.prompts.question_system, &user).await;
    let elapsed = start.elapsed();

    match result {
      Ok(reply) => {
        let questions = split_questions(&reply, request.count);
        info!(?elapsed, reply_len = reply.len(), questions = questions.len(), "Model response received");
        Ok(questions)
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during question generation");
        Err(format!("Model generation failed: {e}"))
      }
    }
  }

  #[instrument(level = "info", skip(self, request), fields(kind = %request.kind, answer_len = request.answer.len()))]
  async fn explain(&self, request: &ExplanationRequest<'_>) -> Result<String, String> {
    let user = self.explanation_prompt(request);
    let start = Instant::now();
    let result = self.chat_plain(&self.prompts.explanation_system, &user).await;
    let elapsed = start.elapsed();

    match result {
      Ok(reply) => {
        info!(?elapsed, reply_len = reply.len(), "Explanation received");
        Ok(reply)
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during answer explanation");
        Err(format!("Model explanation failed: {e}"))
      }
    }
  }

  fn name(&self) -> &str {
    "openai"
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

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
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
