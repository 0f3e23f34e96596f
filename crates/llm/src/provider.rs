use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::error::{LlmError, Result};

/// A single-prompt chat-completions request.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
  pub prompt: String,
  pub system_prompt: Option<String>,
  pub model: String,
  pub timeout_secs: u64,
}

impl InferenceRequest {
  pub fn new(prompt: impl Into<String>) -> Self {
    Self { prompt: prompt.into(), system_prompt: None, model: String::new(), timeout_secs: 60 }
  }

  pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
    self.system_prompt = Some(system_prompt.into());
    self
  }

  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = model.into();
    self
  }

  pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
    self.timeout_secs = timeout_secs;
    self
  }
}

#[derive(Debug, Clone)]
pub struct InferenceResponse {
  pub text: String,
  pub input_tokens: u32,
  pub output_tokens: u32,
  pub duration_ms: u64,
}

/// An OpenAI-chat-completions-compatible inference backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
  fn name(&self) -> &str;
  fn model_id(&self) -> &str;

  async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse>;
  async fn is_available(&self) -> bool;
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat-completions client. Request: single-prompt message (plus optional
/// system prompt). Response: the assistant's text content, which callers
/// parse for the `Summary:`/`Purpose:` block themselves (see `prompts`).
#[derive(Debug, Clone)]
pub struct HttpLlmProvider {
  client: reqwest::Client,
  base_url: String,
  model: String,
  api_key: String,
}

impl HttpLlmProvider {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: DEFAULT_BASE_URL.to_string(),
      model: DEFAULT_MODEL.to_string(),
      api_key: api_key.into(),
    }
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = model.into();
    self
  }

  pub fn from_env(api_key_env: &str) -> Result<Self> {
    let api_key = std::env::var(api_key_env).map_err(|_| LlmError::MissingApiKey(api_key_env.to_string()))?;
    Ok(Self::new(api_key))
  }
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage<'a>>,
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)]
  usage: Option<ChatUsage>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
  message: ChatResponseMessage,
}

#[derive(serde::Deserialize)]
struct ChatResponseMessage {
  content: String,
}

#[derive(serde::Deserialize, Default)]
struct ChatUsage {
  #[serde(default)]
  prompt_tokens: u32,
  #[serde(default)]
  completion_tokens: u32,
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
  fn name(&self) -> &str {
    "http-chat-completions"
  }

  fn model_id(&self) -> &str {
    &self.model
  }

  async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse> {
    let model = if request.model.is_empty() { self.model.clone() } else { request.model.clone() };

    let mut messages = Vec::with_capacity(2);
    if let Some(system_prompt) = request.system_prompt.as_deref() {
      messages.push(ChatMessage { role: "system", content: system_prompt });
    }
    messages.push(ChatMessage { role: "user", content: &request.prompt });

    let body = ChatRequest { model: &model, messages };

    let started = Instant::now();
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let response = self
      .client
      .post(url)
      .header("Authorization", format!("Bearer {}", self.api_key))
      .header("Content-Type", "application/json")
      .timeout(Duration::from_secs(request.timeout_secs))
      .json(&body)
      .send()
      .await
      .map_err(|e| if e.is_timeout() { LlmError::Timeout(request.timeout_secs) } else { LlmError::Request(e) })?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
      let body = response.text().await.unwrap_or_default();
      return Err(LlmError::Auth(body));
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
      let body = response.text().await.unwrap_or_default();
      return Err(LlmError::RateLimited(body));
    }
    if status.is_server_error() {
      let body = response.text().await.unwrap_or_default();
      return Err(LlmError::ServerError { status: status.as_u16(), body });
    }
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(LlmError::ServerError { status: status.as_u16(), body });
    }

    let parsed: ChatResponse = response.json().await?;
    let text = parsed.choices.into_iter().next().map(|c| c.message.content).ok_or(LlmError::NoResponse)?;
    let usage = parsed.usage.unwrap_or_default();

    Ok(InferenceResponse {
      text,
      input_tokens: usage.prompt_tokens,
      output_tokens: usage.completion_tokens,
      duration_ms: started.elapsed().as_millis() as u64,
    })
  }

  async fn is_available(&self) -> bool {
    !self.api_key.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn inference_request_builder_sets_fields() {
    let request = InferenceRequest::new("hi").with_system_prompt("sys").with_model("gpt-x").with_timeout_secs(30);
    assert_eq!(request.prompt, "hi");
    assert_eq!(request.system_prompt.as_deref(), Some("sys"));
    assert_eq!(request.model, "gpt-x");
    assert_eq!(request.timeout_secs, 30);
  }

  #[tokio::test]
  async fn is_available_reflects_api_key_presence() {
    assert!(HttpLlmProvider::new("key").is_available().await);
    assert!(!HttpLlmProvider::new("").is_available().await);
  }

  #[test]
  fn from_env_errors_without_var() {
    unsafe {
      std::env::remove_var("LLM_TEST_MISSING_KEY");
    }
    let err = HttpLlmProvider::from_env("LLM_TEST_MISSING_KEY").unwrap_err();
    assert!(matches!(err, LlmError::MissingApiKey(_)));
  }

  #[test]
  fn auth_errors_are_not_retryable() {
    let err = LlmError::Auth("bad key".to_string());
    assert!(!err.is_retryable());
  }

  #[test]
  fn server_errors_are_retryable() {
    let err = LlmError::ServerError { status: 503, body: "".to_string() };
    assert!(err.is_retryable());
  }
}
