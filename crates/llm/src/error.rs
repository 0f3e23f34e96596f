#[derive(Debug, thiserror::Error)]
pub enum LlmError {
  #[error("http request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("request timed out after {0} seconds")]
  Timeout(u64),
  #[error("authentication failed: {0}")]
  Auth(String),
  #[error("server error {status}: {body}")]
  ServerError { status: u16, body: String },
  #[error("rate limited: {0}")]
  RateLimited(String),
  #[error("failed to parse response: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("no choices in chat-completions response")]
  NoResponse,
  #[error("no api key configured (expected env var {0})")]
  MissingApiKey(String),
}

impl LlmError {
  /// Per `5.` external-interface semantics: auth failures are a
  /// configuration problem, not a retry candidate; 5xx/429/timeouts are.
  pub fn is_retryable(&self) -> bool {
    match self {
      LlmError::Request(e) => e.is_timeout() || e.is_connect() || e.status().is_none_or(|s| s.is_server_error() || s.as_u16() == 429),
      LlmError::Timeout(_) | LlmError::RateLimited(_) | LlmError::ServerError { .. } => true,
      LlmError::Auth(_) | LlmError::MissingApiKey(_) | LlmError::ParseError(_) | LlmError::NoResponse => false,
    }
  }
}

pub type Result<T> = std::result::Result<T, LlmError>;
