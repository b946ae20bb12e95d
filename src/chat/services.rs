use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::chat::dto::{Answer, Question, Role};
use crate::config::LlmConfig;

pub const SYSTEM_PROMPT: &str = "You are friendly assistant";

/// Failure talking to the model provider. No variant is retried.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid provider response: {0}")]
    Decode(String),
    #[error("provider returned no completion")]
    EmptyCompletion,
}

/// Turns a question and its history into an answer.
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn execute(&self, question: &Question) -> Result<Answer, LlmError>;
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u64>,
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::Human => "user",
    }
}

/// System prompt, then history in the given order, then the new question.
pub fn build_messages(question: &Question) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(question.history.len() + 2);
    messages.push(WireMessage {
        role: "system".into(),
        content: SYSTEM_PROMPT.into(),
    });
    messages.extend(question.history.iter().map(|m| WireMessage {
        role: wire_role(m.role).into(),
        content: m.text.clone(),
    }));
    messages.push(WireMessage {
        role: "user".into(),
        content: question.text.clone(),
    });
    messages
}

fn parse_answer(body: &[u8]) -> Result<Answer, LlmError> {
    let decoded: ChatCompletionResponse =
        serde_json::from_slice(body).map_err(|e| LlmError::Decode(e.to_string()))?;
    let text = decoded
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.is_empty())
        .ok_or(LlmError::EmptyCompletion)?;
    Ok(Answer {
        text,
        used_tokens: decoded.usage.and_then(|u| u.total_tokens),
    })
}

/// Client for any OpenAI-compatible `/v1/chat/completions` endpoint
/// (Ollama in the default setup).
pub struct OpenAiCompatLlmService {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatLlmService {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model_name.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl LlmService for OpenAiCompatLlmService {
    #[instrument(skip_all, fields(history = question.history.len()))]
    async fn execute(&self, question: &Question) -> Result<Answer, LlmError> {
        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_messages(question),
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "llm request failed");
            LlmError::Transport(e)
        })?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&body).into_owned();
            error!(%status, "llm provider error");
            return Err(LlmError::Status { status, body });
        }

        let answer = parse_answer(&body)?;
        debug!(used_tokens = ?answer.used_tokens, "llm answered");
        Ok(answer)
    }
}
