use serde::{Deserialize, Serialize};

/// Author of a message in the chat history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

/// New utterance plus the prior turns, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// Model output. `used_tokens` is `None` when the provider reports no usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub used_tokens: Option<u64>,
}

/// Wire form of an [`Answer`]; unreported usage is sent as 0.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerResponse {
    pub text: String,
    pub used_tokens: u64,
}

impl From<Answer> for AnswerResponse {
    fn from(answer: Answer) -> Self {
        Self {
            text: answer.text,
            used_tokens: answer.used_tokens.unwrap_or(0),
        }
    }
}
