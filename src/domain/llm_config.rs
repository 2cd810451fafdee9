use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Bearer credential for the upstream completion API.
///
/// Threaded explicitly from the request boundary into every collaborator;
/// `Debug` never prints the key itself.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential(String);

impl ApiCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiCredential(***)")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_penalties"))]
pub struct SamplingParams {
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
    #[validate(range(min = 1, max = 128000))]
    pub max_tokens: u32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

fn validate_penalties(params: &SamplingParams) -> std::result::Result<(), ValidationError> {
    let in_range = |value: f32| (-2.0..=2.0).contains(&value);
    if in_range(params.frequency_penalty) && in_range(params.presence_penalty) {
        Ok(())
    } else {
        Err(ValidationError::new("penalty_out_of_range"))
    }
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
    pub json_mode: bool,
}

impl CompletionRequest {
    /// System message (skipped when blank) followed by the user prompt.
    pub fn from_prompt(
        model: &str,
        system_message: Option<&str>,
        prompt: &str,
        sampling: SamplingParams,
        json_mode: bool,
    ) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_message.filter(|value| !value.trim().is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        Self {
            model: model.to_string(),
            messages,
            sampling,
            json_mode,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

/// Result envelope of a gateway call. Transport, auth and format problems
/// all land in `Failure`; nothing escapes the gateway as an error.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    Success { content: String, usage: TokenUsage },
    Failure { message: String },
}

impl GatewayOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        GatewayOutcome::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GatewayOutcome::Success { .. })
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CredentialCheck {
    pub valid: bool,
    pub message: String,
}
