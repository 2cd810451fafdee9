use crate::domain::llm_config::{
    ApiCredential, CompletionRequest, CredentialCheck, GatewayOutcome, SamplingParams, TokenUsage,
    DEFAULT_MODEL,
};
use crate::infrastructure::llm_clients::LLMClient;
use serde::Serialize;
use std::sync::Arc;

pub const FALLBACK_MODELS: [&str; 3] = ["gpt-4o", "gpt-4", "gpt-3.5-turbo"];

const GREETING_PROMPT: &str = "Hello, please respond with a simple greeting.";

/// Result of the end-to-end connection check run from the command line.
#[derive(Debug, Serialize, Clone)]
pub struct ConnectionReport {
    pub check: CredentialCheck,
    pub models: Vec<String>,
    pub greeting: Option<String>,
    pub usage: TokenUsage,
    pub error: Option<String>,
}

impl ConnectionReport {
    pub fn succeeded(&self) -> bool {
        self.check.valid && self.error.is_none()
    }
}

pub struct ConnectionUseCase {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
}

impl ConnectionUseCase {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>) -> Self {
        Self { llm_client }
    }

    pub async fn validate(&self, credential: &ApiCredential) -> CredentialCheck {
        self.llm_client.validate_credential(credential).await
    }

    /// Chat models offered to the user. Never empty: any listing failure
    /// yields the fixed fallback set.
    pub async fn available_models(&self, credential: &ApiCredential) -> Vec<String> {
        match self.llm_client.list_models(credential).await {
            Ok(models) => select_chat_models(models),
            Err(e) => {
                tracing::error!(error = %e, "Error fetching models, using fallback list");
                fallback_models()
            }
        }
    }

    /// Validates the key, then asks for a short greeting to prove the
    /// completion endpoint answers.
    pub async fn check(&self, credential: &ApiCredential) -> ConnectionReport {
        let check = self.validate(credential).await;
        if !check.valid {
            return ConnectionReport {
                error: Some(check.message.clone()),
                check,
                models: Vec::new(),
                greeting: None,
                usage: TokenUsage::default(),
            };
        }

        let models = self.available_models(credential).await;
        let request = CompletionRequest::from_prompt(
            DEFAULT_MODEL,
            None,
            GREETING_PROMPT,
            SamplingParams {
                max_tokens: 50,
                ..SamplingParams::default()
            },
            false,
        );

        match self.llm_client.complete(credential, &request).await {
            GatewayOutcome::Success { content, usage } => ConnectionReport {
                check,
                models,
                greeting: Some(content),
                usage,
                error: None,
            },
            GatewayOutcome::Failure { message } => ConnectionReport {
                check,
                models,
                greeting: None,
                usage: TokenUsage::default(),
                error: Some(message),
            },
        }
    }
}

/// Keeps GPT chat models, makes sure `gpt-4o` is offered and orders
/// `gpt-4o*` first, other `gpt-4*` next, the rest last.
pub fn select_chat_models(models: Vec<String>) -> Vec<String> {
    let mut chat_models: Vec<String> = models
        .into_iter()
        .filter(|id| id.contains("gpt-4") || id.contains("gpt-3.5"))
        .collect();

    if !chat_models.iter().any(|id| id == DEFAULT_MODEL) {
        chat_models.push(DEFAULT_MODEL.to_string());
    }

    chat_models.sort_by_key(|id| model_priority(id));
    chat_models
}

fn model_priority(id: &str) -> u8 {
    if id.contains("gpt-4o") {
        0
    } else if id.contains("gpt-4") {
        1
    } else {
        2
    }
}

fn fallback_models() -> Vec<String> {
    FALLBACK_MODELS.iter().map(|id| id.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::ScriptedClient;
    use crate::domain::error::{AppError, Result};
    use async_trait::async_trait;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_select_filters_and_orders_by_family() {
        let selected = select_chat_models(ids(&[
            "whisper-1",
            "gpt-3.5-turbo",
            "gpt-4-turbo",
            "dall-e-3",
            "gpt-4o-mini",
            "gpt-4o",
        ]));
        assert_eq!(
            selected,
            ids(&["gpt-4o-mini", "gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"])
        );
    }

    #[test]
    fn test_select_always_offers_default_model() {
        let selected = select_chat_models(ids(&["gpt-3.5-turbo", "text-embedding-3-small"]));
        assert_eq!(selected, ids(&["gpt-4o", "gpt-3.5-turbo"]));
    }

    struct BrokenListing;

    #[async_trait]
    impl LLMClient for BrokenListing {
        async fn complete(&self, _: &ApiCredential, _: &CompletionRequest) -> GatewayOutcome {
            GatewayOutcome::failure("unused")
        }

        async fn list_models(&self, _: &ApiCredential) -> Result<Vec<String>> {
            Err(AppError::LLMError("API error (401 Unauthorized): bad key".to_string()))
        }
    }

    #[tokio::test]
    async fn test_listing_failure_uses_fallback() {
        let use_case = ConnectionUseCase::new(Arc::new(BrokenListing));
        let models = use_case.available_models(&ApiCredential::new("sk-bad")).await;
        assert_eq!(models, ids(&FALLBACK_MODELS));

        let check = use_case.validate(&ApiCredential::new("sk-bad")).await;
        assert!(!check.valid);
        assert!(check.message.starts_with("API key validation failed"));
    }

    #[tokio::test]
    async fn test_check_reports_greeting_and_usage() {
        let client = ScriptedClient::new(vec![ScriptedClient::success("Hello there!")]);
        let use_case = ConnectionUseCase::new(client.clone());

        let report = use_case.check(&ApiCredential::new("sk-test")).await;
        assert!(report.succeeded());
        assert_eq!(report.greeting.as_deref(), Some("Hello there!"));
        assert_eq!(report.usage.total_tokens, 30);
        assert_eq!(report.models, ids(&["gpt-4o"]));
        assert_eq!(client.requests()[0].sampling.max_tokens, 50);
    }

    #[tokio::test]
    async fn test_check_blank_key_skips_network() {
        let client = ScriptedClient::new(vec![]);
        let use_case = ConnectionUseCase::new(client.clone());

        let report = use_case.check(&ApiCredential::new(" ")).await;
        assert!(!report.succeeded());
        assert_eq!(report.error.as_deref(), Some("API key is required"));
        assert!(client.requests().is_empty());
    }
}
