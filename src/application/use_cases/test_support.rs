use crate::domain::error::Result;
use crate::domain::llm_config::{ApiCredential, CompletionRequest, GatewayOutcome, TokenUsage};
use crate::infrastructure::llm_clients::LLMClient;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Gateway double that replays queued outcomes and records every request.
pub(crate) struct ScriptedClient {
    outcomes: Mutex<VecDeque<GatewayOutcome>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(outcomes: Vec<GatewayOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn success(content: &str) -> GatewayOutcome {
        GatewayOutcome::Success {
            content: content.to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            },
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for ScriptedClient {
    async fn complete(
        &self,
        _credential: &ApiCredential,
        request: &CompletionRequest,
    ) -> GatewayOutcome {
        self.requests.lock().unwrap().push(request.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| GatewayOutcome::failure("no scripted response"))
    }

    async fn list_models(&self, _credential: &ApiCredential) -> Result<Vec<String>> {
        Ok(vec!["gpt-4o".to_string()])
    }
}
