pub mod openai;

use crate::domain::error::Result;
use crate::domain::llm_config::{ApiCredential, CompletionRequest, CredentialCheck, GatewayOutcome};
use async_trait::async_trait;

pub use openai::OpenAIClient;

/// Boundary to the external completion service.
///
/// `complete` and `validate_credential` never fail: every transport or
/// upstream problem is folded into the returned value. Only the raw model
/// listing surfaces an error, so callers can pick their own fallback.
#[async_trait]
pub trait LLMClient {
    async fn complete(
        &self,
        credential: &ApiCredential,
        request: &CompletionRequest,
    ) -> GatewayOutcome;

    async fn list_models(&self, credential: &ApiCredential) -> Result<Vec<String>>;

    async fn validate_credential(&self, credential: &ApiCredential) -> CredentialCheck {
        if credential.is_blank() {
            return CredentialCheck {
                valid: false,
                message: "API key is required".to_string(),
            };
        }
        match self.list_models(credential).await {
            Ok(_) => CredentialCheck {
                valid: true,
                message: "API key is valid".to_string(),
            },
            Err(e) => {
                tracing::error!(error = %e, "API key validation failed");
                CredentialCheck {
                    valid: false,
                    message: format!("API key validation failed: {}", e),
                }
            }
        }
    }
}
