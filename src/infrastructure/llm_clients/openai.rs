use super::LLMClient;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{ApiCredential, CompletionRequest, GatewayOutcome, TokenUsage};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const EMPTY_RESPONSE: &str = "empty response";

pub struct OpenAIClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        if self.base_url.ends_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn post_completion(
        &self,
        credential: &ApiCredential,
        request: &CompletionRequest,
    ) -> std::result::Result<Value, String> {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.sampling.temperature,
            "max_tokens": request.sampling.max_tokens,
            "top_p": request.sampling.top_p,
            "frequency_penalty": request.sampling.frequency_penalty,
            "presence_penalty": request.sampling.presence_penalty,
        });
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("API error ({}): {}", status, upstream_error_message(&text)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("Failed to parse JSON: {}", e))
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(
        &self,
        credential: &ApiCredential,
        request: &CompletionRequest,
    ) -> GatewayOutcome {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            json_mode = request.json_mode,
            "Sending completion request"
        );

        match self.post_completion(credential, request).await {
            Ok(json) => interpret_completion(&json),
            Err(message) => {
                tracing::error!(model = %request.model, error = %message, "Completion request failed");
                GatewayOutcome::failure(message)
            }
        }
    }

    async fn list_models(&self, credential: &ApiCredential) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLMError(format!(
                "API error ({}): {}",
                status,
                upstream_error_message(&text)
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        let models = json["data"]
            .as_array()
            .ok_or_else(|| {
                AppError::LLMError("Invalid response format: missing data array".to_string())
            })?
            .iter()
            .filter_map(|m| m["id"].as_str())
            .map(|id| id.to_string())
            .collect();

        Ok(models)
    }
}

/// Turns a chat-completion body into an outcome. No choices, or a first
/// choice without text, is a failure rather than an empty success.
pub(crate) fn interpret_completion(json: &Value) -> GatewayOutcome {
    let first_choice = match json.get("choices").and_then(Value::as_array) {
        Some(choices) if !choices.is_empty() => &choices[0],
        _ => return GatewayOutcome::failure(EMPTY_RESPONSE),
    };

    let content = first_choice
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return GatewayOutcome::failure(EMPTY_RESPONSE);
    }

    let usage = &json["usage"];
    GatewayOutcome::Success {
        content: content.to_string(),
        usage: TokenUsage {
            prompt_tokens: usage["prompt_tokens"].as_i64().unwrap_or(0),
            completion_tokens: usage["completion_tokens"].as_i64().unwrap_or(0),
            total_tokens: usage["total_tokens"].as_i64().unwrap_or(0),
        },
    }
}

fn upstream_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm_config::SamplingParams;
    use actix_web::http::StatusCode;
    use actix_web::{web, App, HttpResponse, HttpServer};

    #[test]
    fn test_zero_choices_is_failure() {
        let body = json!({ "choices": [], "usage": { "total_tokens": 3 } });
        assert_eq!(interpret_completion(&body), GatewayOutcome::failure(EMPTY_RESPONSE));
    }

    #[test]
    fn test_missing_or_blank_content_is_failure() {
        let missing = json!({ "choices": [{ "message": { "role": "assistant" } }] });
        let blank = json!({ "choices": [{ "message": { "content": "  " } }] });
        assert!(!interpret_completion(&missing).is_success());
        assert!(!interpret_completion(&blank).is_success());
    }

    #[test]
    fn test_success_carries_usage() {
        let body = json!({
            "choices": [{ "message": { "content": "Hello there" } }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7 }
        });
        assert_eq!(
            interpret_completion(&body),
            GatewayOutcome::Success {
                content: "Hello there".to_string(),
                usage: TokenUsage {
                    prompt_tokens: 5,
                    completion_tokens: 2,
                    total_tokens: 7,
                },
            }
        );
    }

    #[test]
    fn test_upstream_error_message_prefers_error_field() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
        assert_eq!(upstream_error_message(body), "Rate limit reached");
        assert_eq!(upstream_error_message("  plain text "), "plain text");
    }

    async fn spawn_upstream(status: u16, body: Value) -> String {
        let server = HttpServer::new(move || {
            let body = body.clone();
            App::new().default_service(web::route().to(move || {
                let body = body.clone();
                async move {
                    HttpResponse::build(StatusCode::from_u16(status).unwrap()).json(body)
                }
            }))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}/v1", addr)
    }

    fn hello_request() -> CompletionRequest {
        CompletionRequest::from_prompt("gpt-4o", None, "hi", SamplingParams::default(), true)
    }

    #[actix_web::test]
    async fn test_rate_limited_upstream_becomes_failure() {
        let base_url = spawn_upstream(
            429,
            json!({ "error": { "message": "Rate limit reached" } }),
        )
        .await;
        let client = OpenAIClient::new(&base_url);
        let outcome = client
            .complete(&ApiCredential::new("sk-test"), &hello_request())
            .await;
        match outcome {
            GatewayOutcome::Failure { message } => {
                assert!(message.contains("429"));
                assert!(message.contains("Rate limit reached"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_upstream_without_choices_becomes_failure() {
        let base_url = spawn_upstream(200, json!({ "choices": [] })).await;
        let client = OpenAIClient::new(&base_url);
        let outcome = client
            .complete(&ApiCredential::new("sk-test"), &hello_request())
            .await;
        assert_eq!(outcome, GatewayOutcome::failure(EMPTY_RESPONSE));
    }

    #[actix_web::test]
    async fn test_unreachable_upstream_becomes_failure() {
        let client = OpenAIClient::new("http://127.0.0.1:9/v1");
        let outcome = client
            .complete(&ApiCredential::new("sk-test"), &hello_request())
            .await;
        assert!(!outcome.is_success());
    }

    #[actix_web::test]
    async fn test_list_models_reads_data_ids() {
        let base_url = spawn_upstream(
            200,
            json!({ "data": [{ "id": "gpt-4o" }, { "id": "gpt-3.5-turbo" }] }),
        )
        .await;
        let client = OpenAIClient::new(&base_url);
        let models = client
            .list_models(&ApiCredential::new("sk-test"))
            .await
            .unwrap();
        assert_eq!(models, vec!["gpt-4o".to_string(), "gpt-3.5-turbo".to_string()]);

        let check = client
            .validate_credential(&ApiCredential::new("sk-test"))
            .await;
        assert!(check.valid);
    }

    #[actix_web::test]
    async fn test_blank_key_is_invalid_without_network() {
        let client = OpenAIClient::new("http://127.0.0.1:9/v1");
        let check = client.validate_credential(&ApiCredential::new(" ")).await;
        assert!(!check.valid);
        assert_eq!(check.message, "API key is required");
    }
}
