mod llm_output;
pub mod prompts;

use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{ApiCredential, CompletionRequest, GatewayOutcome, SamplingParams, DEFAULT_MODEL};
use crate::domain::questionnaire::{ItemType, Questionnaire, QuestionnaireItem, QuestionnaireSelection};
use crate::infrastructure::db::{MedicalCaseRepository, QuestionnaireRepository};
use crate::infrastructure::llm_clients::LLMClient;
use std::sync::Arc;

use llm_output::{parse_questionnaire, PayloadQuality};
use prompts::{build_questionnaire_prompt, QUESTIONNAIRE_SYSTEM_MESSAGE};

pub const GENERATION_FAILED_FLOW: &str = "Failed to generate questionnaire items.";

/// Shown for populated cases stored before the flow narrative was persisted.
pub const LEGACY_FLOW_PLACEHOLDER: &str = "Begin with open-ended questions about the chief complaint. \
Proceed to more specific questions about onset, duration, and severity. \
Then explore past medical history, medications, and allergies. \
Complete the interview with review of systems and social history.";

/// Interview plan per case. A case without stored items is generated on
/// first read; once items exist every read is a plain lookup.
pub struct QuestionnaireUseCase {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    cases: MedicalCaseRepository,
    items: QuestionnaireRepository,
}

impl QuestionnaireUseCase {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        cases: MedicalCaseRepository,
        items: QuestionnaireRepository,
    ) -> Self {
        Self {
            llm_client,
            cases,
            items,
        }
    }

    /// A failed upstream call stores nothing and returns empty lists, so the
    /// next read tries again.
    pub async fn get_questionnaire(
        &self,
        credential: Option<&ApiCredential>,
        case_id: i64,
    ) -> Result<Questionnaire> {
        let detail = self.cases.get_case(case_id).await?;

        let stored = self.items.list_items(case_id).await?;
        if !stored.is_empty() {
            return Ok(from_items(stored, detail.case.questionnaire_flow));
        }

        let credential = credential
            .ok_or_else(|| AppError::CredentialError("API key is required".to_string()))?;

        let request = questionnaire_request(&build_questionnaire_prompt(&detail));
        let content = match self.llm_client.complete(credential, &request).await {
            GatewayOutcome::Success { content, .. } => content,
            GatewayOutcome::Failure { message } => {
                tracing::warn!(case_id, error = %message, "Questionnaire generation failed");
                return Ok(Questionnaire {
                    questions: Vec::new(),
                    exams: Vec::new(),
                    questionnaire_flow: GENERATION_FAILED_FLOW.to_string(),
                });
            }
        };

        let generated = parse_generated(case_id, &content);
        if !self.items.populate(case_id, &generated).await? {
            tracing::info!(case_id, "Questionnaire populated concurrently, keeping stored items");
        }
        self.load_stored(case_id).await
    }

    /// Always asks the gateway and replaces whatever is stored.
    pub async fn regenerate(&self, credential: &ApiCredential, case_id: i64) -> Result<Questionnaire> {
        let detail = self.cases.get_case(case_id).await?;

        let request = questionnaire_request(&build_questionnaire_prompt(&detail));
        let content = match self.llm_client.complete(credential, &request).await {
            GatewayOutcome::Success { content, .. } => content,
            GatewayOutcome::Failure { message } => {
                tracing::error!(case_id, error = %message, "Questionnaire regeneration failed");
                return Err(AppError::LLMError(message));
            }
        };

        let generated = parse_generated(case_id, &content);
        self.items.replace(case_id, &generated).await?;
        self.load_stored(case_id).await
    }

    pub async fn list_items(&self, case_id: i64) -> Result<Vec<QuestionnaireItem>> {
        self.items.list_items(case_id).await
    }

    /// Returns `false` when the store rejected the update; nothing is kept then.
    pub async fn save_selection(&self, selection: &QuestionnaireSelection) -> bool {
        match self
            .items
            .save_selection(selection.case_id, &selection.questions, &selection.exams)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(case_id = selection.case_id, error = %e, "Failed to save questionnaire selection");
                false
            }
        }
    }

    async fn load_stored(&self, case_id: i64) -> Result<Questionnaire> {
        let items = self.items.list_items(case_id).await?;
        let flow = self.items.stored_flow(case_id).await?;
        Ok(from_items(items, flow))
    }
}

fn questionnaire_request(prompt: &str) -> CompletionRequest {
    let sampling = SamplingParams {
        temperature: 0.7,
        max_tokens: 2000,
        ..SamplingParams::default()
    };
    CompletionRequest::from_prompt(
        DEFAULT_MODEL,
        Some(QUESTIONNAIRE_SYSTEM_MESSAGE),
        prompt,
        sampling,
        true,
    )
}

fn parse_generated(case_id: i64, content: &str) -> Questionnaire {
    let (questionnaire, quality) = parse_questionnaire(content);
    if quality != PayloadQuality::Clean {
        tracing::warn!(case_id, quality = ?quality, "Questionnaire payload was not clean JSON");
    }
    questionnaire
}

fn from_items(items: Vec<QuestionnaireItem>, flow: Option<String>) -> Questionnaire {
    let mut questionnaire = Questionnaire {
        questionnaire_flow: flow
            .filter(|flow| !flow.trim().is_empty())
            .unwrap_or_else(|| LEGACY_FLOW_PLACEHOLDER.to_string()),
        ..Questionnaire::default()
    };
    for item in items {
        match item.item_type {
            ItemType::Question => questionnaire.questions.push(item.text),
            ItemType::Exam => questionnaire.exams.push(item.text),
        }
    }
    questionnaire
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::ScriptedClient;
    use crate::domain::medical_case::NewMedicalCase;
    use crate::infrastructure::db::sqlite::memory_pool;

    const GENERATED: &str = r#"{"questions":["When did the pain start?","Does it radiate?"],"exams":["ECG","Chest auscultation"],"questionnaire_flow":"Onset first, then radiation."}"#;

    struct Fixture {
        use_case: QuestionnaireUseCase,
        items: QuestionnaireRepository,
        client: Arc<ScriptedClient>,
        case_id: i64,
    }

    async fn fixture(outcomes: Vec<GatewayOutcome>) -> Fixture {
        let pool = memory_pool().await;
        let cases = MedicalCaseRepository::new(pool.clone());
        let items = QuestionnaireRepository::new(pool);
        let case_id = cases
            .save_case(
                &NewMedicalCase {
                    title: "Chest pain".to_string(),
                    patient_age: Some(61),
                    ..NewMedicalCase::default()
                },
                &[],
            )
            .await
            .unwrap();
        let client = ScriptedClient::new(outcomes);
        Fixture {
            use_case: QuestionnaireUseCase::new(client.clone(), cases, items.clone()),
            items,
            client,
            case_id,
        }
    }

    fn key() -> ApiCredential {
        ApiCredential::new("sk-test")
    }

    #[tokio::test]
    async fn test_failed_generation_is_retryable_and_stores_nothing() {
        let fx = fixture(vec![
            GatewayOutcome::failure("rate limited"),
            GatewayOutcome::failure("rate limited"),
        ])
        .await;

        for _ in 0..2 {
            let questionnaire = fx.use_case.get_questionnaire(Some(&key()), fx.case_id).await.unwrap();
            assert!(questionnaire.questions.is_empty());
            assert!(questionnaire.exams.is_empty());
            assert_eq!(questionnaire.questionnaire_flow, GENERATION_FAILED_FLOW);
            assert!(fx.items.list_items(fx.case_id).await.unwrap().is_empty());
        }
        assert_eq!(fx.client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_first_read_generates_then_reuses_with_persisted_flow() {
        let fx = fixture(vec![ScriptedClient::success(GENERATED)]).await;

        let first = fx.use_case.get_questionnaire(Some(&key()), fx.case_id).await.unwrap();
        assert_eq!(first.questions, vec!["When did the pain start?", "Does it radiate?"]);
        assert_eq!(first.exams, vec!["ECG", "Chest auscultation"]);
        assert_eq!(first.questionnaire_flow, "Onset first, then radiation.");

        let second = fx.use_case.get_questionnaire(None, fx.case_id).await.unwrap();
        assert_eq!(second, first);

        let requests = fx.client.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_mode);
        assert_eq!(requests[0].model, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_unreadable_payload_persists_defaults() {
        let fx = fixture(vec![ScriptedClient::success("not json at all")]).await;

        let questionnaire = fx.use_case.get_questionnaire(Some(&key()), fx.case_id).await.unwrap();
        assert_eq!(questionnaire, llm_output::default_questionnaire());
        assert!(!fx.items.list_items(fx.case_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unpopulated_read_requires_credential() {
        let fx = fixture(vec![]).await;
        let result = fx.use_case.get_questionnaire(None, fx.case_id).await;
        assert!(matches!(result, Err(AppError::CredentialError(_))));
    }

    #[tokio::test]
    async fn test_missing_case_is_not_found() {
        let fx = fixture(vec![]).await;
        let result = fx.use_case.get_questionnaire(Some(&key()), 4040).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_regenerate_replaces_items() {
        let fx = fixture(vec![
            ScriptedClient::success(GENERATED),
            ScriptedClient::success(r#"{"questions":["Any syncope?"],"exams":[],"questionnaire_flow":"Brief."}"#),
        ])
        .await;
        fx.use_case.get_questionnaire(Some(&key()), fx.case_id).await.unwrap();

        let regenerated = fx.use_case.regenerate(&key(), fx.case_id).await.unwrap();
        assert_eq!(regenerated.questions, vec!["Any syncope?"]);
        assert!(regenerated.exams.is_empty());
        assert_eq!(regenerated.questionnaire_flow, "Brief.");
        assert_eq!(fx.items.list_items(fx.case_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_regenerate_failure_keeps_existing_items() {
        let fx = fixture(vec![
            ScriptedClient::success(GENERATED),
            GatewayOutcome::failure("timeout"),
        ])
        .await;
        fx.use_case.get_questionnaire(Some(&key()), fx.case_id).await.unwrap();

        let result = fx.use_case.regenerate(&key(), fx.case_id).await;
        assert!(matches!(result, Err(AppError::LLMError(_))));
        assert_eq!(fx.items.list_items(fx.case_id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_save_selection_marks_exactly_the_chosen_items() {
        let fx = fixture(vec![ScriptedClient::success(GENERATED)]).await;
        fx.use_case.get_questionnaire(Some(&key()), fx.case_id).await.unwrap();

        let saved = fx
            .use_case
            .save_selection(&QuestionnaireSelection {
                case_id: fx.case_id,
                questions: vec!["Does it radiate?".to_string()],
                exams: vec!["ECG".to_string(), "Not a stored exam".to_string()],
            })
            .await;
        assert!(saved);

        let items = fx.use_case.list_items(fx.case_id).await.unwrap();
        for item in &items {
            let expected = item.text == "Does it radiate?" || item.text == "ECG";
            assert_eq!(item.is_selected, expected, "item {:?}", item.text);
        }
    }

    #[test]
    fn test_from_items_falls_back_to_legacy_flow() {
        let questionnaire = from_items(Vec::new(), None);
        assert_eq!(questionnaire.questionnaire_flow, LEGACY_FLOW_PLACEHOLDER);
    }
}
