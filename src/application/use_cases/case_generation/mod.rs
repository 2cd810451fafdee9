pub mod diagnosis;
pub mod parser;
pub mod prompts;

use crate::domain::error::{AppError, Result};
use crate::domain::generation::{CaseGenerationOptions, GeneratedCase, GenerationMetadata};
use crate::domain::llm_config::{ApiCredential, CompletionRequest, GatewayOutcome};
use crate::domain::medical_case::NewMedicalCase;
use crate::infrastructure::db::{MedicalCaseRepository, TemplateRepository};
use crate::infrastructure::llm_clients::LLMClient;
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use diagnosis::extract_diagnoses;
use parser::{case_sections, parse_case_content, TITLE_KEY};
use prompts::{build_case_prompt, case_system_message};

const UNTITLED_CASE: &str = "Untitled Case";

pub struct CaseGenerationUseCase {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    cases: MedicalCaseRepository,
    templates: TemplateRepository,
}

impl CaseGenerationUseCase {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        cases: MedicalCaseRepository,
        templates: TemplateRepository,
    ) -> Self {
        Self {
            llm_client,
            cases,
            templates,
        }
    }

    pub async fn generate(
        &self,
        credential: &ApiCredential,
        options: &CaseGenerationOptions,
        save: bool,
    ) -> Result<GeneratedCase> {
        options.validate()?;

        let template = match options.template_id {
            Some(id) => Some(self.templates.get(id).await?),
            None => None,
        };
        let system_message = case_system_message(options, template.as_ref());
        let prompt = build_case_prompt(options, template.as_ref());

        tracing::info!(
            specialty = %options.specialty,
            complexity = %options.complexity,
            model = %options.model,
            template_id = ?options.template_id,
            "Generating medical case"
        );

        let request = CompletionRequest::from_prompt(
            &options.model,
            Some(&system_message),
            &prompt,
            options.sampling(),
            false,
        );
        let (content, usage) = match self.llm_client.complete(credential, &request).await {
            GatewayOutcome::Success { content, usage } => (content, usage),
            GatewayOutcome::Failure { message } => {
                tracing::error!(error = %message, "Medical case generation failed");
                return Err(AppError::LLMError(message));
            }
        };

        let parsed = parse_case_content(&content);
        let diagnoses = parsed
            .get("assessment")
            .map(|assessment| extract_diagnoses(assessment, options.diagnosis_dedup))
            .unwrap_or_default();

        let metadata = GenerationMetadata {
            generated_at: Utc::now().to_rfc3339(),
            model_used: options.model.clone(),
            specialty: options.specialty.clone(),
            chief_complaint: options.chief_complaint.clone(),
            patient_age: options.patient_age.clone(),
            patient_gender: options.patient_gender.clone(),
            complexity: options.complexity,
            prompt_used: prompt,
            system_message,
            tokens: usage,
        };

        let case_id = if save {
            let title = parsed
                .get(TITLE_KEY)
                .map(|title| title.trim())
                .filter(|title| !title.is_empty())
                .unwrap_or(UNTITLED_CASE);
            let new_case = NewMedicalCase {
                title: title.to_string(),
                patient_age: options.numeric_age(),
                patient_gender: Some(options.patient_gender.clone()),
                sections: case_sections(&parsed),
                specialty_name: Some(options.specialty.clone()),
                prompt_used: Some(metadata.prompt_used.clone()),
                system_message: Some(metadata.system_message.clone()),
                ai_model: Some(metadata.model_used.clone()),
            };
            Some(self.cases.save_case(&new_case, &diagnoses).await?)
        } else {
            None
        };

        Ok(GeneratedCase {
            case: parsed,
            diagnoses,
            metadata,
            raw_content: content,
            case_id,
        })
    }
}
