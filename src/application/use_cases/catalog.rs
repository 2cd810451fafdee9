use crate::domain::error::Result;
use crate::domain::medical_case::{
    CaseSummary, CaseTemplate, MedicalCaseDetail, MedicalSpecialty, NewCaseTemplate, NewSpecialty,
};
use crate::infrastructure::db::{MedicalCaseRepository, TemplateRepository};
use validator::Validate;

pub const RECENT_CASES_LIMIT: i64 = 5;

/// Read and maintenance operations over stored cases, specialties and
/// templates. Nothing here talks to the gateway.
pub struct CatalogUseCase {
    cases: MedicalCaseRepository,
    templates: TemplateRepository,
}

impl CatalogUseCase {
    pub fn new(cases: MedicalCaseRepository, templates: TemplateRepository) -> Self {
        Self { cases, templates }
    }

    pub async fn list_cases(&self) -> Result<Vec<CaseSummary>> {
        self.cases.list_cases(None).await
    }

    pub async fn recent_cases(&self) -> Result<Vec<CaseSummary>> {
        self.cases.list_cases(Some(RECENT_CASES_LIMIT)).await
    }

    pub async fn get_case(&self, id: i64) -> Result<MedicalCaseDetail> {
        self.cases.get_case(id).await
    }

    pub async fn delete_case(&self, id: i64) -> Result<()> {
        self.cases.delete_case(id).await?;
        tracing::info!(case_id = id, "Medical case deleted");
        Ok(())
    }

    pub async fn list_specialties(&self) -> Result<Vec<MedicalSpecialty>> {
        self.cases.list_specialties().await
    }

    pub async fn add_specialty(&self, input: &NewSpecialty) -> Result<MedicalSpecialty> {
        input.validate()?;
        self.cases.add_specialty(input).await
    }

    pub async fn list_templates(&self) -> Result<Vec<CaseTemplate>> {
        self.templates.list().await
    }

    pub async fn get_template(&self, id: i64) -> Result<CaseTemplate> {
        self.templates.get(id).await
    }

    pub async fn add_template(&self, input: &NewCaseTemplate) -> Result<CaseTemplate> {
        input.validate()?;
        self.templates.create(input).await
    }

    pub async fn delete_template(&self, id: i64) -> Result<()> {
        self.templates.delete(id).await
    }
}
