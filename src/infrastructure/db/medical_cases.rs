use crate::domain::error::{AppError, Result};
use crate::domain::medical_case::{
    CaseSections, CaseSummary, Diagnosis, MedicalCase, MedicalCaseDetail, MedicalSpecialty,
    NewMedicalCase, NewSpecialty,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool};

const CASE_SELECT: &str = "SELECT c.id, c.title, c.patient_age, c.patient_gender,
        c.chief_complaint, c.history_present_illness, c.past_medical_history, c.medications,
        c.allergies, c.family_history, c.social_history, c.physical_examination, c.vital_signs,
        c.laboratory_results, c.imaging_results, c.assessment, c.plan,
        c.specialty_id, c.prompt_used, c.system_message, c.ai_model, c.questionnaire_flow,
        c.created_at, c.updated_at, s.name AS specialty_name
     FROM medical_case c
     LEFT JOIN medical_specialty s ON s.id = c.specialty_id";

#[derive(Clone)]
pub struct MedicalCaseRepository {
    pool: SqlitePool,
}

impl MedicalCaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persists the case, its specialty link and its diagnoses atomically.
    pub async fn save_case(&self, case: &NewMedicalCase, diagnoses: &[String]) -> Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        let specialty_id = match case
            .specialty_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            Some(name) => Some(get_or_create_specialty(&mut *tx, name).await?),
            None => None,
        };

        let now = Utc::now();
        let sections = &case.sections;
        let result = sqlx::query(
            "INSERT INTO medical_case (title, patient_age, patient_gender,
                chief_complaint, history_present_illness, past_medical_history, medications,
                allergies, family_history, social_history, physical_examination, vital_signs,
                laboratory_results, imaging_results, assessment, plan,
                specialty_id, prompt_used, system_message, ai_model, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&case.title)
        .bind(case.patient_age)
        .bind(&case.patient_gender)
        .bind(&sections.chief_complaint)
        .bind(&sections.history_present_illness)
        .bind(&sections.past_medical_history)
        .bind(&sections.medications)
        .bind(&sections.allergies)
        .bind(&sections.family_history)
        .bind(&sections.social_history)
        .bind(&sections.physical_examination)
        .bind(&sections.vital_signs)
        .bind(&sections.laboratory_results)
        .bind(&sections.imaging_results)
        .bind(&sections.assessment)
        .bind(&sections.plan)
        .bind(specialty_id)
        .bind(&case.prompt_used)
        .bind(&case.system_message)
        .bind(&case.ai_model)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert medical case: {e}")))?;
        let case_id = result.last_insert_rowid();

        for name in diagnoses {
            sqlx::query("INSERT INTO diagnosis (case_id, name) VALUES (?, ?)")
                .bind(case_id)
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to insert diagnosis: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit medical case: {e}")))?;

        tracing::info!(case_id, diagnoses = diagnoses.len(), "Saved medical case");
        Ok(case_id)
    }

    pub async fn get_case(&self, id: i64) -> Result<MedicalCaseDetail> {
        let entity = sqlx::query_as::<_, MedicalCaseEntity>(&format!("{CASE_SELECT} WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch medical case: {e}")))?
            .ok_or_else(|| AppError::NotFound(format!("Medical case not found: {}", id)))?;

        let diagnoses = sqlx::query_as::<_, DiagnosisEntity>(
            "SELECT id, case_id, name, description, icd_code FROM diagnosis WHERE case_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch diagnoses: {e}")))?;

        let specialty = entity.specialty_name.clone();
        Ok(MedicalCaseDetail {
            case: entity.into(),
            specialty,
            diagnoses: diagnoses.into_iter().map(|d| d.into()).collect(),
        })
    }

    pub async fn list_cases(&self, limit: Option<i64>) -> Result<Vec<CaseSummary>> {
        let summaries = sqlx::query_as::<_, CaseSummaryEntity>(
            "SELECT c.id, c.title, c.patient_age, c.patient_gender, s.name AS specialty_name, c.created_at
             FROM medical_case c
             LEFT JOIN medical_specialty s ON s.id = c.specialty_id
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT ?",
        )
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list medical cases: {e}")))?;

        Ok(summaries.into_iter().map(|s| s.into()).collect())
    }

    /// Deletes the case; diagnoses and questionnaire items cascade.
    pub async fn delete_case(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM medical_case WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete medical case: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Medical case not found: {}", id)));
        }
        Ok(())
    }

    pub async fn list_specialties(&self) -> Result<Vec<MedicalSpecialty>> {
        sqlx::query_as::<_, SpecialtyEntity>(
            "SELECT id, name, description FROM medical_specialty ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list specialties: {e}")))
        .map(|entities| entities.into_iter().map(|e| e.into()).collect())
    }

    pub async fn add_specialty(&self, input: &NewSpecialty) -> Result<MedicalSpecialty> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError(
                "Specialty name must not be blank".to_string(),
            ));
        }
        let result = sqlx::query(
            "INSERT INTO medical_specialty (name, description) VALUES (?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(&input.description)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert specialty: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::ValidationError(format!(
                "Specialty already exists: {}",
                name
            )));
        }

        Ok(MedicalSpecialty {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            description: input.description.clone(),
        })
    }
}

/// Upsert keyed on the unique name, so concurrent callers converge on one row.
async fn get_or_create_specialty(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    sqlx::query("INSERT INTO medical_specialty (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to upsert specialty: {e}")))?;

    sqlx::query_scalar::<_, i64>("SELECT id FROM medical_specialty WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch specialty: {e}")))
}

#[derive(sqlx::FromRow)]
struct MedicalCaseEntity {
    id: i64,
    title: String,
    patient_age: Option<i64>,
    patient_gender: Option<String>,
    chief_complaint: String,
    history_present_illness: String,
    past_medical_history: String,
    medications: String,
    allergies: String,
    family_history: String,
    social_history: String,
    physical_examination: String,
    vital_signs: String,
    laboratory_results: String,
    imaging_results: String,
    assessment: String,
    plan: String,
    specialty_id: Option<i64>,
    prompt_used: Option<String>,
    system_message: Option<String>,
    ai_model: Option<String>,
    questionnaire_flow: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    specialty_name: Option<String>,
}

impl From<MedicalCaseEntity> for MedicalCase {
    fn from(e: MedicalCaseEntity) -> Self {
        Self {
            id: e.id,
            title: e.title,
            patient_age: e.patient_age,
            patient_gender: e.patient_gender,
            sections: CaseSections {
                chief_complaint: e.chief_complaint,
                history_present_illness: e.history_present_illness,
                past_medical_history: e.past_medical_history,
                medications: e.medications,
                allergies: e.allergies,
                family_history: e.family_history,
                social_history: e.social_history,
                physical_examination: e.physical_examination,
                vital_signs: e.vital_signs,
                laboratory_results: e.laboratory_results,
                imaging_results: e.imaging_results,
                assessment: e.assessment,
                plan: e.plan,
            },
            specialty_id: e.specialty_id,
            prompt_used: e.prompt_used,
            system_message: e.system_message,
            ai_model: e.ai_model,
            questionnaire_flow: e.questionnaire_flow,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CaseSummaryEntity {
    id: i64,
    title: String,
    patient_age: Option<i64>,
    patient_gender: Option<String>,
    specialty_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CaseSummaryEntity> for CaseSummary {
    fn from(e: CaseSummaryEntity) -> Self {
        Self {
            id: e.id,
            title: e.title,
            patient_age: e.patient_age,
            patient_gender: e.patient_gender,
            specialty: e.specialty_name,
            created_at: e.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DiagnosisEntity {
    id: i64,
    case_id: i64,
    name: String,
    description: Option<String>,
    icd_code: Option<String>,
}

impl From<DiagnosisEntity> for Diagnosis {
    fn from(e: DiagnosisEntity) -> Self {
        Self {
            id: e.id,
            case_id: e.case_id,
            name: e.name,
            description: e.description,
            icd_code: e.icd_code,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SpecialtyEntity {
    id: i64,
    name: String,
    description: Option<String>,
}

impl From<SpecialtyEntity> for MedicalSpecialty {
    fn from(e: SpecialtyEntity) -> Self {
        Self {
            id: e.id,
            name: e.name,
            description: e.description,
        }
    }
}
