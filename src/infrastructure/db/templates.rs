use crate::domain::error::{AppError, Result};
use crate::domain::medical_case::{CaseTemplate, NewCaseTemplate};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

const TEMPLATE_SELECT: &str = "SELECT t.id, t.name, t.description, t.system_message, t.prompt_template,
        t.specialty_id, s.name AS specialty_name, t.created_at, t.updated_at
     FROM case_template t
     LEFT JOIN medical_specialty s ON s.id = t.specialty_id";

#[derive(Clone)]
pub struct TemplateRepository {
    pool: SqlitePool,
}

impl TemplateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<CaseTemplate>> {
        sqlx::query_as::<_, TemplateEntity>(&format!("{TEMPLATE_SELECT} ORDER BY t.name"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list templates: {e}")))
            .map(|entities| entities.into_iter().map(|e| e.into()).collect())
    }

    pub async fn get(&self, id: i64) -> Result<CaseTemplate> {
        sqlx::query_as::<_, TemplateEntity>(&format!("{TEMPLATE_SELECT} WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch template: {e}")))?
            .map(|entity| entity.into())
            .ok_or_else(|| AppError::NotFound(format!("Template not found: {}", id)))
    }

    pub async fn create(&self, input: &NewCaseTemplate) -> Result<CaseTemplate> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO case_template (name, description, system_message, prompt_template, specialty_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.system_message)
        .bind(&input.prompt_template)
        .bind(input.specialty_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert template: {e}")))?;

        self.get(result.last_insert_rowid()).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM case_template WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete template: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Template not found: {}", id)));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct TemplateEntity {
    id: i64,
    name: String,
    description: Option<String>,
    system_message: Option<String>,
    prompt_template: String,
    specialty_id: Option<i64>,
    specialty_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TemplateEntity> for CaseTemplate {
    fn from(e: TemplateEntity) -> Self {
        Self {
            id: e.id,
            name: e.name,
            description: e.description,
            system_message: e.system_message,
            prompt_template: e.prompt_template,
            specialty_id: e.specialty_id,
            specialty: e.specialty_name,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}
