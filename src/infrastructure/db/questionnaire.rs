use crate::domain::error::{AppError, Result};
use crate::domain::questionnaire::{ItemType, QuestionnaireItem, Questionnaire};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use std::str::FromStr;

#[derive(Clone)]
pub struct QuestionnaireRepository {
    pool: SqlitePool,
}

impl QuestionnaireRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Questions first, then exams, each in stored priority order.
    pub async fn list_items(&self, case_id: i64) -> Result<Vec<QuestionnaireItem>> {
        let entities = sqlx::query_as::<_, QuestionnaireItemEntity>(
            "SELECT id, case_id, item_type, text, is_ai_generated, priority, is_selected, created_at
             FROM questionnaire_item
             WHERE case_id = ?
             ORDER BY CASE item_type WHEN 'question' THEN 0 ELSE 1 END, priority, id",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list questionnaire items: {e}")))?;

        entities.into_iter().map(QuestionnaireItem::try_from).collect()
    }

    pub async fn stored_flow(&self, case_id: i64) -> Result<Option<String>> {
        let flow = sqlx::query_scalar::<_, Option<String>>(
            "SELECT questionnaire_flow FROM medical_case WHERE id = ?",
        )
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch questionnaire flow: {e}")))?;

        Ok(flow.flatten())
    }

    /// Stores a first questionnaire for the case. Returns `false` without
    /// writing when another request already populated it.
    pub async fn populate(&self, case_id: i64, questionnaire: &Questionnaire) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        // Write first so the lock is held before the count is read; a racing
        // writer waits here and then sees the committed items.
        sqlx::query("UPDATE medical_case SET updated_at = updated_at WHERE id = ?")
            .bind(case_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to lock medical case: {e}")))?;

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM questionnaire_item WHERE case_id = ?",
        )
        .bind(case_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to count questionnaire items: {e}")))?;
        if existing > 0 {
            return Ok(false);
        }

        write_questionnaire(&mut *tx, case_id, questionnaire).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit questionnaire: {e}")))?;
        Ok(true)
    }

    /// Swaps every stored item of the case for a new set in one transaction.
    pub async fn replace(&self, case_id: i64, questionnaire: &Questionnaire) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        sqlx::query("DELETE FROM questionnaire_item WHERE case_id = ?")
            .bind(case_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to clear questionnaire items: {e}")))?;

        write_questionnaire(&mut *tx, case_id, questionnaire).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit questionnaire: {e}")))?;
        Ok(())
    }

    /// Clears every selection flag of the case, then marks exact text
    /// matches per item type. Rolled back as a whole on error.
    pub async fn save_selection(
        &self,
        case_id: i64,
        questions: &[String],
        exams: &[String],
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        sqlx::query("UPDATE questionnaire_item SET is_selected = 0 WHERE case_id = ?")
            .bind(case_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to clear selection: {e}")))?;

        let selected = questions
            .iter()
            .map(|text| (ItemType::Question, text))
            .chain(exams.iter().map(|text| (ItemType::Exam, text)));
        for (item_type, text) in selected {
            sqlx::query(
                "UPDATE questionnaire_item SET is_selected = 1
                 WHERE case_id = ? AND item_type = ? AND text = ?",
            )
            .bind(case_id)
            .bind(item_type.as_str())
            .bind(text)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to mark selection: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit selection: {e}")))?;
        Ok(())
    }
}

async fn write_questionnaire(
    conn: &mut SqliteConnection,
    case_id: i64,
    questionnaire: &Questionnaire,
) -> Result<()> {
    let now = Utc::now();
    let groups = [
        (ItemType::Question, &questionnaire.questions),
        (ItemType::Exam, &questionnaire.exams),
    ];
    for (item_type, texts) in groups {
        for (index, text) in texts.iter().enumerate() {
            sqlx::query(
                "INSERT INTO questionnaire_item (case_id, item_type, text, is_ai_generated, priority, is_selected, created_at)
                 VALUES (?, ?, ?, 1, ?, 0, ?)",
            )
            .bind(case_id)
            .bind(item_type.as_str())
            .bind(text)
            .bind(index as i64 + 1)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to insert questionnaire item: {e}")))?;
        }
    }

    sqlx::query("UPDATE medical_case SET questionnaire_flow = ?, updated_at = ? WHERE id = ?")
        .bind(&questionnaire.questionnaire_flow)
        .bind(now)
        .bind(case_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to store questionnaire flow: {e}")))?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct QuestionnaireItemEntity {
    id: i64,
    case_id: i64,
    item_type: String,
    text: String,
    is_ai_generated: bool,
    priority: i64,
    is_selected: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuestionnaireItemEntity> for QuestionnaireItem {
    type Error = AppError;

    fn try_from(entity: QuestionnaireItemEntity) -> Result<Self> {
        Ok(Self {
            id: entity.id,
            case_id: entity.case_id,
            item_type: ItemType::from_str(&entity.item_type)?,
            text: entity.text,
            is_ai_generated: entity.is_ai_generated,
            priority: entity.priority,
            is_selected: entity.is_selected,
            created_at: entity.created_at,
        })
    }
}
