use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::SamplingParams;
use crate::domain::test_case::{NewTestCase, RunCompletion, RunStatus, TestCase, TestRun};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use std::str::FromStr;

const TEST_CASE_COLUMNS: &str = "id, name, model, prompt, system_message, temperature, max_tokens, top_p, frequency_penalty, presence_penalty, json_response, created_at, updated_at";

const TEST_RUN_COLUMNS: &str = "id, test_case_id, start_time, end_time, duration_ms, status, response, error_message, prompt_tokens, completion_tokens, total_tokens, api_key_used";

#[derive(Clone)]
pub struct TestCaseRepository {
    pool: SqlitePool,
}

impl TestCaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: &NewTestCase) -> Result<TestCase> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO test_case (name, model, prompt, system_message, temperature, max_tokens, top_p, frequency_penalty, presence_penalty, json_response, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.name)
        .bind(&input.model)
        .bind(&input.prompt)
        .bind(&input.system_message)
        .bind(input.sampling.temperature)
        .bind(input.sampling.max_tokens)
        .bind(input.sampling.top_p)
        .bind(input.sampling.frequency_penalty)
        .bind(input.sampling.presence_penalty)
        .bind(input.json_response)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert test case: {e}")))?;

        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> Result<TestCase> {
        let entity = sqlx::query_as::<_, TestCaseEntity>(&format!(
            "SELECT {TEST_CASE_COLUMNS} FROM test_case WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch test case: {e}")))?;

        match entity {
            Some(entity) => Ok(entity.into()),
            None => Err(AppError::NotFound(format!("Test case not found: {}", id))),
        }
    }

    pub async fn list(&self) -> Result<Vec<TestCase>> {
        let entities = sqlx::query_as::<_, TestCaseEntity>(&format!(
            "SELECT {TEST_CASE_COLUMNS} FROM test_case ORDER BY updated_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list test cases: {e}")))?;

        Ok(entities.into_iter().map(|entity| entity.into()).collect())
    }

    /// Removes the test case; its runs go with it through the cascade.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM test_case WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete test case: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Test case not found: {}", id)));
        }
        Ok(())
    }

    pub async fn start_run(
        &self,
        test_case_id: i64,
        start_time: DateTime<Utc>,
        api_key_used: bool,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO test_run (test_case_id, start_time, status, api_key_used) VALUES (?, ?, ?, ?)",
        )
        .bind(test_case_id)
        .bind(start_time)
        .bind(RunStatus::Running.as_str())
        .bind(api_key_used)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert test run: {e}")))?;

        Ok(result.last_insert_rowid())
    }

    pub async fn complete_run(&self, run_id: i64, completion: &RunCompletion) -> Result<()> {
        sqlx::query(
            "UPDATE test_run
             SET status = ?, end_time = ?, duration_ms = ?, response = ?, error_message = ?,
                 prompt_tokens = ?, completion_tokens = ?, total_tokens = ?
             WHERE id = ?",
        )
        .bind(completion.status.as_str())
        .bind(completion.end_time)
        .bind(completion.duration_ms)
        .bind(&completion.response)
        .bind(&completion.error_message)
        .bind(completion.usage.prompt_tokens)
        .bind(completion.usage.completion_tokens)
        .bind(completion.usage.total_tokens)
        .bind(run_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update test run: {e}")))?;

        Ok(())
    }

    #[cfg(test)]
    pub async fn get_run(&self, run_id: i64) -> Result<TestRun> {
        let entity = sqlx::query_as::<_, TestRunEntity>(&format!(
            "SELECT {TEST_RUN_COLUMNS} FROM test_run WHERE id = ?"
        ))
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch test run: {e}")))?;

        match entity {
            Some(entity) => entity.try_into(),
            None => Err(AppError::NotFound(format!("Test run not found: {}", run_id))),
        }
    }

    pub async fn list_runs(&self, test_case_id: i64) -> Result<Vec<TestRun>> {
        let entities = sqlx::query_as::<_, TestRunEntity>(&format!(
            "SELECT {TEST_RUN_COLUMNS} FROM test_run WHERE test_case_id = ? ORDER BY start_time DESC, id DESC"
        ))
        .bind(test_case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list test runs: {e}")))?;

        entities.into_iter().map(TestRun::try_from).collect()
    }

    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<TestRun>> {
        let entities = sqlx::query_as::<_, TestRunEntity>(&format!(
            "SELECT {TEST_RUN_COLUMNS} FROM test_run ORDER BY start_time DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list recent test runs: {e}")))?;

        entities.into_iter().map(TestRun::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct TestCaseEntity {
    id: i64,
    name: String,
    model: String,
    prompt: String,
    system_message: Option<String>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    json_response: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TestCaseEntity> for TestCase {
    fn from(entity: TestCaseEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            model: entity.model,
            prompt: entity.prompt,
            system_message: entity.system_message,
            sampling: SamplingParams {
                temperature: entity.temperature,
                max_tokens: entity.max_tokens,
                top_p: entity.top_p,
                frequency_penalty: entity.frequency_penalty,
                presence_penalty: entity.presence_penalty,
            },
            json_response: entity.json_response,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TestRunEntity {
    id: i64,
    test_case_id: i64,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    duration_ms: Option<i64>,
    status: String,
    response: Option<String>,
    error_message: Option<String>,
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    total_tokens: Option<i64>,
    api_key_used: bool,
}

impl TryFrom<TestRunEntity> for TestRun {
    type Error = AppError;

    fn try_from(entity: TestRunEntity) -> Result<Self> {
        Ok(Self {
            id: entity.id,
            test_case_id: entity.test_case_id,
            start_time: entity.start_time,
            end_time: entity.end_time,
            duration_ms: entity.duration_ms,
            status: RunStatus::from_str(&entity.status)?,
            response: entity.response,
            error_message: entity.error_message,
            prompt_tokens: entity.prompt_tokens,
            completion_tokens: entity.completion_tokens,
            total_tokens: entity.total_tokens,
            api_key_used: entity.api_key_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm_config::TokenUsage;
    use crate::infrastructure::db::sqlite::memory_pool;

    fn sample_case() -> NewTestCase {
        serde_json::from_value(serde_json::json!({
            "name": "Greeting",
            "prompt": "Say hello",
            "temperature": 0.2,
            "json_response": true
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_reads_back() {
        let repo = TestCaseRepository::new(memory_pool().await);
        let created = repo.create(&sample_case()).await.unwrap();

        assert_eq!(created.name, "Greeting");
        assert_eq!(created.model, "gpt-4o");
        assert_eq!(created.sampling.max_tokens, 1000);
        assert!((created.sampling.temperature - 0.2).abs() < f32::EPSILON);
        assert!(created.json_response);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_lifecycle_updates_once() {
        let repo = TestCaseRepository::new(memory_pool().await);
        let case = repo.create(&sample_case()).await.unwrap();
        let run_id = repo.start_run(case.id, Utc::now(), true).await.unwrap();

        let running = repo.get_run(run_id).await.unwrap();
        assert_eq!(running.status, RunStatus::Running);
        assert!(running.end_time.is_none());

        repo.complete_run(
            run_id,
            &RunCompletion {
                status: RunStatus::Completed,
                end_time: Utc::now(),
                duration_ms: 42,
                response: Some("\"hello\"".to_string()),
                error_message: None,
                usage: TokenUsage {
                    prompt_tokens: 3,
                    completion_tokens: 1,
                    total_tokens: 4,
                },
            },
        )
        .await
        .unwrap();

        let done = repo.get_run(run_id).await.unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert_eq!(done.duration_ms, Some(42));
        assert_eq!(done.total_tokens, Some(4));
        assert!(done.api_key_used);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_runs() {
        let repo = TestCaseRepository::new(memory_pool().await);
        let case = repo.create(&sample_case()).await.unwrap();
        repo.start_run(case.id, Utc::now(), false).await.unwrap();
        repo.start_run(case.id, Utc::now(), false).await.unwrap();
        assert_eq!(repo.list_runs(case.id).await.unwrap().len(), 2);

        repo.delete(case.id).await.unwrap();
        assert!(repo.recent_runs(10).await.unwrap().is_empty());
        assert!(matches!(repo.get(case.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(repo.delete(case.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_run_requires_existing_case() {
        let repo = TestCaseRepository::new(memory_pool().await);
        let result = repo.start_run(999, Utc::now(), false).await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));
    }
}
