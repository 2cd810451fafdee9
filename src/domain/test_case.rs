use crate::domain::error::AppError;
use crate::domain::llm_config::{SamplingParams, TokenUsage, DEFAULT_MODEL};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TestCase {
    pub id: i64,
    pub name: String,
    pub model: String,
    pub prompt: String,
    pub system_message: Option<String>,
    #[serde(flatten)]
    pub sampling: SamplingParams,
    pub json_response: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct NewTestCase {
    #[serde(default = "default_test_name")]
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default = "default_model")]
    #[validate(length(min = 1, max = 50))]
    pub model: String,
    #[validate(length(min = 1))]
    pub prompt: String,
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(flatten)]
    #[validate(nested)]
    pub sampling: SamplingParams,
    #[serde(default)]
    pub json_response: bool,
}

fn default_test_name() -> String {
    "Unnamed Test".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl From<&TestCase> for NewTestCase {
    fn from(case: &TestCase) -> Self {
        Self {
            name: case.name.clone(),
            model: case.model.clone(),
            prompt: case.prompt.clone(),
            system_message: case.system_message.clone(),
            sampling: case.sampling.clone(),
            json_response: case.json_response,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl FromStr for RunStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(AppError::ParseError(format!(
                "Unknown test run status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TestRun {
    pub id: i64,
    pub test_case_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub status: RunStatus,
    pub response: Option<String>,
    pub error_message: Option<String>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub api_key_used: bool,
}

/// Values written to a run row once the upstream call has returned.
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub response: Option<String>,
    pub error_message: Option<String>,
    pub usage: TokenUsage,
}

#[derive(Debug, Serialize, Clone)]
pub struct TestCaseDetail {
    pub test_case: TestCase,
    pub test_runs: Vec<TestRun>,
}

/// What a caller gets back from running a prompt test, saved or not.
#[derive(Debug, Serialize, Clone)]
pub struct RunReport {
    pub test_case_id: Option<i64>,
    pub test_run_id: Option<i64>,
    pub status: RunStatus,
    pub duration_ms: i64,
    pub response: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub usage: TokenUsage,
}
