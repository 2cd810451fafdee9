use crate::domain::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Question,
    Exam,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Question => "question",
            ItemType::Exam => "exam",
        }
    }
}

impl FromStr for ItemType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "question" => Ok(ItemType::Question),
            "exam" => Ok(ItemType::Exam),
            other => Err(AppError::ParseError(format!(
                "Unknown questionnaire item type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QuestionnaireItem {
    pub id: i64,
    pub case_id: i64,
    pub item_type: ItemType,
    pub text: String,
    pub is_ai_generated: bool,
    pub priority: i64,
    pub is_selected: bool,
    pub created_at: DateTime<Utc>,
}

/// Generated or stored interview plan for a case.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Questionnaire {
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub exams: Vec<String>,
    #[serde(default)]
    pub questionnaire_flow: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QuestionnaireSelection {
    pub case_id: i64,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub exams: Vec<String>,
}
