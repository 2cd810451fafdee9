use crate::domain::llm_config::{SamplingParams, TokenUsage, DEFAULT_MODEL};
use crate::domain::medical_case::CaseSection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Moderate,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        };
        f.write_str(label)
    }
}

/// How repeated diagnosis candidates are treated when a case is parsed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    /// Every match of every pattern, overlaps included.
    #[default]
    KeepAll,
    /// First occurrence of each exact string.
    Deduplicate,
}

/// Every option the case generator recognizes, with its default.
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(default)]
pub struct CaseGenerationOptions {
    #[validate(length(max = 100))]
    pub specialty: String,
    #[validate(length(max = 2000))]
    pub chief_complaint: String,
    /// Either a number ("45") or a descriptor ("adult", "elderly").
    #[validate(length(min = 1, max = 40))]
    pub patient_age: String,
    #[validate(length(min = 1, max = 20))]
    pub patient_gender: String,
    pub complexity: Complexity,
    pub include_sections: Vec<CaseSection>,
    #[validate(length(min = 1, max = 50))]
    pub model: String,
    pub system_message: Option<String>,
    pub template_id: Option<i64>,
    pub diagnosis_dedup: DedupMode,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
    #[validate(range(min = 1, max = 128000))]
    pub max_tokens: u32,
}

impl Default for CaseGenerationOptions {
    fn default() -> Self {
        Self {
            specialty: String::new(),
            chief_complaint: String::new(),
            patient_age: "adult".to_string(),
            patient_gender: "not specified".to_string(),
            complexity: Complexity::Moderate,
            include_sections: CaseSection::DEFAULT_GENERATED.to_vec(),
            model: DEFAULT_MODEL.to_string(),
            system_message: None,
            template_id: None,
            diagnosis_dedup: DedupMode::KeepAll,
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

impl CaseGenerationOptions {
    /// Integral ages are stored; descriptors such as "adult" are not.
    pub fn numeric_age(&self) -> Option<i64> {
        self.patient_age.trim().parse::<i64>().ok()
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..SamplingParams::default()
        }
    }

    pub fn sections(&self) -> &[CaseSection] {
        if self.include_sections.is_empty() {
            &CaseSection::DEFAULT_GENERATED
        } else {
            &self.include_sections
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct GenerationMetadata {
    pub generated_at: String,
    pub model_used: String,
    pub specialty: String,
    pub chief_complaint: String,
    pub patient_age: String,
    pub patient_gender: String,
    pub complexity: Complexity,
    pub prompt_used: String,
    pub system_message: String,
    pub tokens: TokenUsage,
}

#[derive(Debug, Serialize, Clone)]
pub struct GeneratedCase {
    /// Parsed sections keyed by normalized heading, plus `title`.
    pub case: BTreeMap<String, String>,
    pub diagnoses: Vec<String>,
    pub metadata: GenerationMetadata,
    pub raw_content: String,
    pub case_id: Option<i64>,
}
