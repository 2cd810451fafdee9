pub mod error;
pub mod generation;
pub mod llm_config;
pub mod medical_case;
pub mod questionnaire;
pub mod test_case;
