pub mod medical_cases;
pub mod questionnaire;
pub mod sqlite;
pub mod templates;
pub mod test_cases;

pub use medical_cases::MedicalCaseRepository;
pub use questionnaire::QuestionnaireRepository;
pub use templates::TemplateRepository;
pub use test_cases::TestCaseRepository;
