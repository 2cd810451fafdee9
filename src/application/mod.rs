pub mod use_cases;

pub use use_cases::case_generation::CaseGenerationUseCase;
pub use use_cases::catalog::CatalogUseCase;
pub use use_cases::connection::ConnectionUseCase;
pub use use_cases::prompt_test::PromptTestUseCase;
pub use use_cases::questionnaire::QuestionnaireUseCase;
