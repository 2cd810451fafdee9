use crate::domain::medical_case::MedicalCaseDetail;

pub const QUESTIONNAIRE_SYSTEM_MESSAGE: &str = "You are an experienced medical professional assisting with patient interviews. \
Generate relevant, focused, and clinically appropriate questions and physical examination procedures \
for the described patient case. Be specific and practical. Format your entire response as valid JSON.";

pub fn build_questionnaire_prompt(detail: &MedicalCaseDetail) -> String {
    format!(
        "Based on the following medical case information, please generate:\n\
1. A list of 10-15 important questions to ask this patient during the clinical interview\n\
2. A list of 5-10 recommended physical examination procedures to perform\n\
3. A short paragraph suggesting a logical order/flow for the clinical questioning\n\n\
Respond in JSON format with the following structure:\n\
{{\n  \"questions\": [\"Question 1\", \"Question 2\", ...],\n  \"exams\": [\"Exam 1\", \"Exam 2\", ...],\n  \"questionnaire_flow\": \"Logical flow description...\"\n}}\n\n\
Case Information:\n{}",
        case_context(detail)
    )
}

/// Clinical fields the interview plan is based on. Empty sections are skipped.
fn case_context(detail: &MedicalCaseDetail) -> String {
    let case = &detail.case;
    let age = case
        .patient_age
        .map(|age| format!("{} year old", age))
        .unwrap_or_else(|| "adult".to_string());
    let gender = case
        .patient_gender
        .as_deref()
        .filter(|gender| !gender.trim().is_empty())
        .unwrap_or("patient");

    let mut context = format!(
        "Medical Case Information:\n- Patient: {} {}\n- Chief Complaint: {}\n- Specialty: {}\n",
        age,
        gender,
        case.sections.chief_complaint,
        detail.specialty.as_deref().unwrap_or("General"),
    );

    let sections = &case.sections;
    for text in [
        &sections.history_present_illness,
        &sections.past_medical_history,
        &sections.medications,
        &sections.allergies,
        &sections.physical_examination,
        &sections.vital_signs,
    ] {
        if !text.trim().is_empty() {
            context.push('\n');
            context.push_str(text.trim());
            context.push('\n');
        }
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::medical_case::{CaseSections, MedicalCase};
    use chrono::Utc;

    #[test]
    fn test_context_includes_demographics_and_non_empty_sections() {
        let mut sections = CaseSections::default();
        sections.chief_complaint = "Headache".to_string();
        sections.medications = "Ibuprofen PRN".to_string();
        let detail = MedicalCaseDetail {
            case: MedicalCase {
                id: 1,
                title: "Headache".to_string(),
                patient_age: Some(34),
                patient_gender: Some("female".to_string()),
                sections,
                specialty_id: None,
                prompt_used: None,
                system_message: None,
                ai_model: None,
                questionnaire_flow: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            specialty: None,
            diagnoses: vec![],
        };

        let prompt = build_questionnaire_prompt(&detail);
        assert!(prompt.contains("- Patient: 34 year old female"));
        assert!(prompt.contains("- Specialty: General"));
        assert!(prompt.contains("\nIbuprofen PRN\n"));
        assert!(prompt.contains("\"questionnaire_flow\""));
    }
}
