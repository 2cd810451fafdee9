use crate::domain::generation::CaseGenerationOptions;
use crate::domain::medical_case::CaseTemplate;

pub const DEFAULT_CASE_SYSTEM_MESSAGE: &str = "You are an experienced medical professional creating realistic patient cases for education and training purposes. \
Create a detailed and medically accurate case based on the provided information. Use realistic medical terminology, \
lab values, and findings. All cases should be fictional but realistic and medically accurate.";

/// Caller override first, then the template's, then the built-in default.
pub fn case_system_message(
    options: &CaseGenerationOptions,
    template: Option<&CaseTemplate>,
) -> String {
    let non_blank = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    non_blank(&options.system_message)
        .or_else(|| template.and_then(|t| non_blank(&t.system_message)))
        .unwrap_or_else(|| DEFAULT_CASE_SYSTEM_MESSAGE.to_string())
}

pub fn build_case_prompt(options: &CaseGenerationOptions, template: Option<&CaseTemplate>) -> String {
    let mut prompt = format!(
        "Create a realistic and detailed medical case with the following specifications:\n\n\
Specialty: {}\n\
Chief Complaint: {}\n\
Patient Age: {}\n\
Patient Gender: {}\n\
Complexity Level: {}\n\n\
Please include the following sections, formatted with section headers in Markdown:\n",
        options.specialty,
        options.chief_complaint,
        options.patient_age,
        options.patient_gender,
        options.complexity,
    );

    for section in options.sections() {
        prompt.push_str(&format!("- {}\n", section.heading()));
    }

    prompt.push_str(
        "\nEnsure all medical information is realistic and accurate. Use proper medical terminology and realistic values for vitals and lab results.\n\
Format your response as a medical case report with clear section headings using Markdown (## Section Title).\n\n\
Begin with a brief title for the case.",
    );

    if let Some(template) = template {
        let extra = template.prompt_template.trim();
        if !extra.is_empty() {
            prompt.push_str("\n\nAdditional instructions:\n");
            prompt.push_str(extra);
        }
    }

    prompt
}
