use crate::domain::questionnaire::Questionnaire;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PayloadQuality {
    Clean,
    Repaired,
    Defaulted,
}

/// Reads the model's JSON answer. A truncated object gets one closing brace
/// appended; anything still unreadable is replaced by the built-in set.
pub(crate) fn parse_questionnaire(output: &str) -> (Questionnaire, PayloadQuality) {
    let payload = strip_code_fence(output);

    if let Ok(parsed) = serde_json::from_str::<Questionnaire>(&payload) {
        return (parsed, PayloadQuality::Clean);
    }

    let repaired = format!("{}}}", payload);
    match serde_json::from_str::<Questionnaire>(&repaired) {
        Ok(parsed) => (parsed, PayloadQuality::Repaired),
        Err(e) => {
            tracing::warn!(error = %e, "Questionnaire payload unreadable after repair, using defaults");
            (default_questionnaire(), PayloadQuality::Defaulted)
        }
    }
}

fn strip_code_fence(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(stripped) = trimmed.strip_prefix("```json") {
        return stripped.trim().trim_end_matches("```").trim().to_string();
    }
    if let Some(stripped) = trimmed.strip_prefix("```") {
        return stripped.trim().trim_end_matches("```").trim().to_string();
    }
    trimmed.to_string()
}

pub(crate) fn default_questionnaire() -> Questionnaire {
    let to_strings = |items: &[&str]| items.iter().map(|item| item.to_string()).collect();
    Questionnaire {
        questions: to_strings(&[
            "What brings you in today?",
            "When did your symptoms start?",
            "How would you rate the severity of your symptoms?",
            "Have you had anything like this before?",
            "What makes the symptoms better or worse?",
            "Do you have any other medical conditions?",
            "What medications are you currently taking?",
            "Do you have any allergies?",
        ]),
        exams: to_strings(&[
            "Vital signs measurement",
            "General appearance assessment",
            "Cardiovascular examination",
            "Respiratory examination",
            "Abdominal examination",
        ]),
        questionnaire_flow: "Start with open-ended questions about the chief complaint, \
then characterize onset, duration and severity. Review past medical history, \
medications and allergies before moving on to a focused review of systems."
            .to_string(),
    }
}
